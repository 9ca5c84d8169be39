//! Yahoo Finance market-data provider.
//!
//! Daily bars come from the v8 chart API, company profiles from the v10
//! quoteSummary API. One call is one HTTP attempt: retries belong to the
//! `RetryPolicy` held by `PriceFetcher`. The circuit breaker is consulted
//! before every request and fed by every response.
//!
//! Yahoo has no official API and changes its payloads without notice. The CSV
//! provider is the offline fallback.

use super::circuit_breaker::CircuitBreaker;
use super::frame::PriceFrame;
use super::provider::{DataError, PriceProvider, RawBar};
use crate::calendar::DateRange;
use crate::domain::CompanyProfile;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
    #[serde(rename = "longBusinessSummary")]
    long_business_summary: Option<String>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
}

impl YahooProvider {
    /// `timeout` bounds each individual HTTP request.
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: BASE_URL.to_string(),
        })
    }

    fn chart_url(&self, symbol: &str, range: DateRange) -> String {
        let start_ts = range.start.and_time(chrono::NaiveTime::default()).and_utc().timestamp();
        let end_ts = range.end.and_time(chrono::NaiveTime::default()).and_utc().timestamp() + 86_399;
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }

    fn profile_url(&self, symbol: &str) -> String {
        format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=assetProfile",
            self.base_url
        )
    }

    /// One GET with status classification and circuit-breaker bookkeeping.
    fn get(&self, url: &str, symbol: &str) -> Result<reqwest::blocking::Response, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::Timeout(e.to_string())
            } else if e.is_connect() {
                DataError::NetworkUnreachable(e.to_string())
            } else {
                DataError::Other(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            if status.is_server_error() {
                self.circuit_breaker.record_failure();
            }
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        self.circuit_breaker.record_success();
        Ok(resp)
    }
}

fn api_error(symbol: &str, err: Option<ApiError>, what: &str) -> DataError {
    match err {
        Some(e) if e.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(e) => DataError::ResponseFormatChanged(format!("{}: {}", e.code, e.description)),
        None => DataError::ResponseFormatChanged(format!("empty {what} result with no error")),
    }
}

/// Parse a chart payload into a tagged frame.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<PriceFrame, DataError> {
    let data = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| api_error(symbol, resp.chart.error, "chart"))?;

    // No sessions in range: Yahoo omits the timestamp array entirely.
    let timestamps = data.timestamp.unwrap_or_default();

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        // Session timestamps are 09:00 KST, i.e. 00:00 UTC of the same date.
        let date = chrono::DateTime::from_timestamp(ts + 9 * 3600, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none() {
            continue;
        }

        bars.push(RawBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume: volume.unwrap_or(0),
            adj_close: adj_close.unwrap_or(f64::NAN),
        });
    }

    Ok(PriceFrame::from_rows(bars))
}

fn parse_profile(symbol: &str, resp: QuoteSummaryResponse) -> Result<CompanyProfile, DataError> {
    let result = resp
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| api_error(symbol, resp.quote_summary.error, "quoteSummary"))?;

    let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
    Ok(result
        .asset_profile
        .map(|p| CompanyProfile {
            sector: non_empty(p.sector),
            industry: non_empty(p.industry),
            description: non_empty(p.long_business_summary),
        })
        .unwrap_or_default())
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_daily(&self, symbol: &str, range: DateRange) -> Result<PriceFrame, DataError> {
        let resp = self.get(&self.chart_url(symbol, range), symbol)?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse chart for {symbol}: {e}"))
        })?;
        parse_chart(symbol, chart)
    }

    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, DataError> {
        let resp = self.get(&self.profile_url(symbol), symbol)?;
        let summary: QuoteSummaryResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse profile for {symbol}: {e}"))
        })?;
        parse_profile(symbol, summary)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
