//! KRX exchange-listing provider.
//!
//! Reads the current roster of listed common stocks per board from the KRX
//! market data service (`getJsonData.cmd`, screen MDCSTAT01901).

use super::provider::{DataError, ListingProvider};
use crate::domain::{ListedInstrument, Market};
use serde::Deserialize;
use std::time::Duration;

const ENDPOINT: &str = "http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";
const REFERER: &str = "http://data.krx.co.kr/contents/MDC/MDI/mdiLoader";
const LISTING_BLD: &str = "dbms/MDC/STAT/standard/MDCSTAT01901";

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(rename = "OutBlock_1")]
    out_block: Option<Vec<ListingRow>>,
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(rename = "ISU_SRT_CD")]
    short_code: String,
    #[serde(rename = "ISU_ABBRV")]
    abbreviation: String,
}

pub struct KrxListingProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl KrxListingProvider {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: ENDPOINT.to_string(),
        })
    }
}

/// Local codes are six ASCII alphanumerics (`005930`, `0126Z0`).
pub fn is_valid_local_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn parse_listing(market: Market, resp: ListingResponse) -> Result<Vec<ListedInstrument>, DataError> {
    let rows = resp
        .out_block
        .ok_or_else(|| DataError::ResponseFormatChanged("listing payload has no OutBlock_1".into()))?;

    let mut listed = Vec::with_capacity(rows.len());
    for row in rows {
        let code = row.short_code.trim();
        if !is_valid_local_code(code) {
            tracing::warn!(market = %market, code, "skipping malformed listing code");
            continue;
        }
        listed.push(ListedInstrument {
            local_code: code.to_string(),
            name: row.abbreviation.trim().to_string(),
            market,
        });
    }
    Ok(listed)
}

impl ListingProvider for KrxListingProvider {
    fn name(&self) -> &str {
        "krx"
    }

    fn list(&self, market: Market) -> Result<Vec<ListedInstrument>, DataError> {
        let form = [
            ("bld", LISTING_BLD),
            ("locale", "ko_KR"),
            ("mktId", market.listing_id()),
            ("share", "1"),
            ("csvxls_isNo", "false"),
        ];
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Referer", REFERER)
            .form(&form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DataError::Timeout(e.to_string())
                } else {
                    DataError::NetworkUnreachable(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                symbol: market.code().to_string(),
            });
        }

        let body: ListingResponse = resp
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(format!("listing for {market}: {e}")))?;
        parse_listing(market, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_rows() {
        let body = r#"{"OutBlock_1":[
            {"ISU_CD":"KR7005930003","ISU_SRT_CD":"005930","ISU_NM":"삼성전자보통주","ISU_ABBRV":"삼성전자"},
            {"ISU_CD":"KR7000660001","ISU_SRT_CD":"000660","ISU_NM":"SK하이닉스보통주","ISU_ABBRV":"SK하이닉스"},
            {"ISU_CD":"XX","ISU_SRT_CD":"12","ISU_NM":"bad","ISU_ABBRV":"bad"}
        ]}"#;
        let listed = parse_listing(Market::Kospi, serde_json::from_str(body).unwrap()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].local_code, "005930");
        assert_eq!(listed[1].name, "SK하이닉스");
        assert!(listed.iter().all(|l| l.market == Market::Kospi));
    }

    #[test]
    fn missing_block_is_format_change() {
        let body = r#"{"CURRENT_DATETIME":"2024.03.04 PM 04:00:00"}"#;
        let err = parse_listing(Market::Kosdaq, serde_json::from_str(body).unwrap()).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn local_code_shape() {
        assert!(is_valid_local_code("005930"));
        assert!(is_valid_local_code("0126Z0"));
        assert!(!is_valid_local_code("5930"));
        assert!(!is_valid_local_code("005930.KS"));
    }
}
