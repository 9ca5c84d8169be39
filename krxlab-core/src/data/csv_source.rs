//! Offline price provider reading one CSV file per symbol.
//!
//! Files live at `<dir>/<provider symbol>.csv` with the header layout of a
//! Yahoo Finance download: `Date,Open,High,Low,Close,Adj Close,Volume`.
//! Empty cells and the literal `null` are missing values.

use super::frame::PriceFrame;
use super::provider::{DataError, PriceProvider, RawBar};
use crate::calendar::DateRange;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

fn number(field: Option<&str>) -> f64 {
    match field.map(str::trim) {
        None | Some("") | Some("null") => f64::NAN,
        Some(v) => v.parse().unwrap_or(f64::NAN),
    }
}

/// Read every row of a CSV price file.
pub fn read_csv_bars(path: &Path) -> Result<Vec<RawBar>, DataError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let date_col = col("Date")
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("{}: no Date column", path.display())))?;
    let (open, high, low, close) = (col("Open"), col("High"), col("Low"), col("Close"));
    let adj = col("Adj Close").or(close);
    let volume = col("Volume");

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record?;
        let raw_date = record.get(date_col).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
            DataError::ResponseFormatChanged(format!("{}: bad date '{raw_date}': {e}", path.display()))
        })?;
        let get = |c: Option<usize>| number(c.and_then(|i| record.get(i)));
        let vol = get(volume);
        bars.push(RawBar {
            date,
            open: get(open),
            high: get(high),
            low: get(low),
            close: get(close),
            volume: if vol.is_finite() && vol > 0.0 { vol as u64 } else { 0 },
            adj_close: get(adj),
        });
    }
    Ok(bars)
}

impl PriceProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_daily(&self, symbol: &str, range: DateRange) -> Result<PriceFrame, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let rows = read_csv_bars(&path)?
            .into_iter()
            .filter(|b| range.contains(b.date))
            .collect();
        Ok(PriceFrame::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_yahoo_layout_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("005930.KS.csv"),
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-03-04,72800,73900,72700,73400,73400,16000000\n\
             2024-03-05,null,null,null,null,null,null\n\
             2024-03-06,73000,73500,72600,72900,72500,13000000\n",
        )
        .unwrap();

        let provider = CsvProvider::new(dir.path());
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        );
        let frame = provider.fetch_daily("005930.KS", range).unwrap();
        let PriceFrame::MultiDay(rows) = frame else {
            panic!("expected MultiDay");
        };
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_void());
        assert_eq!(rows[2].adj_close, 72_500.0);
        assert_eq!(rows[0].volume, 16_000_000);
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvProvider::new(dir.path());
        let d = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let err = provider.fetch_daily("000000.KS", DateRange::single(d)).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn single_row_in_range_is_single_day() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("068270.KQ.csv"),
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-03-04,180000,182000,179000,181000,181000,500000\n\
             2024-03-05,181000,183000,180000,182500,182500,450000\n",
        )
        .unwrap();
        let provider = CsvProvider::new(dir.path());
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let frame = provider.fetch_daily("068270.KQ", DateRange::single(d)).unwrap();
        assert!(matches!(frame, PriceFrame::SingleDay(ref b) if b.close == 182_500.0));
    }
}
