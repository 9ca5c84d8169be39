//! SQLite persistence: instruments, daily prices, indicators, segment indices
//! and market statistics.
//!
//! Every write is an `INSERT .. ON CONFLICT(key) DO UPDATE`, so replaying the
//! same input leaves the tables unchanged. Multi-row writes for one
//! instrument (or one date) run in a single transaction. Price, indicator,
//! index and stat rows carry no timestamps.

use chrono::NaiveDate;
use krxlab_core::aggregate::CrossSection;
use krxlab_core::calendar::DateRange;
use krxlab_core::domain::{
    DailyPrice, IndicatorRow, Instrument, InstrumentId, Market, MarketIndexBar, MarketStat,
    NewInstrument, StatScope,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tables covered by `Store::table_fingerprint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Instruments,
    DailyPrices,
    TechnicalIndicators,
    MarketIndices,
    MarketStats,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Instruments,
        Table::DailyPrices,
        Table::TechnicalIndicators,
        Table::MarketIndices,
        Table::MarketStats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Instruments => "instruments",
            Table::DailyPrices => "daily_prices",
            Table::TechnicalIndicators => "technical_indicators",
            Table::MarketIndices => "market_indices",
            Table::MarketStats => "market_stats",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Table::Instruments => "id",
            Table::DailyPrices | Table::TechnicalIndicators => "instrument_id, date",
            Table::MarketIndices => "market, date",
            Table::MarketStats => "scope, date",
        }
    }
}

/// Row counts and freshness, for `krxlab status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub instruments: i64,
    pub active_instruments: i64,
    pub daily_prices: i64,
    pub technical_indicators: i64,
    pub market_indices: i64,
    pub market_stats: i64,
    pub latest_price_date: Option<NaiveDate>,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS instruments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol      TEXT NOT NULL UNIQUE,
    local_code  TEXT NOT NULL,
    name        TEXT NOT NULL,
    market      TEXT NOT NULL,
    sector      TEXT,
    industry    TEXT,
    description TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS daily_prices (
    instrument_id  INTEGER NOT NULL REFERENCES instruments(id),
    date           TEXT NOT NULL,
    open           REAL,
    high           REAL,
    low            REAL,
    close          REAL,
    adjusted_close REAL,
    volume         INTEGER NOT NULL DEFAULT 0,
    change         REAL,
    change_rate    REAL,
    PRIMARY KEY (instrument_id, date)
);

CREATE INDEX IF NOT EXISTS idx_daily_prices_date ON daily_prices(date);

CREATE TABLE IF NOT EXISTS technical_indicators (
    instrument_id  INTEGER NOT NULL REFERENCES instruments(id),
    date           TEXT NOT NULL,
    ma5            REAL,
    ma10           REAL,
    ma20           REAL,
    ma60           REAL,
    ma120          REAL,
    bb_upper       REAL,
    bb_middle      REAL,
    bb_lower       REAL,
    bb_width       REAL,
    rsi            REAL,
    macd           REAL,
    macd_signal    REAL,
    macd_hist      REAL,
    volume_ma20    REAL,
    volume_ratio   REAL,
    is_doji        INTEGER,
    is_hammer      INTEGER,
    golden_cross   INTEGER,
    death_cross    INTEGER,
    bb_upper_touch INTEGER,
    bb_lower_touch INTEGER,
    PRIMARY KEY (instrument_id, date)
);

CREATE TABLE IF NOT EXISTS market_indices (
    market      TEXT NOT NULL,
    date        TEXT NOT NULL,
    open        REAL,
    high        REAL,
    low         REAL,
    close       REAL,
    volume      INTEGER NOT NULL DEFAULT 0,
    change      REAL,
    change_rate REAL,
    PRIMARY KEY (market, date)
);

CREATE TABLE IF NOT EXISTS market_stats (
    scope        TEXT NOT NULL,
    date         TEXT NOT NULL,
    rising       INTEGER NOT NULL,
    falling      INTEGER NOT NULL,
    unchanged    INTEGER NOT NULL,
    total        INTEGER NOT NULL,
    total_volume INTEGER NOT NULL,
    total_value  INTEGER NOT NULL,
    PRIMARY KEY (scope, date)
);
"#;

const UPSERT_INSTRUMENT_SQL: &str = r#"
INSERT INTO instruments (symbol, local_code, name, market, sector, industry, description, is_active)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
ON CONFLICT(symbol) DO UPDATE SET
    local_code  = excluded.local_code,
    name        = excluded.name,
    market      = excluded.market,
    sector      = COALESCE(excluded.sector, instruments.sector),
    industry    = COALESCE(excluded.industry, instruments.industry),
    description = COALESCE(excluded.description, instruments.description),
    is_active   = 1
"#;

const UPSERT_PRICE_SQL: &str = r#"
INSERT INTO daily_prices
    (instrument_id, date, open, high, low, close, adjusted_close, volume, change, change_rate)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(instrument_id, date) DO UPDATE SET
    open           = excluded.open,
    high           = excluded.high,
    low            = excluded.low,
    close          = excluded.close,
    adjusted_close = excluded.adjusted_close,
    volume         = excluded.volume,
    change         = excluded.change,
    change_rate    = excluded.change_rate
"#;

const UPSERT_INDICATOR_SQL: &str = r#"
INSERT INTO technical_indicators
    (instrument_id, date, ma5, ma10, ma20, ma60, ma120,
     bb_upper, bb_middle, bb_lower, bb_width, rsi, macd, macd_signal, macd_hist,
     volume_ma20, volume_ratio, is_doji, is_hammer, golden_cross, death_cross,
     bb_upper_touch, bb_lower_touch)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
        ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
ON CONFLICT(instrument_id, date) DO UPDATE SET
    ma5            = excluded.ma5,
    ma10           = excluded.ma10,
    ma20           = excluded.ma20,
    ma60           = excluded.ma60,
    ma120          = excluded.ma120,
    bb_upper       = excluded.bb_upper,
    bb_middle      = excluded.bb_middle,
    bb_lower       = excluded.bb_lower,
    bb_width       = excluded.bb_width,
    rsi            = excluded.rsi,
    macd           = excluded.macd,
    macd_signal    = excluded.macd_signal,
    macd_hist      = excluded.macd_hist,
    volume_ma20    = excluded.volume_ma20,
    volume_ratio   = excluded.volume_ratio,
    is_doji        = excluded.is_doji,
    is_hammer      = excluded.is_hammer,
    golden_cross   = excluded.golden_cross,
    death_cross    = excluded.death_cross,
    bb_upper_touch = excluded.bb_upper_touch,
    bb_lower_touch = excluded.bb_lower_touch
"#;

const UPSERT_INDEX_SQL: &str = r#"
INSERT INTO market_indices (market, date, open, high, low, close, volume, change, change_rate)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(market, date) DO UPDATE SET
    open        = excluded.open,
    high        = excluded.high,
    low         = excluded.low,
    close       = excluded.close,
    volume      = excluded.volume,
    change      = excluded.change,
    change_rate = excluded.change_rate
"#;

const UPSERT_STAT_SQL: &str = r#"
INSERT INTO market_stats (scope, date, rising, falling, unchanged, total, total_volume, total_value)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(scope, date) DO UPDATE SET
    rising       = excluded.rising,
    falling      = excluded.falling,
    unchanged    = excluded.unchanged,
    total        = excluded.total,
    total_volume = excluded.total_volume,
    total_value  = excluded.total_value
"#;

const INSTRUMENT_COLUMNS: &str =
    "id, symbol, local_code, name, market, sector, industry, description, is_active";

const PRICE_COLUMNS: &str =
    "instrument_id, date, open, high, low, close, adjusted_close, volume, change, change_rate";

const INDICATOR_COLUMNS: &str = "instrument_id, date, ma5, ma10, ma20, ma60, ma120, \
     bb_upper, bb_middle, bb_lower, bb_width, rsi, macd, macd_signal, macd_hist, \
     volume_ma20, volume_ratio, is_doji, is_hammer, golden_cross, death_cross, \
     bb_upper_touch, bb_lower_touch";

/// Connection setup applied to every pooled connection.
fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    /// Open or create the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = Pool::builder().max_size(POOL_SIZE).build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Single-connection in-memory database.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PersistenceError> {
        Ok(self.pool.get()?)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Instruments ──────────────────────────────────────────────────

    /// Insert or refresh instruments in one transaction and return them with
    /// their stable ids, in input order.
    ///
    /// Empty profile fields never overwrite stored ones. Every upserted
    /// instrument becomes active again.
    pub fn upsert_instruments(
        &self,
        instruments: &[NewInstrument],
    ) -> Result<Vec<Instrument>, PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(instruments.len());
        {
            let mut upsert = tx.prepare_cached(UPSERT_INSTRUMENT_SQL)?;
            let mut select = tx.prepare_cached(&format!(
                "SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE symbol = ?1"
            ))?;
            for new in instruments {
                upsert.execute(params![
                    new.symbol,
                    new.local_code,
                    new.name,
                    new.market.code(),
                    new.profile.sector,
                    new.profile.industry,
                    new.profile.description,
                ])?;
                stored.push(select.query_row(params![new.symbol], instrument_from_row)?);
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    pub fn upsert_instrument(&self, instrument: &NewInstrument) -> Result<Instrument, PersistenceError> {
        let mut stored = self.upsert_instruments(std::slice::from_ref(instrument))?;
        stored.pop().ok_or(PersistenceError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Mark every active instrument of `market` whose symbol is not in
    /// `listed` as inactive. Rows are never deleted. Returns how many changed.
    pub fn mark_inactive(&self, market: Market, listed: &[String]) -> Result<usize, PersistenceError> {
        let listed: HashSet<&str> = listed.iter().map(String::as_str).collect();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut select =
                tx.prepare_cached("SELECT symbol FROM instruments WHERE market = ?1 AND is_active = 1")?;
            let active: Vec<String> = select
                .query_map(params![market.code()], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            let mut update = tx.prepare_cached("UPDATE instruments SET is_active = 0 WHERE symbol = ?1")?;
            for symbol in active.iter().filter(|s| !listed.contains(s.as_str())) {
                changed += update.execute(params![symbol])?;
                tracing::info!(symbol = %symbol, market = %market, "instrument no longer listed, marked inactive");
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    pub fn instrument_by_symbol(&self, symbol: &str) -> Result<Option<Instrument>, PersistenceError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE symbol = ?1"),
                params![symbol],
                instrument_from_row,
            )
            .optional()?;
        Ok(found)
    }

    /// Instruments ordered by id, optionally restricted to one segment
    /// and/or to active rows.
    pub fn instruments(
        &self,
        market: Option<Market>,
        active_only: bool,
    ) -> Result<Vec<Instrument>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTRUMENT_COLUMNS} FROM instruments \
             WHERE (?1 IS NULL OR market = ?1) AND (?2 = 0 OR is_active = 1) ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![market.map(Market::code), active_only], instrument_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Daily prices ─────────────────────────────────────────────────

    /// Upsert price rows in one transaction.
    pub fn upsert_prices(&self, rows: &[DailyPrice]) -> Result<usize, PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_PRICE_SQL)?;
            for p in rows {
                stmt.execute(params![
                    p.instrument_id,
                    p.date,
                    p.open,
                    p.high,
                    p.low,
                    p.close,
                    p.adjusted_close,
                    p.volume,
                    p.change,
                    p.change_rate,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Full stored history of one instrument, ascending by date.
    pub fn price_history(&self, instrument_id: InstrumentId) -> Result<Vec<DailyPrice>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {PRICE_COLUMNS} FROM daily_prices WHERE instrument_id = ?1 ORDER BY date"
        ))?;
        let rows = stmt
            .query_map(params![instrument_id], price_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Latest stored reference close strictly before `date`.
    pub fn close_before(
        &self,
        instrument_id: InstrumentId,
        date: NaiveDate,
    ) -> Result<Option<f64>, PersistenceError> {
        let conn = self.conn()?;
        let close = conn
            .query_row(
                "SELECT COALESCE(adjusted_close, close) FROM daily_prices \
                 WHERE instrument_id = ?1 AND date < ?2 \
                   AND COALESCE(adjusted_close, close) IS NOT NULL \
                 ORDER BY date DESC LIMIT 1",
                params![instrument_id, date],
                |row| row.get(0),
            )
            .optional()?;
        Ok(close)
    }

    /// Every stored price row of `date`, tagged with its instrument's segment.
    pub fn cross_section(&self, date: NaiveDate) -> Result<CrossSection, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT i.market, p.instrument_id, p.date, p.open, p.high, p.low, p.close, \
                    p.adjusted_close, p.volume, p.change, p.change_rate \
             FROM daily_prices p JOIN instruments i ON i.id = p.instrument_id \
             WHERE p.date = ?1 ORDER BY p.instrument_id",
        )?;
        let rows = stmt
            .query_map(params![date], |row| {
                let market = parse_column::<Market>(row, 0)?;
                Ok((market, price_from_row_at(row, 1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CrossSection::new(rows))
    }

    /// Distinct dates within `range` that have at least one stored price.
    pub fn price_dates(&self, range: DateRange) -> Result<Vec<NaiveDate>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT date FROM daily_prices WHERE date BETWEEN ?1 AND ?2 ORDER BY date",
        )?;
        let dates = stmt
            .query_map(params![range.start, range.end], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dates)
    }

    // ── Indicators ───────────────────────────────────────────────────

    pub fn upsert_indicators(&self, rows: &[IndicatorRow]) -> Result<usize, PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_INDICATOR_SQL)?;
            for r in rows {
                stmt.execute(params![
                    r.instrument_id,
                    r.date,
                    r.ma5,
                    r.ma10,
                    r.ma20,
                    r.ma60,
                    r.ma120,
                    r.bb_upper,
                    r.bb_middle,
                    r.bb_lower,
                    r.bb_width,
                    r.rsi,
                    r.macd,
                    r.macd_signal,
                    r.macd_hist,
                    r.volume_ma20,
                    r.volume_ratio,
                    r.is_doji,
                    r.is_hammer,
                    r.golden_cross,
                    r.death_cross,
                    r.bb_upper_touch,
                    r.bb_lower_touch,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn indicators(&self, instrument_id: InstrumentId) -> Result<Vec<IndicatorRow>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {INDICATOR_COLUMNS} FROM technical_indicators WHERE instrument_id = ?1 ORDER BY date"
        ))?;
        let rows = stmt
            .query_map(params![instrument_id], indicator_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Segment indices ──────────────────────────────────────────────

    pub fn upsert_index_bars(&self, rows: &[MarketIndexBar]) -> Result<usize, PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_INDEX_SQL)?;
            for b in rows {
                stmt.execute(params![
                    b.market.code(),
                    b.date,
                    b.open,
                    b.high,
                    b.low,
                    b.close,
                    b.volume,
                    b.change,
                    b.change_rate,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn index_close_before(&self, market: Market, date: NaiveDate) -> Result<Option<f64>, PersistenceError> {
        let conn = self.conn()?;
        let close = conn
            .query_row(
                "SELECT close FROM market_indices \
                 WHERE market = ?1 AND date < ?2 AND close IS NOT NULL \
                 ORDER BY date DESC LIMIT 1",
                params![market.code(), date],
                |row| row.get(0),
            )
            .optional()?;
        Ok(close)
    }

    pub fn index_bars(&self, market: Market) -> Result<Vec<MarketIndexBar>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT market, date, open, high, low, close, volume, change, change_rate \
             FROM market_indices WHERE market = ?1 ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![market.code()], |row| {
                Ok(MarketIndexBar {
                    market: parse_column(row, 0)?,
                    date: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                    change: row.get(7)?,
                    change_rate: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Market statistics ────────────────────────────────────────────

    pub fn upsert_market_stats(&self, stats: &[MarketStat]) -> Result<usize, PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_STAT_SQL)?;
            for s in stats {
                stmt.execute(params![
                    s.scope.code(),
                    s.date,
                    s.rising,
                    s.falling,
                    s.unchanged,
                    s.total,
                    s.total_volume,
                    s.total_value,
                ])?;
            }
        }
        tx.commit()?;
        Ok(stats.len())
    }

    /// Stat rows ordered by date then scope, optionally within `range`.
    pub fn market_stats(&self, range: Option<DateRange>) -> Result<Vec<MarketStat>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT scope, date, rising, falling, unchanged, total, total_volume, total_value \
             FROM market_stats \
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2) \
             ORDER BY date, scope",
        )?;
        let rows = stmt
            .query_map(
                params![range.map(|r| r.start), range.map(|r| r.end)],
                |row| {
                    let scope_code: String = row.get(0)?;
                    let scope = StatScope::parse(&scope_code)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
                    Ok(MarketStat {
                        scope,
                        date: row.get(1)?,
                        rising: row.get(2)?,
                        falling: row.get(3)?,
                        unchanged: row.get(4)?,
                        total: row.get(5)?,
                        total_volume: row.get(6)?,
                        total_value: row.get(7)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Reporting ────────────────────────────────────────────────────

    pub fn row_count(&self, table: Table) -> Result<i64, PersistenceError> {
        let conn = self.conn()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn status(&self) -> Result<StoreStatus, PersistenceError> {
        let active_instruments = {
            let conn = self.conn()?;
            conn.query_row("SELECT COUNT(*) FROM instruments WHERE is_active = 1", [], |row| {
                row.get(0)
            })?
        };
        let latest_price_date = {
            let conn = self.conn()?;
            conn.query_row("SELECT MAX(date) FROM daily_prices", [], |row| row.get(0))?
        };
        Ok(StoreStatus {
            instruments: self.row_count(Table::Instruments)?,
            active_instruments,
            daily_prices: self.row_count(Table::DailyPrices)?,
            technical_indicators: self.row_count(Table::TechnicalIndicators)?,
            market_indices: self.row_count(Table::MarketIndices)?,
            market_stats: self.row_count(Table::MarketStats)?,
            latest_price_date,
        })
    }

    /// blake3 digest over every row of `table` in key order.
    ///
    /// Two stores with identical table contents produce identical digests;
    /// any changed value, added row or removed row changes it.
    pub fn table_fingerprint(&self, table: Table) -> Result<String, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {}",
            table.name(),
            table.key()
        ))?;
        let columns = stmt.column_count();
        let mut hasher = blake3::Hasher::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for i in 0..columns {
                match row.get_ref(i)? {
                    ValueRef::Null => hasher.update(b"N"),
                    ValueRef::Integer(v) => hasher.update(b"I").update(&v.to_le_bytes()),
                    ValueRef::Real(v) => hasher.update(b"R").update(&v.to_bits().to_le_bytes()),
                    ValueRef::Text(t) => hasher
                        .update(b"T")
                        .update(&(t.len() as u64).to_le_bytes())
                        .update(t),
                    ValueRef::Blob(b) => hasher
                        .update(b"B")
                        .update(&(b.len() as u64).to_le_bytes())
                        .update(b),
                };
            }
            hasher.update(b"\n");
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Combined digest of all five tables.
    pub fn fingerprint(&self) -> Result<String, PersistenceError> {
        let mut hasher = blake3::Hasher::new();
        for table in Table::ALL {
            hasher.update(table.name().as_bytes());
            hasher.update(self.table_fingerprint(table)?.as_bytes());
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn instrument_from_row(row: &Row<'_>) -> rusqlite::Result<Instrument> {
    Ok(Instrument {
        id: row.get(0)?,
        symbol: row.get(1)?,
        local_code: row.get(2)?,
        name: row.get(3)?,
        market: parse_column(row, 4)?,
        sector: row.get(5)?,
        industry: row.get(6)?,
        description: row.get(7)?,
        is_active: row.get(8)?,
    })
}

fn price_from_row(row: &Row<'_>) -> rusqlite::Result<DailyPrice> {
    price_from_row_at(row, 0)
}

fn price_from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<DailyPrice> {
    Ok(DailyPrice {
        instrument_id: row.get(at)?,
        date: row.get(at + 1)?,
        open: row.get(at + 2)?,
        high: row.get(at + 3)?,
        low: row.get(at + 4)?,
        close: row.get(at + 5)?,
        adjusted_close: row.get(at + 6)?,
        volume: row.get(at + 7)?,
        change: row.get(at + 8)?,
        change_rate: row.get(at + 9)?,
    })
}

fn indicator_from_row(row: &Row<'_>) -> rusqlite::Result<IndicatorRow> {
    Ok(IndicatorRow {
        instrument_id: row.get(0)?,
        date: row.get(1)?,
        ma5: row.get(2)?,
        ma10: row.get(3)?,
        ma20: row.get(4)?,
        ma60: row.get(5)?,
        ma120: row.get(6)?,
        bb_upper: row.get(7)?,
        bb_middle: row.get(8)?,
        bb_lower: row.get(9)?,
        bb_width: row.get(10)?,
        rsi: row.get(11)?,
        macd: row.get(12)?,
        macd_signal: row.get(13)?,
        macd_hist: row.get(14)?,
        volume_ma20: row.get(15)?,
        volume_ratio: row.get(16)?,
        is_doji: row.get(17)?,
        is_hammer: row.get(18)?,
        golden_cross: row.get(19)?,
        death_cross: row.get(20)?,
        bb_upper_touch: row.get(21)?,
        bb_lower_touch: row.get(22)?,
    })
}
