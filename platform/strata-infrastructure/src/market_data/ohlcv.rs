use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use strata_domain::repositories::candles::{CandleQuery, CandleRepository};
use strata_domain::services::indicators::{enrich, IndicatorConfig};
use strata_domain::value_objects::candle::{Candle, RawCandle};

#[derive(Debug, Deserialize)]
pub struct OhlcvRecord {
    #[serde(alias = "timestamp_utc")]
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub atr: Option<f64>,
    #[serde(default)]
    pub sma_20: Option<f64>,
    #[serde(default)]
    pub sma_50: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub duplicates: usize,
    pub out_of_order: usize,
    pub invalid_close: usize,
    /// Indicators were computed here because the file carried no `atr`.
    pub enriched: bool,
}

/// Reads OHLCV rows, keeping the last row per timestamp, sorted ascending.
/// Files without any `atr` value get the indicator pass applied.
pub fn load_csv(path: &Path, indicators: IndicatorConfig) -> Result<(Vec<Candle>, LoadReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open OHLCV CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut by_ts: BTreeMap<i64, Candle> = BTreeMap::new();
    let mut report = LoadReport::default();
    let mut last_seen_ts: Option<i64> = None;

    for result in reader.deserialize::<OhlcvRecord>() {
        let record = result.map_err(|err| format!("failed to parse CSV row: {}", err))?;
        report.rows += 1;
        let timestamp = parse_timestamp(&record.timestamp)?;

        if !record.close.is_finite() || record.close <= 0.0 {
            report.invalid_close += 1;
            continue;
        }
        if last_seen_ts.is_some_and(|prev| timestamp < prev) {
            report.out_of_order += 1;
        }
        last_seen_ts = Some(timestamp);

        let candle = Candle {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
            atr: record.atr,
            sma_20: record.sma_20,
            sma_50: record.sma_50,
        };
        if by_ts.insert(timestamp, candle).is_some() {
            report.duplicates += 1;
        }
    }

    let mut candles: Vec<Candle> = by_ts.into_values().collect();
    if !candles.is_empty() && candles.iter().all(|c| c.atr.is_none()) {
        let raw: Vec<RawCandle> = candles.iter().map(Candle::raw).collect();
        candles = enrich(&raw, indicators);
        report.enriched = true;
    }
    Ok((candles, report))
}

fn parse_timestamp(value: &str) -> Result<i64, String> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        let dt: DateTime<Utc> = Utc.from_utc_datetime(&naive);
        return Ok(dt.timestamp_millis());
    }

    Err(format!("unsupported timestamp format: {}", value))
}

/// [`CandleRepository`] over local CSV files. Range bounds are applied after
/// enrichment so indicators are warmed up on the full file.
#[derive(Debug, Clone, Default)]
pub struct CsvCandleRepository {
    indicators: IndicatorConfig,
}

impl CsvCandleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indicators(indicators: IndicatorConfig) -> Self {
        Self { indicators }
    }
}

impl CandleRepository for CsvCandleRepository {
    fn load_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>, String> {
        let (mut candles, report) = load_csv(&query.path, self.indicators)?;
        if report.duplicates > 0 || report.out_of_order > 0 || report.invalid_close > 0 {
            tracing::warn!(
                path = %query.path.display(),
                duplicates = report.duplicates,
                out_of_order = report.out_of_order,
                invalid_close = report.invalid_close,
                "OHLCV data quality issues"
            );
            metrics::counter!("strata.data.dropped_rows")
                .increment((report.duplicates + report.invalid_close) as u64);
        }
        candles.retain(|c| {
            query.start.map_or(true, |start| c.timestamp >= start)
                && query.end.map_or(true, |end| c.timestamp <= end)
        });
        tracing::debug!(
            path = %query.path.display(),
            rows = report.rows,
            candles = candles.len(),
            enriched = report.enriched,
            "candles loaded"
        );
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_tmp_path(name: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("strata_{name}_{}_{}", std::process::id(), now))
    }

    #[test]
    fn timestamps_accept_millis_and_rfc3339() {
        assert_eq!(parse_timestamp("1704067200000"), Ok(1_704_067_200_000));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Ok(1_704_067_200_000));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Ok(1_704_067_200_000));
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn load_csv_sorts_dedups_and_enriches() {
        let path = unique_tmp_path("ohlcv.csv");
        let csv_data = "timestamp,open,high,low,close,volume\n\
2024-01-01T02:00:00Z,1,1,1,1,1\n\
2024-01-01T00:00:00Z,1,1,1,1,1\n\
2024-01-01T01:00:00Z,1,1,1,1,1\n\
2024-01-01T00:00:00Z,2,2,2,2,2\n\
2024-01-01T03:00:00Z,1,1,1,0,1\n";
        fs::write(&path, csv_data).expect("write csv");

        let (candles, report) = load_csv(&path, IndicatorConfig::default()).expect("load csv");
        assert_eq!(report.rows, 5);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.out_of_order, 2);
        assert_eq!(report.invalid_close, 1);
        assert!(report.enriched);
        assert_eq!(candles.len(), 3);
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!((candles[0].close - 2.0).abs() < 1e-9);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn provided_indicators_are_kept() {
        let path = unique_tmp_path("ohlcv_atr.csv");
        let csv_data = "timestamp,open,high,low,close,volume,atr,sma_20,sma_50\n\
1000,1,2,0.5,1.5,10,0.7,,\n\
2000,1,2,0.5,1.5,10,0.8,1.4,\n";
        fs::write(&path, csv_data).expect("write csv");

        let (candles, report) = load_csv(&path, IndicatorConfig::default()).expect("load csv");
        assert!(!report.enriched);
        assert_eq!(candles[0].atr, Some(0.7));
        assert_eq!(candles[0].sma_20, None);
        assert_eq!(candles[1].sma_20, Some(1.4));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_csv(Path::new("/nonexistent/strata.csv"), IndicatorConfig::default())
            .expect_err("missing file");
        assert!(err.contains("failed to open"));
    }
}
