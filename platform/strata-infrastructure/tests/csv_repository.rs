use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_domain::repositories::candles::{CandleQuery, CandleRepository};
use strata_domain::services::series::ensure_series;
use strata_infrastructure::market_data::CsvCandleRepository;

const HOUR_MS: i64 = 3_600_000;

fn unique_tmp_path(name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("strata_{name}_{}_{}", std::process::id(), now))
}

fn write_hourly(path: &PathBuf, n: usize) {
    let mut data = String::from("timestamp,open,high,low,close,volume\n");
    for i in 0..n {
        let close = 100.0 + i as f64 * 0.1;
        data.push_str(&format!(
            "{},{},{},{},{},1000\n",
            i as i64 * HOUR_MS,
            close,
            close + 0.5,
            close - 0.5,
            close
        ));
    }
    fs::write(path, data).expect("write csv");
}

#[test]
fn repository_enriches_before_filtering_range() {
    let path = unique_tmp_path("repo.csv");
    write_hourly(&path, 100);

    let mut query = CandleQuery::new(&path);
    query.start = Some(50 * HOUR_MS);
    query.end = Some(59 * HOUR_MS);
    let candles = CsvCandleRepository::new().load_candles(&query).expect("load");

    assert_eq!(candles.len(), 10);
    assert_eq!(candles[0].timestamp, 50 * HOUR_MS);
    assert_eq!(candles[9].timestamp, 59 * HOUR_MS);
    assert!(candles.iter().all(|c| c.atr.is_some() && c.sma_20.is_some()));
    assert!(candles.iter().all(|c| c.sma_50.is_some()));
    ensure_series(&candles).expect("usable series");
    let _ = fs::remove_file(&path);
}

#[test]
fn repository_surfaces_parse_errors() {
    let path = unique_tmp_path("bad.csv");
    fs::write(&path, "timestamp,open,high,low,close,volume\nnot-a-time,1,1,1,1,1\n")
        .expect("write csv");
    let err = CsvCandleRepository::new()
        .load_candles(&CandleQuery::new(&path))
        .expect_err("bad timestamp");
    assert!(err.contains("unsupported timestamp format"));
    let _ = fs::remove_file(&path);
}
