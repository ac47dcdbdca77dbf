//! Chart analytics tests against realistic price series.

use chrono::{Duration, TimeZone, Utc};
use mercantile::config::ChartConfig;
use mercantile::services::ChartStore;
use mercantile::types::{PriceTrend, Timeframe, TradeAction, TrendKind};

fn store() -> std::sync::Arc<ChartStore> {
    ChartStore::new(Timeframe::Daily, ChartConfig::default())
}

fn feed(store: &ChartStore, item_id: &str, prices: &[f64]) {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    for (i, &price) in prices.iter().enumerate() {
        store
            .add_price_point_at(item_id, price, 1, start + Duration::days(i as i64))
            .unwrap();
    }
}

#[test]
fn test_rally_reads_as_overbought() {
    let store = store();
    let rally: Vec<f64> = (0..30).map(|i| 50.0 + 2.0 * i as f64).collect();
    feed(&store, "ruby", &rally);

    let indicators = store.indicators("ruby").unwrap();
    assert!(indicators.rsi > 70.0);

    let analysis = store.analyze("ruby").unwrap().unwrap();
    assert_eq!(analysis.trend_direction, PriceTrend::Up);
    assert_eq!(analysis.recommendation, TradeAction::Sell);
}

#[test]
fn test_crash_reads_as_oversold() {
    let store = store();
    let crash: Vec<f64> = (0..30).map(|i| 100.0 - 2.0 * i as f64).collect();
    feed(&store, "apple", &crash);

    let indicators = store.indicators("apple").unwrap();
    assert!(indicators.rsi < 30.0);

    let analysis = store.analyze("apple").unwrap().unwrap();
    assert_eq!(analysis.trend_direction, PriceTrend::Down);
    assert_eq!(analysis.recommendation, TradeAction::Buy);

    let prediction = store.prediction("apple").unwrap().unwrap();
    assert_eq!(prediction.direction, PriceTrend::Down);
    assert_eq!(prediction.current_price, 42.0);
}

#[test]
fn test_oscillating_market_finds_support_and_resistance() {
    let store = store();
    // A regular wave: peaks at 110, troughs at 90.
    let wave: Vec<f64> = (0..40)
        .map(|i| 100.0 + 10.0 * ((i % 12) as f64 / 6.0 * std::f64::consts::PI).sin())
        .collect();
    feed(&store, "iron_sword", &wave);

    let lines = store.trend_lines("iron_sword").unwrap();
    assert!(lines.iter().any(|l| l.kind == TrendKind::Resistance));
    assert!(lines.iter().any(|l| l.kind == TrendKind::Support));

    let analysis = store.analyze("iron_sword").unwrap().unwrap();
    let support = analysis.support_level.unwrap();
    let resistance = analysis.resistance_level.unwrap();
    assert!(support < resistance);
}

#[test]
fn test_intraday_points_share_one_daily_candle() {
    let store = store();
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    for (i, price) in [100.0, 105.0, 95.0, 102.0].iter().enumerate() {
        store
            .add_price_point_at("apple", *price, 1, start + Duration::hours(i as i64))
            .unwrap();
    }

    let candles = store.candles("apple").unwrap();
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].open, 100.0);
    assert_eq!(candles[0].high, 105.0);
    assert_eq!(candles[0].low, 95.0);
    assert_eq!(candles[0].close, 102.0);
    assert_eq!(candles[0].volume, 4);
}

#[test]
fn test_analysis_serializes_camel_case() {
    let store = store();
    feed(&store, "apple", &(0..15).map(|i| 100.0 + i as f64).collect::<Vec<_>>());

    let analysis = store.analyze("apple").unwrap().unwrap();
    let json = serde_json::to_string(&analysis).unwrap();
    assert!(json.contains("\"itemId\":\"apple\""));
    assert!(json.contains("trendDirection"));
    assert!(json.contains("volumeAverage"));
}

#[test]
fn test_prediction_confidence_tracks_volatility() {
    let store = store();
    let calm: Vec<f64> = (0..30).map(|i| 100.0 + 0.2 * i as f64).collect();
    let wild: Vec<f64> = (0..30)
        .map(|i| if i % 2 == 0 { 80.0 } else { 120.0 })
        .collect();
    feed(&store, "calm", &calm);
    feed(&store, "wild", &wild);

    let calm_prediction = store.prediction("calm").unwrap().unwrap();
    let wild_prediction = store.prediction("wild").unwrap().unwrap();
    assert!(calm_prediction.confidence > wild_prediction.confidence);
}

#[test]
fn test_charts_are_independent_per_item() {
    let store = store();
    feed(&store, "apple", &[10.0, 11.0, 12.0]);
    feed(&store, "ruby", &[300.0; 20]);

    assert_eq!(store.data_points("apple").unwrap().len(), 3);
    assert_eq!(store.data_points("ruby").unwrap().len(), 20);
    assert!(store.analyze("apple").unwrap().is_none());
    assert!(store.analyze("ruby").unwrap().is_some());
}
