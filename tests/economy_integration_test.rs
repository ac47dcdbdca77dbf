//! End-to-end economy tests: market ticks feeding charts and the balancer.

use chrono::{Duration, TimeZone, Utc};
use mercantile::config::{BalanceConfig, ChartConfig, EngineConfig};
use mercantile::services::{ChartStore, ItemRegistry, Market, PriceBalancer, PriceEngine};
use mercantile::types::{
    Category, EventEffect, Item, MarketEvent, PriceTrend, Progression, Season, Timeframe,
};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

fn sample_items() -> Vec<Item> {
    vec![
        Item::new("apple", "Apple", Category::Fruit, 10.0).unwrap(),
        Item::new("healing_potion", "Healing Potion", Category::Potion, 40.0).unwrap(),
        Item::new("iron_sword", "Iron Sword", Category::Weapon, 120.0).unwrap(),
        Item::new("ruby", "Ruby", Category::Gem, 300.0).unwrap(),
    ]
}

fn seeded_market(seed: u64) -> Market {
    let registry = ItemRegistry::new();
    let engine = PriceEngine::with_seed(EngineConfig::default(), seed);
    let market = Market::new(registry, engine);
    for item in sample_items() {
        market.register_item(item).unwrap();
    }
    market
}

fn season_for_day(day: u32) -> Season {
    match (day - 1) / 7 % 4 {
        0 => Season::Spring,
        1 => Season::Summer,
        2 => Season::Autumn,
        _ => Season::Winter,
    }
}

#[test]
fn test_month_of_ticks_keeps_prices_bounded() {
    init_tracing();
    let market = seeded_market(11);
    let bases: Vec<(String, f64)> = sample_items()
        .into_iter()
        .map(|i| (i.id, i.base_price))
        .collect();

    for day in 1..=30 {
        let changes = market.on_day_tick(day, season_for_day(day));
        assert_eq!(changes.len(), bases.len());
        for change in &changes {
            let base = bases
                .iter()
                .find(|(id, _)| *id == change.item_id)
                .map(|(_, b)| *b)
                .unwrap();
            assert!(
                change.new_price >= base * 0.5 && change.new_price <= base * 2.0,
                "{} price {} escaped the clamp band",
                change.item_id,
                change.new_price
            );
        }
    }

    // History window is bounded regardless of tick count.
    for (id, _) in &bases {
        assert!(market.price_history(id).unwrap().len() <= 10);
        let trend = market.trend(id).unwrap();
        assert!(matches!(
            trend,
            PriceTrend::Up | PriceTrend::Down | PriceTrend::Stable
        ));
    }
}

#[test]
fn test_market_prices_feed_chart_analysis() {
    let market = seeded_market(23);
    let charts = ChartStore::new(Timeframe::Daily, ChartConfig::default());
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    for day in 1..=15 {
        let changes = market.on_day_tick(day, season_for_day(day));
        for change in &changes {
            charts
                .add_price_point_at(
                    &change.item_id,
                    change.new_price,
                    1,
                    start + Duration::days(day as i64),
                )
                .unwrap();
        }
    }

    // One candle per distinct day.
    assert_eq!(charts.candles("apple").unwrap().len(), 15);

    let prediction = charts.prediction("apple").unwrap().unwrap();
    assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
    assert!(prediction.predicted_price > 0.0);

    let analysis = charts.analyze("apple").unwrap().unwrap();
    assert!(analysis.confidence > 0.0 && analysis.confidence <= 0.95);
    assert!((0.0..=100.0).contains(&analysis.rsi));
}

#[test]
fn test_balancer_converges_each_progression() {
    let balancer = PriceBalancer::new(BalanceConfig::default());
    for item in sample_items() {
        balancer
            .register_item(&item.id, item.category, item.base_price)
            .unwrap();
    }
    balancer.update_supply_demand("apple", 300, 100).unwrap();
    balancer.update_supply_demand("healing_potion", 50, 150).unwrap();
    balancer.update_supply_demand("iron_sword", 100, 100).unwrap();
    balancer.update_supply_demand("ruby", 10, 200).unwrap();

    for progression in [
        Progression::EarlyGame,
        Progression::MidGame,
        Progression::LateGame,
    ] {
        for _ in 0..100 {
            balancer.adjust_prices(progression);
        }
        for item in sample_items() {
            let snapshot = balancer.item_balance(&item.id).unwrap();
            assert!(
                snapshot.current_price >= item.base_price * 0.5
                    && snapshot.current_price <= item.base_price * 3.0,
                "{} price {} escaped the balance band",
                item.id,
                snapshot.current_price
            );
            // After 100 passes at speed 0.1 the price has effectively
            // reached its equilibrium.
            assert!((snapshot.current_price - snapshot.optimal_price).abs() < 0.01);
        }
    }

    // Oversupplied apples end below base, scarce rubies above.
    let apple = balancer.item_balance("apple").unwrap();
    let ruby = balancer.item_balance("ruby").unwrap();
    assert!(apple.current_price / apple.base_price < ruby.current_price / ruby.base_price);
}

#[test]
fn test_sales_flow_into_metrics() {
    let balancer = PriceBalancer::new(BalanceConfig::default());
    balancer
        .register_item("apple", Category::Fruit, 10.0)
        .unwrap();

    for i in 0..20 {
        balancer
            .record_sale("apple", 10.0 + (i % 3) as f64, 2, 500.0)
            .unwrap();
    }

    let metrics = balancer.metrics();
    assert_eq!(metrics.total_transactions, 20);
    assert!(metrics.total_volume > 0.0);
    assert!(metrics.average_transaction > 0.0);
    assert_eq!(balancer.item_balance("apple").unwrap().recent_sales, 20);
}

#[test]
fn test_event_lifecycle_over_ticks() {
    let market = seeded_market(5);
    market.on_day_tick(10, Season::Summer);

    market.apply_event(MarketEvent {
        name: "harvest_festival".to_string(),
        description: "Caravans flood the market".to_string(),
        duration: 2,
        start_day: 0,
        effects: vec![EventEffect::SupplyIncrease(2)],
    });
    assert_eq!(market.active_events().len(), 1);

    market.on_day_tick(11, Season::Summer);
    assert_eq!(market.active_events().len(), 1);

    market.on_day_tick(12, Season::Summer);
    assert!(market.active_events().is_empty());
}

#[test]
fn test_concurrent_readers_during_ticks() {
    let market = std::sync::Arc::new(seeded_market(17));
    let mut handles = Vec::new();

    for _ in 0..4 {
        let reader = std::sync::Arc::clone(&market);
        handles.push(std::thread::spawn(move || {
            for _ in 0..200 {
                let price = reader.current_price("apple").unwrap();
                assert!(price >= 5.0 && price <= 20.0);
                reader.trend("apple").unwrap();
                reader.recommended_action("apple").unwrap();
            }
        }));
    }

    for day in 1..=50 {
        market.on_day_tick(day, season_for_day(((day - 1) % 28) + 1));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_reset_returns_economy_to_clean_state() {
    let market = seeded_market(3);
    let balancer = PriceBalancer::new(BalanceConfig::default());
    let charts = ChartStore::new(Timeframe::Daily, ChartConfig::default());

    balancer
        .register_item("apple", Category::Fruit, 10.0)
        .unwrap();
    balancer.record_sale("apple", 11.0, 1, 100.0).unwrap();
    charts.add_price_point("apple", 11.0, 1).unwrap();
    market.on_day_tick(9, Season::Autumn);

    market.reset();
    balancer.reset();
    charts.reset();

    assert!(market.current_price("apple").is_err());
    assert_eq!(market.state().day, 1);
    assert!(balancer.item_balance("apple").is_err());
    assert_eq!(balancer.metrics().total_transactions, 0);
    assert!(charts.data_points("apple").is_err());
}
