use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{MarketError, Result};
use crate::services::engine::PriceEngine;
use crate::services::history::{PriceHistory, PriceRecord};
use crate::services::registry::ItemRegistry;
use crate::types::{
    Category, EventEffect, Item, MarketEvent, MarketState, PriceChange, PriceTrend, Season,
    TradeAction,
};

/// Per-item history window; a couple of in-game weeks of daily prices.
const DEFAULT_HISTORY_SIZE: usize = 10;

type PriceListener = Box<dyn Fn(&PriceChange) + Send + Sync>;

/// Serializable market state export for the external save subsystem.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub state: MarketState,
    pub histories: HashMap<String, PriceHistory>,
    pub active_events: Vec<MarketEvent>,
}

/// The game's market: item registration, per-tick repricing, price
/// history queries and trade hints.
///
/// Writes happen once per tick from the game loop; any number of
/// readers (UI polling, merchant AI) may query concurrently. Price
/// change listeners are invoked after all internal guards are dropped,
/// so a listener may freely query the market.
pub struct Market {
    engine: PriceEngine,
    registry: Arc<ItemRegistry>,
    state: RwLock<MarketState>,
    histories: DashMap<String, PriceHistory>,
    active_events: RwLock<Vec<MarketEvent>>,
    /// Weather-style category multipliers, replaced wholesale each tick.
    category_modifiers: RwLock<HashMap<Category, f64>>,
    /// Calendar effect multipliers keyed by effect name; their product
    /// applies to every item.
    effect_modifiers: RwLock<HashMap<String, f64>>,
    listeners: RwLock<Vec<PriceListener>>,
    history_size: usize,
}

impl Market {
    pub fn new(registry: Arc<ItemRegistry>, engine: PriceEngine) -> Self {
        Self {
            engine,
            registry,
            state: RwLock::new(MarketState::default()),
            histories: DashMap::new(),
            active_events: RwLock::new(Vec::new()),
            category_modifiers: RwLock::new(HashMap::new()),
            effect_modifiers: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }

    /// Override the per-item history window size.
    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size.max(1);
        self
    }

    /// Register an item and seed its price history at the base price.
    pub fn register_item(&self, item: Item) -> Result<()> {
        let id = item.id.clone();
        let base_price = item.base_price;
        self.registry.register(item)?;
        self.histories
            .insert(id, PriceHistory::new(base_price, self.history_size));
        Ok(())
    }

    /// Current market conditions.
    pub fn state(&self) -> MarketState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the weather-driven category multiplier map.
    pub fn set_category_modifiers(&self, modifiers: HashMap<Category, f64>) {
        *self
            .category_modifiers
            .write()
            .unwrap_or_else(|e| e.into_inner()) = modifiers;
    }

    /// Replace the calendar-driven effect multiplier map.
    pub fn set_effect_modifiers(&self, modifiers: HashMap<String, f64>) {
        *self
            .effect_modifiers
            .write()
            .unwrap_or_else(|e| e.into_inner()) = modifiers;
    }

    /// Apply a market event: shifts the coarse supply/demand levels and
    /// keeps the event active for its duration.
    pub fn apply_event(&self, mut event: MarketEvent) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        for effect in &event.effects {
            match *effect {
                EventEffect::SupplyIncrease(steps) => state.supply = state.supply.shift(steps),
                EventEffect::SupplyDecrease(steps) => state.supply = state.supply.shift(-steps),
                EventEffect::DemandIncrease(steps) => state.demand = state.demand.shift(steps),
                EventEffect::DemandDecrease(steps) => state.demand = state.demand.shift(-steps),
            }
        }
        event.start_day = state.day;
        info!(event = %event.name, day = state.day, "market event applied");
        drop(state);

        self.active_events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// Events still within their duration.
    pub fn active_events(&self) -> Vec<MarketEvent> {
        self.active_events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Advance to a new in-game day: updates the calendar state, drops
    /// events whose duration has elapsed, and reprices every item.
    pub fn on_day_tick(&self, day: u32, season: Season) -> Vec<PriceChange> {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.day = day;
            state.season = season;
        }
        self.active_events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|event| event.start_day + event.duration > day);

        self.update_prices()
    }

    /// Reprice every registered item under the current market state.
    ///
    /// Listener callbacks fire after all locks are released, once per
    /// changed item.
    pub fn update_prices(&self) -> Vec<PriceChange> {
        let state = self.state();
        let effect_modifier: f64 = self
            .effect_modifiers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .product();
        let category_modifiers = self
            .category_modifiers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let now = Utc::now();
        let mut changes = Vec::new();

        for item in self.registry.all() {
            let external = category_modifiers
                .get(&item.category)
                .copied()
                .unwrap_or(1.0)
                * effect_modifier;
            let new_price = self.engine.calculate_price_with(&item, &state, external);

            if let Some(mut history) = self.histories.get_mut(&item.id) {
                let old_price = history.latest_price();
                history.add_record(new_price, now);
                changes.push(PriceChange {
                    item_id: item.id,
                    old_price,
                    new_price,
                });
            }
        }
        debug!(items = changes.len(), day = state.day, "market repriced");

        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for change in &changes {
            for listener in listeners.iter() {
                listener(change);
            }
        }
        drop(listeners);

        changes
    }

    /// Register a listener for per-item price changes.
    pub fn subscribe_price_changes<F>(&self, listener: F)
    where
        F: Fn(&PriceChange) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    pub fn current_price(&self, item_id: &str) -> Result<f64> {
        self.with_history(item_id, |h| h.latest_price())
    }

    pub fn average_price(&self, item_id: &str) -> Result<f64> {
        self.with_history(item_id, |h| h.average_price())
    }

    pub fn trend(&self, item_id: &str) -> Result<PriceTrend> {
        self.with_history(item_id, |h| h.trend())
    }

    /// Copy of the retained price records for an item.
    pub fn price_history(&self, item_id: &str) -> Result<Vec<PriceRecord>> {
        self.with_history(item_id, |h| h.records())
    }

    /// Simple trade hint from trend and the price/average ratio: buy
    /// rising items still below average, sell falling items still
    /// above it.
    pub fn recommended_action(&self, item_id: &str) -> Result<TradeAction> {
        self.with_history(item_id, |history| {
            let ratio = history.latest_price() / history.average_price();
            match history.trend() {
                PriceTrend::Up if ratio < 0.9 => TradeAction::Buy,
                PriceTrend::Down if ratio > 1.1 => TradeAction::Sell,
                _ => TradeAction::Hold,
            }
        })
    }

    /// Export the market state for the external save subsystem.
    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            state: self.state(),
            histories: self
                .histories
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            active_events: self.active_events(),
        }
    }

    /// Clear all market state for a new game. Also clears the shared
    /// item registry.
    pub fn reset(&self) {
        info!("market reset");
        self.histories.clear();
        self.registry.clear();
        self.active_events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = MarketState::default();
    }

    fn with_history<T>(&self, item_id: &str, f: impl FnOnce(&PriceHistory) -> T) -> Result<T> {
        self.histories
            .get(item_id)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| MarketError::ItemNotFound(item_id.to_string()))
    }
}
