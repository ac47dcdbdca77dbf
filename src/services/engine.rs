use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::types::{Category, Item, MarketState, Season};

/// Strategy for the deterministic part of a price calculation.
pub trait PriceFormula: Send + Sync {
    fn calculate(&self, item: &Item, state: &MarketState) -> f64;
}

/// Strategy for how strongly an item's price fluctuates per tick.
pub trait VolatilityModel: Send + Sync {
    fn volatility(&self, item: &Item) -> f64;
}

/// Default formula: base price scaled by the coarse demand and supply
/// level multipliers.
pub struct StandardFormula;

impl PriceFormula for StandardFormula {
    fn calculate(&self, item: &Item, state: &MarketState) -> f64 {
        item.base_price * state.demand.multiplier() * state.supply.multiplier()
    }
}

/// Default volatility model: the item's own coefficient (which in turn
/// defaults from its category).
pub struct CategoryVolatility;

impl VolatilityModel for CategoryVolatility {
    fn volatility(&self, item: &Item) -> f64 {
        item.volatility
    }
}

/// Seasonal (category × season) price multipliers, 1.0 for unmapped
/// combinations.
#[derive(Debug, Clone)]
pub struct SeasonalTable {
    table: HashMap<(Category, Season), f64>,
}

impl Default for SeasonalTable {
    fn default() -> Self {
        let mut table = HashMap::new();
        // Fruit is cheap in winter and peaks at the autumn harvest trade.
        table.insert((Category::Fruit, Season::Spring), 1.1);
        table.insert((Category::Fruit, Season::Summer), 1.0);
        table.insert((Category::Fruit, Season::Autumn), 1.3);
        table.insert((Category::Fruit, Season::Winter), 0.8);
        // Potions sell best in the cold season.
        table.insert((Category::Potion, Season::Winter), 1.2);
        Self { table }
    }
}

impl SeasonalTable {
    pub fn modifier(&self, category: Category, season: Season) -> f64 {
        self.table.get(&(category, season)).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, category: Category, season: Season, multiplier: f64) {
        self.table.insert((category, season), multiplier);
    }
}

/// Per-tick price calculator.
///
/// `calculate_price` combines the formula's deterministic price with
/// seasonal and external modifiers plus bounded random noise, then
/// clamps the result into the configured band around the base price.
/// It has no side effects beyond advancing the internal RNG; callers
/// append the result to the item's price history themselves.
pub struct PriceEngine {
    config: EngineConfig,
    formula: Box<dyn PriceFormula>,
    volatility: Box<dyn VolatilityModel>,
    seasonal: SeasonalTable,
    rng: Mutex<StdRng>,
}

impl PriceEngine {
    /// Create an engine with the default strategies and an
    /// entropy-seeded RNG.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            formula: Box::new(StandardFormula),
            volatility: Box::new(CategoryVolatility),
            seasonal: SeasonalTable::default(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create an engine with a fixed RNG seed for deterministic tests.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..Self::new(config)
        }
    }

    /// Replace the pricing formula strategy.
    pub fn with_formula(mut self, formula: Box<dyn PriceFormula>) -> Self {
        self.formula = formula;
        self
    }

    /// Replace the volatility strategy.
    pub fn with_volatility_model(mut self, model: Box<dyn VolatilityModel>) -> Self {
        self.volatility = model;
        self
    }

    /// Mutable access to the seasonal table for host customization.
    pub fn seasonal_table_mut(&mut self) -> &mut SeasonalTable {
        &mut self.seasonal
    }

    /// Compute a new price for the item under the given market state.
    pub fn calculate_price(&self, item: &Item, state: &MarketState) -> f64 {
        self.calculate_price_with(item, state, 1.0)
    }

    /// Like `calculate_price`, folding in an extra multiplier from
    /// external collaborators (weather, calendar effects).
    pub fn calculate_price_with(
        &self,
        item: &Item,
        state: &MarketState,
        external_modifier: f64,
    ) -> f64 {
        let season_mod = self.seasonal.modifier(item.category, state.season);
        let mut price =
            self.formula.calculate(item, state) * season_mod * external_modifier;

        let volatility = self.volatility.volatility(item).clamp(0.0, 1.0);
        let noise: f64 = self.rng.lock().unwrap_or_else(|e| e.into_inner()).gen_range(-1.0..=1.0);
        price *= 1.0 + noise * volatility * self.config.random_swing;

        let min_price = item.base_price * self.config.min_multiplier;
        let max_price = item.base_price * self.config.max_multiplier;
        price.clamp(min_price, max_price)
    }
}
