use std::collections::HashMap;

use serde::Deserialize;

use crate::types::Category;

/// Tuning for the per-tick price calculation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Lower price clamp as a fraction of base price.
    pub min_multiplier: f64,
    /// Upper price clamp as a fraction of base price.
    pub max_multiplier: f64,
    /// Scale of the random factor: the per-tick noise is
    /// `1.0 + U(-1,1) * volatility * random_swing`.
    pub random_swing: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_multiplier: 0.5,
            max_multiplier: 2.0,
            random_swing: 0.2,
        }
    }
}

/// Tuning for the long-run price balancing controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BalanceConfig {
    /// Target profit margin per item category. Categories missing from
    /// the table fall back to the category default.
    pub target_margins: HashMap<Category, f64>,
    /// Lower bound for balanced prices as a fraction of base price.
    pub min_multiplier: f64,
    /// Upper bound for balanced prices as a fraction of base price.
    pub max_multiplier: f64,
    /// Fraction of the gap to the optimal price closed per adjustment
    /// pass. Keeps single-tick price shocks out of the economy.
    pub adjustment_speed: f64,
    /// Supply/demand ratio above which an item counts as oversupplied.
    pub oversupply_threshold: f64,
    /// Supply/demand ratio below which an item counts as scarce.
    pub scarcity_threshold: f64,
    /// Price multiplier applied while the player is early game.
    pub early_game_multiplier: f64,
    /// Price multiplier applied while the player is mid game.
    pub mid_game_multiplier: f64,
    /// Price multiplier applied while the player is late game.
    pub late_game_multiplier: f64,
    /// Coefficient-of-variation threshold for reporting an adjustment
    /// as driven by volatility.
    pub high_volatility_threshold: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            target_margins: HashMap::new(),
            min_multiplier: 0.5,
            max_multiplier: 3.0,
            adjustment_speed: 0.1,
            oversupply_threshold: 1.5,
            scarcity_threshold: 0.5,
            early_game_multiplier: 0.8,
            mid_game_multiplier: 1.0,
            late_game_multiplier: 1.3,
            high_volatility_threshold: 0.2,
        }
    }
}

impl BalanceConfig {
    /// Target margin for a category, falling back to the built-in
    /// per-category default when the table has no entry.
    pub fn target_margin(&self, category: Category) -> f64 {
        self.target_margins
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_margin())
    }
}

/// Tuning for the chart analytics layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    /// Maximum number of retained price points (and candles) per item.
    pub max_points: usize,
    /// Simple moving average window.
    pub ma_period: usize,
    /// RSI window.
    pub rsi_period: usize,
    /// Lookback/lookahead distance for local extrema detection.
    pub extrema_lookback: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_points: 100,
            ma_period: 20,
            rsi_period: 14,
            extrema_lookback: 5,
        }
    }
}
