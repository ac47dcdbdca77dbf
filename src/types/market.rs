use serde::{Deserialize, Serialize};

use crate::types::Season;

/// Coarse demand level, mapped to a fixed price multiplier.
///
/// Distinct from the raw integer demand counts tracked by the balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLevel {
    VeryLow,
    Low,
    Normal,
    High,
    VeryHigh,
}

impl DemandLevel {
    /// Price multiplier for this demand level.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::VeryLow => 0.7,
            Self::Low => 0.85,
            Self::Normal => 1.0,
            Self::High => 1.2,
            Self::VeryHigh => 1.5,
        }
    }

    /// Shift the level by the given number of steps, saturating at the
    /// extremes.
    pub fn shift(&self, steps: i32) -> Self {
        let levels = [
            Self::VeryLow,
            Self::Low,
            Self::Normal,
            Self::High,
            Self::VeryHigh,
        ];
        let index = (*self as i32 + steps).clamp(0, levels.len() as i32 - 1);
        levels[index as usize]
    }
}

/// Coarse supply level, mapped to a fixed price multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyLevel {
    VeryLow,
    Low,
    Normal,
    High,
    VeryHigh,
}

impl SupplyLevel {
    /// Price multiplier for this supply level. Inverse of demand:
    /// scarce supply raises prices.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::VeryLow => 1.3,
            Self::Low => 1.15,
            Self::Normal => 1.0,
            Self::High => 0.85,
            Self::VeryHigh => 0.7,
        }
    }

    /// Shift the level by the given number of steps, saturating at the
    /// extremes.
    pub fn shift(&self, steps: i32) -> Self {
        let levels = [
            Self::VeryLow,
            Self::Low,
            Self::Normal,
            Self::High,
            Self::VeryHigh,
        ];
        let index = (*self as i32 + steps).clamp(0, levels.len() as i32 - 1);
        levels[index as usize]
    }
}

/// Snapshot of market-wide conditions used by the pricing engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    pub demand: DemandLevel,
    pub supply: SupplyLevel,
    pub season: Season,
    pub day: u32,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            demand: DemandLevel::Normal,
            supply: SupplyLevel::Normal,
            season: Season::Spring,
            day: 1,
        }
    }
}

/// Coarse price movement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    Stable,
    Up,
    Down,
}

/// Recommended trading action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Hold,
    Buy,
    Sell,
}

/// Player progression tier; later tiers see higher equilibrium prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progression {
    EarlyGame,
    MidGame,
    LateGame,
}

/// Effect of a market event on coarse supply or demand levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "steps")]
pub enum EventEffect {
    SupplyIncrease(i32),
    SupplyDecrease(i32),
    DemandIncrease(i32),
    DemandDecrease(i32),
}

/// A calendar-driven market event: shifts coarse supply/demand levels
/// for its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEvent {
    pub name: String,
    pub description: String,
    /// Duration in days.
    pub duration: u32,
    /// Day the event was applied; set when the event is activated.
    #[serde(default)]
    pub start_day: u32,
    pub effects: Vec<EventEffect>,
}

/// Notification payload for a per-item price change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub item_id: String,
    pub old_price: f64,
    pub new_price: f64,
}
