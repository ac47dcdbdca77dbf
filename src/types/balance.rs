use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Category;

/// A recorded sale transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub quantity: u32,
    /// Wealth of the buyer at sale time; feeds future demand modeling.
    pub buyer_wealth: f64,
    /// Realized profit relative to the item's base price.
    pub seller_profit: f64,
}

/// Why a balancing pass moved an item's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    Oversupply,
    Scarcity,
    HighVolatility,
    MarketEquilibrium,
}

impl std::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversupply => write!(f, "oversupply"),
            Self::Scarcity => write!(f, "scarcity"),
            Self::HighVolatility => write!(f, "high_volatility"),
            Self::MarketEquilibrium => write!(f, "market_equilibrium"),
        }
    }
}

/// Notification payload for a balancing adjustment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAdjustment {
    pub item_id: String,
    pub old_price: f64,
    pub new_price: f64,
    pub reason: AdjustmentReason,
}

/// Read-only copy of an item's balance state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBalanceSnapshot {
    pub item_id: String,
    pub category: Category,
    pub base_price: f64,
    pub current_price: f64,
    pub optimal_price: f64,
    /// Current price divided by base price.
    pub price_multiplier: f64,
    pub profit_margin: f64,
    pub supply: u32,
    pub demand: u32,
    pub recent_sales: usize,
    pub last_adjustment: DateTime<Utc>,
}

/// Market-wide health indicators maintained by the balancer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMetrics {
    pub total_transactions: u64,
    pub total_volume: f64,
    pub average_transaction: f64,
    /// Overall price level relative to a 100-gold baseline (1.0 = at
    /// baseline).
    pub price_index: f64,
    pub inflation_rate: f64,
    pub supply_demand_ratio: f64,
    pub last_updated: DateTime<Utc>,
}

impl Default for MarketMetrics {
    fn default() -> Self {
        Self {
            total_transactions: 0,
            total_volume: 0.0,
            average_transaction: 0.0,
            price_index: 0.0,
            inflation_rate: 0.0,
            supply_demand_ratio: 0.0,
            last_updated: Utc::now(),
        }
    }
}
