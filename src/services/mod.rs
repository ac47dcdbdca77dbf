//! Core services: price generation, history, balancing, and analytics.

pub mod analytics;
pub mod balancer;
pub mod engine;
pub mod history;
pub mod market;
pub mod registry;

pub use analytics::{ChartIndicators, ChartStore, PriceChart};
pub use balancer::{supply_demand_ratio, BalancerSnapshot, PriceBalancer, MAX_SUPPLY_DEMAND_RATIO};
pub use engine::{
    CategoryVolatility, PriceEngine, PriceFormula, SeasonalTable, StandardFormula, VolatilityModel,
};
pub use history::{PriceHistory, PriceRecord};
pub use market::{Market, MarketSnapshot};
pub use registry::ItemRegistry;
