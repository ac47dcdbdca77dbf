//! Mercantile - A trading-game economy engine
//!
//! Stochastic but bounded price generation, bounded price histories
//! with trend classification, a macro-level price balancer, and chart
//! analytics (moving averages, RSI, OHLC candles, trend lines, and
//! trade recommendations).
//!
//! ```no_run
//! use mercantile::config::{BalanceConfig, ChartConfig, EngineConfig};
//! use mercantile::services::{ChartStore, ItemRegistry, Market, PriceBalancer, PriceEngine};
//! use mercantile::types::{Category, Item, Season, Timeframe};
//!
//! # fn main() -> mercantile::error::Result<()> {
//! let market = Market::new(ItemRegistry::new(), PriceEngine::new(EngineConfig::default()));
//! market.register_item(Item::new("apple", "Apple", Category::Fruit, 10.0)?)?;
//! market.on_day_tick(1, Season::Spring);
//!
//! let balancer = PriceBalancer::new(BalanceConfig::default());
//! let charts = ChartStore::new(Timeframe::Daily, ChartConfig::default());
//! charts.add_price_point("apple", market.current_price("apple")?, 1)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use config::{BalanceConfig, ChartConfig, EngineConfig};
pub use error::{MarketError, Result};
pub use services::{ChartStore, Market, PriceBalancer, PriceEngine};
