pub mod balance;
pub mod chart;
pub mod item;
pub mod market;

pub use balance::*;
pub use chart::*;
pub use item::*;
pub use market::*;
