use thiserror::Error;

/// Economy engine error types.
///
/// These cover boundary validation only; the pricing math itself never
/// fails. Insufficient-data conditions (fewer than 10 chart points) are
/// not errors — the analytics accessors return `None` for those.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("item already registered: {0}")]
    DuplicateItem(String),

    #[error("invalid quantity: {0} (must be positive)")]
    InvalidQuantity(i64),

    #[error("invalid price: {0} (must be finite and positive)")]
    InvalidPrice(f64),

    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
}

pub type Result<T> = std::result::Result<T, MarketError>;
