use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Category of a tradeable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fruit,
    Potion,
    Weapon,
    Accessory,
    MagicBook,
    Gem,
}

impl Category {
    /// Default price volatility coefficient for the category.
    ///
    /// Perishable and luxury goods swing harder than staples.
    pub fn default_volatility(&self) -> f64 {
        match self {
            Self::Fruit => 0.1,
            Self::Potion => 0.3,
            Self::Weapon => 0.05,
            Self::Accessory => 0.5,
            Self::MagicBook => 0.1,
            Self::Gem => 0.7,
        }
    }

    /// Default target profit margin for the category.
    pub fn default_margin(&self) -> f64 {
        match self {
            Self::Fruit => 0.30,
            Self::Potion => 0.45,
            Self::Weapon => 0.40,
            Self::Accessory => 0.50,
            Self::MagicBook => 0.55,
            Self::Gem => 0.60,
        }
    }

    /// All categories, in declaration order.
    pub fn all() -> [Category; 6] {
        [
            Self::Fruit,
            Self::Potion,
            Self::Weapon,
            Self::Accessory,
            Self::MagicBook,
            Self::Gem,
        ]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fruit => write!(f, "fruit"),
            Self::Potion => write!(f, "potion"),
            Self::Weapon => write!(f, "weapon"),
            Self::Accessory => write!(f, "accessory"),
            Self::MagicBook => write!(f, "magic_book"),
            Self::Gem => write!(f, "gem"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fruit" => Ok(Self::Fruit),
            "potion" => Ok(Self::Potion),
            "weapon" => Ok(Self::Weapon),
            "accessory" => Ok(Self::Accessory),
            "magic_book" => Ok(Self::MagicBook),
            "gem" => Ok(Self::Gem),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// In-game season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spring => write!(f, "spring"),
            Self::Summer => write!(f, "summer"),
            Self::Autumn => write!(f, "autumn"),
            Self::Winter => write!(f, "winter"),
        }
    }
}

/// A tradeable item. Immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub category: Category,
    /// Reference price in gold; every computed price is expressed as a
    /// multiple of this.
    pub base_price: f64,
    /// Per-tick fluctuation coefficient, always within [0, 1].
    pub volatility: f64,
}

impl Item {
    /// Create a validated item with the category's default volatility.
    pub fn new(id: &str, name: &str, category: Category, base_price: f64) -> Result<Self> {
        if id.is_empty() {
            return Err(MarketError::EmptyField("item id"));
        }
        if name.is_empty() {
            return Err(MarketError::EmptyField("item name"));
        }
        if !base_price.is_finite() || base_price <= 0.0 {
            return Err(MarketError::InvalidPrice(base_price));
        }

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            base_price,
            volatility: category.default_volatility(),
        })
    }

    /// Override the volatility coefficient, clamped to [0, 1].
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.clamp(0.0, 1.0);
        self
    }
}
