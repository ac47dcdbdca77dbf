use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::{MarketError, Result};
use crate::types::{Category, Item};

/// Shared item catalog.
///
/// Constructed once at startup and passed by `Arc` to every consumer;
/// there is no process-wide instance.
pub struct ItemRegistry {
    items: DashMap<String, Item>,
}

impl ItemRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            items: DashMap::new(),
        })
    }

    /// Register an item. Fails if the id is already taken.
    pub fn register(&self, item: Item) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(MarketError::DuplicateItem(item.id));
        }
        debug!(item_id = %item.id, category = %item.category, "registered item");
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Result<Item> {
        self.items
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MarketError::ItemNotFound(id.to_string()))
    }

    /// All registered items.
    pub fn all(&self) -> Vec<Item> {
        self.items.iter().map(|e| e.value().clone()).collect()
    }

    /// All registered items of the given category.
    pub fn by_category(&self, category: Category) -> Vec<Item> {
        self.items
            .iter()
            .filter(|e| e.value().category == category)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every item. Used on new-game reset.
    pub fn clear(&self) {
        self.items.clear();
    }
}
