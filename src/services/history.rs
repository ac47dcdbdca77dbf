use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PriceTrend;

/// Relative gap between half-window means required to call a trend.
const TREND_THRESHOLD: f64 = 0.05;

/// A single retained price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub price: f64,
    pub time: DateTime<Utc>,
}

/// Bounded, ordered time series of prices for one item.
///
/// Eviction is strictly oldest-first: after N inserts into a size-K
/// history (N > K), the retained records are exactly the last K
/// inserted, in insertion order. The rolling average and trend are
/// recomputed on every insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    records: VecDeque<PriceRecord>,
    current_price: f64,
    average_price: f64,
    trend: PriceTrend,
    max_size: usize,
}

impl PriceHistory {
    /// Create a history seeded at the given price.
    pub fn new(initial_price: f64, max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size),
            current_price: initial_price,
            average_price: initial_price,
            trend: PriceTrend::Stable,
            max_size,
        }
    }

    /// Append a record, evicting the oldest when the window is full.
    pub fn add_record(&mut self, price: f64, time: DateTime<Utc>) {
        self.records.push_back(PriceRecord { price, time });
        while self.records.len() > self.max_size {
            self.records.pop_front();
        }

        self.current_price = price;
        self.update_average();
        self.update_trend();
    }

    pub fn latest_price(&self) -> f64 {
        self.current_price
    }

    pub fn average_price(&self) -> f64 {
        self.average_price
    }

    pub fn trend(&self) -> PriceTrend {
        self.trend
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of the retained records in insertion order.
    pub fn records(&self) -> Vec<PriceRecord> {
        self.records.iter().copied().collect()
    }

    fn update_average(&mut self) {
        if self.records.is_empty() {
            return;
        }
        let sum: f64 = self.records.iter().map(|r| r.price).sum();
        self.average_price = sum / self.records.len() as f64;
    }

    /// Compare the mean of the older half against the newer half; a
    /// relative gap beyond the threshold calls the trend.
    fn update_trend(&mut self) {
        if self.records.len() < 2 {
            self.trend = PriceTrend::Stable;
            return;
        }

        let half = self.records.len() / 2;
        let older: f64 =
            self.records.iter().take(half).map(|r| r.price).sum::<f64>() / half as f64;
        let newer: f64 = self.records.iter().skip(half).map(|r| r.price).sum::<f64>()
            / (self.records.len() - half) as f64;

        let threshold = older * TREND_THRESHOLD;
        self.trend = if newer > older + threshold {
            PriceTrend::Up
        } else if newer < older - threshold {
            PriceTrend::Down
        } else {
            PriceTrend::Stable
        };
    }
}
