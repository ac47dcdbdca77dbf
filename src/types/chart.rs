use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PriceTrend, TradeAction};

/// A single price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
    /// Number of transactions at this observation.
    pub volume: u32,
}

/// OHLC candle for one calendar-aligned time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleData {
    /// Time of the first observation in the bucket.
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u32,
}

/// Chart bucketing granularity.
///
/// Buckets are calendar-aligned: two observations share a bucket when
/// the relevant calendar field (hour, day of month, ISO week, month)
/// matches, not when they fall within a fixed duration. The first
/// bucket after a boundary can therefore span less than its nominal
/// timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    /// Whether two timestamps fall into the same calendar bucket.
    pub fn same_bucket(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        match self {
            Self::Hourly => a.date_naive() == b.date_naive() && a.hour() == b.hour(),
            Self::Daily => a.date_naive() == b.date_naive(),
            Self::Weekly => a.iso_week() == b.iso_week(),
            Self::Monthly => a.year() == b.year() && a.month() == b.month(),
        }
    }

    /// Nominal horizon of one bucket, used as the prediction horizon.
    pub fn horizon(&self) -> std::time::Duration {
        let hour = 3600;
        std::time::Duration::from_secs(match self {
            Self::Hourly => hour,
            Self::Daily => 24 * hour,
            Self::Weekly => 7 * 24 * hour,
            Self::Monthly => 30 * 24 * hour,
        })
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::Daily
    }
}

/// Classification of a fitted trend line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendKind {
    Support,
    Resistance,
    MovingAverage,
}

/// A line fitted to chart data by least-squares regression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendLine {
    pub start: PricePoint,
    pub end: PricePoint,
    /// Gold per second.
    pub slope: f64,
    pub intercept: f64,
    pub kind: TrendKind,
}

/// Short-horizon price forecast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePrediction {
    pub current_price: f64,
    pub predicted_price: f64,
    pub direction: PriceTrend,
    /// Always within (0, 1].
    pub confidence: f64,
    pub horizon: std::time::Duration,
}

/// Full chart analysis with a scored trade recommendation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAnalysis {
    pub item_id: String,
    pub trend_direction: PriceTrend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resistance_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_average: Option<f64>,
    pub rsi: f64,
    pub volatility: f64,
    pub volume_average: u32,
    pub recommendation: TradeAction,
    /// Always within (0, 0.95].
    pub confidence: f64,
}
