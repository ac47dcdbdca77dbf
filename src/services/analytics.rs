use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::config::ChartConfig;
use crate::error::{MarketError, Result};
use crate::types::{
    CandleData, ChartAnalysis, PricePoint, PricePrediction, PriceTrend, Timeframe, TradeAction,
    TrendKind, TrendLine,
};

/// Minimum points before prediction/analysis produce a result.
const MIN_ANALYSIS_POINTS: usize = 10;

/// RSI reading reported while the window is still filling. Neutral, so
/// a short history never fakes an overbought/oversold signal.
const NEUTRAL_RSI: f64 = 50.0;

/// Current indicator values for one item's chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartIndicators {
    /// Trailing simple-moving-average series, oldest first.
    pub moving_average: Vec<f64>,
    pub rsi: f64,
    /// Standard deviation of consecutive fractional price changes, as
    /// a percentage.
    pub volatility: f64,
}

/// Price chart and technical analysis for a single item.
///
/// Keeps a bounded point buffer plus calendar-aligned OHLC candles,
/// and recomputes every indicator eagerly on each insert so readers
/// always see fresh values.
#[derive(Debug, Clone)]
pub struct PriceChart {
    item_id: String,
    timeframe: Timeframe,
    config: ChartConfig,
    points: VecDeque<PricePoint>,
    candles: VecDeque<CandleData>,
    trend_lines: Vec<TrendLine>,
    moving_average: Vec<f64>,
    rsi: f64,
    volatility: f64,
}

impl PriceChart {
    pub fn new(item_id: &str, timeframe: Timeframe, config: ChartConfig) -> Self {
        Self {
            item_id: item_id.to_string(),
            timeframe,
            config,
            points: VecDeque::new(),
            candles: VecDeque::new(),
            trend_lines: Vec::new(),
            moving_average: Vec::new(),
            rsi: NEUTRAL_RSI,
            volatility: 0.0,
        }
    }

    /// Append a price observation and recompute all indicators.
    pub fn add_point(&mut self, price: f64, volume: u32, time: DateTime<Utc>) {
        let point = PricePoint { time, price, volume };
        self.points.push_back(point);
        while self.points.len() > self.config.max_points {
            self.points.pop_front();
        }

        self.update_candles(point);
        self.recompute_indicators();
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn points(&self) -> Vec<PricePoint> {
        self.points.iter().copied().collect()
    }

    pub fn candles(&self) -> Vec<CandleData> {
        self.candles.iter().copied().collect()
    }

    pub fn trend_lines(&self) -> Vec<TrendLine> {
        self.trend_lines.clone()
    }

    pub fn indicators(&self) -> ChartIndicators {
        ChartIndicators {
            moving_average: self.moving_average.clone(),
            rsi: self.rsi,
            volatility: self.volatility,
        }
    }

    /// Extend the current candle, or open a new one when the point
    /// falls into a new calendar bucket. Candles share the point
    /// buffer's bound.
    fn update_candles(&mut self, point: PricePoint) {
        if let Some(last) = self.candles.back_mut() {
            if self.timeframe.same_bucket(last.time, point.time) {
                last.high = last.high.max(point.price);
                last.low = last.low.min(point.price);
                last.close = point.price;
                last.volume += point.volume;
                return;
            }
        }

        self.candles.push_back(CandleData {
            time: point.time,
            open: point.price,
            high: point.price,
            low: point.price,
            close: point.price,
            volume: point.volume,
        });
        while self.candles.len() > self.config.max_points {
            self.candles.pop_front();
        }
    }

    fn recompute_indicators(&mut self) {
        self.update_moving_average();
        self.update_rsi();
        self.update_volatility();
        self.detect_trend_lines();
    }

    fn update_moving_average(&mut self) {
        let period = self.config.ma_period;
        let prices: Vec<f64> = self.points.iter().map(|p| p.price).collect();
        self.moving_average.clear();
        if prices.len() < period {
            return;
        }

        for window in prices.windows(period) {
            self.moving_average
                .push(window.iter().sum::<f64>() / period as f64);
        }
    }

    /// Wilder-smoothed RSI: seeded with simple averages over the first
    /// period, then exponentially smoothed across the rest of the
    /// buffer. 100 when the window has no losses at all.
    fn update_rsi(&mut self) {
        let period = self.config.rsi_period;
        if self.points.len() < period + 1 {
            self.rsi = NEUTRAL_RSI;
            return;
        }

        let prices: Vec<f64> = self.points.iter().map(|p| p.price).collect();
        let mut gains = Vec::with_capacity(prices.len() - 1);
        let mut losses = Vec::with_capacity(prices.len() - 1);
        for pair in prices.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains.push(change);
                losses.push(0.0);
            } else {
                gains.push(0.0);
                losses.push(-change);
            }
        }

        let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
        let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;
        for i in period..gains.len() {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        }

        self.rsi = if avg_loss == 0.0 {
            // No movement at all is neutral, not overbought.
            if avg_gain == 0.0 {
                NEUTRAL_RSI
            } else {
                100.0
            }
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        };
    }

    fn update_volatility(&mut self) {
        if self.points.len() < 2 {
            self.volatility = 0.0;
            return;
        }

        let prices: Vec<f64> = self.points.iter().map(|p| p.price).collect();
        let changes: Vec<f64> = prices
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();

        let mean = changes.iter().sum::<f64>() / changes.len() as f64;
        let variance = changes
            .iter()
            .map(|c| (c - mean).powi(2))
            .sum::<f64>()
            / changes.len() as f64;

        self.volatility = variance.sqrt() * 100.0;
    }

    fn detect_trend_lines(&mut self) {
        self.trend_lines.clear();
        if self.points.len() < MIN_ANALYSIS_POINTS {
            return;
        }

        let points: Vec<PricePoint> = self.points.iter().copied().collect();
        let highs = self.local_extrema(&points, true);
        let lows = self.local_extrema(&points, false);

        if highs.len() >= 2 {
            if let Some(line) = fit_trend_line(&highs, TrendKind::Resistance) {
                self.trend_lines.push(line);
            }
        }
        if lows.len() >= 2 {
            if let Some(line) = fit_trend_line(&lows, TrendKind::Support) {
                self.trend_lines.push(line);
            }
        }

        // Flat windows have no extrema; regress the whole buffer so
        // analysis still sees a level.
        if self.trend_lines.is_empty() {
            if let Some(line) = fit_trend_line(&points, TrendKind::Support) {
                self.trend_lines.push(line);
            }
        }

        if let Some(line) = self.moving_average_line(&points) {
            self.trend_lines.push(line);
        }
    }

    /// A point is a local high (low) if no point within the lookback
    /// window on either side has a strictly larger (smaller) price.
    fn local_extrema(&self, points: &[PricePoint], find_highs: bool) -> Vec<PricePoint> {
        let lookback = self.config.extrema_lookback;
        let mut extrema = Vec::new();
        if points.len() <= 2 * lookback {
            return extrema;
        }

        for i in lookback..points.len() - lookback {
            let current = points[i].price;
            let beaten = points[i - lookback..=i + lookback]
                .iter()
                .enumerate()
                .any(|(offset, p)| {
                    offset != lookback
                        && if find_highs {
                            p.price > current
                        } else {
                            p.price < current
                        }
                });
            if !beaten {
                extrema.push(points[i]);
            }
        }
        extrema
    }

    /// Trend line connecting the first and last moving-average values.
    fn moving_average_line(&self, points: &[PricePoint]) -> Option<TrendLine> {
        if self.moving_average.len() < 2 {
            return None;
        }

        let start_index = points.len() - self.moving_average.len();
        let start = PricePoint {
            time: points[start_index].time,
            price: self.moving_average[0],
            volume: 0,
        };
        let end = PricePoint {
            time: points[points.len() - 1].time,
            price: *self.moving_average.last()?,
            volume: 0,
        };

        let dt = seconds_between(start.time, end.time);
        let slope = if dt > 0.0 { (end.price - start.price) / dt } else { 0.0 };
        Some(TrendLine {
            start,
            end,
            slope,
            intercept: start.price,
            kind: TrendKind::MovingAverage,
        })
    }

    /// Short-horizon forecast. `None` below 10 points.
    pub fn prediction(&self) -> Option<PricePrediction> {
        if self.points.len() < MIN_ANALYSIS_POINTS {
            return None;
        }

        let last_price = self.points.back()?.price;
        let prices: Vec<f64> = self.points.iter().map(|p| p.price).collect();

        // Momentum fallback: average delta over the last few points.
        let lookback = 5.min(prices.len());
        let recent: f64 = prices[prices.len() - lookback..]
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .sum::<f64>()
            / (lookback - 1) as f64;

        let (mut direction, mut predicted) = if recent > 0.5 {
            (PriceTrend::Up, last_price * 1.02)
        } else if recent < -0.5 {
            (PriceTrend::Down, last_price * 0.98)
        } else {
            (PriceTrend::Stable, last_price)
        };
        let mut confidence = 0.5;

        // A fitted trend line overrides momentum, with confidence from
        // the volatility bucket.
        if let Some(line) = self.trend_lines.first() {
            if line.slope > 0.0 {
                direction = PriceTrend::Up;
                predicted = last_price * (1.0 + line.slope * 0.01);
            } else if line.slope < 0.0 {
                direction = PriceTrend::Down;
                predicted = last_price * (1.0 + line.slope * 0.01);
            } else {
                direction = PriceTrend::Stable;
                predicted = last_price;
            }

            confidence = if self.volatility < 5.0 {
                0.8
            } else if self.volatility < 10.0 {
                0.6
            } else if self.volatility < 20.0 {
                0.4
            } else {
                0.2
            };
        }

        // Overbought/oversold markets tend to snap back.
        if self.rsi > 70.0 {
            predicted *= 0.98;
            confidence *= 0.9;
        } else if self.rsi < 30.0 {
            predicted *= 1.02;
            confidence *= 0.9;
        }

        Some(PricePrediction {
            current_price: last_price,
            predicted_price: predicted,
            direction,
            confidence,
            horizon: self.timeframe.horizon(),
        })
    }

    /// Full chart analysis with a scored recommendation. `None` below
    /// 10 points.
    pub fn analyze(&self) -> Option<ChartAnalysis> {
        if self.points.len() < MIN_ANALYSIS_POINTS {
            return None;
        }

        let trend_direction = match self.trend_lines.first() {
            Some(line) if line.slope > 0.01 => PriceTrend::Up,
            Some(line) if line.slope < -0.01 => PriceTrend::Down,
            _ => PriceTrend::Stable,
        };

        let support_level = self
            .trend_lines
            .iter()
            .find(|l| l.kind == TrendKind::Support)
            .map(|l| l.end.price);
        let resistance_level = self
            .trend_lines
            .iter()
            .find(|l| l.kind == TrendKind::Resistance)
            .map(|l| l.end.price);
        let moving_average = self.moving_average.last().copied();

        let total_volume: u64 = self.points.iter().map(|p| p.volume as u64).sum();
        let volume_average = (total_volume / self.points.len() as u64) as u32;

        let (recommendation, confidence) =
            self.recommend(support_level, resistance_level, moving_average);

        Some(ChartAnalysis {
            item_id: self.item_id.clone(),
            trend_direction,
            support_level,
            resistance_level,
            moving_average,
            rsi: self.rsi,
            volatility: self.volatility,
            volume_average,
            recommendation,
            confidence,
        })
    }

    /// Additive scoring: momentum (RSI), price vs moving average, and
    /// proximity to support/resistance each contribute; the winning
    /// side must clear 0.2 to displace Hold.
    fn recommend(
        &self,
        support: Option<f64>,
        resistance: Option<f64>,
        moving_average: Option<f64>,
    ) -> (TradeAction, f64) {
        let last_price = match self.points.back() {
            Some(p) => p.price,
            None => return (TradeAction::Hold, 0.5),
        };

        let mut buy_score: f64 = 0.0;
        let mut sell_score: f64 = 0.0;

        if self.rsi > 70.0 {
            sell_score += 0.4;
        } else if self.rsi < 30.0 {
            buy_score += 0.4;
        }

        if let Some(ma) = moving_average {
            if last_price < ma * 0.95 {
                buy_score += 0.2;
            } else if last_price > ma * 1.05 {
                sell_score += 0.2;
            }
        }

        if support.is_some_and(|s| last_price <= s * 1.02) {
            buy_score += 0.15;
        } else if resistance.is_some_and(|r| last_price >= r * 0.98) {
            sell_score += 0.15;
        }

        let mut confidence: f64 = 0.5;
        let action = if sell_score > buy_score && sell_score > 0.2 {
            confidence += sell_score;
            TradeAction::Sell
        } else if buy_score > sell_score && buy_score > 0.2 {
            confidence += buy_score;
            TradeAction::Buy
        } else {
            TradeAction::Hold
        };

        if self.volatility > 20.0 {
            confidence *= 0.7;
        } else if self.volatility < 5.0 {
            confidence *= 1.2;
        }

        (action, confidence.min(0.95))
    }
}

/// Ordinary least-squares fit over (seconds since first point, price).
/// `None` when the points cannot determine a line.
fn fit_trend_line(points: &[PricePoint], kind: TrendKind) -> Option<TrendLine> {
    if points.len() < 2 {
        return None;
    }

    let start_time = points[0].time;
    let n = points.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for point in points {
        let x = seconds_between(start_time, point.time);
        sum_x += x;
        sum_y += point.price;
        sum_xy += x * point.price;
        sum_x2 += x * x;
    }

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    Some(TrendLine {
        start: points[0],
        end: points[points.len() - 1],
        slope,
        intercept,
        kind,
    })
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Chart analytics for all items, keyed by item id.
///
/// Each item's chart lives in its own map entry; many readers may
/// query while the tick writer inserts. Charts are created on first
/// insert; queries for unknown items fail with `ItemNotFound`, while
/// insufficient data surfaces as `Ok(None)` from prediction/analysis.
pub struct ChartStore {
    charts: DashMap<String, PriceChart>,
    timeframe: Timeframe,
    config: ChartConfig,
}

impl ChartStore {
    pub fn new(timeframe: Timeframe, config: ChartConfig) -> Arc<Self> {
        Arc::new(Self {
            charts: DashMap::new(),
            timeframe,
            config,
        })
    }

    /// Record a price observation for an item at the current time.
    pub fn add_price_point(&self, item_id: &str, price: f64, volume: u32) -> Result<()> {
        self.add_price_point_at(item_id, price, volume, Utc::now())
    }

    /// Record a price observation with an explicit timestamp (backfill
    /// and deterministic tests).
    pub fn add_price_point_at(
        &self,
        item_id: &str,
        price: f64,
        volume: u32,
        time: DateTime<Utc>,
    ) -> Result<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(MarketError::InvalidPrice(price));
        }

        let mut chart = self
            .charts
            .entry(item_id.to_string())
            .or_insert_with(|| PriceChart::new(item_id, self.timeframe, self.config.clone()));
        chart.add_point(price, volume, time);
        Ok(())
    }

    pub fn data_points(&self, item_id: &str) -> Result<Vec<PricePoint>> {
        self.with_chart(item_id, PriceChart::points)
    }

    pub fn candles(&self, item_id: &str) -> Result<Vec<CandleData>> {
        self.with_chart(item_id, PriceChart::candles)
    }

    pub fn trend_lines(&self, item_id: &str) -> Result<Vec<TrendLine>> {
        self.with_chart(item_id, PriceChart::trend_lines)
    }

    pub fn indicators(&self, item_id: &str) -> Result<ChartIndicators> {
        self.with_chart(item_id, PriceChart::indicators)
    }

    /// `Ok(None)` while the item has fewer than 10 points.
    pub fn prediction(&self, item_id: &str) -> Result<Option<PricePrediction>> {
        self.with_chart(item_id, PriceChart::prediction)
    }

    /// `Ok(None)` while the item has fewer than 10 points.
    pub fn analyze(&self, item_id: &str) -> Result<Option<ChartAnalysis>> {
        self.with_chart(item_id, PriceChart::analyze)
    }

    /// Drop all charts for a new game.
    pub fn reset(&self) {
        debug!("chart store reset");
        self.charts.clear();
    }

    fn with_chart<T>(&self, item_id: &str, f: impl FnOnce(&PriceChart) -> T) -> Result<T> {
        self.charts
            .get(item_id)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| MarketError::ItemNotFound(item_id.to_string()))
    }
}
