use tracing::trace;

use crate::engine::types::{ImbalanceLabel, OrderBook};

pub const NEAR_TOUCH_LEVELS: usize = 10;
pub const PRESSURE_THRESHOLD: f64 = 0.2;

/// Normalised near-touch volume difference alongside the label derived from it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Imbalance {
    pub bid_volume: f64,
    pub ask_volume: f64,
    pub ratio: f64,
    pub label: ImbalanceLabel,
}

#[derive(Debug, Clone, Copy)]
pub struct ImbalanceClassifier {
    pub levels: usize,
    pub threshold: f64,
}

impl Default for ImbalanceClassifier {
    fn default() -> Self {
        Self { levels: NEAR_TOUCH_LEVELS, threshold: PRESSURE_THRESHOLD }
    }
}

impl ImbalanceClassifier {
    pub fn classify(&self, book: &OrderBook) -> ImbalanceLabel {
        self.measure(book).label
    }

    pub fn measure(&self, book: &OrderBook) -> Imbalance {
        let bid_volume: f64 = book.bids().iter().take(self.levels).map(|l| l.size()).sum();
        let ask_volume: f64 = book.asks().iter().take(self.levels).map(|l| l.size()).sum();
        let total = bid_volume + ask_volume;

        // Nothing on either side reads as balanced
        let ratio = if total > 0.0 { (bid_volume - ask_volume) / total } else { 0.0 };

        let label = if ratio.abs() > self.threshold {
            if ratio > 0.0 { ImbalanceLabel::BuyPressure } else { ImbalanceLabel::SellPressure }
        } else {
            ImbalanceLabel::Balanced
        };
        trace!(bid_volume, ask_volume, ratio, %label, "Classified book imbalance");
        Imbalance { bid_volume, ask_volume, ratio, label }
    }
}
