use std::fmt;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::engine::types::OrderBook;

pub const ALERT_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SpikeDirection {
    Upward,
    Downward,
}

impl SpikeDirection {
    fn sign(self) -> f64 {
        match self {
            SpikeDirection::Upward => 1.0,
            SpikeDirection::Downward => -1.0,
        }
    }
}

impl fmt::Display for SpikeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpikeDirection::Upward => write!(f, "upward"),
            SpikeDirection::Downward => write!(f, "downward"),
        }
    }
}

/// Alert text for the display layer plus how long it stays relevant.
/// Clearing it after `display_for` is the caller's job.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VolatilityAlert {
    pub direction: SpikeDirection,
    pub intensity: f64,
    // Intensity was cut below the drawn value to keep the book uncrossed
    pub capped: bool,
    pub message: String,
    pub display_for: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct VolatilitySpikeEngine {
    pub levels_affected: usize,
    pub min_intensity: f64,
    pub max_intensity: f64,
    pub size_factor: f64,
    pub display_for: Duration,
}

impl Default for VolatilitySpikeEngine {
    fn default() -> Self {
        Self {
            levels_affected: 5,
            min_intensity: 0.002,
            max_intensity: 0.005,
            size_factor: 0.7,
            display_for: ALERT_DISPLAY_WINDOW,
        }
    }
}

impl VolatilitySpikeEngine {
    /// Shocks the top levels of both sides: bids move by `1 - intensity*dir`,
    /// asks by `1 + intensity*dir`, and their sizes shrink by `size_factor`.
    ///
    /// A downward spike pulls bids and asks towards each other, so its
    /// intensity is capped at half the relative spread to keep the touch
    /// uncrossed. On a realistic spread that cap sits far below `min_intensity`,
    /// so downward shocks are usually much smaller than upward ones; the alert
    /// says so when it happens. Levels that overshoot deeper ones are re-sorted
    /// into place.
    #[instrument(level = "debug", skip_all)]
    pub fn spike<R: Rng + ?Sized>(&self, book: &mut OrderBook, rng: &mut R) -> VolatilityAlert {
        let drawn = rng.gen_range(self.min_intensity..self.max_intensity);
        let direction = if rng.gen_bool(0.5) { SpikeDirection::Upward } else { SpikeDirection::Downward };

        let capped_intensity = match (direction, book.bids.first(), book.asks.first()) {
            (SpikeDirection::Downward, Some(bid), Some(ask)) => {
                let cap = 0.5 * (ask.price() - bid.price()) / (ask.price() + bid.price());
                if drawn > cap {
                    debug!(drawn, cap, "Capping spike intensity to keep the book uncrossed");
                }
                // Too tight to move without rounding into a cross
                if cap <= f64::EPSILON { Some(0.0) } else if drawn > cap { Some(cap) } else { None }
            }
            _ => None,
        };
        let capped = capped_intensity.is_some();
        let intensity = capped_intensity.unwrap_or(drawn);

        let shift = intensity * direction.sign();
        for level in book.bids.iter_mut().take(self.levels_affected) {
            level.scale_price(1.0 - shift);
            level.scale_size(self.size_factor);
        }
        for level in book.asks.iter_mut().take(self.levels_affected) {
            level.scale_price(1.0 + shift);
            level.scale_size(self.size_factor);
        }

        // An upward shock can push the shocked levels past deeper, untouched ones
        let bids_sorted = book.bids.windows(2).all(|w| w[0].price() > w[1].price());
        let asks_sorted = book.asks.windows(2).all(|w| w[0].price() < w[1].price());
        if !(bids_sorted && asks_sorted) {
            book.bids.sort_by(|a, b| b.price().total_cmp(&a.price()));
            book.asks.sort_by(|a, b| a.price().total_cmp(&b.price()));
            debug!("Re-sorted ladder after spike");
        }

        let mut message = format!("High volatility detected - {} pressure", direction);
        if capped {
            message.push_str(&format!(" (limited to {:.4}% by the spread)", intensity * 100.0));
        }
        warn!(%direction, intensity, capped, "{}", message);
        VolatilityAlert { direction, intensity, capped, message, display_for: self.display_for }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ladder::PriceLadderGenerator;
    use crate::engine::types::PriceLevel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn contains_level(levels: &[PriceLevel], price: f64, size: f64) -> bool {
        levels
            .iter()
            .any(|l| (l.price() - price).abs() < 1e-6 && (l.size() - size).abs() < 1e-9)
    }

    #[test]
    fn test_spike_shrinks_top_five_only() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..20 {
            let before = PriceLadderGenerator::default().generate(45_000.0, &mut rng).unwrap();
            let mut after = before.clone();
            let alert = VolatilitySpikeEngine::default().spike(&mut after, &mut rng);
            assert_eq!(alert.display_for, Duration::from_secs(3));
            let shift = match alert.direction {
                SpikeDirection::Upward => alert.intensity,
                SpikeDirection::Downward => -alert.intensity,
            };

            for (i, old) in before.bids().iter().enumerate() {
                if i < 5 {
                    assert!(contains_level(after.bids(), old.price() * (1.0 - shift), old.size() * 0.7));
                } else {
                    assert!(after.bids().contains(old));
                }
            }
            for (i, old) in before.asks().iter().enumerate() {
                if i < 5 {
                    assert!(contains_level(after.asks(), old.price() * (1.0 + shift), old.size() * 0.7));
                } else {
                    assert!(after.asks().contains(old));
                }
            }
            for level in after.bids().iter().chain(after.asks()) {
                assert!((level.total() - level.price() * level.size()).abs() < 1e-9);
            }
            assert!(after.check_invariants().is_ok());
        }
    }

    #[test]
    fn test_spike_moves_prices_by_direction() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..40 {
            let before = PriceLadderGenerator::default().generate(100.0, &mut rng).unwrap();
            let mut after = before.clone();
            let alert = VolatilitySpikeEngine::default().spike(&mut after, &mut rng);
            let bid_ratio = after.bids()[0].price() / before.bids()[0].price();
            let ask_ratio = after.asks()[0].price() / before.asks()[0].price();
            match alert.direction {
                SpikeDirection::Upward => {
                    assert!(alert.intensity >= 0.002 && alert.intensity < 0.005);
                    assert!(bid_ratio < 1.0 && ask_ratio > 1.0);
                    assert!(alert.message.ends_with("upward pressure"));
                    assert!(!alert.capped);
                }
                SpikeDirection::Downward => {
                    assert!(bid_ratio >= 1.0 && ask_ratio <= 1.0);
                    assert!(alert.message.contains("downward pressure"));
                    assert_eq!(alert.capped, alert.message.contains("limited to"));
                }
            }
            assert!(after.check_invariants().is_ok());
        }
    }

    #[test]
    fn test_downward_spike_never_crosses_tight_book() {
        let mut rng = StdRng::seed_from_u64(13);
        let engine = VolatilitySpikeEngine::default();
        for _ in 0..100 {
            let mut book = OrderBook::from_levels(
                vec![PriceLevel::new(99.99, 1.0).unwrap()],
                vec![PriceLevel::new(100.0, 1.0).unwrap()],
            )
            .unwrap();
            let alert = engine.spike(&mut book, &mut rng);
            assert!(book.check_invariants().is_ok());
            if alert.direction == SpikeDirection::Downward {
                assert!(alert.capped);
                assert!(alert.intensity < engine.min_intensity);
                assert!(alert.message.contains("by the spread"));
            }
        }
    }

    #[test]
    fn test_spike_on_empty_book() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut book = OrderBook::new();
        let alert = VolatilitySpikeEngine::default().spike(&mut book, &mut rng);
        assert!(book.is_empty());
        assert!(!alert.message.is_empty());
    }
}
