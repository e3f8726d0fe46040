use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{info, instrument, trace};

use crate::engine::types::OrderBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TrendDirection {
    Down,
    Flat,
    Up,
}

impl TrendDirection {
    pub fn sign(self) -> f64 {
        match self {
            TrendDirection::Down => -1.0,
            TrendDirection::Flat => 0.0,
            TrendDirection::Up => 1.0,
        }
    }

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..3) {
            0 => TrendDirection::Down,
            1 => TrendDirection::Flat,
            _ => TrendDirection::Up,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Down => write!(f, "down"),
            TrendDirection::Flat => write!(f, "flat"),
            TrendDirection::Up => write!(f, "up"),
        }
    }
}

/// Current drift regime and when it was last redrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendState {
    pub direction: TrendDirection,
    pub last_change: Instant,
}

impl TrendState {
    pub fn new(now: Instant) -> Self {
        Self { direction: TrendDirection::Flat, last_change: now }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrendEngine {
    pub min_interval: Duration,
    pub change_probability: f64,
    pub rate: f64,
}

impl Default for TrendEngine {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(30),
            change_probability: 0.1,
            rate: 0.001,
        }
    }
}

impl TrendEngine {
    /// Redraws the direction with `change_probability`, but only once
    /// `min_interval` has passed since the previous redraw. A redraw resets the
    /// clock even when it lands on the same direction.
    pub fn maybe_redraw<R: Rng + ?Sized>(&self, state: TrendState, now: Instant, rng: &mut R) -> TrendState {
        if now.saturating_duration_since(state.last_change) <= self.min_interval {
            return state;
        }
        if !rng.gen_bool(self.change_probability) {
            return state;
        }
        let direction = TrendDirection::draw(rng);
        info!(from = %state.direction, to = %direction, "Trend regime changed");
        TrendState { direction, last_change: now }
    }

    /// Scales every price on both sides by one shared factor. Returns the
    /// adjustment applied, `None` for a flat trend.
    #[instrument(level = "trace", skip(self, book, rng))]
    pub fn apply_trend<R: Rng + ?Sized>(
        &self,
        book: &mut OrderBook,
        direction: TrendDirection,
        rng: &mut R,
    ) -> Option<f64> {
        if direction == TrendDirection::Flat {
            return None;
        }
        let adjustment = direction.sign() * self.rate * rng.gen_range(0.5..1.0);
        let factor = 1.0 + adjustment;
        for level in book.bids.iter_mut().chain(book.asks.iter_mut()) {
            level.scale_price(factor);
        }
        trace!(adjustment, "Applied trend");
        Some(adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ladder::PriceLadderGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn book(rng: &mut StdRng) -> OrderBook {
        PriceLadderGenerator::default().generate(2_800.0, rng).unwrap()
    }

    #[test]
    fn test_flat_trend_is_noop() {
        let mut rng = StdRng::seed_from_u64(1);
        let before = book(&mut rng);
        let mut after = before.clone();
        assert_eq!(TrendEngine::default().apply_trend(&mut after, TrendDirection::Flat, &mut rng), None);
        assert_eq!(before, after);
    }

    #[test]
    fn test_up_trend_raises_every_price() {
        let mut rng = StdRng::seed_from_u64(2);
        let before = book(&mut rng);
        let mut after = before.clone();
        let adj = TrendEngine::default().apply_trend(&mut after, TrendDirection::Up, &mut rng).unwrap();
        assert!(adj >= 0.0005 && adj <= 0.001);
        for (old, new) in before.bids().iter().chain(before.asks()).zip(after.bids().iter().chain(after.asks())) {
            assert!(new.price() > old.price());
            assert_eq!(old.size(), new.size());
        }
        assert!(after.check_invariants().is_ok());
    }

    #[test]
    fn test_down_trend_lowers_every_price() {
        let mut rng = StdRng::seed_from_u64(3);
        let before = book(&mut rng);
        let mut after = before.clone();
        TrendEngine::default().apply_trend(&mut after, TrendDirection::Down, &mut rng).unwrap();
        for (old, new) in before.bids().iter().chain(before.asks()).zip(after.bids().iter().chain(after.asks())) {
            assert!(new.price() < old.price());
        }
        assert!(after.check_invariants().is_ok());
    }

    #[test]
    fn test_no_redraw_before_interval() {
        let mut rng = StdRng::seed_from_u64(4);
        let start = Instant::now();
        let engine = TrendEngine { change_probability: 1.0, ..TrendEngine::default() };
        let state = TrendState::new(start);
        let next = engine.maybe_redraw(state, start + Duration::from_secs(30), &mut rng);
        assert_eq!(next, state);
    }

    #[test]
    fn test_redraw_after_interval_resets_clock() {
        let mut rng = StdRng::seed_from_u64(5);
        let start = Instant::now();
        let engine = TrendEngine { change_probability: 1.0, ..TrendEngine::default() };
        let later = start + Duration::from_secs(31);
        let next = engine.maybe_redraw(TrendState::new(start), later, &mut rng);
        assert_eq!(next.last_change, later);
    }

    #[test]
    fn test_zero_probability_never_redraws() {
        let mut rng = StdRng::seed_from_u64(6);
        let start = Instant::now();
        let engine = TrendEngine { change_probability: 0.0, ..TrendEngine::default() };
        let state = TrendState::new(start);
        for secs in 31..200 {
            assert_eq!(engine.maybe_redraw(state, start + Duration::from_secs(secs), &mut rng), state);
        }
    }

    #[test]
    fn test_redraw_covers_all_directions() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = Instant::now();
        let engine = TrendEngine { change_probability: 1.0, ..TrendEngine::default() };
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let next = engine.maybe_redraw(TrendState::new(start), start + Duration::from_secs(60), &mut rng);
            seen.insert(next.direction);
        }
        assert_eq!(seen.len(), 3);
    }
}
