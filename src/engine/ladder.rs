use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::engine::types::{BookError, OrderBook, PriceLevel, Side};

pub const DEFAULT_DEPTH: usize = 20;
// Past ~1000 levels the lowest bids go non-positive
pub const MAX_DEPTH: usize = 500;

const LEVEL_STEP: f64 = 0.001;
const LEVEL_JITTER: f64 = 0.0005;
const MIN_SIZE: f64 = 0.1;
const SIZE_SPAN: f64 = 10.0;

/// Builds a fresh two-sided ladder around a reference price.
#[derive(Debug, Clone, Copy)]
pub struct PriceLadderGenerator {
    depth: usize,
}

impl Default for PriceLadderGenerator {
    fn default() -> Self {
        Self { depth: DEFAULT_DEPTH }
    }
}

impl PriceLadderGenerator {
    pub fn new(depth: usize) -> Result<Self, BookError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(BookError::InvalidDepth { depth, max: MAX_DEPTH });
        }
        Ok(Self { depth })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Level `i` sits `i` steps of 0.1% away from `base_price`, pushed further out
    /// by up to half a step of jitter. Since jitter never reaches a full step,
    /// adjacent levels cannot swap.
    #[instrument(skip(self, rng))]
    pub fn generate<R: Rng + ?Sized>(&self, base_price: f64, rng: &mut R) -> Result<OrderBook, BookError> {
        let step = base_price * LEVEL_STEP;
        let jitter = base_price * LEVEL_JITTER;
        if !(base_price.is_finite() && jitter > 0.0) {
            return Err(BookError::InvalidBasePrice { price: base_price });
        }

        let mut bids = Vec::with_capacity(self.depth);
        for i in 0..self.depth {
            let price = base_price - i as f64 * step - rng.gen_range(0.0..jitter);
            let size = MIN_SIZE + rng.gen_range(0.0..SIZE_SPAN);
            bids.push(PriceLevel::new(price, size)?);
        }

        let mut asks = Vec::with_capacity(self.depth);
        for i in 0..self.depth {
            let price = base_price + i as f64 * step + rng.gen_range(0.0..jitter);
            let size = MIN_SIZE + rng.gen_range(0.0..SIZE_SPAN);
            asks.push(PriceLevel::new(price, size)?);
        }

        debug!(base_price, depth = self.depth, "Generated price ladder");
        Ok(OrderBook { bids, asks })
    }
}

/// What a single mutation touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelChange {
    pub side: Side,
    pub index: usize,
    pub old_size: f64,
    pub new_size: f64,
}

/// Rescales the size of one near-touch level to mimic micro liquidity changes.
#[derive(Debug, Clone, Copy)]
pub struct LadderMutator {
    pub levels_considered: usize,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for LadderMutator {
    fn default() -> Self {
        Self { levels_considered: 10, min_factor: 0.8, max_factor: 1.2 }
    }
}

impl LadderMutator {
    /// Picks a side, then one of its first `levels_considered` slots. Returns
    /// `None` when the slot is past the end of a thin side.
    pub fn mutate<R: Rng + ?Sized>(&self, book: &mut OrderBook, rng: &mut R) -> Option<LevelChange> {
        let side = if rng.gen_bool(0.5) { Side::BUY } else { Side::SELL };
        let index = rng.gen_range(0..self.levels_considered.max(1));
        let factor = rng.gen_range(self.min_factor..self.max_factor);

        let level = match book.levels_mut(side).get_mut(index) {
            Some(level) => level,
            None => {
                trace!(%side, index, "Mutation slot out of range, skipping");
                return None;
            }
        };

        let old_size = level.size();
        level.scale_size(factor);
        let change = LevelChange { side, index, old_size, new_size: level.size() };
        trace!(%side, index, old_size, new_size = change.new_size, "Mutated level size");
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let book = PriceLadderGenerator::default().generate(45_000.0, &mut rng).unwrap();
        assert_eq!(book.bids().len(), DEFAULT_DEPTH);
        assert_eq!(book.asks().len(), DEFAULT_DEPTH);
        assert!(book.check_invariants().is_ok());
        for level in book.bids().iter().chain(book.asks()) {
            assert!(level.size() >= 0.1 && level.size() <= 10.1);
            assert!((level.total() - level.price() * level.size()).abs() < 1e-9);
        }
        assert!(book.best_bid().unwrap().price() <= 45_000.0);
        assert!(book.best_ask().unwrap().price() >= 45_000.0);
    }

    #[test]
    fn test_generate_price_bands() {
        let mut rng = StdRng::seed_from_u64(11);
        let base = 100.0;
        let book = PriceLadderGenerator::new(5).unwrap().generate(base, &mut rng).unwrap();
        for (i, level) in book.bids().iter().enumerate() {
            let upper = base - i as f64 * 0.1;
            assert!(level.price() <= upper + 1e-9 && level.price() > upper - 0.05 - 1e-9);
        }
        for (i, level) in book.asks().iter().enumerate() {
            let lower = base + i as f64 * 0.1;
            assert!(level.price() >= lower - 1e-9 && level.price() < lower + 0.05 + 1e-9);
        }
    }

    #[test]
    fn test_generate_rejects_bad_inputs() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            PriceLadderGenerator::default().generate(0.0, &mut rng),
            Err(BookError::InvalidBasePrice { .. })
        ));
        assert!(matches!(PriceLadderGenerator::new(0), Err(BookError::InvalidDepth { .. })));
        assert!(matches!(PriceLadderGenerator::new(MAX_DEPTH + 1), Err(BookError::InvalidDepth { .. })));
    }

    #[test]
    fn test_generate_is_seed_deterministic() {
        let generator = PriceLadderGenerator::default();
        let a = generator.generate(2_800.0, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = generator.generate(2_800.0, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutate_changes_exactly_one_level() {
        let mut rng = StdRng::seed_from_u64(3);
        let before = PriceLadderGenerator::default().generate(100.0, &mut rng).unwrap();
        let mutator = LadderMutator::default();

        for _ in 0..50 {
            let mut after = before.clone();
            let change = mutator.mutate(&mut after, &mut rng).expect("full book always has 10 levels");
            assert!(change.index < 10);

            let mut changed = 0;
            for side in [Side::BUY, Side::SELL] {
                for (old, new) in before.levels(side).iter().zip(after.levels(side)) {
                    assert_eq!(old.price(), new.price());
                    if old.size() != new.size() {
                        changed += 1;
                        let ratio = new.size() / old.size();
                        assert!(ratio >= 0.8 - 1e-12 && ratio <= 1.2 + 1e-12);
                    }
                }
            }
            assert_eq!(changed, 1);
            let level = after.levels(change.side)[change.index];
            assert_eq!(level.size(), change.new_size);
        }
    }

    #[test]
    fn test_mutate_thin_book_is_noop() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut book = OrderBook::new();
        for _ in 0..20 {
            assert_eq!(LadderMutator::default().mutate(&mut book, &mut rng), None);
        }
        assert!(book.is_empty());
    }
}
