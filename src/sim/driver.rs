use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

use crate::config::SimConfig;
use crate::engine::fill::FillEstimator;
use crate::engine::imbalance::{Imbalance, ImbalanceClassifier};
use crate::engine::ladder::{LadderMutator, LevelChange, PriceLadderGenerator};
use crate::engine::trend::{TrendDirection, TrendEngine, TrendState};
use crate::engine::types::{BookError, FillResult, HypotheticalOrder, OrderBook};
use crate::engine::volatility::{VolatilityAlert, VolatilitySpikeEngine};
use crate::sim::market::{SymbolTable, Venue};

/// Everything one driver tick did to the book.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mutation: Option<LevelChange>,
    pub trend_change: Option<TrendDirection>,
    pub trend_adjustment: Option<f64>,
    pub alert: Option<VolatilityAlert>,
    pub imbalance: Imbalance,
}

/// The single authoritative book plus the state that evolves it.
#[derive(Debug)]
pub struct MarketState {
    symbol: String,
    venue: Venue,
    symbols: SymbolTable,
    book: OrderBook,
    trend: TrendState,
    imbalance: Imbalance,
    rng: StdRng,
    // Keys the per-estimate rng; estimates never draw from `rng`
    estimate_seed: u64,
    generator: PriceLadderGenerator,
    mutator: LadderMutator,
    trend_engine: TrendEngine,
    spike_engine: VolatilitySpikeEngine,
    classifier: ImbalanceClassifier,
    estimator: FillEstimator,
    mutation_probability: f64,
    spike_probability: f64,
}

impl MarketState {
    pub fn from_config(cfg: &SimConfig, now: Instant) -> Result<Self, BookError> {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let trend_engine = TrendEngine {
            min_interval: cfg.trend_min_interval(),
            change_probability: cfg.trend_change_probability,
            ..TrendEngine::default()
        };
        let spike_engine = VolatilitySpikeEngine { display_for: cfg.alert_display(), ..VolatilitySpikeEngine::default() };

        Self::new(
            &cfg.symbol,
            cfg.venue,
            cfg.symbols.clone(),
            PriceLadderGenerator::new(cfg.depth)?,
            trend_engine,
            spike_engine,
            cfg.mutation_probability,
            cfg.spike_probability,
            rng,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        venue: Venue,
        symbols: SymbolTable,
        generator: PriceLadderGenerator,
        trend_engine: TrendEngine,
        spike_engine: VolatilitySpikeEngine,
        mutation_probability: f64,
        spike_probability: f64,
        mut rng: StdRng,
        now: Instant,
    ) -> Result<Self, BookError> {
        let mutation_probability = check_probability("mutation_probability", mutation_probability)?;
        let spike_probability = check_probability("spike_probability", spike_probability)?;
        check_probability("trend_change_probability", trend_engine.change_probability)?;

        let base_price = symbols.base_price(symbol)?;
        let book = generator.generate(base_price, &mut rng)?;
        let estimate_seed = rng.gen::<u64>();
        let classifier = ImbalanceClassifier::default();
        let imbalance = classifier.measure(&book);
        info!(symbol, %venue, base_price, depth = generator.depth(), "Market initialised");

        Ok(Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            venue,
            symbols,
            book,
            trend: TrendState::new(now),
            imbalance,
            rng,
            estimate_seed,
            generator,
            mutator: LadderMutator::default(),
            trend_engine,
            spike_engine,
            classifier,
            estimator: FillEstimator::default(),
            mutation_probability,
            spike_probability,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn snapshot(&self) -> OrderBook {
        self.book.clone()
    }

    pub fn trend(&self) -> TrendState {
        self.trend
    }

    pub fn imbalance(&self) -> Imbalance {
        self.imbalance
    }

    pub fn set_venue(&mut self, venue: Venue) {
        info!(from = %self.venue, to = %venue, "Venue changed");
        self.venue = venue;
    }

    /// Drops the current ladder and builds a fresh one around the new symbol's
    /// base price. The trend regime carries over.
    pub fn switch_symbol(&mut self, symbol: &str) -> Result<(), BookError> {
        let base_price = self.symbols.base_price(symbol)?;
        self.book = self.generator.generate(base_price, &mut self.rng)?;
        self.symbol = symbol.trim().to_ascii_uppercase();
        self.imbalance = self.classifier.measure(&self.book);
        info!(symbol = %self.symbol, base_price, "Switched symbol");
        Ok(())
    }

    /// One driver step: mutate, maybe redraw the trend, apply it, maybe spike.
    /// Each step is an independent coin flip, always evaluated in that order.
    #[instrument(level = "trace", skip_all)]
    pub fn tick(&mut self, now: Instant) -> TickReport {
        metrics::counter!("lobsim_ticks_total").increment(1);

        let mutation = if self.rng.gen_bool(self.mutation_probability) {
            self.mutator.mutate(&mut self.book, &mut self.rng)
        } else {
            None
        };
        if mutation.is_some() {
            metrics::counter!("lobsim_mutations_total").increment(1);
        }

        let previous = self.trend;
        self.trend = self.trend_engine.maybe_redraw(self.trend, now, &mut self.rng);
        let trend_change = if self.trend.last_change != previous.last_change {
            metrics::counter!("lobsim_trend_changes_total").increment(1);
            Some(self.trend.direction)
        } else {
            None
        };

        let trend_adjustment = self.trend_engine.apply_trend(&mut self.book, self.trend.direction, &mut self.rng);

        let alert = if self.rng.gen_bool(self.spike_probability) {
            metrics::counter!("lobsim_spikes_total").increment(1);
            Some(self.spike_engine.spike(&mut self.book, &mut self.rng))
        } else {
            None
        };

        self.imbalance = self.classifier.measure(&self.book);
        metrics::gauge!("lobsim_imbalance_ratio").set(self.imbalance.ratio);
        if let Some(bid) = self.book.best_bid() {
            metrics::gauge!("lobsim_best_bid").set(bid.price());
        }
        if let Some(ask) = self.book.best_ask() {
            metrics::gauge!("lobsim_best_ask").set(ask.price());
        }
        debug_assert!(self.book.check_invariants().is_ok());

        debug!(
            mutated = mutation.is_some(),
            trend = %self.trend.direction,
            spiked = alert.is_some(),
            label = %self.imbalance.label,
            "Tick complete"
        );

        TickReport { mutation, trend_change, trend_adjustment, alert, imbalance: self.imbalance }
    }

    /// Estimates against the book as it stands, inside whatever lock the caller
    /// holds. The same order against the same book always gives the same result,
    /// and the simulation's own random stream is never touched.
    pub fn estimate(&self, order: &HypotheticalOrder) -> Result<FillResult, BookError> {
        let mut rng = self.estimate_rng(order);
        let result = self.estimator.estimate(order, &self.book, &mut rng)?;
        metrics::counter!("lobsim_estimates_total").increment(1);
        Ok(result)
    }

    fn estimate_rng(&self, order: &HypotheticalOrder) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.estimate_seed.hash(&mut hasher);
        order.side.hash(&mut hasher);
        order.order_type.hash(&mut hasher);
        order.price.map(f64::to_bits).hash(&mut hasher);
        order.quantity.to_bits().hash(&mut hasher);
        for level in self.book.bids().iter().chain(self.book.asks()) {
            level.price().to_bits().hash(&mut hasher);
            level.size().to_bits().hash(&mut hasher);
        }
        StdRng::seed_from_u64(hasher.finish())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<f64, BookError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(BookError::InvalidProbability { name, value })
    }
}
