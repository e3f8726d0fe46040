// Book model and the transformations applied to it
pub mod types;      // data model + BookError
pub mod book;       // snapshot queries and invariant checks
pub mod ladder;     // initial ladder generation and per-level size noise
pub mod trend;      // slow multiplicative drift
pub mod volatility; // one-sided top-of-book shocks
pub mod imbalance;  // near-touch pressure label
pub mod fill;       // hypothetical order fill estimation

pub use book::DepthPoint;
pub use fill::{FillEstimator, ImpactSeverity};
pub use imbalance::{Imbalance, ImbalanceClassifier};
pub use ladder::{LadderMutator, LevelChange, PriceLadderGenerator};
pub use trend::{TrendDirection, TrendEngine, TrendState};
pub use types::*;
pub use volatility::{SpikeDirection, VolatilityAlert, VolatilitySpikeEngine};
