use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context};
use serde::Deserialize;

use crate::engine::ladder::MAX_DEPTH;
use crate::sim::market::{SymbolTable, Venue};

pub const ENV_PREFIX: &str = "LOBSIM";
const DEFAULT_CONFIG_FILE: &str = "lobsim";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub symbol: String,
    pub venue: Venue,
    pub depth: usize,
    pub tick_interval_ms: u64,
    pub seed: Option<u64>,
    pub mutation_probability: f64,
    pub trend_change_probability: f64,
    pub trend_min_interval_secs: u64,
    pub spike_probability: f64,
    pub alert_display_secs: u64,
    pub metrics_port: u16,
    pub symbols: SymbolTable,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USD".to_string(),
            venue: Venue::Okx,
            depth: 20,
            tick_interval_ms: 500,
            seed: None,
            mutation_probability: 0.3,
            trend_change_probability: 0.1,
            trend_min_interval_secs: 30,
            spike_probability: 0.05,
            alert_display_secs: 3,
            metrics_port: 9000,
            symbols: SymbolTable::default(),
        }
    }
}

impl SimConfig {
    /// Defaults, then `lobsim.toml` (or `path`), then `LOBSIM_*` variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let cfg: SimConfig = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.depth >= 1 && self.depth <= MAX_DEPTH, "depth must be in 1..={}, got {}", MAX_DEPTH, self.depth);
        ensure!(self.tick_interval_ms > 0, "tick_interval_ms must be positive");
        for (name, p) in [
            ("mutation_probability", self.mutation_probability),
            ("trend_change_probability", self.trend_change_probability),
            ("spike_probability", self.spike_probability),
        ] {
            ensure!((0.0..=1.0).contains(&p), "{} must be within [0, 1], got {}", name, p);
        }
        for (symbol, price) in self.symbols.iter() {
            ensure!(price.is_finite() && price > 0.0, "base price for {} must be positive, got {}", symbol, price);
        }
        self.symbols.base_price(&self.symbol)?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn trend_min_interval(&self) -> Duration {
        Duration::from_secs(self.trend_min_interval_secs)
    }

    pub fn alert_display(&self) -> Duration {
        Duration::from_secs(self.alert_display_secs)
    }
}
