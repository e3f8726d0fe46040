use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::types::BookError;

// Display label only; every venue gets the same synthetic ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Okx,
    Bybit,
    Deribit,
}

impl Venue {
    pub const ALL: [Venue; 3] = [Venue::Okx, Venue::Bybit, Venue::Deribit];
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Okx => write!(f, "OKX"),
            Venue::Bybit => write!(f, "BYBIT"),
            Venue::Deribit => write!(f, "DERIBIT"),
        }
    }
}

impl FromStr for Venue {
    type Err = BookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "okx" => Ok(Venue::Okx),
            "bybit" => Ok(Venue::Bybit),
            "deribit" => Ok(Venue::Deribit),
            _ => Err(BookError::UnknownVenue(s.to_string())),
        }
    }
}

/// Reference price per symbol used to seed a fresh ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>")]
pub struct SymbolTable(BTreeMap<String, f64>);

impl From<BTreeMap<String, f64>> for SymbolTable {
    fn from(entries: BTreeMap<String, f64>) -> Self {
        Self::new(entries)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert("BTC-USD".to_string(), 45_000.0);
        table.insert("ETH-USD".to_string(), 2_800.0);
        table.insert("SOL-USD".to_string(), 100.0);
        table.insert("ADA-USD".to_string(), 0.5);
        Self(table)
    }
}

impl SymbolTable {
    pub fn new(entries: BTreeMap<String, f64>) -> Self {
        Self(entries.into_iter().map(|(k, v)| (k.to_ascii_uppercase(), v)).collect())
    }

    pub fn base_price(&self, symbol: &str) -> Result<f64, BookError> {
        self.0
            .get(&symbol.trim().to_ascii_uppercase())
            .copied()
            .ok_or_else(|| BookError::UnknownSymbol(symbol.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
