use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    BUY,
    SELL
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::BUY => write!(f, "buy"),
            Side::SELL => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderType {
    LIMIT,
    MARKET
}

// One rung of the ladder. `total` is always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    price: f64,
    size: f64,
}

impl PriceLevel {
    pub fn new(price: f64, size: f64) -> Result<Self, BookError> {
        if !(price.is_finite() && price > 0.0 && size.is_finite() && size > 0.0) {
            return Err(BookError::InvalidLevel { price, size });
        }
        Ok(Self { price, size })
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn total(&self) -> f64 {
        self.price * self.size
    }

    pub(crate) fn scale_price(&mut self, factor: f64) {
        self.price *= factor;
    }

    pub(crate) fn scale_size(&mut self, factor: f64) {
        self.size *= factor;
    }
}

impl Serialize for PriceLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PriceLevel", 3)?;
        s.serialize_field("price", &self.price)?;
        s.serialize_field("size", &self.size)?;
        s.serialize_field("total", &self.total())?;
        s.end()
    }
}

// Two-sided ladder, best level first on each side
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderBook {
    pub(crate) bids: Vec<PriceLevel>,
    pub(crate) asks: Vec<PriceLevel>,
}

// Order as entered by the user; never rests anywhere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypotheticalOrder {
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub quantity: f64,
    pub timing_delay_ms: u32,
    // Best opposing price captured at submission, for delayed market orders
    pub reference_price: Option<f64>,
}

impl HypotheticalOrder {
    pub fn limit(side: Side, price: f64, quantity: f64) -> Self {
        Self { side, order_type: OrderType::LIMIT, price: Some(price), quantity, timing_delay_ms: 0, reference_price: None }
    }

    pub fn market(side: Side, quantity: f64) -> Self {
        Self { side, order_type: OrderType::MARKET, price: None, quantity, timing_delay_ms: 0, reference_price: None }
    }

    pub fn with_delay(mut self, timing_delay_ms: u32) -> Self {
        self.timing_delay_ms = timing_delay_ms;
        self
    }

    /// Pins the price a market order is measured against. Limit orders always
    /// use their own price.
    pub fn with_reference(mut self, reference_price: f64) -> Self {
        self.reference_price = Some(reference_price);
        self
    }

    /// Rejects the inputs the estimator cannot give a meaning to.
    pub fn validate(&self) -> Result<(), BookError> {
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(BookError::InvalidQuantity { quantity: self.quantity });
        }
        if self.order_type == OrderType::LIMIT {
            match self.price {
                None => return Err(BookError::MissingLimitPrice),
                Some(p) if !(p.is_finite() && p > 0.0) => {
                    return Err(BookError::InvalidLimitPrice { price: p })
                }
                Some(_) => {}
            }
        }
        if let Some(p) = self.reference_price {
            if !(p.is_finite() && p > 0.0) {
                return Err(BookError::InvalidReferencePrice { price: p });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TimeToFill {
    Seconds(f64),
    Partial,
}

impl fmt::Display for TimeToFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeToFill::Seconds(s) => write!(f, "{:.0}s", s),
            TimeToFill::Partial => write!(f, "Partial"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FillResult {
    pub fill_quantity: f64,
    pub fill_percentage: f64,
    pub avg_fill_price: f64,
    pub total_cost: f64,
    pub market_impact_pct: f64,
    pub slippage_pct: f64,
    pub estimated_time_to_fill: TimeToFill,
    // Price the order is measured against: limit price, or best opposite for market orders
    pub reference_price: f64,
}

impl FillResult {
    pub fn is_complete(&self) -> bool {
        matches!(self.estimated_time_to_fill, TimeToFill::Seconds(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImbalanceLabel {
    BuyPressure,
    SellPressure,
    Balanced,
}

impl fmt::Display for ImbalanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImbalanceLabel::BuyPressure => write!(f, "BUY PRESSURE"),
            ImbalanceLabel::SellPressure => write!(f, "SELL PRESSURE"),
            ImbalanceLabel::Balanced => write!(f, "BALANCED"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BookError {
    #[error("order quantity must be positive, got {quantity}")]
    InvalidQuantity { quantity: f64 },
    #[error("limit order requires a price")]
    MissingLimitPrice,
    #[error("limit price must be positive, got {price}")]
    InvalidLimitPrice { price: f64 },
    #[error("reference price must be positive, got {price}")]
    InvalidReferencePrice { price: f64 },
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("no liquidity on the {side} side of the book")]
    EmptyBook { side: Side },
    #[error("base price must be positive, got {price}")]
    InvalidBasePrice { price: f64 },
    #[error("book depth must be between 1 and {max}, got {depth}")]
    InvalidDepth { depth: usize, max: usize },
    #[error("{side} levels out of order at index {index}")]
    UnorderedLevels { side: Side, index: usize },
    #[error("crossed book: best bid {bid} >= best ask {ask}")]
    CrossedBook { bid: f64, ask: f64 },
    #[error("level must have positive price and size, got {price} x {size}")]
    InvalidLevel { price: f64, size: f64 },
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error("unknown venue {0}")]
    UnknownVenue(String),
}
