use tracing::{instrument, trace};

use crate::engine::types::{BookError, HypotheticalOrder, OrderBook, OrderType, PriceLevel, Side};

/// Cumulative size up to and including a level, the data behind a depth chart.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DepthPoint {
    pub price: f64,
    pub cumulative_size: f64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from caller-supplied levels, best first on each side.
    /// Rejects ladders that break the ordering or crossing rules.
    pub fn from_levels(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Result<Self, BookError> {
        let book = Self { bids, asks };
        book.check_invariants()?;
        Ok(book)
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// Levels resting on `side`: bids for BUY, asks for SELL.
    pub fn levels(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::BUY => &self.bids,
            Side::SELL => &self.asks,
        }
    }

    pub(crate) fn levels_mut(&mut self, side: Side) -> &mut Vec<PriceLevel> {
        match side {
            Side::BUY => &mut self.bids,
            Side::SELL => &mut self.asks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        let best = self.bids.first().copied();
        trace!(price = ?best.map(|l| l.price()), "Found best bid");
        best
    }

    #[instrument(level = "trace", skip(self))]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        let best = self.asks.first().copied();
        trace!(price = ?best.map(|l| l.price()), "Found best ask");
        best
    }

    #[instrument(level = "trace", skip(self))]
    pub fn spread(&self) -> Option<f64> {
        let best_bid = match self.best_bid() {
            Some(level) => level.price(),
            None => {
                trace!("No best bid available for spread calculation");
                return None;
            }
        };

        let best_ask = match self.best_ask() {
            Some(level) => level.price(),
            None => {
                trace!("No best ask available for spread calculation");
                return None;
            }
        };

        let spread = best_ask - best_bid;
        trace!(best_bid, best_ask, spread, "Calculated spread");
        Some(spread)
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price() + a.price()) / 2.0),
            _ => None,
        }
    }

    /// Bids strictly descending, asks strictly ascending, bid below ask.
    pub fn check_invariants(&self) -> Result<(), BookError> {
        for (index, pair) in self.bids.windows(2).enumerate() {
            if pair[1].price() >= pair[0].price() {
                return Err(BookError::UnorderedLevels { side: Side::BUY, index: index + 1 });
            }
        }
        for (index, pair) in self.asks.windows(2).enumerate() {
            if pair[1].price() <= pair[0].price() {
                return Err(BookError::UnorderedLevels { side: Side::SELL, index: index + 1 });
            }
        }
        if let (Some(bid), Some(ask)) = (self.bids.first(), self.asks.first()) {
            if bid.price() >= ask.price() {
                return Err(BookError::CrossedBook { bid: bid.price(), ask: ask.price() });
            }
        }
        Ok(())
    }

    /// Running size totals over the first `n` levels of a side.
    pub fn cumulative_depth(&self, side: Side, n: usize) -> Vec<DepthPoint> {
        let mut running = 0.0;
        self.levels(side)
            .iter()
            .take(n)
            .map(|level| {
                running += level.size();
                DepthPoint { price: level.price(), cumulative_size: running }
            })
            .collect()
    }

    /// Index on the order's own side where a limit order would rest, i.e. the
    /// first level it matches or improves on. Market orders never rest.
    pub fn resting_position(&self, order: &HypotheticalOrder) -> Option<usize> {
        if order.order_type == OrderType::MARKET {
            return None;
        }
        let price = order.price?;
        let own = self.levels(order.side);
        let position = match order.side {
            Side::BUY => own.iter().position(|level| price >= level.price()),
            Side::SELL => own.iter().position(|level| price <= level.price()),
        };
        // Behind every level when it improves on none of them
        Some(position.unwrap_or(own.len()))
    }
}
