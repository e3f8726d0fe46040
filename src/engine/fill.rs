use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::engine::types::{BookError, FillResult, HypotheticalOrder, OrderBook, OrderType, Side, TimeToFill};

/// Display grade for impact and slippage percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ImpactSeverity {
    Good,
    Warning,
    Danger,
}

impl ImpactSeverity {
    pub fn from_pct(pct: f64) -> Self {
        if pct > 0.5 {
            ImpactSeverity::Danger
        } else if pct > 0.1 {
            ImpactSeverity::Warning
        } else {
            ImpactSeverity::Good
        }
    }
}

impl FillResult {
    pub fn impact_severity(&self) -> ImpactSeverity {
        ImpactSeverity::from_pct(self.market_impact_pct)
    }

    pub fn slippage_severity(&self) -> ImpactSeverity {
        ImpactSeverity::from_pct(self.slippage_pct)
    }
}

/// Walks the opposing side of a snapshot to estimate how a hypothetical order
/// would fill. Never touches the book.
#[derive(Debug, Clone, Copy)]
pub struct FillEstimator {
    pub min_fill_secs: f64,
    pub max_fill_secs: f64,
}

impl Default for FillEstimator {
    fn default() -> Self {
        Self { min_fill_secs: 5.0, max_fill_secs: 35.0 }
    }
}

impl FillEstimator {
    #[instrument(skip(self, book, rng), fields(side = %order.side, qty = order.quantity))]
    pub fn estimate<R: Rng + ?Sized>(
        &self,
        order: &HypotheticalOrder,
        book: &OrderBook,
        rng: &mut R,
    ) -> Result<FillResult, BookError> {
        if let Err(error) = order.validate() {
            warn!(%error, "Rejecting hypothetical order");
            return Err(error);
        }

        let opposite = order.side.opposite();
        let levels = book.levels(opposite);
        let best_price = match levels.first() {
            Some(level) => level.price(),
            None => {
                let error = BookError::EmptyBook { side: opposite };
                warn!(%error, "Cannot estimate against an empty side");
                return Err(error);
            }
        };

        let mut fill_quantity = 0.0;
        let mut total_cost = 0.0;
        for level in levels {
            let eligible = match (order.order_type, order.side, order.price) {
                (OrderType::MARKET, _, _) => true,
                (OrderType::LIMIT, Side::BUY, Some(limit)) => level.price() <= limit,
                (OrderType::LIMIT, Side::SELL, Some(limit)) => level.price() >= limit,
                (OrderType::LIMIT, _, None) => false,
            };
            // Ineligible levels are skipped, not a stop
            if !eligible {
                continue;
            }

            let remaining = order.quantity - fill_quantity;
            let consumed = level.size().min(remaining);
            total_cost += consumed * level.price();
            if consumed >= remaining {
                fill_quantity = order.quantity;
                break;
            }
            fill_quantity += consumed;
        }

        let avg_fill_price = if fill_quantity > 0.0 { total_cost / fill_quantity } else { 0.0 };
        let fill_percentage = 100.0 * fill_quantity / order.quantity;
        let market_impact_pct = 100.0 * (avg_fill_price - best_price).abs() / best_price;

        let (reference_price, slippage_pct) = match (order.order_type, order.price) {
            (OrderType::LIMIT, Some(limit)) => (limit, 100.0 * (avg_fill_price - limit).abs() / limit),
            // Impact is still measured against the book being walked
            _ => (order.reference_price.unwrap_or(best_price), market_impact_pct),
        };

        // Placeholder: no queueing model behind this number
        let estimated_time_to_fill = if fill_quantity >= order.quantity {
            TimeToFill::Seconds(rng.gen_range(self.min_fill_secs..self.max_fill_secs))
        } else {
            TimeToFill::Partial
        };

        debug!(
            fill_quantity,
            fill_percentage,
            avg_fill_price,
            market_impact_pct,
            slippage_pct,
            "Estimated fill"
        );

        Ok(FillResult {
            fill_quantity,
            fill_percentage,
            avg_fill_price,
            total_cost,
            market_impact_pct,
            slippage_pct,
            estimated_time_to_fill,
            reference_price,
        })
    }
}
