// Runner keeps the shared market ticking and hands events to the display side
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::imbalance::Imbalance;
use crate::engine::trend::TrendDirection;
use crate::engine::types::{BookError, FillResult, HypotheticalOrder, OrderType};
use crate::engine::volatility::VolatilityAlert;
use crate::sim::driver::MarketState;

pub type SharedMarket = Arc<Mutex<MarketState>>;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Tick {
        imbalance: Imbalance,
        best_bid: Option<f64>,
        best_ask: Option<f64>,
    },
    TrendChanged { direction: TrendDirection },
    VolatilityAlert(VolatilityAlert),
}

pub fn shared(state: MarketState) -> SharedMarket {
    Arc::new(Mutex::new(state))
}

/// Starts the periodic driver on its own task. The task ends once the
/// returned receiver is dropped.
pub fn spawn_driver(market: SharedMarket, tick_interval: Duration) -> (JoinHandle<()>, mpsc::Receiver<SimEvent>) {
    let (tx, rx) = mpsc::channel::<SimEvent>(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        run_driver(market, tick_interval, tx).await;
    });
    (handle, rx)
}

pub async fn run_driver(market: SharedMarket, tick_interval: Duration, tx: mpsc::Sender<SimEvent>) {
    info!(interval_ms = tick_interval.as_millis() as u64, "Starting market driver");
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        // Lock only for the tick itself
        let (report, best_bid, best_ask) = {
            let mut guard = market.lock();
            let report = guard.tick(Instant::now());
            let book = guard.book();
            (report, book.best_bid().map(|l| l.price()), book.best_ask().map(|l| l.price()))
        };

        let mut events = Vec::with_capacity(3);
        if let Some(direction) = report.trend_change {
            events.push(SimEvent::TrendChanged { direction });
        }
        if let Some(alert) = report.alert {
            events.push(SimEvent::VolatilityAlert(alert));
        }
        events.push(SimEvent::Tick { imbalance: report.imbalance, best_bid, best_ask });

        for event in events {
            if tx.send(event).await.is_err() {
                debug!("Event receiver dropped, stopping market driver");
                return;
            }
        }
    }
}

/// Fill estimate plus where a limit order would rest, both taken from the
/// same book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderOutcome {
    pub fill: FillResult,
    pub resting_level: Option<usize>,
}

/// Pins a market order's reference to the best opposing price at submission,
/// waits out the timing delay, then estimates against whatever the book looks
/// like at that moment. Estimation happens under the same lock the driver
/// ticks under, so it always sees a whole tick.
pub async fn simulate_order(market: &SharedMarket, mut order: HypotheticalOrder) -> Result<OrderOutcome, BookError> {
    order.validate()?;
    if order.order_type == OrderType::MARKET && order.reference_price.is_none() {
        let submitted = market.lock().book().levels(order.side.opposite()).first().map(|l| l.price());
        order.reference_price = submitted;
    }
    if order.timing_delay_ms > 0 {
        debug!(delay_ms = order.timing_delay_ms, "Delaying order simulation");
        tokio::time::sleep(Duration::from_millis(order.timing_delay_ms as u64)).await;
    }

    let outcome = {
        let guard = market.lock();
        guard.estimate(&order).map(|fill| OrderOutcome {
            fill,
            resting_level: guard.book().resting_position(&order),
        })
    };
    if let Err(ref error) = outcome {
        warn!(%error, "Order simulation failed");
    }
    outcome
}
