use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use itertools::{EitherOrBoth, Itertools};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use lobsim_rs::config::SimConfig;
use lobsim_rs::engine::imbalance::NEAR_TOUCH_LEVELS;
use lobsim_rs::engine::types::{FillResult, HypotheticalOrder, OrderBook, Side};
use lobsim_rs::engine::volatility::VolatilityAlert;
use lobsim_rs::sim::driver::MarketState;
use lobsim_rs::sim::market::Venue;
use lobsim_rs::sim::runner::{self, SharedMarket, SimEvent};
use lobsim_rs::telemetry;

#[derive(Parser, Debug)]
#[command(name = "lobsim")]
#[command(about = "Synthetic order book simulator with order impact analysis")]
#[command(version)]
struct Args {
    /// Config file (TOML); defaults to ./lobsim.toml when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Symbol to simulate, e.g. BTC-USD
    #[arg(long)]
    symbol: Option<String>,

    /// Venue label: okx, bybit or deribit
    #[arg(long)]
    venue: Option<Venue>,

    /// Levels per side
    #[arg(long)]
    depth: Option<usize>,

    /// Driver tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Print order results as JSON
    #[arg(long)]
    json: bool,
}

type LatestAlert = Arc<Mutex<Option<(VolatilityAlert, Instant)>>>;

fn print_help() {
    println!("Available commands:");
    println!("  buy <price> <qty> [delay_ms]    - Simulate buy limit order");
    println!("  sell <price> <qty> [delay_ms]   - Simulate sell limit order");
    println!("  market_buy <qty> [delay_ms]     - Simulate market buy order");
    println!("  market_sell <qty> [delay_ms]    - Simulate market sell order");
    println!("  top                             - Show top of book, imbalance and alerts");
    println!("  book [levels]                   - Show the ladder (default 10 levels)");
    println!("  depth [levels]                  - Show cumulative depth");
    println!("  symbol <SYMBOL>                 - Switch symbol and regenerate the book");
    println!("  venue <okx|bybit|deribit>       - Switch venue label");
    println!("  symbols                         - List known symbols");
    println!("  quit, q                         - Exit");
}

fn print_state_summary(market: &SharedMarket, latest_alert: &LatestAlert) {
    let (symbol, venue, book, imbalance, trend) = {
        let guard = market.lock();
        (guard.symbol().to_string(), guard.venue(), guard.snapshot(), guard.imbalance(), guard.trend())
    };

    println!("\n=== {} on {} ===", symbol, venue);
    match book.best_bid() {
        Some(bid) => println!("Best bid: {:.4} @ {:.2}", bid.size(), bid.price()),
        None => println!("Best bid: None"),
    }
    match book.best_ask() {
        Some(ask) => println!("Best ask: {:.4} @ {:.2}", ask.size(), ask.price()),
        None => println!("Best ask: None"),
    }
    match book.spread() {
        Some(spread) => println!("Spread: {:.4}", spread),
        None => println!("Spread: N/A"),
    }
    println!("Imbalance: {} ({:+.3})", imbalance.label, imbalance.ratio);
    println!("Trend: {}", trend.direction);

    // Alerts stay visible only for their display window
    let mut slot = latest_alert.lock();
    let expired = match slot.as_ref() {
        Some((alert, raised_at)) if raised_at.elapsed() < alert.display_for => {
            println!("⚠️ {}", alert.message);
            false
        }
        Some(_) => true,
        None => false,
    };
    if expired {
        *slot = None;
    }
    println!("========================\n");
}

fn print_ladder(book: &OrderBook, levels: usize) {
    println!("{:>14} {:>12} | {:>12} {:>14}", "BID SIZE", "BID", "ASK", "ASK SIZE");
    for pair in book.bids().iter().take(levels).zip_longest(book.asks().iter().take(levels)) {
        let (bid, ask) = match pair {
            EitherOrBoth::Both(b, a) => (Some(b), Some(a)),
            EitherOrBoth::Left(b) => (Some(b), None),
            EitherOrBoth::Right(a) => (None, Some(a)),
        };
        let bid_cols = bid.map(|b| format!("{:>14.4} {:>12.2}", b.size(), b.price())).unwrap_or_else(|| format!("{:>27}", ""));
        let ask_cols = ask.map(|a| format!("{:>12.2} {:>14.4}", a.price(), a.size())).unwrap_or_default();
        println!("{} | {}", bid_cols, ask_cols);
    }
}

fn print_depth(book: &OrderBook, levels: usize) {
    for (name, side) in [("Bids", Side::BUY), ("Asks", Side::SELL)] {
        println!("{}:", name);
        for point in book.cumulative_depth(side, levels) {
            println!("  {:>12.2}  {:>10.4}", point.price, point.cumulative_size);
        }
    }
}

fn print_fill(order: &HypotheticalOrder, result: &FillResult, resting: Option<usize>, json: bool) {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialise result: {}", e),
        }
        return;
    }
    println!("\n--- Order Impact Analysis ({} {:?}) ---", order.side, order.order_type);
    println!("Reference price:   {:.2}", result.reference_price);
    println!("Estimated fill:    {:.1}% ({:.4})", result.fill_percentage, result.fill_quantity);
    println!("Market impact:     {:.3}% [{:?}]", result.market_impact_pct, result.impact_severity());
    println!("Slippage:          {:.3}% [{:?}]", result.slippage_pct, result.slippage_severity());
    println!("Est. time to fill: {}", result.estimated_time_to_fill);
    println!("Avg fill price:    {:.2}", result.avg_fill_price);
    println!("Total cost:        {:.2}", result.total_cost);
    if let Some(index) = resting {
        println!("Would rest at level {} of its own side", index + 1);
    }
    println!("--------------------------------------\n");
}

fn parse_order(side: Side, is_market: bool, parts: &[&str]) -> Result<HypotheticalOrder, String> {
    let num = |s: &str| s.parse::<f64>().map_err(|_| format!("Invalid number '{}'", s));
    let delay = |s: Option<&&str>| match s {
        Some(d) => d.parse::<u32>().map_err(|_| format!("Invalid delay '{}'", d)),
        None => Ok(0),
    };

    if is_market {
        match parts {
            [qty, rest @ ..] if rest.len() <= 1 => {
                Ok(HypotheticalOrder::market(side, num(*qty)?).with_delay(delay(rest.first())?))
            }
            _ => Err("Usage: quantity [delay_ms]".to_string()),
        }
    } else {
        match parts {
            [price, qty, rest @ ..] if rest.len() <= 1 => {
                Ok(HypotheticalOrder::limit(side, num(*price)?, num(*qty)?).with_delay(delay(rest.first())?))
            }
            _ => Err("Usage: price quantity [delay_ms]".to_string()),
        }
    }
}

async fn run_order(market: &SharedMarket, order: HypotheticalOrder, json: bool) {
    if order.timing_delay_ms > 0 {
        println!("Simulating... ({} ms)", order.timing_delay_ms);
    }
    match runner::simulate_order(market, order).await {
        Ok(outcome) => print_fill(&order, &outcome.fill, outcome.resting_level, json),
        Err(e) => println!("❌ {}", e),
    }
}

fn spawn_event_logger(mut rx: tokio::sync::mpsc::Receiver<SimEvent>, latest_alert: LatestAlert) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SimEvent::VolatilityAlert(alert) => {
                    warn!(direction = %alert.direction, "{}", alert.message);
                    *latest_alert.lock() = Some((alert, Instant::now()));
                }
                SimEvent::TrendChanged { direction } => {
                    info!(%direction, "Trend changed");
                }
                SimEvent::Tick { .. } => {}
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    telemetry::init_tracing(telemetry::DEFAULT_FILTER);

    let args = Args::parse();
    let mut cfg = SimConfig::load(args.config.as_deref())?;
    if let Some(symbol) = args.symbol {
        cfg.symbol = symbol;
    }
    if let Some(venue) = args.venue {
        cfg.venue = venue;
    }
    if let Some(depth) = args.depth {
        cfg.depth = depth;
    }
    if let Some(tick_ms) = args.tick_ms {
        cfg.tick_interval_ms = tick_ms;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    cfg.validate()?;
    telemetry::init_metrics(cfg.metrics_port)?;

    let market = runner::shared(MarketState::from_config(&cfg, Instant::now())?);
    let (_driver, rx) = runner::spawn_driver(Arc::clone(&market), cfg.tick_interval());
    let latest_alert: LatestAlert = Arc::new(Mutex::new(None));
    spawn_event_logger(rx, Arc::clone(&latest_alert));

    println!("Connected to {} ({}). Type 'help' for commands.", cfg.venue, cfg.symbol);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nLOBSIM> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (command, rest) = match parts.split_first() {
            Some((command, rest)) => (command.to_lowercase(), rest),
            None => continue,
        };

        match command.as_str() {
            "help" | "h" => print_help(),
            "buy" | "sell" | "market_buy" | "market_sell" => {
                let side = if command.ends_with("buy") { Side::BUY } else { Side::SELL };
                match parse_order(side, command.starts_with("market"), rest) {
                    Ok(order) => run_order(&market, order, args.json).await,
                    Err(msg) => println!("{}", msg),
                }
            }
            "top" => print_state_summary(&market, &latest_alert),
            "book" => {
                let levels = rest.first().and_then(|s| s.parse().ok()).unwrap_or(NEAR_TOUCH_LEVELS);
                let book = market.lock().snapshot();
                print_ladder(&book, levels);
            }
            "depth" => {
                let levels = rest.first().and_then(|s| s.parse().ok()).unwrap_or(NEAR_TOUCH_LEVELS);
                let book = market.lock().snapshot();
                print_depth(&book, levels);
            }
            "symbol" => match rest.first() {
                Some(symbol) => match market.lock().switch_symbol(symbol) {
                    Ok(()) => println!("✅ Switched to {}", symbol.to_uppercase()),
                    Err(e) => println!("❌ {}", e),
                },
                None => println!("Usage: symbol <SYMBOL>"),
            },
            "venue" => match rest.first().map(|v| v.parse::<Venue>()) {
                Some(Ok(venue)) => {
                    market.lock().set_venue(venue);
                    println!("Connected to {}", venue);
                }
                Some(Err(e)) => println!("❌ {}", e),
                None => println!("Usage: venue <okx|bybit|deribit>"),
            },
            "symbols" => {
                let guard = market.lock();
                for (symbol, price) in guard.symbols().iter() {
                    println!("  {:<10} {}", symbol, price);
                }
            }
            "quit" | "q" | "exit" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Unknown command. Type 'help' for available commands."),
        }
    }

    Ok(())
}
