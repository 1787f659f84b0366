//! OKX perpetual swap trading CLI
//!
//! Thin command-line front end over `OkxTrader`. Credentials come from
//! OKX_API_KEY / OKX_SECRET_KEY / OKX_PASSPHRASE (a `.env` file is honored).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use okx_swap_trader::config::destination_from_env;
use okx_swap_trader::{Destination, LeverageChange, OkxCredentials, OkxTrader, PositionSide, TraderConfig};

/// OKX USDT-margined perpetual swap trader.
#[derive(Parser)]
#[command(name = "okxswap")]
#[command(about = "Open, close and protect OKX perpetual swap positions", long_about = None)]
struct Cli {
    /// Route requests to OKX demo trading
    #[arg(long)]
    demo: bool,

    /// JSON file with trader settings (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show USDT account balance
    Balance,

    /// List open swap positions
    Positions,

    /// Show the last traded price
    Price {
        /// Symbol, e.g. BTCUSDT
        symbol: String,
    },

    /// Set isolated leverage for an instrument
    Leverage { symbol: String, leverage: u32 },

    /// Open (or add to) a long position at market
    OpenLong {
        symbol: String,
        quantity: Decimal,
        #[arg(short = 'x', long, default_value = "1")]
        leverage: u32,
    },

    /// Open (or add to) a short position at market
    OpenShort {
        symbol: String,
        quantity: Decimal,
        #[arg(short = 'x', long, default_value = "1")]
        leverage: u32,
    },

    /// Close a long position at market (0 closes all of it)
    CloseLong {
        symbol: String,
        #[arg(default_value = "0")]
        quantity: Decimal,
    },

    /// Close a short position at market (0 closes all of it)
    CloseShort {
        symbol: String,
        #[arg(default_value = "0")]
        quantity: Decimal,
    },

    /// Place a stop-loss for a position
    StopLoss {
        symbol: String,
        /// Position side to protect (long, short)
        side: PositionSide,
        quantity: Decimal,
        price: Decimal,
    },

    /// Place a take-profit for a position
    TakeProfit {
        symbol: String,
        /// Position side to protect (long, short)
        side: PositionSide,
        quantity: Decimal,
        price: Decimal,
    },

    /// Cancel all pending stop-loss and take-profit orders for a symbol
    Cancel { symbol: String },

    /// Render a quantity and price at the instrument's precision
    Format {
        symbol: String,
        quantity: Decimal,
        price: Decimal,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<TraderConfig>(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => TraderConfig::default(),
    };
    if cli.demo {
        config.destination = Destination::Demo;
    } else if config.destination == Destination::Live {
        config.destination = destination_from_env();
    }

    if let Commands::Config = cli.command {
        return print_config(&config);
    }

    let credentials = OkxCredentials::from_env().context("loading OKX credentials")?;
    let trader = OkxTrader::connect(credentials, config)
        .await
        .context("connecting to OKX")?;

    match cli.command {
        Commands::Balance => {
            let balance = trader.balance().await?;

            println!("\n=== USDT Balance ===");
            println!("Wallet:         {:.2}", balance.total_wallet_balance);
            println!("Available:      {:.2}", balance.available_balance);
            println!("Unrealized P&L: {:.2}", balance.total_unrealized_profit);
        }

        Commands::Positions => {
            let positions = trader.positions().await?;

            if positions.is_empty() {
                println!("No open positions.");
                return Ok(());
            }

            println!(
                "\n{:<14} {:<6} {:>12} {:>12} {:>12} {:>14} {:>10} {:>5} {:>12}",
                "SYMBOL", "SIDE", "AMOUNT", "ENTRY", "MARK", "NOTIONAL", "UPL", "LEV", "LIQ"
            );
            println!("{}", "-".repeat(105));

            for p in positions {
                println!(
                    "{:<14} {:<6} {:>12} {:>12} {:>12} {:>14.2} {:>10.2} {:>5} {:>12}",
                    p.symbol,
                    p.side,
                    p.amount,
                    p.entry_price,
                    p.mark_price,
                    p.notional(),
                    p.unrealized_pnl,
                    p.leverage,
                    p.liquidation_price
                );
            }
        }

        Commands::Price { symbol } => {
            let price = trader.market_price(&symbol).await?;
            println!("{} {}", symbol, price);
        }

        Commands::Leverage { symbol, leverage } => match trader.set_leverage(&symbol, leverage).await? {
            LeverageChange::Changed => println!("{} leverage set to {}x", symbol, leverage),
            LeverageChange::Unchanged => println!("{} leverage already {}x", symbol, leverage),
        },

        Commands::OpenLong {
            symbol,
            quantity,
            leverage,
        } => {
            info!(symbol = %symbol, %quantity, leverage, "Opening long from CLI");
            let order = trader.open_long(&symbol, quantity, leverage).await?;
            println!("Order {} ({}) {}", order.order_id, order.client_order_id, order.status);
        }

        Commands::OpenShort {
            symbol,
            quantity,
            leverage,
        } => {
            info!(symbol = %symbol, %quantity, leverage, "Opening short from CLI");
            let order = trader.open_short(&symbol, quantity, leverage).await?;
            println!("Order {} ({}) {}", order.order_id, order.client_order_id, order.status);
        }

        Commands::CloseLong { symbol, quantity } => {
            let order = trader.close_long(&symbol, quantity).await?;
            println!("Order {} ({}) {}", order.order_id, order.client_order_id, order.status);
        }

        Commands::CloseShort { symbol, quantity } => {
            let order = trader.close_short(&symbol, quantity).await?;
            println!("Order {} ({}) {}", order.order_id, order.client_order_id, order.status);
        }

        Commands::StopLoss {
            symbol,
            side,
            quantity,
            price,
        } => {
            let algo_id = trader.set_stop_loss(&symbol, side, quantity, price).await?;
            println!("Stop-loss {} placed for {} {}", algo_id, symbol, side);
        }

        Commands::TakeProfit {
            symbol,
            side,
            quantity,
            price,
        } => {
            let algo_id = trader
                .set_take_profit(&symbol, side, quantity, price)
                .await?;
            println!("Take-profit {} placed for {} {}", algo_id, symbol, side);
        }

        Commands::Cancel { symbol } => {
            let report = trader.cancel_all_orders(&symbol).await?;
            println!("{}: {}", symbol, report);
            for failure in &report.failures {
                println!("  {}", failure);
            }
        }

        Commands::Format {
            symbol,
            quantity,
            price,
        } => {
            println!("Quantity: {}", trader.format_quantity(&symbol, quantity).await);
            println!("Price:    {}", trader.format_price(&symbol, price).await);
        }

        Commands::Config => print_config(trader.config())?,
    }

    Ok(())
}

fn print_config(config: &TraderConfig) -> Result<()> {
    println!("\n=== Trader Configuration ===\n");
    println!("Destination:            {}", config.destination);
    println!("Base URL:               {}", config.base_url);
    println!("HTTP Timeout:           {}s", config.http_timeout_secs);
    println!("Leverage Settle Delay:  {}ms", config.leverage_settle_delay_ms);
    println!(
        "Precision TTL:          {}",
        config
            .precision_ttl_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "forever".to_string())
    );
    println!("Precision Fail Alert:   after {} failures", config.precision_failure_threshold);
    println!(
        "Fallback Digits:        qty {} / price {}",
        config.fallback_quantity_digits, config.fallback_price_digits
    );
    println!("Cancel Retry Window:    {}ms", config.cancel_retry_max_elapsed_ms);

    println!("\nAs JSON:\n{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
