//! Position lifecycle on OKX: open, close, protect.
//!
//! `OkxTrader` is stateless apart from the precision cache; positions are
//! re-read from the exchange whenever a quantity has to be resolved.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::types::parse_decimal;
use crate::api::{OkxApi, OkxClient};
use crate::config::{OkxCredentials, TraderConfig};
use crate::error::{Result, TraderError};
use crate::models::symbol::to_inst_id;
use crate::models::{BalanceSummary, CancelReport, OrderResult, OrderType, Position, PositionSide};

use super::account::PositionReader;
use super::contingent::ContingentOrderManager;
use super::leverage::{LeverageChange, LeverageManager};
use super::orders::OrderPlacer;
use super::precision::NumericFormatter;

pub struct OkxTrader {
    api: Arc<dyn OkxApi>,
    config: TraderConfig,
    reader: PositionReader,
    leverage: LeverageManager,
    formatter: Arc<NumericFormatter>,
    orders: OrderPlacer,
    contingent: ContingentOrderManager,
}

impl OkxTrader {
    /// Build an authenticated client and verify connectivity.
    pub async fn connect(credentials: OkxCredentials, config: TraderConfig) -> Result<Self> {
        let client = OkxClient::new(credentials, &config).map_err(|e| {
            TraderError::Config(format!("cannot build OKX client for {}: {}", config.base_url, e))
        })?;
        Self::with_api(Arc::new(client), config).await
    }

    /// Wire the trader over an existing transport. Runs the same
    /// connectivity check as [`OkxTrader::connect`].
    pub async fn with_api(api: Arc<dyn OkxApi>, config: TraderConfig) -> Result<Self> {
        let time = api
            .server_time()
            .await
            .map_err(|e| TraderError::transport("connect", config.destination.to_string(), e))?;

        info!(
            destination = %config.destination,
            server_time = %time.first().map(|t| t.ts.as_str()).unwrap_or("?"),
            "Connected to OKX"
        );

        let formatter = Arc::new(NumericFormatter::new(api.clone(), &config));

        Ok(Self {
            reader: PositionReader::new(api.clone()),
            leverage: LeverageManager::new(api.clone(), config.leverage_settle_delay()),
            orders: OrderPlacer::new(api.clone(), formatter.clone()),
            contingent: ContingentOrderManager::new(
                api.clone(),
                formatter.clone(),
                config.cancel_retry_max_elapsed(),
            ),
            formatter,
            api,
            config,
        })
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub async fn balance(&self) -> Result<BalanceSummary> {
        self.reader.balance().await
    }

    pub async fn positions(&self) -> Result<Vec<Position>> {
        self.reader.positions().await
    }

    /// Set isolated leverage for the whole instrument.
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<LeverageChange> {
        self.leverage.set_leverage(symbol, leverage, None).await
    }

    pub async fn open_long(
        &self,
        symbol: &str,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<OrderResult> {
        info!(symbol = %symbol, %quantity, leverage, "Opening long");
        self.open(symbol, PositionSide::Long, quantity, leverage).await
    }

    pub async fn open_short(
        &self,
        symbol: &str,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<OrderResult> {
        info!(symbol = %symbol, %quantity, leverage, "Opening short");
        self.open(symbol, PositionSide::Short, quantity, leverage).await
    }

    /// Close `quantity` of the long position; zero closes all of it.
    pub async fn close_long(&self, symbol: &str, quantity: Decimal) -> Result<OrderResult> {
        info!(symbol = %symbol, %quantity, "Closing long");
        self.close(symbol, PositionSide::Long, quantity).await
    }

    /// Close `quantity` of the short position; zero closes all of it.
    pub async fn close_short(&self, symbol: &str, quantity: Decimal) -> Result<OrderResult> {
        info!(symbol = %symbol, %quantity, "Closing short");
        self.close(symbol, PositionSide::Short, quantity).await
    }

    async fn open(
        &self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
        leverage: u32,
    ) -> Result<OrderResult> {
        // stale protection from a previous position must not fire on the new one
        let report = self.contingent.cancel_all(symbol).await;
        if !report.is_clean() {
            warn!(symbol = %symbol, report = %report, "Stale contingent orders left in place");
        }

        self.leverage
            .set_leverage(symbol, leverage, Some(side))
            .await?;

        self.orders
            .place_order(
                symbol,
                side.opening_side(),
                OrderType::Market,
                Some(side),
                quantity,
            )
            .await
    }

    async fn close(
        &self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<OrderResult> {
        let quantity = if quantity.is_zero() {
            let position = self
                .reader
                .position(symbol, side)
                .await?
                .ok_or_else(|| {
                    TraderError::NotFound(format!("no open {} position for {}", side, symbol))
                })?;
            info!(symbol = %symbol, side = %side, amount = %position.amount, "Closing full position");
            position.amount
        } else {
            quantity
        };

        self.orders
            .place_order(
                symbol,
                side.closing_side(),
                OrderType::Market,
                Some(side),
                quantity,
            )
            .await
    }

    /// Last traded price.
    pub async fn market_price(&self, symbol: &str) -> Result<Decimal> {
        let inst_id = to_inst_id(symbol);

        let tickers = self
            .api
            .ticker(&inst_id)
            .await
            .map_err(|e| TraderError::transport("market_price", symbol, e))?;

        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| TraderError::EmptyResponse {
                op: "market_price",
                symbol: symbol.to_string(),
            })?;

        Ok(parse_decimal(&ticker.last))
    }

    /// Returns the new algo order ID.
    pub async fn set_stop_loss(
        &self,
        symbol: &str,
        pos_side: PositionSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Result<String> {
        self.contingent
            .set_stop_loss(symbol, pos_side, quantity, stop_price)
            .await
    }

    /// Returns the new algo order ID.
    pub async fn set_take_profit(
        &self,
        symbol: &str,
        pos_side: PositionSide,
        quantity: Decimal,
        take_profit_price: Decimal,
    ) -> Result<String> {
        self.contingent
            .set_take_profit(symbol, pos_side, quantity, take_profit_price)
            .await
    }

    /// Best-effort sweep of pending stop-loss and take-profit orders.
    /// Individual failures are logged and reported, never returned as an error.
    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<CancelReport> {
        let report = self.contingent.cancel_all(symbol).await;
        info!(symbol = %symbol, report = %report, "Cancel sweep finished");
        Ok(report)
    }

    pub async fn format_quantity(&self, symbol: &str, quantity: Decimal) -> String {
        self.formatter.format_quantity(symbol, quantity).await
    }

    pub async fn format_price(&self, symbol: &str, price: Decimal) -> String {
        self.formatter.format_price(symbol, price).await
    }

    /// Drop cached precision for `symbol`, e.g. after an instrument's step size changes.
    pub fn invalidate_precision(&self, symbol: &str) {
        self.formatter.invalidate(symbol);
    }
}
