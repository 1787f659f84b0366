//! Stop-loss / take-profit algo orders and their cancellation.
//!
//! Both kinds are OKX `conditional` algo orders. A stop-loss carries
//! `slTriggerPx`, a take-profit carries `tpTriggerPx`, and both execute at
//! market (`-1` order price) once triggered.

use std::sync::Arc;
use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::types::{
    AlgoOrder, CancelAlgoRequest, PlaceAlgoOrderRequest, ALGO_CONDITIONAL, ISOLATED,
    MARKET_TRIGGER_PRICE,
};
use crate::api::OkxApi;
use crate::error::{ApiError, Result, TraderError};
use crate::models::symbol::to_inst_id;
use crate::models::{CancelReport, ContingentKind, ContingentOrderSpec, PositionSide};

use super::precision::NumericFormatter;

pub struct ContingentOrderManager {
    api: Arc<dyn OkxApi>,
    formatter: Arc<NumericFormatter>,
    retry_window: Duration,
}

impl ContingentOrderManager {
    pub fn new(api: Arc<dyn OkxApi>, formatter: Arc<NumericFormatter>, retry_window: Duration) -> Self {
        Self {
            api,
            formatter,
            retry_window,
        }
    }

    /// Place a stop-loss that closes `quantity` of the `pos_side` position.
    pub async fn set_stop_loss(
        &self,
        symbol: &str,
        pos_side: PositionSide,
        quantity: Decimal,
        trigger_price: Decimal,
    ) -> Result<String> {
        self.place(symbol, pos_side, ContingentKind::StopLoss, quantity, trigger_price)
            .await
    }

    /// Place a take-profit that closes `quantity` of the `pos_side` position.
    pub async fn set_take_profit(
        &self,
        symbol: &str,
        pos_side: PositionSide,
        quantity: Decimal,
        trigger_price: Decimal,
    ) -> Result<String> {
        self.place(symbol, pos_side, ContingentKind::TakeProfit, quantity, trigger_price)
            .await
    }

    /// Build the order description with both values rendered at instrument precision.
    pub async fn build_spec(
        &self,
        symbol: &str,
        pos_side: PositionSide,
        kind: ContingentKind,
        quantity: Decimal,
        trigger_price: Decimal,
    ) -> ContingentOrderSpec {
        let inst_id = to_inst_id(symbol);
        let quantity = self.formatter.format_quantity(&inst_id, quantity).await;
        let trigger_price = self.formatter.format_price(&inst_id, trigger_price).await;

        ContingentOrderSpec {
            inst_id,
            pos_side,
            kind,
            trigger_price,
            quantity,
        }
    }

    async fn place(
        &self,
        symbol: &str,
        pos_side: PositionSide,
        kind: ContingentKind,
        quantity: Decimal,
        trigger_price: Decimal,
    ) -> Result<String> {
        let op = match kind {
            ContingentKind::StopLoss => "set_stop_loss",
            ContingentKind::TakeProfit => "set_take_profit",
        };

        if quantity <= Decimal::ZERO || trigger_price <= Decimal::ZERO {
            return Err(TraderError::InvalidInput(format!(
                "{} for {} needs positive quantity and trigger price, got {} @ {}",
                kind, symbol, quantity, trigger_price
            )));
        }

        let spec = self
            .build_spec(symbol, pos_side, kind, quantity, trigger_price)
            .await;
        let req = algo_request(&spec);

        info!(
            inst_id = %spec.inst_id,
            kind = %kind,
            pos_side = %pos_side,
            side = %req.side,
            trigger = %spec.trigger_price,
            sz = %spec.quantity,
            "Placing contingent order"
        );

        let acks = self
            .api
            .place_algo_order(&req)
            .await
            .map_err(|e| TraderError::transport(op, symbol, e))?;

        let ack = acks.into_iter().next().ok_or_else(|| TraderError::EmptyResponse {
            op,
            symbol: symbol.to_string(),
        })?;

        if ack.s_code != "0" {
            warn!(
                inst_id = %spec.inst_id,
                kind = %kind,
                code = %ack.s_code,
                msg = %ack.s_msg,
                "Contingent order rejected"
            );
            return Err(TraderError::Rejected {
                op,
                symbol: symbol.to_string(),
                code: ack.s_code,
                msg: ack.s_msg,
            });
        }

        info!(inst_id = %spec.inst_id, kind = %kind, algo_id = %ack.algo_id, "Contingent order placed");
        Ok(ack.algo_id)
    }

    /// Cancel every pending stop-loss and take-profit order on `symbol`.
    ///
    /// The two kinds are swept concurrently and independently. Nothing here
    /// fails: listing and cancel failures are collected into the report.
    pub async fn cancel_all(&self, symbol: &str) -> CancelReport {
        let inst_id = to_inst_id(symbol);

        let (mut report, take_profit) = futures::join!(
            self.cancel_kind(&inst_id, ContingentKind::StopLoss),
            self.cancel_kind(&inst_id, ContingentKind::TakeProfit),
        );
        report.merge(take_profit);

        if report.is_clean() {
            debug!(inst_id = %inst_id, report = %report, "Contingent orders swept");
        } else {
            warn!(
                inst_id = %inst_id,
                report = %report,
                failures = ?report.failures,
                "Some contingent orders could not be cancelled"
            );
        }
        report
    }

    async fn cancel_kind(&self, inst_id: &str, kind: ContingentKind) -> CancelReport {
        let mut report = CancelReport::default();

        let pending = match self
            .with_retry(|| self.api.pending_algo_orders(inst_id, ALGO_CONDITIONAL))
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                warn!(inst_id = %inst_id, kind = %kind, error = %e, "Failed to list pending orders");
                report.failures.push(format!("list {} orders: {}", kind, e));
                return report;
            }
        };

        for order in pending.into_iter().filter(|o| is_kind(o, kind)) {
            let req = [CancelAlgoRequest {
                inst_id: inst_id.to_string(),
                algo_id: order.algo_id.clone(),
            }];

            match self.with_retry(|| self.api.cancel_algo_orders(&req)).await {
                Ok(acks) => match acks.into_iter().find(|a| a.algo_id == order.algo_id) {
                    Some(ack) if ack.s_code == "0" => {
                        info!(inst_id = %inst_id, kind = %kind, algo_id = %order.algo_id, "Cancelled");
                        report.cancelled.push(order.algo_id);
                    }
                    Some(ack) => {
                        report.failures.push(format!(
                            "cancel {} {}: {} (code: {})",
                            kind, order.algo_id, ack.s_msg, ack.s_code
                        ));
                    }
                    None => {
                        report
                            .failures
                            .push(format!("cancel {} {}: no acknowledgement", kind, order.algo_id));
                    }
                },
                Err(e) => {
                    report
                        .failures
                        .push(format!("cancel {} {}: {}", kind, order.algo_id, e));
                }
            }
        }

        report
    }

    /// Retry transient transport failures with exponential backoff inside the
    /// configured window. Anything else fails on the first attempt.
    async fn with_retry<T, F, Fut>(&self, mut call: F) -> std::result::Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, ApiError>>,
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(self.retry_window))
            .build();

        retry(policy, || {
            let attempt = call();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_transient() {
                        debug!(error = %e, "Transient failure, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }
}

fn is_kind(order: &AlgoOrder, kind: ContingentKind) -> bool {
    match kind {
        ContingentKind::StopLoss => order.has_stop_loss(),
        // orders carrying both triggers are swept by the stop-loss pass
        ContingentKind::TakeProfit => order.has_take_profit() && !order.has_stop_loss(),
    }
}

fn algo_request(spec: &ContingentOrderSpec) -> PlaceAlgoOrderRequest {
    let trigger = Some(spec.trigger_price.clone());
    let at_market = Some(MARKET_TRIGGER_PRICE.to_string());
    let ((sl_trigger_px, sl_ord_px), (tp_trigger_px, tp_ord_px)) = match spec.kind {
        ContingentKind::StopLoss => ((trigger, at_market), (None, None)),
        ContingentKind::TakeProfit => ((None, None), (trigger, at_market)),
    };

    PlaceAlgoOrderRequest {
        inst_id: spec.inst_id.clone(),
        td_mode: ISOLATED.to_string(),
        side: spec.trade_side(),
        pos_side: spec.pos_side,
        ord_type: ALGO_CONDITIONAL.to_string(),
        sz: spec.quantity.clone(),
        sl_trigger_px,
        sl_ord_px,
        tp_trigger_px,
        tp_ord_px,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::AlgoAck;
    use crate::config::TraderConfig;
    use crate::models::OrderSide;
    use crate::testing::{algo, MockApi};
    use rust_decimal_macros::dec;

    fn manager(api: Arc<MockApi>) -> ContingentOrderManager {
        let formatter = Arc::new(NumericFormatter::new(api.clone(), &TraderConfig::default()));
        ContingentOrderManager::new(api, formatter, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_stop_loss_on_long_sells() {
        let api = MockApi::default()
            .with_instrument("BTC-USDT-SWAP", "0.01", "0.1")
            .accepting_orders()
            .into_arc();

        let algo_id = manager(api.clone())
            .set_stop_loss("BTCUSDT", PositionSide::Long, dec!(0.5), dec!(58000.04))
            .await
            .unwrap();
        assert_eq!(algo_id, "algo-new");

        let placed = api.placed_algos.lock().unwrap();
        let req = &placed[0];
        assert_eq!(req.side, OrderSide::Sell);
        assert_eq!(req.pos_side, PositionSide::Long);
        assert_eq!(req.ord_type, "conditional");
        assert_eq!(req.td_mode, "isolated");
        assert_eq!(req.sz, "0.50");
        assert_eq!(req.sl_trigger_px.as_deref(), Some("58000.0"));
        assert_eq!(req.sl_ord_px.as_deref(), Some("-1"));
        assert!(req.tp_trigger_px.is_none());
    }

    #[tokio::test]
    async fn test_take_profit_on_short_buys() {
        let api = MockApi::default()
            .with_instrument("ETH-USDT-SWAP", "1", "0.01")
            .accepting_orders()
            .into_arc();

        manager(api.clone())
            .set_take_profit("ETHUSDT", PositionSide::Short, dec!(3), dec!(2999.995))
            .await
            .unwrap();

        let placed = api.placed_algos.lock().unwrap();
        let req = &placed[0];
        assert_eq!(req.side, OrderSide::Buy);
        assert_eq!(req.pos_side, PositionSide::Short);
        assert_eq!(req.sz, "3");
        assert_eq!(req.tp_trigger_px.as_deref(), Some("3000.00"));
        assert_eq!(req.tp_ord_px.as_deref(), Some("-1"));
        assert!(req.sl_trigger_px.is_none());
    }

    #[tokio::test]
    async fn test_rejected_contingent_order() {
        let api = MockApi {
            algo_ack: Some(AlgoAck {
                algo_id: String::new(),
                s_code: "51277".to_string(),
                s_msg: "TP trigger price cannot be lower than the last price".to_string(),
            }),
            ..MockApi::default()
        }
        .into_arc();

        let err = manager(api)
            .set_take_profit("BTCUSDT", PositionSide::Long, dec!(1), dec!(10))
            .await
            .unwrap_err();

        assert!(err.is_rejected());
        assert!(err.to_string().contains("set_take_profit"));
    }

    #[tokio::test]
    async fn test_empty_algo_response() {
        let api = MockApi::default().into_arc();

        let err = manager(api)
            .set_stop_loss("BTCUSDT", PositionSide::Short, dec!(1), dec!(70000))
            .await
            .unwrap_err();

        assert!(matches!(err, TraderError::EmptyResponse { op: "set_stop_loss", .. }));
    }

    #[tokio::test]
    async fn test_cancel_all_splits_by_kind() {
        let listing = vec![
            algo("sl-1", "58000", ""),
            algo("tp-1", "", "65000"),
            algo("both-1", "58000", "65000"),
        ];
        let api = MockApi::default()
            .with_algo_listing(Ok(listing.clone()))
            .with_algo_listing(Ok(listing))
            .into_arc();

        let report = manager(api.clone()).cancel_all("BTCUSDT").await;

        assert!(report.is_clean());
        let mut cancelled = report.cancelled.clone();
        cancelled.sort();
        assert_eq!(cancelled, vec!["both-1", "sl-1", "tp-1"]);
        assert_eq!(
            api.calls()
                .iter()
                .filter(|c| c.starts_with("pending_algo_orders:BTC-USDT-SWAP:conditional"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_failed_listing_does_not_block_other_kind() {
        // the stop-loss pass is polled first and takes the failing listing
        let api = MockApi::default()
            .with_algo_listing(Err(401))
            .with_algo_listing(Ok(vec![algo("sl-1", "58000", ""), algo("tp-1", "", "65000")]))
            .into_arc();

        let report = manager(api.clone()).cancel_all("BTCUSDT").await;

        assert_eq!(report.cancelled, vec!["tp-1"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("stop-loss"));
        assert_eq!(*api.cancelled.lock().unwrap(), vec!["tp-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_cancel_does_not_abort_sweep() {
        let mut api = MockApi::default()
            .with_algo_listing(Ok(vec![algo("sl-1", "58000", ""), algo("sl-2", "57000", "")]))
            .with_algo_listing(Ok(vec![]));
        api.failing_cancels.insert("sl-1".to_string());
        let api = api.into_arc();

        let report = manager(api).cancel_all("BTCUSDT").await;

        assert_eq!(report.cancelled, vec!["sl-2"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("51400"));
    }

    #[test]
    fn test_both_triggers_belong_to_stop_loss_pass() {
        let order = algo("both", "1", "2");
        assert!(is_kind(&order, ContingentKind::StopLoss));
        assert!(!is_kind(&order, ContingentKind::TakeProfit));
    }
}
