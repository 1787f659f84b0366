//! Market order placement.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::types::{PlaceOrderRequest, ISOLATED};
use crate::api::OkxApi;
use crate::error::{Result, TraderError};
use crate::models::symbol::to_inst_id;
use crate::models::{OrderResult, OrderSide, OrderStatus, OrderType, PositionSide};

use super::precision::NumericFormatter;

pub struct OrderPlacer {
    api: Arc<dyn OkxApi>,
    formatter: Arc<NumericFormatter>,
}

impl OrderPlacer {
    pub fn new(api: Arc<dyn OkxApi>, formatter: Arc<NumericFormatter>) -> Self {
        Self { api, formatter }
    }

    /// Submit an isolated-margin order and report it as filled.
    ///
    /// Market orders are assumed to execute immediately; fills are not polled.
    pub async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        pos_side: Option<PositionSide>,
        quantity: Decimal,
    ) -> Result<OrderResult> {
        if quantity <= Decimal::ZERO {
            return Err(TraderError::InvalidInput(format!(
                "order quantity for {} must be positive, got {}",
                symbol, quantity
            )));
        }

        let inst_id = to_inst_id(symbol);
        let sz = self.formatter.format_quantity(&inst_id, quantity).await;
        let cl_ord_id = client_order_id();

        let req = PlaceOrderRequest {
            inst_id: inst_id.clone(),
            td_mode: ISOLATED.to_string(),
            side,
            ord_type: order_type,
            sz: sz.clone(),
            pos_side,
            cl_ord_id: Some(cl_ord_id.clone()),
        };

        info!(
            inst_id = %inst_id,
            side = %side,
            pos_side = ?pos_side,
            sz = %sz,
            cl_ord_id = %cl_ord_id,
            "Placing order"
        );

        let acks = self
            .api
            .place_order(&req)
            .await
            .map_err(|e| TraderError::transport("place_order", symbol, e))?;

        let ack = acks.into_iter().next().ok_or_else(|| TraderError::EmptyResponse {
            op: "place_order",
            symbol: symbol.to_string(),
        })?;

        if ack.s_code != "0" {
            warn!(
                inst_id = %inst_id,
                side = %side,
                sz = %sz,
                code = %ack.s_code,
                msg = %ack.s_msg,
                "Order rejected"
            );
            return Err(TraderError::Rejected {
                op: "place_order",
                symbol: symbol.to_string(),
                code: ack.s_code,
                msg: ack.s_msg,
            });
        }

        info!(inst_id = %inst_id, order_id = %ack.ord_id, "Order accepted");

        Ok(OrderResult {
            order_id: ack.ord_id,
            client_order_id: if ack.cl_ord_id.is_empty() {
                cl_ord_id
            } else {
                ack.cl_ord_id
            },
            symbol: symbol.to_string(),
            status: OrderStatus::Filled,
        })
    }
}

/// OKX accepts up to 32 alphanumeric characters.
fn client_order_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
