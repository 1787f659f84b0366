//! Request and response types for the OKX v5 REST API.
//!
//! OKX encodes every number as a string and uses `""` for "not set", so numeric
//! fields stay `String` here and are parsed with [`parse_decimal`] at the edge.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{OrderSide, OrderType, PositionSide};

/// Margin mode used for every order and leverage change.
pub const ISOLATED: &str = "isolated";

/// Instrument type for perpetual swaps.
pub const INST_TYPE_SWAP: &str = "SWAP";

/// Algo order type carrying stop-loss / take-profit triggers.
pub const ALGO_CONDITIONAL: &str = "conditional";

/// Order price `-1` makes a triggered algo order execute at market.
pub const MARKET_TRIGGER_PRICE: &str = "-1";

/// Margin currency queried for balances.
pub const MARGIN_CCY: &str = "USDT";

/// Parse an OKX numeric string, treating empty or malformed values as zero.
pub fn parse_decimal(value: &str) -> Decimal {
    if value.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .unwrap_or_else(|err| {
            warn!(input = value, ?err, "Failed to parse decimal from OKX payload");
            Decimal::ZERO
        })
}

/// Standard `{code, msg, data}` envelope wrapping every response.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Server time from /api/v5/public/time.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTime {
    pub ts: String,
}

/// Account record from /api/v5/account/balance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    #[serde(default)]
    pub total_eq: String,
    #[serde(default)]
    pub upl: String,
    #[serde(default)]
    pub avail_eq: String,
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
}

/// Per-currency detail inside an account record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    pub ccy: String,
    #[serde(default)]
    pub eq: String,
    #[serde(default)]
    pub avail_eq: String,
    #[serde(default)]
    pub upl: String,
}

/// Position record from /api/v5/account/positions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub inst_id: String,
    /// "long", "short" or "net"
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub avg_px: String,
    #[serde(default)]
    pub mark_px: String,
    #[serde(default)]
    pub upl: String,
    #[serde(default)]
    pub lever: String,
    #[serde(default)]
    pub liq_px: String,
    #[serde(default)]
    pub mgn_mode: String,
}

/// Instrument metadata from /api/v5/public/instruments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub inst_id: String,
    /// Order size increment
    #[serde(default)]
    pub lot_sz: String,
    /// Price increment
    #[serde(default)]
    pub tick_sz: String,
    #[serde(default)]
    pub min_sz: String,
    #[serde(default)]
    pub ct_val: String,
}

/// Ticker from /api/v5/market/ticker.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub inst_id: String,
    #[serde(default)]
    pub last: String,
}

/// Body of /api/v5/account/set-leverage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageRequest {
    pub inst_id: String,
    pub lever: String,
    pub mgn_mode: String,
    /// Required by OKX for isolated margin in long/short mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<PositionSide>,
}

/// Body of /api/v5/trade/order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: OrderSide,
    pub ord_type: OrderType,
    pub sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<PositionSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

/// Per-order acknowledgement from /api/v5/trade/order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

/// Body of /api/v5/trade/order-algo.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceAlgoOrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: OrderSide,
    pub pos_side: PositionSide,
    pub ord_type: String,
    pub sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl_trigger_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl_ord_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_trigger_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_ord_px: Option<String>,
}

/// Per-order acknowledgement from the algo order endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoAck {
    #[serde(default)]
    pub algo_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

/// Pending algo order from /api/v5/trade/orders-algo-pending.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoOrder {
    pub algo_id: String,
    pub inst_id: String,
    #[serde(default)]
    pub ord_type: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub pos_side: String,
    #[serde(default)]
    pub sz: String,
    #[serde(default)]
    pub sl_trigger_px: String,
    #[serde(default)]
    pub tp_trigger_px: String,
}

impl AlgoOrder {
    pub fn has_stop_loss(&self) -> bool {
        !self.sl_trigger_px.is_empty()
    }

    pub fn has_take_profit(&self) -> bool {
        !self.tp_trigger_px.is_empty()
    }
}

/// One entry of the /api/v5/trade/cancel-algos body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAlgoRequest {
    pub inst_id: String,
    pub algo_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("0.01"), dec!(0.01));
        assert_eq!(parse_decimal(""), Decimal::ZERO);
        assert_eq!(parse_decimal("-2.5"), dec!(-2.5));
        assert_eq!(parse_decimal("abc"), Decimal::ZERO);
    }

    #[test]
    fn test_envelope_decoding() {
        let body = r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","lotSz":"0.01","tickSz":"0.1","minSz":"0.01","ctVal":"0.01"}]}"#;
        let env: Envelope<Instrument> = serde_json::from_str(body).unwrap();
        assert_eq!(env.code, "0");
        assert_eq!(env.data[0].lot_sz, "0.01");
        assert_eq!(env.data[0].tick_sz, "0.1");
    }

    #[test]
    fn test_order_request_encoding() {
        let req = PlaceOrderRequest {
            inst_id: "BTC-USDT-SWAP".to_string(),
            td_mode: ISOLATED.to_string(),
            side: OrderSide::Buy,
            ord_type: OrderType::Market,
            sz: "1.00".to_string(),
            pos_side: Some(PositionSide::Long),
            cl_ord_id: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["instId"], "BTC-USDT-SWAP");
        assert_eq!(json["tdMode"], "isolated");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["ordType"], "market");
        assert_eq!(json["posSide"], "long");
        assert!(json.get("clOrdId").is_none());
    }
}
