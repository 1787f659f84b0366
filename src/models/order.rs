//! Order-side vocabulary shared by the order placer and the contingent order manager.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::position::PositionSide;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type. Only market orders are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
}

/// Reported status of a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Market orders are assumed to fill immediately
    Filled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Filled => f.write_str("FILLED"),
        }
    }
}

/// Normalized result of a market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    /// Exchange-assigned order ID
    pub order_id: String,

    /// Client order ID sent with the request
    #[serde(default)]
    pub client_order_id: String,

    /// Canonical symbol
    pub symbol: String,

    pub status: OrderStatus,
}

/// Kind of protective trigger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContingentKind {
    StopLoss,
    TakeProfit,
}

impl ContingentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContingentKind::StopLoss => "stop-loss",
            ContingentKind::TakeProfit => "take-profit",
        }
    }
}

impl fmt::Display for ContingentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stop-loss or take-profit order protecting one side of a position.
/// Quantity and trigger price are already rendered at instrument precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingentOrderSpec {
    pub inst_id: String,
    pub pos_side: PositionSide,
    pub kind: ContingentKind,
    pub trigger_price: String,
    pub quantity: String,
}

impl ContingentOrderSpec {
    /// Trade direction of the order executed when the trigger fires.
    pub fn trade_side(&self) -> OrderSide {
        self.pos_side.closing_side()
    }
}

/// Outcome of a best-effort cancellation sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CancelReport {
    /// Algo order IDs that were cancelled
    pub cancelled: Vec<String>,

    /// Failures, one line per listing or cancel that did not go through
    pub failures: Vec<String>,
}

impl CancelReport {
    pub fn merge(&mut self, other: CancelReport) {
        self.cancelled.extend(other.cancelled);
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for CancelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cancelled, {} failed",
            self.cancelled.len(),
            self.failures.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contingent_trade_side() {
        let spec = ContingentOrderSpec {
            inst_id: "BTC-USDT-SWAP".to_string(),
            pos_side: PositionSide::Long,
            kind: ContingentKind::StopLoss,
            trigger_price: "60000.0".to_string(),
            quantity: "0.01".to_string(),
        };
        assert_eq!(spec.trade_side(), OrderSide::Sell);

        let spec = ContingentOrderSpec {
            pos_side: PositionSide::Short,
            ..spec
        };
        assert_eq!(spec.trade_side(), OrderSide::Buy);
    }

    #[test]
    fn test_cancel_report_merge() {
        let mut report = CancelReport {
            cancelled: vec!["1".to_string()],
            failures: vec![],
        };
        report.merge(CancelReport {
            cancelled: vec!["2".to_string()],
            failures: vec!["listing stop-loss failed".to_string()],
        });
        assert_eq!(report.cancelled.len(), 2);
        assert!(!report.is_clean());
        assert_eq!(report.to_string(), "2 cancelled, 1 failed");
    }
}
