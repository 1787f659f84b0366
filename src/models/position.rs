//! Open position and account balance snapshots, normalized from OKX payloads.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::OrderSide;

/// Side of a hedged (long/short mode) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    /// Trade direction that opens a position on this side.
    pub fn opening_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Trade direction that reduces a position on this side.
    pub fn closing_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            other => Err(format!("unknown position side: {}", other)),
        }
    }
}

/// Open perpetual swap position. The exchange is the source of truth; this is a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Canonical symbol (e.g. "BTCUSDT")
    pub symbol: String,

    pub side: PositionSide,

    /// Position size in contracts, always non-negative
    pub amount: Decimal,

    pub entry_price: Decimal,

    pub mark_price: Decimal,

    pub unrealized_pnl: Decimal,

    pub leverage: Decimal,

    pub liquidation_price: Decimal,
}

impl Position {
    /// Notional value at the current mark price.
    pub fn notional(&self) -> Decimal {
        self.amount * self.mark_price
    }
}

/// Account balance summary for the USDT margin currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    /// Equity excluding unrealized P&L
    pub total_wallet_balance: Decimal,

    pub available_balance: Decimal,

    pub total_unrealized_profit: Decimal,
}

impl BalanceSummary {
    /// Build a summary from total equity, available equity and unrealized P&L.
    pub fn from_equity(total_equity: Decimal, available: Decimal, unrealized_pnl: Decimal) -> Self {
        Self {
            total_wallet_balance: total_equity - unrealized_pnl,
            available_balance: available,
            total_unrealized_profit: unrealized_pnl,
        }
    }
}
