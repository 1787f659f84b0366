//! OKX USDT-margined perpetual swap trading.
//!
//! Opens and closes isolated-margin positions, places stop-loss and
//! take-profit orders, and renders quantities and prices at each
//! instrument's precision. Callers speak canonical symbols (`BTCUSDT`);
//! translation to OKX instrument IDs happens inside.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod trading;

#[cfg(test)]
mod testing;

pub use config::{Destination, OkxCredentials, TraderConfig};
pub use error::{ApiError, Result, TraderError};
pub use models::{BalanceSummary, CancelReport, OrderResult, Position, PositionSide};
pub use trading::{LeverageChange, OkxTrader};
