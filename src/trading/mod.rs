//! Trading core: precision, account queries, leverage, orders, protection.

mod account;
mod contingent;
mod leverage;
mod orders;
mod precision;
mod trader;

pub use account::PositionReader;
pub use contingent::ContingentOrderManager;
pub use leverage::{LeverageChange, LeverageManager};
pub use orders::OrderPlacer;
pub use precision::{render, step_digits, NumericFormatter, PrecisionCache, PrecisionKind};
pub use trader::OkxTrader;
