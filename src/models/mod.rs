//! Data models for positions, balances, orders, and symbol translation.

mod order;
mod position;
pub mod symbol;

pub use order::{
    CancelReport, ContingentKind, ContingentOrderSpec, OrderResult, OrderSide, OrderStatus,
    OrderType,
};
pub use position::{BalanceSummary, Position, PositionSide};
