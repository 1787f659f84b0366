//! The REST surface the trading core consumes.

use async_trait::async_trait;

use crate::error::ApiError;

use super::types::*;

/// Authenticated OKX v5 REST endpoints used by the trading core.
///
/// Every method returns the envelope's `data` array. Order endpoints return
/// per-item acknowledgements even when OKX flags the envelope itself as failed,
/// so callers can read `sCode`/`sMsg`.
#[async_trait]
pub trait OkxApi: Send + Sync {
    /// GET /api/v5/public/time
    async fn server_time(&self) -> Result<Vec<ServerTime>, ApiError>;

    /// GET /api/v5/account/balance
    async fn account_balance(&self, ccy: &str) -> Result<Vec<AccountBalance>, ApiError>;

    /// GET /api/v5/account/positions, filtered by instrument type and optionally instrument.
    async fn positions(
        &self,
        inst_type: &str,
        inst_id: Option<&str>,
    ) -> Result<Vec<PositionData>, ApiError>;

    /// POST /api/v5/account/set-leverage
    async fn set_leverage(&self, req: &SetLeverageRequest) -> Result<(), ApiError>;

    /// POST /api/v5/trade/order
    async fn place_order(&self, req: &PlaceOrderRequest) -> Result<Vec<OrderAck>, ApiError>;

    /// POST /api/v5/trade/order-algo
    async fn place_algo_order(&self, req: &PlaceAlgoOrderRequest)
        -> Result<Vec<AlgoAck>, ApiError>;

    /// GET /api/v5/trade/orders-algo-pending
    async fn pending_algo_orders(
        &self,
        inst_id: &str,
        ord_type: &str,
    ) -> Result<Vec<AlgoOrder>, ApiError>;

    /// POST /api/v5/trade/cancel-algos
    async fn cancel_algo_orders(&self, reqs: &[CancelAlgoRequest])
        -> Result<Vec<AlgoAck>, ApiError>;

    /// GET /api/v5/market/ticker
    async fn ticker(&self, inst_id: &str) -> Result<Vec<Ticker>, ApiError>;

    /// GET /api/v5/public/instruments
    async fn instruments(&self, inst_type: &str, inst_id: &str)
        -> Result<Vec<Instrument>, ApiError>;
}
