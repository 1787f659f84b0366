//! Per-instrument leverage, always in isolated margin mode.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::types::{SetLeverageRequest, ISOLATED};
use crate::api::OkxApi;
use crate::error::{Result, TraderError};
use crate::models::symbol::to_inst_id;
use crate::models::PositionSide;

/// What a leverage request did on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeverageChange {
    Changed,
    /// The requested leverage was already in effect
    Unchanged,
}

pub struct LeverageManager {
    api: Arc<dyn OkxApi>,
    settle_delay: Duration,
}

impl LeverageManager {
    pub fn new(api: Arc<dyn OkxApi>, settle_delay: Duration) -> Self {
        Self { api, settle_delay }
    }

    /// Set isolated-margin leverage for `symbol`.
    ///
    /// An exchange "leverage not changed" answer is success. After a real change
    /// this waits the settling delay so an immediately following order is not
    /// rejected before the change propagates.
    pub async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
        pos_side: Option<PositionSide>,
    ) -> Result<LeverageChange> {
        if leverage == 0 {
            return Err(TraderError::InvalidInput(format!(
                "leverage for {} must be at least 1",
                symbol
            )));
        }

        let inst_id = to_inst_id(symbol);
        info!(inst_id = %inst_id, leverage, pos_side = ?pos_side, "Setting leverage");

        let req = SetLeverageRequest {
            inst_id: inst_id.clone(),
            lever: leverage.to_string(),
            mgn_mode: ISOLATED.to_string(),
            pos_side,
        };

        match self.api.set_leverage(&req).await {
            Ok(()) => {
                info!(inst_id = %inst_id, leverage, "Leverage changed");
                if !self.settle_delay.is_zero() {
                    tokio::time::sleep(self.settle_delay).await;
                }
                Ok(LeverageChange::Changed)
            }
            Err(e) if e.is_leverage_unchanged() => {
                info!(inst_id = %inst_id, leverage, "Leverage already set, no change needed");
                Ok(LeverageChange::Unchanged)
            }
            Err(e) => Err(TraderError::transport("set_leverage", symbol, e)),
        }
    }
}
