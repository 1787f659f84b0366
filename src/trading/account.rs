//! Account balance and open-position queries, normalized from OKX payloads.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::types::{parse_decimal, AccountBalance, PositionData, INST_TYPE_SWAP, MARGIN_CCY};
use crate::api::OkxApi;
use crate::error::{Result, TraderError};
use crate::models::symbol::{to_canonical, to_inst_id};
use crate::models::{BalanceSummary, Position, PositionSide};

/// Reads balances and positions. Holds no state besides the API handle.
pub struct PositionReader {
    api: Arc<dyn OkxApi>,
}

impl PositionReader {
    pub fn new(api: Arc<dyn OkxApi>) -> Self {
        Self { api }
    }

    /// USDT account balance.
    pub async fn balance(&self) -> Result<BalanceSummary> {
        info!("Fetching OKX account balance");

        let accounts = self
            .api
            .account_balance(MARGIN_CCY)
            .await
            .map_err(|e| TraderError::transport("get_balance", MARGIN_CCY, e))?;

        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| TraderError::NotFound("OKX returned no account record".to_string()))?;

        Ok(summarize(&account))
    }

    /// All open swap positions, in the order OKX returns them.
    pub async fn positions(&self) -> Result<Vec<Position>> {
        info!("Fetching OKX positions");

        let data = self
            .api
            .positions(INST_TYPE_SWAP, None)
            .await
            .map_err(|e| TraderError::transport("get_positions", "*", e))?;

        Ok(data.iter().filter_map(normalize).collect())
    }

    /// The open position on one side of `symbol`, or `None` when there is none.
    pub async fn position(&self, symbol: &str, side: PositionSide) -> Result<Option<Position>> {
        let inst_id = to_inst_id(symbol);

        let data = self
            .api
            .positions(INST_TYPE_SWAP, Some(&inst_id))
            .await
            .map_err(|e| TraderError::transport("get_position", symbol, e))?;

        let found = data
            .iter()
            .filter_map(normalize)
            .find(|p| p.side == side);

        debug!(symbol = %symbol, side = %side, found = found.is_some(), "Position lookup");
        Ok(found)
    }
}

fn summarize(account: &AccountBalance) -> BalanceSummary {
    let usdt = account.details.iter().find(|d| d.ccy == MARGIN_CCY);

    let total_equity = parse_decimal(&account.total_eq);
    let unrealized = parse_decimal(&account.upl);

    // Account-level availEq is empty for some account modes
    let available = if account.avail_eq.is_empty() {
        usdt.map(|d| parse_decimal(&d.avail_eq)).unwrap_or(Decimal::ZERO)
    } else {
        parse_decimal(&account.avail_eq)
    };

    BalanceSummary::from_equity(total_equity, available, unrealized)
}

/// Convert a raw position, dropping empty ones and ones with an unrecognized side.
fn normalize(data: &PositionData) -> Option<Position> {
    let amount = parse_decimal(&data.pos).abs();
    if amount.is_zero() {
        return None;
    }

    let side = match data.pos_side.parse::<PositionSide>() {
        Ok(side) => side,
        // net mode: the sign of `pos` carries the direction
        Err(_) if data.pos_side == "net" => {
            if parse_decimal(&data.pos).is_sign_negative() {
                PositionSide::Short
            } else {
                PositionSide::Long
            }
        }
        Err(e) => {
            warn!(inst_id = %data.inst_id, error = %e, "Skipping position with unknown side");
            return None;
        }
    };

    Some(Position {
        symbol: to_canonical(&data.inst_id),
        side,
        amount,
        entry_price: parse_decimal(&data.avg_px),
        mark_price: parse_decimal(&data.mark_px),
        unrealized_pnl: parse_decimal(&data.upl),
        leverage: parse_decimal(&data.lever),
        liquidation_price: parse_decimal(&data.liq_px),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::BalanceDetail;
    use crate::testing::MockApi;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_balance_arithmetic() {
        let api = MockApi {
            balances: vec![AccountBalance {
                total_eq: "1000".to_string(),
                upl: "50".to_string(),
                avail_eq: "800".to_string(),
                details: vec![],
            }],
            ..MockApi::default()
        }
        .into_arc();

        let balance = PositionReader::new(api).balance().await.unwrap();

        assert_eq!(balance.total_wallet_balance, dec!(950));
        assert_eq!(balance.available_balance, dec!(800));
        assert_eq!(balance.total_unrealized_profit, dec!(50));
    }

    #[tokio::test]
    async fn test_balance_uses_detail_when_account_avail_missing() {
        let api = MockApi {
            balances: vec![AccountBalance {
                total_eq: "500".to_string(),
                upl: "-20".to_string(),
                avail_eq: String::new(),
                details: vec![BalanceDetail {
                    ccy: "USDT".to_string(),
                    avail_eq: "430".to_string(),
                    ..BalanceDetail::default()
                }],
            }],
            ..MockApi::default()
        }
        .into_arc();

        let balance = PositionReader::new(api).balance().await.unwrap();

        assert_eq!(balance.total_wallet_balance, dec!(520));
        assert_eq!(balance.available_balance, dec!(430));
    }

    #[tokio::test]
    async fn test_balance_without_account_record() {
        let api = MockApi::default().into_arc();
        let err = PositionReader::new(api).balance().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_positions_filter_zero_amounts() {
        let api = MockApi::default()
            .with_position("BTC-USDT-SWAP", "long", "0")
            .with_position("ETH-USDT-SWAP", "short", "2.5")
            .into_arc();

        let positions = PositionReader::new(api).positions().await.unwrap();

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "ETHUSDT");
        assert_eq!(positions[0].side, PositionSide::Short);
        assert_eq!(positions[0].amount, dec!(2.5));
        assert_eq!(positions[0].leverage, dec!(5));
    }

    #[tokio::test]
    async fn test_positions_keep_source_order() {
        let api = MockApi::default()
            .with_position("SOL-USDT-SWAP", "long", "10")
            .with_position("BTC-USDT-SWAP", "short", "1")
            .with_position("ADA-USDT-SWAP", "long", "100")
            .into_arc();

        let symbols: Vec<String> = PositionReader::new(api)
            .positions()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.symbol)
            .collect();

        assert_eq!(symbols, vec!["SOLUSDT", "BTCUSDT", "ADAUSDT"]);
    }

    #[tokio::test]
    async fn test_specific_position() {
        let api = MockApi::default()
            .with_position("BTC-USDT-SWAP", "short", "1")
            .with_position("BTC-USDT-SWAP", "long", "2")
            .with_position("ETH-USDT-SWAP", "long", "7")
            .into_arc();
        let reader = PositionReader::new(api);

        let long = reader.position("BTCUSDT", PositionSide::Long).await.unwrap();
        assert_eq!(long.map(|p| p.amount), Some(dec!(2)));

        let missing = reader.position("SOLUSDT", PositionSide::Long).await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_net_mode_position_side() {
        let data = PositionData {
            inst_id: "BTC-USDT-SWAP".to_string(),
            pos_side: "net".to_string(),
            pos: "-3".to_string(),
            ..PositionData::default()
        };
        let position = normalize(&data).unwrap();
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.amount, dec!(3));
    }
}
