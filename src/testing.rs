//! In-memory `OkxApi` fake shared by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::types::*;
use crate::api::OkxApi;
use crate::error::ApiError;

/// Scripted exchange. Unset fields behave like an empty, healthy account.
#[derive(Default)]
pub struct MockApi {
    pub server_time_fails: bool,
    pub balances: Vec<AccountBalance>,
    pub positions: Vec<PositionData>,
    /// `None` makes instrument lookups fail
    pub instruments: Option<Vec<Instrument>>,
    pub tickers: Vec<Ticker>,
    /// `None` answers order placement with an empty data array
    pub order_ack: Option<OrderAck>,
    pub algo_ack: Option<AlgoAck>,
    /// Generic set-leverage failure (code, msg)
    pub leverage_error: Option<(String, String)>,
    /// Popped per pending-algo listing call; `Err(status)` fails that call
    pub algo_listings: Mutex<VecDeque<Result<Vec<AlgoOrder>, u16>>>,
    /// Algo IDs whose cancellation is rejected
    pub failing_cancels: HashSet<String>,

    pub leverage: Mutex<HashMap<String, String>>,
    pub placed_orders: Mutex<Vec<PlaceOrderRequest>>,
    pub placed_algos: Mutex<Vec<PlaceAlgoOrderRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
    pub instrument_calls: AtomicUsize,
    /// Instrument lookups that fail before `instruments` is served
    pub instrument_failures: AtomicUsize,
}

impl MockApi {
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn with_instrument(mut self, inst_id: &str, lot_sz: &str, tick_sz: &str) -> Self {
        self.instruments
            .get_or_insert_with(Vec::new)
            .push(Instrument {
                inst_id: inst_id.to_string(),
                lot_sz: lot_sz.to_string(),
                tick_sz: tick_sz.to_string(),
                ..Instrument::default()
            });
        self
    }

    pub fn failing_instruments(self, times: usize) -> Self {
        self.instrument_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn with_position(mut self, inst_id: &str, pos_side: &str, pos: &str) -> Self {
        self.positions.push(PositionData {
            inst_id: inst_id.to_string(),
            pos_side: pos_side.to_string(),
            pos: pos.to_string(),
            avg_px: "100".to_string(),
            mark_px: "101".to_string(),
            upl: "1".to_string(),
            lever: "5".to_string(),
            liq_px: "80".to_string(),
            mgn_mode: ISOLATED.to_string(),
        });
        self
    }

    pub fn accepting_orders(mut self) -> Self {
        self.order_ack = Some(OrderAck {
            ord_id: "312269865356374016".to_string(),
            cl_ord_id: String::new(),
            s_code: "0".to_string(),
            s_msg: String::new(),
        });
        self.algo_ack = Some(AlgoAck {
            algo_id: "algo-new".to_string(),
            s_code: "0".to_string(),
            s_msg: String::new(),
        });
        self
    }

    pub fn with_algo_listing(self, listing: Result<Vec<AlgoOrder>, u16>) -> Self {
        self.algo_listings
            .lock()
            .unwrap()
            .push_back(listing);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn algo(algo_id: &str, sl: &str, tp: &str) -> AlgoOrder {
    AlgoOrder {
        algo_id: algo_id.to_string(),
        inst_id: "BTC-USDT-SWAP".to_string(),
        ord_type: ALGO_CONDITIONAL.to_string(),
        sl_trigger_px: sl.to_string(),
        tp_trigger_px: tp.to_string(),
        ..AlgoOrder::default()
    }
}

#[async_trait]
impl OkxApi for MockApi {
    async fn server_time(&self) -> Result<Vec<ServerTime>, ApiError> {
        self.record("server_time".to_string());
        if self.server_time_fails {
            return Err(ApiError::Exchange {
                code: "50113".to_string(),
                msg: "Invalid Sign".to_string(),
            });
        }
        Ok(vec![ServerTime {
            ts: "1700000000000".to_string(),
        }])
    }

    async fn account_balance(&self, ccy: &str) -> Result<Vec<AccountBalance>, ApiError> {
        self.record(format!("account_balance:{}", ccy));
        Ok(self.balances.clone())
    }

    async fn positions(
        &self,
        inst_type: &str,
        inst_id: Option<&str>,
    ) -> Result<Vec<PositionData>, ApiError> {
        self.record(format!("positions:{}:{}", inst_type, inst_id.unwrap_or("*")));
        Ok(self
            .positions
            .iter()
            .filter(|p| inst_id.map_or(true, |id| p.inst_id == id))
            .cloned()
            .collect())
    }

    async fn set_leverage(&self, req: &SetLeverageRequest) -> Result<(), ApiError> {
        self.record(format!("set_leverage:{}:{}", req.inst_id, req.lever));
        if let Some((code, msg)) = &self.leverage_error {
            return Err(ApiError::Exchange {
                code: code.clone(),
                msg: msg.clone(),
            });
        }
        let key = match req.pos_side {
            Some(side) => format!("{}:{}", req.inst_id, side),
            None => req.inst_id.clone(),
        };
        let mut leverage = self.leverage.lock().unwrap();
        if leverage.get(&key) == Some(&req.lever) {
            return Err(ApiError::Exchange {
                code: "1".to_string(),
                msg: "Leverage not change".to_string(),
            });
        }
        leverage.insert(key, req.lever.clone());
        Ok(())
    }

    async fn place_order(&self, req: &PlaceOrderRequest) -> Result<Vec<OrderAck>, ApiError> {
        self.record(format!("place_order:{}:{}:{}", req.inst_id, req.side, req.sz));
        self.placed_orders.lock().unwrap().push(req.clone());
        Ok(self
            .order_ack
            .clone()
            .map(|mut ack| {
                ack.cl_ord_id = req.cl_ord_id.clone().unwrap_or_default();
                ack
            })
            .into_iter()
            .collect())
    }

    async fn place_algo_order(
        &self,
        req: &PlaceAlgoOrderRequest,
    ) -> Result<Vec<AlgoAck>, ApiError> {
        self.record(format!("place_algo_order:{}:{}", req.inst_id, req.side));
        self.placed_algos.lock().unwrap().push(req.clone());
        Ok(self.algo_ack.clone().into_iter().collect())
    }

    async fn pending_algo_orders(
        &self,
        inst_id: &str,
        ord_type: &str,
    ) -> Result<Vec<AlgoOrder>, ApiError> {
        self.record(format!("pending_algo_orders:{}:{}", inst_id, ord_type));
        let next = self.algo_listings.lock().unwrap().pop_front();
        match next {
            Some(Ok(orders)) => Ok(orders),
            Some(Err(status)) => Err(ApiError::Status {
                status,
                body: "listing failed".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn cancel_algo_orders(
        &self,
        reqs: &[CancelAlgoRequest],
    ) -> Result<Vec<AlgoAck>, ApiError> {
        let mut acks = Vec::new();
        for req in reqs {
            self.record(format!("cancel_algo:{}", req.algo_id));
            let s_code = if self.failing_cancels.contains(&req.algo_id) {
                "51400"
            } else {
                self.cancelled.lock().unwrap().push(req.algo_id.clone());
                "0"
            };
            acks.push(AlgoAck {
                algo_id: req.algo_id.clone(),
                s_code: s_code.to_string(),
                s_msg: if s_code == "0" {
                    String::new()
                } else {
                    "Cancellation failed as the order does not exist".to_string()
                },
            });
        }
        Ok(acks)
    }

    async fn ticker(&self, inst_id: &str) -> Result<Vec<Ticker>, ApiError> {
        self.record(format!("ticker:{}", inst_id));
        Ok(self
            .tickers
            .iter()
            .filter(|t| t.inst_id == inst_id)
            .cloned()
            .collect())
    }

    async fn instruments(
        &self,
        inst_type: &str,
        inst_id: &str,
    ) -> Result<Vec<Instrument>, ApiError> {
        self.instrument_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("instruments:{}:{}", inst_type, inst_id));
        let failing = self
            .instrument_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ApiError::Status {
                status: 503,
                body: "instruments unavailable".to_string(),
            });
        }
        match &self.instruments {
            Some(list) => Ok(list
                .iter()
                .filter(|i| i.inst_id == inst_id)
                .cloned()
                .collect()),
            None => Err(ApiError::Status {
                status: 503,
                body: "instruments unavailable".to_string(),
            }),
        }
    }
}
