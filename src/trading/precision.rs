//! Instrument precision cache and the numeric formatter built on it.
//!
//! OKX rejects sizes and prices that are not multiples of the instrument's
//! `lotSz` / `tickSz`. The formatter renders values at the number of decimals
//! those steps imply, fetching instrument metadata lazily and caching it.
//! Formatting never fails: when metadata is unavailable it falls back to fixed
//! defaults so a live trading action is not blocked by a metadata hiccup.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, error, warn};

use crate::api::types::INST_TYPE_SWAP;
use crate::api::OkxApi;
use crate::config::TraderConfig;
use crate::error::{Result, TraderError};
use crate::models::symbol::to_inst_id;

/// Which increment of an instrument a precision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecisionKind {
    /// Order size, derived from `lotSz`
    Quantity,
    /// Price, derived from `tickSz`
    Price,
}

#[derive(Debug, Clone, Copy)]
struct CachedPrecision {
    digits: u32,
    cached_at: Instant,
}

/// Concurrent `(instId, kind) -> decimal digits` cache with optional expiry.
pub struct PrecisionCache {
    entries: DashMap<(String, PrecisionKind), CachedPrecision>,
    ttl: Option<Duration>,
}

impl PrecisionCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn is_fresh(&self, entry: &CachedPrecision) -> bool {
        match self.ttl {
            Some(ttl) => entry.cached_at.elapsed() < ttl,
            None => true,
        }
    }

    /// Cached digits, if present and not expired.
    pub fn get(&self, inst_id: &str, kind: PrecisionKind) -> Option<u32> {
        self.entries
            .get(&(inst_id.to_string(), kind))
            .filter(|e| self.is_fresh(e))
            .map(|e| e.digits)
    }

    /// Store digits unless a fresh value is already present; returns the value in effect.
    pub fn store(&self, inst_id: &str, kind: PrecisionKind, digits: u32) -> u32 {
        let fresh = CachedPrecision {
            digits,
            cached_at: Instant::now(),
        };
        match self.entries.entry((inst_id.to_string(), kind)) {
            Entry::Occupied(mut e) => {
                if self.is_fresh(e.get()) {
                    e.get().digits
                } else {
                    e.insert(fresh);
                    digits
                }
            }
            Entry::Vacant(e) => {
                e.insert(fresh);
                digits
            }
        }
    }

    /// Drop both cached precisions of an instrument.
    pub fn invalidate(&self, inst_id: &str) {
        self.entries.retain(|(id, _), _| id != inst_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Number of decimal digits implied by a step size ("0.001" -> 3, "1" -> 0).
///
/// Returns `None` for empty, malformed, or non-positive steps.
pub fn step_digits(step: &str) -> Option<u32> {
    let step = Decimal::from_str(step).ok()?;
    if step <= Decimal::ZERO {
        return None;
    }
    Some(step.normalize().scale())
}

/// Render `value` with exactly `digits` decimals.
pub fn render(value: Decimal, digits: u32, strategy: RoundingStrategy) -> String {
    let mut rounded = value.round_dp_with_strategy(digits, strategy);
    rounded.rescale(digits);
    rounded.to_string()
}

/// Formats quantities and prices at instrument precision. Sole owner of the precision cache.
pub struct NumericFormatter {
    api: Arc<dyn OkxApi>,
    cache: PrecisionCache,
    failures: DashMap<String, u32>,
    failure_threshold: u32,
    fallback_quantity_digits: u32,
    fallback_price_digits: u32,
}

impl NumericFormatter {
    pub fn new(api: Arc<dyn OkxApi>, config: &TraderConfig) -> Self {
        Self {
            api,
            cache: PrecisionCache::new(config.precision_ttl()),
            failures: DashMap::new(),
            failure_threshold: config.precision_failure_threshold,
            fallback_quantity_digits: config.fallback_quantity_digits,
            fallback_price_digits: config.fallback_price_digits,
        }
    }

    fn fallback(&self, kind: PrecisionKind) -> u32 {
        match kind {
            PrecisionKind::Quantity => self.fallback_quantity_digits,
            PrecisionKind::Price => self.fallback_price_digits,
        }
    }

    /// Decimal digits for an instrument, fetching metadata on a cache miss.
    ///
    /// Never fails; a lookup error yields the fallback precision for `kind`.
    pub async fn precision(&self, inst_id: &str, kind: PrecisionKind) -> u32 {
        if let Some(digits) = self.cache.get(inst_id, kind) {
            return digits;
        }

        match self.fetch(inst_id, kind).await {
            Ok(digits) => {
                self.failures.remove(inst_id);
                digits
            }
            Err(e) => {
                let fallback = self.fallback(kind);
                let consecutive = self.record_failure(inst_id);
                if self.is_escalated(consecutive) {
                    error!(
                        inst_id = %inst_id,
                        kind = ?kind,
                        consecutive,
                        fallback,
                        error = %e,
                        "Instrument precision repeatedly unavailable, still using fallback"
                    );
                } else {
                    warn!(
                        inst_id = %inst_id,
                        kind = ?kind,
                        fallback,
                        error = %e,
                        "Instrument precision unavailable, using fallback"
                    );
                }
                fallback
            }
        }
    }

    /// Bump the consecutive failure count for `inst_id` and return it.
    fn record_failure(&self, inst_id: &str) -> u32 {
        let mut count = self.failures.entry(inst_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn is_escalated(&self, consecutive: u32) -> bool {
        consecutive >= self.failure_threshold
    }

    /// Fetch metadata and cache both precisions of the instrument.
    async fn fetch(&self, inst_id: &str, kind: PrecisionKind) -> Result<u32> {
        let instruments = self
            .api
            .instruments(INST_TYPE_SWAP, inst_id)
            .await
            .map_err(|e| TraderError::transport("get_instrument", inst_id, e))?;

        let instrument = instruments
            .into_iter()
            .next()
            .ok_or_else(|| TraderError::NotFound(format!("instrument {}", inst_id)))?;

        let lot = step_digits(&instrument.lot_sz);
        let tick = step_digits(&instrument.tick_sz);

        debug!(
            inst_id = %inst_id,
            lot_sz = %instrument.lot_sz,
            tick_sz = %instrument.tick_sz,
            "Instrument precision loaded"
        );

        let quantity = lot.map(|d| self.cache.store(inst_id, PrecisionKind::Quantity, d));
        let price = tick.map(|d| self.cache.store(inst_id, PrecisionKind::Price, d));

        let (digits, field, raw) = match kind {
            PrecisionKind::Quantity => (quantity, "lotSz", &instrument.lot_sz),
            PrecisionKind::Price => (price, "tickSz", &instrument.tick_sz),
        };
        digits.ok_or_else(|| {
            TraderError::InvalidInput(format!("{} has unusable {} {:?}", inst_id, field, raw))
        })
    }

    /// Render an order size for `symbol` (canonical or instrument ID), rounding toward zero.
    pub async fn format_quantity(&self, symbol: &str, quantity: Decimal) -> String {
        let inst_id = to_inst_id(symbol);
        let digits = self.precision(&inst_id, PrecisionKind::Quantity).await;
        render(quantity, digits, RoundingStrategy::ToZero)
    }

    /// Render a price for `symbol` (canonical or instrument ID), rounding half away from zero.
    pub async fn format_price(&self, symbol: &str, price: Decimal) -> String {
        let inst_id = to_inst_id(symbol);
        let digits = self.precision(&inst_id, PrecisionKind::Price).await;
        render(price, digits, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Forget cached precision for `symbol` so the next format refetches it.
    pub fn invalidate(&self, symbol: &str) {
        let inst_id = to_inst_id(symbol);
        self.cache.invalidate(&inst_id);
        self.failures.remove(&inst_id);
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.failures.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
