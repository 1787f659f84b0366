//! Mapping between canonical tickers ("BTCUSDT") and OKX swap instrument IDs ("BTC-USDT-SWAP").

/// Quote asset every supported perpetual swap is margined in.
pub const QUOTE_ASSET: &str = "USDT";

/// Suffix OKX uses for USDT-margined perpetual swaps.
pub const SWAP_SUFFIX: &str = "-USDT-SWAP";

/// Convert a canonical symbol to its OKX instrument ID.
///
/// Already-translated IDs pass through unchanged, so callers may hand either
/// form to the formatter.
pub fn to_inst_id(symbol: &str) -> String {
    if symbol.ends_with(SWAP_SUFFIX) {
        return symbol.to_string();
    }
    match symbol.strip_suffix(QUOTE_ASSET) {
        Some(base) => format!("{}{}", base, SWAP_SUFFIX),
        None => format!("{}{}", symbol, SWAP_SUFFIX),
    }
}

/// Convert an OKX instrument ID back to its canonical symbol.
///
/// IDs without the swap suffix are returned unchanged.
pub fn to_canonical(inst_id: &str) -> String {
    match inst_id.strip_suffix(SWAP_SUFFIX) {
        Some(base) => format!("{}{}", base, QUOTE_ASSET),
        None => inst_id.to_string(),
    }
}
