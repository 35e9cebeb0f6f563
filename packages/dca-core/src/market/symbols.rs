//! Resolution of user-typed instrument names to ticker symbols.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in aliases from common names (English and Korean) to tickers.
pub static SYMBOL_ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut aliases = HashMap::new();

    for (names, ticker) in [
        (&["삼성전자", "samsung electronics", "samsung"][..], "005930.KS"),
        (&["sk하이닉스", "sk hynix"][..], "000660.KS"),
        (&["현대차", "hyundai motor", "hyundai"][..], "005380.KS"),
        (&["애플", "apple"][..], "AAPL"),
        (&["테슬라", "tesla"][..], "TSLA"),
        (&["엔비디아", "nvidia"][..], "NVDA"),
        (&["마이크로소프트", "microsoft"][..], "MSFT"),
        (&["비트코인", "bitcoin"][..], "BTC-USD"),
        (&["나스닥100", "nasdaq100", "nasdaq 100"][..], "QQQ"),
        (&["s&p500", "s&p 500"][..], "SPY"),
        (&["슈드", "schd"][..], "SCHD"),
    ] {
        for name in names {
            aliases.insert(*name, ticker);
        }
    }

    aliases
});

/// Whether `query` matches a built-in alias.
pub fn is_known_alias(query: &str) -> bool {
    SYMBOL_ALIASES.contains_key(query.trim().to_lowercase().as_str())
}

/// Turn a user query into a ticker symbol.
///
/// Known names map through [`SYMBOL_ALIASES`] (case-insensitive). A bare
/// six-digit code is treated as a KRX listing and gets the `.KS` suffix.
/// Anything else is returned trimmed and uppercased.
///
/// # Example
///
/// ```rust
/// use dca_core::resolve_symbol;
///
/// assert_eq!(resolve_symbol("Apple"), "AAPL");
/// assert_eq!(resolve_symbol("005930"), "005930.KS");
/// assert_eq!(resolve_symbol(" vti "), "VTI");
/// ```
pub fn resolve_symbol(query: &str) -> String {
    let query = query.trim();

    if let Some(ticker) = SYMBOL_ALIASES.get(query.to_lowercase().as_str()) {
        return ticker.to_string();
    }

    if query.len() == 6 && query.chars().all(|c| c.is_ascii_digit()) {
        return format!("{}.KS", query);
    }

    query.to_uppercase()
}
