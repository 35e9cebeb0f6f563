//! Market data module.
//!
//! The simulation never fetches data itself. This module defines the provider
//! seam it is fed through, with caching and retry layered on as explicit wrappers.

mod cache;
mod provider;
mod retry;
mod symbols;

pub use cache::{CachedProvider, DEFAULT_CACHE_TTL};
pub use provider::{JsonFileProvider, QuoteProvider};
pub use retry::{RetryPolicy, RetryingProvider, DEFAULT_MAX_DELAY};
pub use symbols::{is_known_alias, resolve_symbol, SYMBOL_ALIASES};
