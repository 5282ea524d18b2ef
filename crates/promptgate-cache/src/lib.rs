//! Response cache for promptgate.
//!
//! The fast path is cache-aside: normalize the prompt into a key, read the
//! shared store, and only call the compute service on a miss.

pub mod keys;
pub mod memory;
pub mod service;
pub mod types;

pub use keys::{CACHE_NAMESPACE, cache_key, normalize_prompt};
pub use memory::MemoryStore;
pub use service::{DEFAULT_CACHE_TTL, ResponseCache};
pub use types::{CacheStats, CacheStatsSnapshot, CachedResponse, ResponseSource};
