//! Lookup cache
//!
//! A bounded, in-process LRU cache with a fixed time-to-live per entry. It
//! sits in front of the student directory so that repeated scans of the same
//! card skip the repository.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! capacity = 5
//! ttl_seconds = 3600
//! purge_interval_seconds = 300
//! ```

mod clock;
mod config;
mod lock;
mod ttl;

pub(crate) use lock::mutex_lock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use ttl::{CacheError, TtlCache};
