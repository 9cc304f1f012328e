//! nft-rarity Fetch Layer
//!
//! Drives all network crawling:
//! - Bounded-concurrency, retrying fetch engine with per-item outcomes
//! - Process-wide scheduler dividing a shared concurrency budget across runs
//! - HTTP transport abstraction with a reqwest client and a scripted test double
//! - `Retry-After` parsing and embedded JSON extraction from token pages

pub mod options;
pub mod response;
pub mod scheduler;
pub mod engine;
pub mod transport;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod retry_after;
pub mod page;
pub mod stats;

pub use options::*;
pub use response::*;
pub use scheduler::*;
pub use engine::*;
pub use transport::*;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::*;
pub use retry_after::*;
pub use page::*;
pub use stats::*;
