//! nft-rarity Data Sources
//!
//! One classifier per data source, plus the helpers they share:
//! - Status classification and the failure taxonomy
//! - Marketplace assets, events and single JSON documents
//! - Token metadata from token URIs and token homepages
//! - Record normalizers, token URI helpers and reveal detection

pub mod classify;
pub mod marketplace;
pub mod normalize;
pub mod uri;
pub mod reveal;
pub mod assets;
pub mod events;
pub mod tokens;
pub mod single;

pub use classify::*;
pub use marketplace::*;
pub use normalize::*;
pub use uri::*;
pub use reveal::*;
pub use assets::*;
pub use events::*;
pub use tokens::*;
pub use single::*;
