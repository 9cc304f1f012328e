//! nft-rarity Runtime
//!
//! Ties the fetch layer, the data sources and the rarity engine together:
//! - Project configuration (TOML)
//! - Collection assembly from tokens and marketplace assets
//! - Collection and trait floors, daily floor history
//! - The crawl pipeline producing scored snapshots

pub mod config;
pub mod assembler;
pub mod floor;
pub mod pipeline;

pub use config::*;
pub use assembler::*;
pub use floor::*;
pub use pipeline::*;
