//! Extraction and serialization of context-sensitive JVM call graphs.
//!
//! A [`crate::core::GraphEngine`] builds the graph; [`crate::core::Engine`] walks it,
//! resolves contexts and call sites, and writes chunked JSON or TSV output.

pub mod config;
pub mod core;
pub mod error;

pub use config::Config;
pub use error::{ExtractError, Result};
