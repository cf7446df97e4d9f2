//! Scrypt Mining Client
//!
//! An async getwork mining client for scrypt proof-of-work chains:
//! - JSON-RPC `getwork` work fetching and solution submission
//! - Header decoding from the getwork word order into hashing order
//! - scrypt (N=1024, r=1, p=1) nonce search with cooperative cancellation
//! - Retry of transient failures with exponential backoff

pub mod client;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod header;
pub mod logging;
pub mod search;
pub mod types;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use header::{BlockHeader, HeaderBuilder};
pub use search::{NonceSearcher, SearchOutcome};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "scrypt-mining-client";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
