//! Flow network access.
//!
//! - `FlowClient`: REST access node client
//! - `TransactionFetcher`: transaction event lists, retried across indexing lag
//! - `types`: wire shapes of the REST API

pub mod client;
pub mod fetcher;
pub mod types;

pub use client::{FetchError, FlowClient};
pub use fetcher::{TransactionFetcher, TxEventSource, TxEvents};
