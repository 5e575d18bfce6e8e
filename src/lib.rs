//! Shared library modules for the pinbot sale monitor.
//!
//! Re-exports modules needed by the daemon and the standalone inspection
//! binaries.

pub mod cadence;
pub mod config;
pub mod flow;
pub mod metadata;
pub mod monitor;
pub mod notify;
pub mod price;
pub mod retry;
pub mod sale;
