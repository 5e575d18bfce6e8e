//! Top-level driver: polling, per-event handling, status and audit.

pub mod audit;
pub mod handler;
pub mod poller;
pub mod stats;

pub use audit::{AuditKind, AuditLog};
pub use handler::{Outcome, Pipeline, Publishing, SaleHandler, SkipReason};
pub use poller::{chunk_ranges, BlockPoller, BlockSource, PollerConfig};
pub use stats::Stats;
