//! Append-only JSON-lines audit trail.
//!
//! One file per outcome so a missing post can be traced after the fact.
//! Write failures are logged and swallowed.

use serde_json::{json, Value as Json};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Skipped,
    Posted,
    Failed,
}

impl AuditKind {
    pub fn file_name(self) -> &'static str {
        match self {
            AuditKind::Skipped => "skipped_events.log",
            AuditKind::Posted => "successful_posts.log",
            AuditKind::Failed => "failed_posts.log",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    dir: Option<PathBuf>,
}

impl AuditLog {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            debug!(dir = %dir.display(), error = %e, "audit directory not created");
        }
        Self { dir: Some(dir) }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Append `entry` with a `timestamp` field added.
    pub fn record(&self, kind: AuditKind, entry: Json) {
        let Some(dir) = &self.dir else {
            return;
        };
        let mut line = match entry {
            Json::Object(map) => Json::Object(map),
            other => json!({ "entry": other }),
        };
        line["timestamp"] = Json::String(chrono::Utc::now().to_rfc3339());

        let path = dir.join(kind.file_name());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            debug!(path = %path.display(), error = %e, "audit write failed");
        }
    }
}
