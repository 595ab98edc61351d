//! Diagnostic metadata recorded in lock files.

use crate::error::{CacheLockError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata written into a lock file on acquisition.
///
/// Only the lock-file backend persists this; it exists so a contended or
/// abandoned lock can be attributed to a holder when diagnosing timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the lock holder (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Timestamp when the lock was acquired (RFC3339).
    pub created_at: DateTime<Utc>,

    /// The operation being serialized ("read" or "write").
    pub action: String,
}

impl LockMetadata {
    /// Create new lock metadata with the current timestamp.
    pub fn new(action: &str) -> Self {
        Self {
            owner: get_owner_string(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
            action: action.to_string(),
        }
    }

    /// Parse lock metadata from a lock file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            CacheLockError::Lock(format!(
                "could not read lock metadata from '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            CacheLockError::Lock(format!(
                "lock metadata in '{}' is not valid JSON: {}",
                path.display(),
                e
            ))
        })
    }

    /// Serialize lock metadata to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            CacheLockError::Lock(format!("could not serialize lock metadata: {}", e))
        })
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        }
    }

    /// One-line description for timeout diagnostics.
    ///
    /// Metadata survives release, so this names the *last recorded*
    /// holder, which may no longer hold the primitive.
    pub fn describe(&self) -> String {
        format!(
            "last recorded holder: {} (pid {}, action: {}, recorded {} ago)",
            self.owner,
            self.pid.map_or_else(|| "?".to_string(), |p| p.to_string()),
            self.action,
            self.age_string()
        )
    }
}

/// `user@host` identifying the acquiring process.
fn get_owner_string() -> String {
    let user = ["USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "unknown".to_string());

    match hostname::get() {
        Ok(host) => format!("{}@{}", user, host.to_string_lossy()),
        Err(_) => format!("{}@unknown", user),
    }
}
