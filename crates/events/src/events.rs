//! Domain-grouped event types

use serde::{Deserialize, Serialize};

/// Top-level application event, grouped by functional domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain")]
pub enum AppEvent {
    Plan(PlanEvent),
    Download(DownloadEvent),
    Verify(VerifyEvent),
    Relay(RelayEvent),
    General(GeneralEvent),
}

/// Transaction planning events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlanEvent {
    /// Dry-run invocation of the package tool started
    Started { command: String },

    /// Plan fully parsed
    Parsed {
        missing_files: usize,
        total_size: u64,
    },
}

/// Download coordinator events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// A transfer was admitted into the active window. `seq` counts
    /// admissions, starting at 1.
    Admitted {
        seq: usize,
        total: usize,
        name: String,
        url: String,
    },

    /// A transfer finished successfully. `seq` counts completions, so the
    /// order of these events reflects completion order, not admission order.
    Completed {
        seq: usize,
        total: usize,
        name: String,
    },
}

/// Checksum verification and promotion events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VerifyEvent {
    Started { name: String, algorithm: String },

    /// Verified file atomically moved into the package cache
    Promoted { name: String },
}

/// Interactive apply-phase relay events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    Started { command: String },

    /// No pseudo-terminal was available; the subprocess runs with
    /// inherited standard streams instead.
    PtyFallback { reason: String },
}

/// General-purpose events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Plain informational line for the user
    Message { message: String },

    Warning { message: String },

    DebugLog { message: String },
}
