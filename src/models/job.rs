//! Separation job record and state machine
//!
//! A job progresses NEW → ACQUIRED → SUBMITTED → PROCESSING → COMPLETED,
//! or terminally to FAILED when the remote service reports failure.
//! NEW is the absence of a record; every other state is a total function
//! of the persisted fields, so resumption after a restart needs no
//! scattered filesystem checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stem roles retained after separation.
///
/// The remote service produces more stem types than we keep (bass, drums,
/// etc.); only these two survive the cleanup pass. Remote output names map
/// to roles in exactly one place, [`StemRole::from_remote_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemRole {
    Vocals,
    Instrumental,
}

impl StemRole {
    /// All retained roles, in persistence order.
    pub const ALL: [StemRole; 2] = [StemRole::Vocals, StemRole::Instrumental];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemRole::Vocals => "vocals",
            StemRole::Instrumental => "instrumental",
        }
    }

    /// Map a remote output name (file base name, lowercased) to a retained
    /// role. The service labels the non-vocal stem inconsistently across
    /// algorithm versions ("instrum", "instrumental", "other"); all of them
    /// canonicalize to [`StemRole::Instrumental`]. Unmapped names (bass,
    /// drums, ...) are downloaded and then discarded by cleanup.
    pub fn from_remote_name(name: &str) -> Option<StemRole> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vocals" => Some(StemRole::Vocals),
            "instrum" | "instrumental" | "other" => Some(StemRole::Instrumental),
            _ => None,
        }
    }

    /// Local file name for the retained stem of a media item,
    /// e.g. `vocals-abc123.mp3`.
    pub fn file_name(&self, media_id: &str) -> String {
        format!("{}-{}.mp3", self.as_str(), media_id)
    }
}

impl std::fmt::Display for StemRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local references to retained stems, keyed by role.
pub type StemRefs = BTreeMap<StemRole, String>;

/// Derived job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Audio and thumbnail on disk, not yet submitted
    Acquired,
    /// Remote handle present, outcome unknown
    Submitted,
    /// Retained stems downloaded and referenced
    Completed,
    /// Remote service reported failure; terminal
    Failed,
}

/// Persisted job record, keyed by media identifier.
///
/// Created once on first successful acquisition; the handle is set at most
/// once; stem refs are written as a single atomic update. Records are never
/// deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque external media identifier
    pub media_id: String,

    /// Original query used to find this item; display label
    pub search_term: String,

    /// Local reference to the cached thumbnail
    pub thumbnail_ref: String,

    /// Timestamp of successful audio acquisition
    pub acquired_at: DateTime<Utc>,

    /// Remote separation job handle (URL); set at most once
    pub separation_handle: Option<String>,

    /// Retained stem references; set only after all retained stems
    /// downloaded successfully
    pub stem_refs: Option<StemRefs>,

    /// Remote failure message; terminal once set
    pub failed_reason: Option<String>,
}

impl JobRecord {
    /// Derive the job state from field presence.
    pub fn state(&self) -> JobState {
        if self.failed_reason.is_some() {
            JobState::Failed
        } else if self.stem_refs.is_some() {
            JobState::Completed
        } else if self.separation_handle.is_some() {
            JobState::Submitted
        } else {
            JobState::Acquired
        }
    }

    /// True once the record can no longer change (completed or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self.state(), JobState::Completed | JobState::Failed)
    }
}
