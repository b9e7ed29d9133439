use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// One record exactly as it appeared in the export, plus provenance.
/// Produced once by the loader and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Name of the archive entry (or file) this record came from.
    pub source_file: String,
    /// The untouched JSON object fields.
    pub fields: Map<String, Value>,
}

/// Canonical playback session record.
///
/// Every field except provenance is optional: export files vary across platform
/// versions and the normalizer degrades bad or missing fields to `None` instead
/// of rejecting the whole record. Behavioral flags are tri-state — `Some(true)`,
/// `Some(false)`, and `None` (absent/null) are three distinct buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    /// Parsed timestamp, when the `ts` field was a valid RFC 3339 instant.
    pub ts: Option<DateTime<Utc>>,
    /// The original timestamp string, kept for display.
    pub ts_raw: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    /// Stable track identity. Display name/artist may collide across tracks.
    pub track_uri: Option<String>,
    pub ms_played: Option<u64>,
    pub reason_start: Option<String>,
    pub reason_end: Option<String>,
    pub skipped: Option<bool>,
    pub shuffle: Option<bool>,
    pub offline: Option<bool>,
    pub incognito: Option<bool>,
    pub source_file: String,
}

impl PlaybackEvent {
    /// Whether the record was explicitly flagged as skipped.
    pub fn is_skip(&self) -> bool {
        self.skipped == Some(true)
    }

    /// Whether playback ended via the forward-skip button.
    pub fn is_fwdbtn(&self) -> bool {
        self.reason_end.as_deref() == Some("fwdbtn")
    }
}
