use crate::event::{PlaybackEvent, RawRecord};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Date-filter configuration for the analysis entry point.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Restrict the analysis to a recent window of events.
    pub limit_to_recent: bool,
    /// Upper bound of the window (defaults to now).
    pub reference: DateTime<Utc>,
    /// Window length (defaults to one year).
    pub window: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            limit_to_recent: true,
            reference: Utc::now(),
            window: Duration::days(365),
        }
    }
}

/// Coerce raw records into canonical playback events, field by field.
/// Wrong-typed or missing fields degrade to `None`; a record is never
/// rejected outright. Order is preserved.
pub fn normalize(records: &[RawRecord]) -> Vec<PlaybackEvent> {
    records.iter().map(normalize_record).collect()
}

fn normalize_record(raw: &RawRecord) -> PlaybackEvent {
    let ts_raw = opt_string(raw.fields.get("ts"));
    let ts = ts_raw.as_deref().and_then(parse_ts);

    PlaybackEvent {
        ts,
        ts_raw,
        track_name: opt_string(raw.fields.get("master_metadata_track_name")),
        artist_name: opt_string(raw.fields.get("master_metadata_album_artist_name")),
        track_uri: opt_string(raw.fields.get("spotify_track_uri")),
        ms_played: opt_ms(raw.fields.get("ms_played")),
        reason_start: opt_string(raw.fields.get("reason_start")),
        reason_end: opt_string(raw.fields.get("reason_end")),
        skipped: opt_bool(raw.fields.get("skipped")),
        shuffle: opt_bool(raw.fields.get("shuffle")),
        offline: opt_bool(raw.fields.get("offline")),
        incognito: opt_bool(raw.fields.get("incognito_mode")),
        source_file: raw.source_file.clone(),
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn opt_string(v: Option<&Value>) -> Option<String> {
    v.and_then(|v| v.as_str()).map(str::to_string)
}

fn opt_bool(v: Option<&Value>) -> Option<bool> {
    v.and_then(Value::as_bool)
}

/// Played duration must be a non-negative number; anything else is absent.
fn opt_ms(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    match v.as_f64() {
        Some(f) if f >= 0.0 => Some(f as u64),
        _ => None,
    }
}

/// Apply the recency window. Events with an unparseable or missing timestamp
/// are retained (fail open) — ambiguous data is surfaced, not silently
/// discarded. Relative order of retained events is preserved.
pub fn apply_filter(events: Vec<PlaybackEvent>, cfg: &FilterConfig) -> Vec<PlaybackEvent> {
    if !cfg.limit_to_recent {
        return events;
    }
    let floor = cfg.reference - cfg.window;
    events
        .into_iter()
        .filter(|e| match e.ts {
            Some(ts) => ts >= floor && ts <= cfg.reference,
            None => true,
        })
        .collect()
}
