//! Synthetic streaming-history generator for benchmarking.
//!
//! Mirrors the shape of a real export and plants deterministic patterns the
//! window metrics must find: every 10,000th block opens with a 12-skip burst
//! timestamped one second apart, every 25,000th block with a 15-skip streak.
//! Everything else skips at a 20% background rate.

use chrono::{SecondsFormat, TimeZone, Utc};
use rand::Rng;
use serde_json::{json, Value};

const TRACKS: [&str; 5] = ["Song A", "Song B", "Song C", "Song D", "Song E"];
const ARTISTS: [&str; 3] = ["Artist 1", "Artist 2", "Artist 3"];

/// Average gap between plays: one track every three minutes.
const STEP_MS: i64 = 3 * 60 * 1000;
const BURST_EVERY: usize = 10_000;
const BURST_LEN: usize = 12;
const STREAK_EVERY: usize = 25_000;
const STREAK_LEN: usize = 15;
const BACKGROUND_SKIP_RATE: f64 = 0.2;

/// Generate `rows` synthetic playback events.
pub fn generate(rows: usize) -> Vec<Value> {
    let base_ms = Utc
        .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
        .unwrap()
        .timestamp_millis();
    let mut rng = rand::thread_rng();
    let mut data = Vec::with_capacity(rows);

    for i in 0..rows {
        let in_burst = i % BURST_EVERY < BURST_LEN;
        let in_streak = i % STREAK_EVERY < STREAK_LEN;

        let mut skipped = rng.gen_bool(BACKGROUND_SKIP_RATE);
        let mut ts_ms = base_ms + i as i64 * STEP_MS;

        if in_burst {
            skipped = true;
            // Bursts need tight timestamps: anchor at the block start and
            // advance one second per row instead of the usual three minutes
            let block_start = (i - i % BURST_EVERY) as i64;
            ts_ms = base_ms + block_start * STEP_MS + (i % BURST_EVERY) as i64 * 1_000;
        } else if in_streak {
            skipped = true;
        }

        let ts = Utc
            .timestamp_millis_opt(ts_ms)
            .unwrap()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        data.push(json!({
            "ts": ts,
            "platform": "web",
            "ms_played": if skipped { 1_000 } else { 180_000 },
            "conn_country": "US",
            "master_metadata_track_name": TRACKS[i % TRACKS.len()],
            "master_metadata_album_artist_name": ARTISTS[i % ARTISTS.len()],
            "master_metadata_album_album_name": "Mock Album",
            "spotify_track_uri": format!("spotify:track:mock{i}"),
            "reason_start": "clickrow",
            "reason_end": if skipped { "fwdbtn" } else { "trackdone" },
            "shuffle": false,
            "skipped": skipped,
            "offline": false,
            "incognito_mode": false,
        }));
    }

    data
}

/// Generate a serialized JSON array payload, as an engine or a file would
/// receive it.
pub fn generate_json(rows: usize) -> Vec<u8> {
    serde_json::to_vec(&generate(rows)).expect("mock rows always serialize")
}
