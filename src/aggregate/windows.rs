//! Window-function metrics over the time-ordered event sequence.
//!
//! Both metrics require the full sequence sorted by timestamp ascending;
//! `window_metrics` establishes that order itself, the slice-level functions
//! expect it as a precondition.

use crate::event::PlaybackEvent;
use std::collections::HashMap;

/// A burst is this many skips within the span window.
pub const BURST_ROWS: usize = 10;
/// Maximum span of a burst window, in milliseconds.
pub const BURST_SPAN_MS: i64 = 60_000;
/// Minimum run length for a skip streak.
pub const STREAK_MIN_LEN: u64 = 10;

/// Both window metrics for one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMetrics {
    pub burst: u64,
    pub streak: u64,
}

/// Count burst windows over skipped-only timestamps (millis, sorted asc).
///
/// Row `i` opens a burst when it and the 9 skips before it span at most
/// 60 seconds. Windows slide by one row; overlapping windows all count.
pub fn burst_count(skip_ts_ms: &[i64]) -> u64 {
    let lag = BURST_ROWS - 1;
    if skip_ts_ms.len() <= lag {
        return 0;
    }
    (lag..skip_ts_ms.len())
        .filter(|&i| skip_ts_ms[i] - skip_ts_ms[i - lag] <= BURST_SPAN_MS)
        .count() as u64
}

/// Count maximal runs of consecutive skips of length >= 10, over the full
/// chronological skip-flag sequence.
///
/// Gaps and islands: the difference between a skip's overall rank and its
/// rank within the skipped-only subsequence is constant inside one
/// contiguous run (a non-skip advances the overall rank only), so grouping
/// by that difference recovers the runs.
pub fn streak_count(skipped: &[bool]) -> u64 {
    let mut run_sizes: HashMap<usize, u64> = HashMap::new();
    let mut subset_rank = 0usize;
    for (i, &is_skip) in skipped.iter().enumerate() {
        if is_skip {
            subset_rank += 1;
            let overall_rank = i + 1;
            *run_sizes.entry(overall_rank - subset_rank).or_insert(0) += 1;
        }
    }
    run_sizes.values().filter(|&&len| len >= STREAK_MIN_LEN).count() as u64
}

/// Compute both metrics from canonical events.
///
/// Events without a parseable timestamp cannot be placed on the timeline and
/// are excluded here (unlike the date filter, which fails open).
pub fn window_metrics(events: &[PlaybackEvent]) -> WindowMetrics {
    let mut timeline: Vec<(i64, bool)> = events
        .iter()
        .filter_map(|e| e.ts.map(|ts| (ts.timestamp_millis(), e.is_skip())))
        .collect();
    timeline.sort_by_key(|&(ts, _)| ts);

    let skip_ts: Vec<i64> = timeline
        .iter()
        .filter(|&&(_, s)| s)
        .map(|&(ts, _)| ts)
        .collect();
    let flags: Vec<bool> = timeline.iter().map(|&(_, s)| s).collect();

    WindowMetrics {
        burst: burst_count(&skip_ts),
        streak: streak_count(&flags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlaybackEvent;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts_series(start_ms: i64, step_ms: i64, n: usize) -> Vec<i64> {
        (0..n).map(|i| start_ms + i as i64 * step_ms).collect()
    }

    #[test]
    fn test_burst_twelve_skips_five_seconds_apart() {
        // Windows ending at indices 9, 10, 11 each span 9 * 5s = 45s <= 60s
        let ts = ts_series(0, 5_000, 12);
        assert_eq!(burst_count(&ts), 3);
    }

    #[test]
    fn test_burst_exact_sixty_second_span_counts() {
        // 9 gaps of 6666ms = 59994ms; push the last skip to land on 60s exactly
        let mut ts = ts_series(0, 6_666, 10);
        ts[9] = 60_000;
        assert_eq!(burst_count(&ts), 1);
        ts[9] = 60_001;
        assert_eq!(burst_count(&ts), 0);
    }

    #[test]
    fn test_burst_needs_ten_skips() {
        let ts = ts_series(0, 1_000, 9);
        assert_eq!(burst_count(&ts), 0);
        let ts = ts_series(0, 1_000, 10);
        assert_eq!(burst_count(&ts), 1);
    }

    #[test]
    fn test_burst_overlapping_windows_all_count() {
        // 20 skips 1s apart: every window from index 9 on qualifies
        let ts = ts_series(0, 1_000, 20);
        assert_eq!(burst_count(&ts), 11);
    }

    #[test]
    fn test_burst_spread_out_skips_do_not_count() {
        // 3 minutes apart — no ten skips land within a minute
        let ts = ts_series(0, 180_000, 50);
        assert_eq!(burst_count(&ts), 0);
    }

    fn flags(runs: &[(bool, usize)]) -> Vec<bool> {
        runs.iter()
            .flat_map(|&(v, n)| std::iter::repeat_n(v, n))
            .collect()
    }

    #[test]
    fn test_streak_of_ten_counts_once() {
        let f = flags(&[(false, 3), (true, 10), (false, 3)]);
        assert_eq!(streak_count(&f), 1);
    }

    #[test]
    fn test_streak_of_nine_does_not_count() {
        let f = flags(&[(false, 3), (true, 9), (false, 3)]);
        assert_eq!(streak_count(&f), 0);
    }

    #[test]
    fn test_interrupted_run_is_two_short_streaks() {
        // 9 + 9 skips with one completion in between: neither run reaches 10
        let f = flags(&[(true, 9), (false, 1), (true, 9)]);
        assert_eq!(streak_count(&f), 0);
    }

    #[test]
    fn test_multiple_long_streaks() {
        let f = flags(&[(true, 12), (false, 2), (true, 10), (false, 1), (true, 15)]);
        assert_eq!(streak_count(&f), 3);
    }

    #[test]
    fn test_streak_at_sequence_edges() {
        let f = flags(&[(true, 10)]);
        assert_eq!(streak_count(&f), 1);
        assert_eq!(streak_count(&[]), 0);
    }

    fn event(ts: DateTime<Utc>, skipped: bool) -> PlaybackEvent {
        PlaybackEvent {
            ts: Some(ts),
            ts_raw: None,
            track_name: None,
            artist_name: None,
            track_uri: None,
            ms_played: None,
            reason_start: None,
            reason_end: None,
            skipped: Some(skipped),
            shuffle: None,
            offline: None,
            incognito: None,
            source_file: "test.json".to_string(),
        }
    }

    fn events_every(step_secs: i64, skips: &[bool]) -> Vec<PlaybackEvent> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        skips
            .iter()
            .enumerate()
            .map(|(i, &s)| event(base + chrono::Duration::seconds(i as i64 * step_secs), s))
            .collect()
    }

    #[test]
    fn test_window_metrics_sorts_internally() {
        let mut events = events_every(5, &[true; 12]);
        events.reverse();
        let m = window_metrics(&events);
        assert_eq!(m.burst, 3);
        assert_eq!(m.streak, 1);
    }

    #[test]
    fn test_idempotent_on_sorted_input() {
        let events = events_every(5, &flags(&[(true, 10), (false, 2), (true, 3)]));
        let first = window_metrics(&events);
        let second = window_metrics(&events);
        assert_eq!(first, second);
    }

    #[test]
    fn test_streak_is_order_sensitive() {
        // Same multiset of flags, different chronology: consecutive vs interleaved
        let consecutive = flags(&[(true, 10), (false, 10)]);
        let interleaved: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        let a = window_metrics(&events_every(120, &consecutive));
        let b = window_metrics(&events_every(120, &interleaved));
        assert_eq!(a.streak, 1);
        assert_eq!(b.streak, 0);
        assert_ne!(a.streak, b.streak);
    }

    #[test]
    fn test_events_without_timestamps_are_excluded() {
        let mut events = events_every(5, &[true; 12]);
        let mut no_ts = events[0].clone();
        no_ts.ts = None;
        // A timestamp-less non-skip cannot break the streak
        no_ts.skipped = Some(false);
        events.insert(6, no_ts);
        let m = window_metrics(&events);
        assert_eq!(m.streak, 1);
        assert_eq!(m.burst, 3);
    }
}
