pub mod windows;

use crate::event::PlaybackEvent;
use std::collections::HashMap;

/// Groups with this many plays or fewer are statistical noise.
const MIN_PLAYS: u64 = 3;
/// Majority-skip threshold for a track to count as a "bad song".
const SKIPABILITY_FLOOR: f64 = 0.48;
/// Rows per ranked view.
const TOP_N: usize = 5;

/// Overall skip totals.
///
/// `fwdbtn_mismatch` counts events ended by the forward button that were NOT
/// flagged skipped — a known data-quality signature in the exports, surfaced
/// deliberately rather than folded into the skip count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub total: u64,
    pub skips: u64,
    pub fwdbtn_mismatch: u64,
}

impl Totals {
    /// Overall skip rate; `None` when there are no events.
    pub fn skip_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.skips as f64 / self.total as f64)
        }
    }
}

pub fn totals(events: &[PlaybackEvent]) -> Totals {
    let mut t = Totals::default();
    for e in events {
        t.total += 1;
        if e.is_skip() {
            t.skips += 1;
        } else if e.is_fwdbtn() {
            t.fwdbtn_mismatch += 1;
        }
    }
    t
}

/// Per-track rollup row. Grouping key is display identity (name + artist),
/// not the track uri — distinct tracks with identical titles conflate here.
/// Known limitation of the reporting path, kept on purpose.
#[derive(Debug, Clone)]
pub struct TrackRollup {
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub total_plays: u64,
    pub skips: u64,
    /// Total seconds spent before giving up (sum of ms_played, absent = 0).
    pub suffered_secs: f64,
    /// Mean seconds played, over events that reported a duration.
    pub time_to_skip_secs: Option<f64>,
    pub skipability: f64,
}

/// The two ranked "bad songs" views.
#[derive(Debug, Clone, Default)]
pub struct BadSongs {
    /// Most reliably skipped: skipability desc, ties by play count desc.
    pub skipability_view: Vec<TrackRollup>,
    /// Fastest abandoned: mean time-to-skip ascending.
    pub fast_skips_view: Vec<TrackRollup>,
}

#[derive(Default)]
struct TrackAcc {
    plays: u64,
    skips: u64,
    ms_sum: u64,
    ms_count: u64,
}

pub fn bad_songs(events: &[PlaybackEvent]) -> BadSongs {
    let mut groups: HashMap<(Option<String>, Option<String>), TrackAcc> = HashMap::new();

    for e in events {
        let acc = groups
            .entry((e.track_name.clone(), e.artist_name.clone()))
            .or_default();
        acc.plays += 1;
        if e.is_skip() {
            acc.skips += 1;
        }
        if let Some(ms) = e.ms_played {
            acc.ms_sum += ms;
            acc.ms_count += 1;
        }
    }

    let mut rollups: Vec<TrackRollup> = groups
        .into_iter()
        .filter(|(_, acc)| acc.plays > MIN_PLAYS)
        .map(|((track_name, artist_name), acc)| TrackRollup {
            track_name,
            artist_name,
            total_plays: acc.plays,
            skips: acc.skips,
            suffered_secs: acc.ms_sum as f64 * 0.001,
            time_to_skip_secs: if acc.ms_count > 0 {
                Some(acc.ms_sum as f64 / acc.ms_count as f64 * 0.001)
            } else {
                None
            },
            skipability: acc.skips as f64 / acc.plays as f64,
        })
        .filter(|r| r.skipability > SKIPABILITY_FLOOR)
        .collect();

    let mut skipability_view = rollups.clone();
    skipability_view.sort_by(|a, b| {
        b.skipability
            .partial_cmp(&a.skipability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.total_plays.cmp(&a.total_plays))
    });
    skipability_view.truncate(TOP_N);

    // Groups with no reported duration sort last in the fast-skip view
    rollups.sort_by(|a, b| match (a.time_to_skip_secs, b.time_to_skip_secs) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rollups.truncate(TOP_N);

    BadSongs {
        skipability_view,
        fast_skips_view: rollups,
    }
}

/// Tri-state flag bucket. Absent/null is its own bucket, never collapsed
/// into `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    True,
    False,
    Unknown,
}

impl TriState {
    pub fn from_flag(v: Option<bool>) -> Self {
        match v {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::Unknown,
        }
    }
}

/// Per-bucket counters for one behavioral flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagBreakdown {
    pub total: u64,
    pub skipped: u64,
    pub fwdbtn: u64,
    pub fwdbtn_and_skipped: u64,
}

impl FlagBreakdown {
    /// Skip rate within the bucket; `None` for an empty bucket
    /// (reported as "n/a", never 0 or NaN).
    pub fn skip_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.skipped as f64 / self.total as f64)
        }
    }
}

/// All three buckets of one tri-state flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagCrossTab {
    pub on: FlagBreakdown,
    pub off: FlagBreakdown,
    pub unknown: FlagBreakdown,
}

impl FlagCrossTab {
    fn bucket_mut(&mut self, v: Option<bool>) -> &mut FlagBreakdown {
        match TriState::from_flag(v) {
            TriState::True => &mut self.on,
            TriState::False => &mut self.off,
            TriState::Unknown => &mut self.unknown,
        }
    }
}

/// Shuffle and offline behavioral cross-tabs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossTabs {
    pub shuffle: FlagCrossTab,
    pub offline: FlagCrossTab,
}

pub fn cross_tabs(events: &[PlaybackEvent]) -> CrossTabs {
    let mut tabs = CrossTabs::default();
    for e in events {
        for bucket in [
            tabs.shuffle.bucket_mut(e.shuffle),
            tabs.offline.bucket_mut(e.offline),
        ] {
            bucket.total += 1;
            if e.is_skip() {
                bucket.skipped += 1;
            }
            if e.is_fwdbtn() {
                bucket.fwdbtn += 1;
                if e.is_skip() {
                    bucket.fwdbtn_and_skipped += 1;
                }
            }
        }
    }
    tabs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn make_event(
        ts: &str,
        track: &str,
        ms_played: Option<u64>,
        reason_end: &str,
        skipped: Option<bool>,
    ) -> PlaybackEvent {
        PlaybackEvent {
            ts: DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            ts_raw: Some(ts.to_string()),
            track_name: Some(track.to_string()),
            artist_name: Some("Artist 1".to_string()),
            track_uri: Some(format!("spotify:track:{track}")),
            ms_played,
            reason_start: Some("clickrow".to_string()),
            reason_end: Some(reason_end.to_string()),
            skipped,
            shuffle: None,
            offline: None,
            incognito: None,
            source_file: "test.json".to_string(),
        }
    }

    #[test]
    fn test_totals_partition_exactly() {
        let events = vec![
            make_event("2024-01-01T00:00:00Z", "A", Some(1000), "fwdbtn", Some(true)),
            make_event("2024-01-02T00:00:00Z", "B", Some(5000), "trackdone", Some(false)),
            make_event("2024-01-03T00:00:00Z", "C", None, "endplay", None),
        ];
        let t = totals(&events);
        let not_skipped = events.iter().filter(|e| !e.is_skip()).count() as u64;
        assert_eq!(t.total, t.skips + not_skipped);
    }

    #[test]
    fn test_fwdbtn_mismatch_scenario() {
        // Two fwdbtn skips a day apart, two natural completions
        let events = vec![
            make_event("2024-01-01T00:00:00Z", "A", Some(1000), "fwdbtn", Some(true)),
            make_event("2024-01-02T00:00:00Z", "A", Some(1200), "fwdbtn", Some(true)),
            make_event("2024-01-03T00:00:00Z", "B", Some(250000), "trackdone", Some(false)),
            make_event("2024-01-04T00:00:00Z", "B", Some(240000), "trackdone", Some(false)),
        ];
        let t = totals(&events);
        assert_eq!(t.skips, 2);
        assert_eq!(t.fwdbtn_mismatch, 0);
    }

    #[test]
    fn test_fwdbtn_mismatch_is_disjoint_from_flagged_skips() {
        let events = vec![
            make_event("2024-01-01T00:00:00Z", "A", Some(1000), "fwdbtn", Some(true)),
            make_event("2024-01-02T00:00:00Z", "A", Some(1000), "fwdbtn", Some(false)),
            make_event("2024-01-03T00:00:00Z", "A", Some(1000), "fwdbtn", None),
        ];
        let t = totals(&events);
        assert_eq!(t.skips, 1);
        assert_eq!(t.fwdbtn_mismatch, 2);
    }

    #[test]
    fn test_empty_sequence_is_all_zero() {
        let t = totals(&[]);
        assert_eq!(t, Totals::default());
        assert_eq!(t.skip_rate(), None);

        let songs = bad_songs(&[]);
        assert!(songs.skipability_view.is_empty());
        assert!(songs.fast_skips_view.is_empty());

        let tabs = cross_tabs(&[]);
        assert_eq!(tabs.shuffle.on.skip_rate(), None);
    }

    fn plays(track: &str, total: usize, skips: usize, ms: u64) -> Vec<PlaybackEvent> {
        (0..total)
            .map(|i| {
                let skipped = i < skips;
                make_event(
                    &format!("2024-01-{:02}T00:00:00Z", i + 1),
                    track,
                    Some(ms),
                    if skipped { "fwdbtn" } else { "trackdone" },
                    Some(skipped),
                )
            })
            .collect()
    }

    #[test]
    fn test_noise_floor_excludes_small_groups() {
        // 3 plays, all skipped — still excluded (needs > 3)
        let mut events = plays("Rare", 3, 3, 1000);
        events.extend(plays("Common", 10, 9, 1000));
        let songs = bad_songs(&events);
        assert_eq!(songs.skipability_view.len(), 1);
        assert_eq!(
            songs.skipability_view[0].track_name.as_deref(),
            Some("Common")
        );
        assert!(songs
            .skipability_view
            .iter()
            .all(|r| r.total_plays > MIN_PLAYS));
    }

    #[test]
    fn test_skipability_threshold() {
        // 4/10 = 0.4 is below the 0.48 floor; 5/10 = 0.5 passes
        let mut events = plays("Tolerated", 10, 4, 1000);
        events.extend(plays("Hated", 10, 5, 1000));
        let songs = bad_songs(&events);
        assert_eq!(songs.skipability_view.len(), 1);
        assert_eq!(
            songs.skipability_view[0].track_name.as_deref(),
            Some("Hated")
        );
    }

    #[test]
    fn test_skipability_ordering_and_tiebreak() {
        let mut events = plays("Half", 10, 5, 1000);
        events.extend(plays("Always", 5, 5, 1000));
        events.extend(plays("AlwaysBig", 8, 8, 1000));
        let songs = bad_songs(&events);
        let names: Vec<_> = songs
            .skipability_view
            .iter()
            .map(|r| r.track_name.as_deref().unwrap().to_string())
            .collect();
        // 1.0 before 0.5; among the 1.0s, more plays first
        assert_eq!(names, vec!["AlwaysBig", "Always", "Half"]);
    }

    #[test]
    fn test_fast_skips_orders_by_mean_ascending() {
        let mut events = plays("Slow", 5, 5, 30_000);
        events.extend(plays("Instant", 5, 5, 800));
        let songs = bad_songs(&events);
        assert_eq!(
            songs.fast_skips_view[0].track_name.as_deref(),
            Some("Instant")
        );
        let ttk = songs.fast_skips_view[0].time_to_skip_secs.unwrap();
        assert!((ttk - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_suffered_sums_and_mean_excludes_absent() {
        let mut events = plays("Mixed", 4, 4, 2000);
        // A fifth play with no reported duration: zero for the sum,
        // excluded from the mean
        events.push(make_event(
            "2024-02-01T00:00:00Z",
            "Mixed",
            None,
            "fwdbtn",
            Some(true),
        ));
        let songs = bad_songs(&events);
        let r = &songs.skipability_view[0];
        assert_eq!(r.total_plays, 5);
        assert!((r.suffered_secs - 8.0).abs() < 1e-9);
        assert!((r.time_to_skip_secs.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_tabs_tristate_buckets() {
        let mut on = make_event("2024-01-01T00:00:00Z", "A", Some(1000), "fwdbtn", Some(true));
        on.shuffle = Some(true);
        on.offline = Some(false);
        let mut off = make_event("2024-01-02T00:00:00Z", "B", Some(1000), "trackdone", Some(false));
        off.shuffle = Some(false);
        off.offline = Some(false);
        let unknown = make_event("2024-01-03T00:00:00Z", "C", Some(1000), "fwdbtn", None);

        let tabs = cross_tabs(&[on, off, unknown]);

        assert_eq!(tabs.shuffle.on.total, 1);
        assert_eq!(tabs.shuffle.on.skipped, 1);
        assert_eq!(tabs.shuffle.on.fwdbtn_and_skipped, 1);
        assert_eq!(tabs.shuffle.off.total, 1);
        assert_eq!(tabs.shuffle.off.skipped, 0);
        assert_eq!(tabs.shuffle.unknown.total, 1);
        assert_eq!(tabs.shuffle.unknown.fwdbtn, 1);
        assert_eq!(tabs.shuffle.unknown.fwdbtn_and_skipped, 0);

        assert_eq!(tabs.offline.off.total, 2);
        assert_eq!(tabs.offline.unknown.total, 1);
        // Empty bucket reports "not applicable", never zero
        assert_eq!(tabs.offline.on.skip_rate(), None);
        assert_eq!(tabs.shuffle.on.skip_rate(), Some(1.0));
    }
}
