use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use skipscan::aggregate::{self, BadSongs, CrossTabs, FlagBreakdown, Totals, TrackRollup};
use skipscan::aggregate::windows::{self, WindowMetrics};
use skipscan::engine::{self, BenchmarkResult, EngineKind};
use skipscan::event::PlaybackEvent;
use skipscan::normalize::{self, FilterConfig};
use skipscan::{config::AppConfig, loader, mock};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skipscan", version, about = "Playback-history skip analyzer")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a streaming-history export and print the skip report
    Analyze {
        /// Path to a zip export or a single JSON event file
        path: PathBuf,

        /// Analyze every event instead of only the recent window
        #[arg(long)]
        all_time: bool,

        /// Recency window in days (overrides config)
        #[arg(long)]
        window_days: Option<i64>,

        /// Window reference instant, RFC 3339 (defaults to now)
        #[arg(long)]
        reference: Option<String>,

        /// Max sample mismatch records to print
        #[arg(short = 'n', long)]
        samples: Option<usize>,
    },

    /// Run the dual-engine window-metric benchmark
    Bench {
        /// Synthetic dataset size (overrides config; ignored with --input)
        #[arg(long)]
        rows: Option<usize>,

        /// Benchmark an existing JSON event file instead of synthetic data
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Write a synthetic streaming-history dataset
    Mock {
        /// Number of events to generate
        #[arg(long, default_value = "500000")]
        rows: usize,

        /// Output file
        #[arg(short, long, default_value = "mock_history.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    match cli.command {
        Commands::Analyze {
            path,
            all_time,
            window_days,
            reference,
            samples,
        } => {
            let reference = match reference {
                Some(s) => DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .with_context(|| format!("Invalid --reference timestamp: {s}"))?,
                None => Utc::now(),
            };
            let filter = FilterConfig {
                limit_to_recent: !all_time,
                reference,
                window: ChronoDuration::days(window_days.unwrap_or(config.window_days)),
            };

            let records = loader::load_path(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let loaded = records.len();
            log::info!("Loaded {loaded} raw records");

            let events = normalize::apply_filter(normalize::normalize(&records), &filter);
            if events.is_empty() {
                // Valid outcome, distinct from a load failure
                println!(
                    "No events within the selected window ({loaded} loaded). \
                     Try --all-time or a wider --window-days."
                );
                return Ok(());
            }

            let totals = aggregate::totals(&events);
            let tabs = aggregate::cross_tabs(&events);
            let songs = aggregate::bad_songs(&events);
            let metrics = windows::window_metrics(&events);

            print_report(&path, &filter, loaded, &events, &totals, &tabs, &songs, &metrics);
            print_mismatch_samples(&events, samples.unwrap_or(config.sample_limit));
        }

        Commands::Bench { rows, input } => {
            let payload = match input {
                Some(path) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let rows = rows.unwrap_or(config.bench_rows);
                    println!("Generating {rows} synthetic events...");
                    mock::generate_json(rows)
                }
            };
            run_benchmark(payload)?;
        }

        Commands::Mock { rows, out } => {
            let payload = mock::generate_json(rows);
            std::fs::write(&out, &payload)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} events to {}", rows, out.display());
        }
    }

    Ok(())
}

fn run_benchmark(payload: Vec<u8>) -> Result<()> {
    let engines = [
        engine::spawn(EngineKind::Columnar),
        engine::spawn(EngineKind::Relational),
    ];

    // Both engines finish ingestion before any compute begins
    for handle in &engines {
        let ingest = handle
            .load(payload.clone())
            .with_context(|| format!("{} engine failed to ingest", handle.kind.label()))?;
        println!(
            "{:<12} ingested in {:.1} ms",
            handle.kind.label(),
            ingest.as_secs_f64() * 1000.0
        );
    }
    println!();

    println!(
        "{:<12} {:<8} {:>10} {:>12} {:>12} {:>10} {:>10}",
        "Engine", "Metric", "Init(ms)", "Ingest(ms)", "Compute(ms)", "Total(ms)", "Results"
    );
    println!("{}", "-".repeat(80));

    for handle in &engines {
        let (burst, streak) = handle
            .run_metrics()
            .with_context(|| format!("{} engine failed to compute", handle.kind.label()))?;
        print_benchmark_row(&burst);
        print_benchmark_row(&streak);
    }

    Ok(())
}

fn print_benchmark_row(r: &BenchmarkResult) {
    let ms = |d: std::time::Duration| d.as_secs_f64() * 1000.0;
    println!(
        "{:<12} {:<8} {:>10.1} {:>12.1} {:>12.2} {:>10.1} {:>10}",
        r.engine.label(),
        r.metric.label(),
        ms(r.init),
        ms(r.ingest),
        ms(r.compute),
        ms(r.total),
        r.result_count
    );
}

#[allow(clippy::too_many_arguments)]
fn print_report(
    path: &std::path::Path,
    filter: &FilterConfig,
    loaded: usize,
    events: &[PlaybackEvent],
    totals: &Totals,
    tabs: &CrossTabs,
    songs: &BadSongs,
    metrics: &WindowMetrics,
) {
    println!("--- skip analysis ---");
    println!("Input: {}", path.display());
    if filter.limit_to_recent {
        println!(
            "Window: {} days ending {}",
            filter.window.num_days(),
            filter.reference.format("%Y-%m-%d")
        );
    } else {
        println!("Window: all time");
    }
    println!("Playback records analyzed: {} (of {} loaded)", events.len(), loaded);
    println!();

    println!("skipped == true:  {}", totals.skips);
    println!("skipped != true:  {}", totals.total - totals.skips);
    println!("Overall skip rate: {}", fmt_rate(totals.skip_rate()));
    println!(
        "Forward-button mismatches (fwdbtn, not flagged skipped): {}",
        totals.fwdbtn_mismatch
    );
    println!();

    print_cross_tab("Shuffle vs skip:", "shuffle", &tabs.shuffle);
    print_cross_tab("Offline vs skip:", "offline", &tabs.offline);

    print_rollup_table("Worst offenders by skipability:", &songs.skipability_view);
    print_rollup_table("Fastest abandoned:", &songs.fast_skips_view);

    println!("Window metrics:");
    println!("  Skip bursts (10 skips within 60s):    {}", metrics.burst);
    println!("  Skip streaks (10+ consecutive skips): {}", metrics.streak);
    println!();
}

fn print_cross_tab(title: &str, flag: &str, tab: &skipscan::aggregate::FlagCrossTab) {
    println!("{title}");
    for (label, b) in [
        (format!("{flag} == true"), &tab.on),
        (format!("{flag} == false"), &tab.off),
        (format!("{flag} unknown"), &tab.unknown),
    ] {
        print_breakdown(&label, b);
    }
    println!();
}

fn print_breakdown(label: &str, b: &FlagBreakdown) {
    println!(
        "  {:<18} total={:<8} skipped={:<8} fwdbtn={:<8} fwdbtn&skip={:<8} skip_rate={}",
        label,
        b.total,
        b.skipped,
        b.fwdbtn,
        b.fwdbtn_and_skipped,
        fmt_rate(b.skip_rate())
    );
}

fn print_rollup_table(title: &str, rows: &[TrackRollup]) {
    println!("{title}");
    if rows.is_empty() {
        println!("  (no track with enough plays crossed the skip threshold)");
        println!();
        return;
    }

    println!(
        "  {:<28} {:<20} {:>5} {:>5} {:>6} {:>10} {:>8}",
        "Song", "Artist", "Plays", "Skips", "Skip%", "Suffered", "ToSkip"
    );
    println!("  {}", "-".repeat(88));

    for r in rows {
        println!(
            "  {:<28} {:<20} {:>5} {:>5} {:>5.0}% {:>9.1}s {:>8}",
            truncate(r.track_name.as_deref().unwrap_or("Unknown track"), 28),
            truncate(r.artist_name.as_deref().unwrap_or("Unknown artist"), 20),
            r.total_plays,
            r.skips,
            r.skipability * 100.0,
            r.suffered_secs,
            r.time_to_skip_secs
                .map(|s| format!("{s:.1}s"))
                .unwrap_or_else(|| "n/a".to_string()),
        );
    }
    println!();
}

fn print_mismatch_samples(events: &[PlaybackEvent], limit: usize) {
    let samples: Vec<&PlaybackEvent> = events
        .iter()
        .filter(|e| e.is_fwdbtn() && !e.is_skip())
        .take(limit)
        .collect();
    if samples.is_empty() {
        return;
    }

    println!("Sample mismatch records (up to {limit}):");
    for (i, e) in samples.iter().enumerate() {
        println!(
            "  {}. {} | {} — {}",
            i + 1,
            e.ts_raw.as_deref().unwrap_or("Unknown time"),
            e.track_name.as_deref().unwrap_or("Unknown track"),
            e.artist_name.as_deref().unwrap_or("Unknown artist"),
        );
        println!(
            "     ms_played={} skipped={} file={}",
            e.ms_played.map(|m| m.to_string()).unwrap_or_else(|| "n/a".into()),
            e.skipped.map(|s| s.to_string()).unwrap_or_else(|| "n/a".into()),
            e.source_file
        );
    }
}

fn fmt_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

/// Truncate long names to at most `max` characters for table display.
/// Counts characters, not bytes, so multi-byte titles never split mid-glyph.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}
