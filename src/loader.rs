use crate::event::RawRecord;
use crate::JSON_SUFFIX;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive could not be decompressed: {0}")]
    BadArchive(String),
    #[error("No JSON entries found in the archive")]
    NoJsonEntries,
    #[error("No playback events found in the input")]
    NoEvents,
    #[error("Unsupported file type: {0} (expected .zip or .json)")]
    UnsupportedFile(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Load playback records from a file path. Dispatches on extension:
/// `.zip` goes through archive decompression, `.json` is read directly
/// with the same per-file semantics.
pub fn load_path(path: &Path) -> Result<Vec<RawRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    match ext.as_str() {
        "zip" => {
            let bytes = std::fs::read(path)?;
            load_archive_bytes(&bytes)
        }
        "json" => {
            let bytes = std::fs::read(path)?;
            let records = parse_entry(&name, &bytes);
            if records.is_empty() {
                return Err(LoadError::NoEvents);
            }
            Ok(records)
        }
        _ => Err(LoadError::UnsupportedFile(name)),
    }
}

/// Decompress a zip archive held in memory and flatten every JSON entry
/// into one record sequence, tagging each record with its entry name.
///
/// Per-entry problems (unreadable entry, malformed JSON, non-array payload)
/// are logged and skipped; only an undecompressable archive or an empty
/// result is fatal.
pub fn load_archive_bytes(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let mut archive = ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| LoadError::BadArchive(e.to_string()))?;

    // First pass: pull out the bytes of every .json entry
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping archive entry {i}: {e}");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.to_lowercase().ends_with(JSON_SUFFIX) {
            log::debug!("Ignoring non-JSON entry {name}");
            continue;
        }
        let mut buf = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut buf) {
            log::warn!("Skipping {name}; read failed: {e}");
            continue;
        }
        entries.push((name, buf));
    }

    if entries.is_empty() {
        return Err(LoadError::NoJsonEntries);
    }

    // Second pass: parse entries in parallel, keeping entry order
    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.set_message("Parsing history files...");

    let events: Vec<RawRecord> = entries
        .par_iter()
        .flat_map(|(name, bytes)| {
            let records = parse_entry(name, bytes);
            pb.inc(1);
            records
        })
        .collect();

    pb.finish_and_clear();

    if events.is_empty() {
        return Err(LoadError::NoEvents);
    }
    Ok(events)
}

/// Parse one JSON file's bytes into tagged records.
/// Malformed JSON and non-array top levels yield an empty vec with a warning;
/// non-object array elements are silently dropped.
fn parse_entry(name: &str, bytes: &[u8]) -> Vec<RawRecord> {
    let payload: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Skipping {name}; JSON parse failed: {e}");
            return Vec::new();
        }
    };

    let Value::Array(items) = payload else {
        log::warn!("Skipping {name}; expected an array of events");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(fields) => Some(RawRecord {
                source_file: name.to_string(),
                fields,
            }),
            _ => None,
        })
        .collect()
}
