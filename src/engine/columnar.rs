use super::{decode_rows, EngineError, MetricsEngine, Result};
use crate::aggregate::windows;

/// In-memory columnar engine: the dataset is a pair of parallel columns,
/// sorted by timestamp once at ingest so both metric computations start from
/// established chronological order (hoisted off the compute path on purpose).
pub struct ColumnarEngine {
    ts: Vec<i64>,
    skipped: Vec<bool>,
    loaded: bool,
}

impl ColumnarEngine {
    pub fn new() -> Self {
        Self {
            ts: Vec::new(),
            skipped: Vec::new(),
            loaded: false,
        }
    }
}

impl Default for ColumnarEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEngine for ColumnarEngine {
    fn ingest(&mut self, payload: &[u8]) -> Result<()> {
        let mut rows = decode_rows(payload)?;
        rows.sort_by_key(|&(ts, _)| ts);
        self.ts = rows.iter().map(|&(ts, _)| ts).collect();
        self.skipped = rows.iter().map(|&(_, s)| s).collect();
        self.loaded = true;
        Ok(())
    }

    fn burst_count(&self) -> Result<u64> {
        if !self.loaded {
            return Err(EngineError::NoData);
        }
        let skip_ts: Vec<i64> = self
            .ts
            .iter()
            .zip(&self.skipped)
            .filter(|&(_, &s)| s)
            .map(|(&ts, _)| ts)
            .collect();
        Ok(windows::burst_count(&skip_ts))
    }

    fn streak_count(&self) -> Result<u64> {
        if !self.loaded {
            return Err(EngineError::NoData);
        }
        Ok(windows::streak_count(&self.skipped))
    }
}
