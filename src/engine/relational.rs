use super::{decode_rows, EngineError, MetricsEngine, Result};
use rusqlite::{params, Connection};

/// Burst: among skipped rows ordered by timestamp, count rows whose 9-back
/// neighbor lies within 60 seconds. Overlapping windows all count.
const BURST_SQL: &str = "
    WITH skips AS (
        SELECT ts FROM playback_events WHERE skipped = 1
    ),
    lagged AS (
        SELECT ts, LAG(ts, 9) OVER (ORDER BY ts) AS prev_ts FROM skips
    )
    SELECT COUNT(*) FROM lagged
    WHERE prev_ts IS NOT NULL AND ts - prev_ts <= 60000
";

/// Streak: gaps-and-islands — the rank difference is constant within one
/// contiguous run of skips; count runs of length >= 10.
const STREAK_SQL: &str = "
    WITH marked AS (
        SELECT skipped,
               ROW_NUMBER() OVER (ORDER BY ts)
             - ROW_NUMBER() OVER (PARTITION BY skipped ORDER BY ts) AS grp
        FROM playback_events
    ),
    runs AS (
        SELECT COUNT(*) AS len FROM marked WHERE skipped = 1 GROUP BY grp
    )
    SELECT COUNT(*) FROM runs WHERE len >= 10
";

/// Embedded relational engine: an in-memory SQLite database. Init opens the
/// connection and creates the schema; ingest batch-inserts decoded rows in
/// one transaction; compute runs the two window-function queries.
pub struct RelationalEngine {
    conn: Connection,
    loaded: bool,
}

impl RelationalEngine {
    pub fn new() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE playback_events (
                ts       INTEGER NOT NULL,
                skipped  INTEGER NOT NULL
            );
            CREATE INDEX idx_events_ts ON playback_events(ts);",
        )?;
        Ok(Self {
            conn,
            loaded: false,
        })
    }
}

impl MetricsEngine for RelationalEngine {
    fn ingest(&mut self, payload: &[u8]) -> Result<()> {
        let rows = decode_rows(payload)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM playback_events", [])?;
        {
            let mut stmt =
                tx.prepare_cached("INSERT INTO playback_events (ts, skipped) VALUES (?1, ?2)")?;
            for (ts, skipped) in &rows {
                stmt.execute(params![ts, *skipped as i64])?;
            }
        }
        tx.commit()?;
        self.loaded = true;
        Ok(())
    }

    fn burst_count(&self) -> Result<u64> {
        if !self.loaded {
            return Err(EngineError::NoData);
        }
        let count: i64 = self.conn.query_row(BURST_SQL, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn streak_count(&self) -> Result<u64> {
        if !self.loaded {
            return Err(EngineError::NoData);
        }
        let count: i64 = self.conn.query_row(STREAK_SQL, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
