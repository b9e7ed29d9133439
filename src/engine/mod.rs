//! Dual-engine benchmark harness.
//!
//! The same two window metrics run through two execution strategies — an
//! in-memory columnar table and an embedded relational engine — over identical
//! payloads. Each engine lives on its own worker thread and owns its dataset
//! exclusively; callers talk to it through a typed request/response channel
//! pair. `LoadData` must complete before any `RunMetrics`.

pub mod columnar;
pub mod relational;

use chrono::DateTime;
use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Columnar,
    Relational,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Columnar => "columnar",
            Self::Relational => "relational",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Burst,
    Streak,
}

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Burst => "burst",
            Self::Streak => "streak",
        }
    }
}

/// One engine/metric timing record. Immutable once produced.
///
/// `init` and `ingest` are engine-level phases shared by both metrics of a
/// run; `compute` is the metric-specific query/traversal cost alone.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkResult {
    pub engine: EngineKind,
    pub metric: MetricKind,
    pub init: Duration,
    pub ingest: Duration,
    pub compute: Duration,
    pub total: Duration,
    pub result_count: u64,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("payload is not a JSON array of events: {0}")]
    BadPayload(String),
    #[error("no dataset loaded")]
    NoData,
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("engine worker disconnected")]
    WorkerGone,
    #[error("engine reported: {0}")]
    Remote(String),
    #[error("unexpected response from engine worker")]
    Protocol,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// One execution strategy for the window metrics. Ingest replaces any
/// previously loaded dataset entirely.
pub trait MetricsEngine: Send {
    fn ingest(&mut self, payload: &[u8]) -> Result<()>;
    fn burst_count(&self) -> Result<u64>;
    fn streak_count(&self) -> Result<u64>;
}

pub enum EngineRequest {
    LoadData(Vec<u8>),
    RunMetrics,
}

pub enum EngineResponse {
    LoadDone {
        ingest: Duration,
    },
    MetricsDone {
        burst: BenchmarkResult,
        streak: BenchmarkResult,
    },
    Error(String),
}

/// Caller-side handle to one engine worker. Dropping it shuts the worker down.
pub struct EngineHandle {
    pub kind: EngineKind,
    req: Option<Sender<EngineRequest>>,
    resp: Receiver<EngineResponse>,
    join: Option<JoinHandle<()>>,
}

impl EngineHandle {
    fn send(&self, req: EngineRequest) -> Result<()> {
        self.req
            .as_ref()
            .ok_or(EngineError::WorkerGone)?
            .send(req)
            .map_err(|_| EngineError::WorkerGone)
    }

    /// Send the payload and wait for ingestion to complete.
    pub fn load(&self, payload: Vec<u8>) -> Result<Duration> {
        self.send(EngineRequest::LoadData(payload))?;
        match self.resp.recv() {
            Ok(EngineResponse::LoadDone { ingest }) => Ok(ingest),
            Ok(EngineResponse::Error(e)) => Err(EngineError::Remote(e)),
            Ok(_) => Err(EngineError::Protocol),
            Err(_) => Err(EngineError::WorkerGone),
        }
    }

    /// Run both metrics against the loaded dataset.
    pub fn run_metrics(&self) -> Result<(BenchmarkResult, BenchmarkResult)> {
        self.send(EngineRequest::RunMetrics)?;
        match self.resp.recv() {
            Ok(EngineResponse::MetricsDone { burst, streak }) => Ok((burst, streak)),
            Ok(EngineResponse::Error(e)) => Err(EngineError::Remote(e)),
            Ok(_) => Err(EngineError::Protocol),
            Err(_) => Err(EngineError::WorkerGone),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.req.take();
        if let Some(join) = self.join.take() {
            join.join().ok();
        }
    }
}

/// Spawn an engine worker thread and return its handle.
pub fn spawn(kind: EngineKind) -> EngineHandle {
    let (req_tx, req_rx) = unbounded();
    let (resp_tx, resp_rx) = unbounded();
    let join = std::thread::spawn(move || worker_loop(kind, req_rx, resp_tx));
    EngineHandle {
        kind,
        req: Some(req_tx),
        resp: resp_rx,
        join: Some(join),
    }
}

fn worker_loop(kind: EngineKind, req_rx: Receiver<EngineRequest>, resp_tx: Sender<EngineResponse>) {
    let init_start = Instant::now();
    let mut engine: Box<dyn MetricsEngine> = match kind {
        EngineKind::Columnar => Box::new(columnar::ColumnarEngine::new()),
        EngineKind::Relational => match relational::RelationalEngine::new() {
            Ok(e) => Box::new(e),
            Err(e) => {
                log::error!("{} engine failed to initialize: {e}", kind.label());
                let _ = resp_tx.send(EngineResponse::Error(e.to_string()));
                return;
            }
        },
    };
    let init = init_start.elapsed();
    let mut ingest: Option<Duration> = None;

    for req in req_rx {
        match req {
            EngineRequest::LoadData(payload) => {
                let start = Instant::now();
                match engine.ingest(&payload) {
                    Ok(()) => {
                        let elapsed = start.elapsed();
                        ingest = Some(elapsed);
                        let _ = resp_tx.send(EngineResponse::LoadDone { ingest: elapsed });
                    }
                    Err(e) => {
                        ingest = None;
                        let _ = resp_tx.send(EngineResponse::Error(e.to_string()));
                    }
                }
            }
            EngineRequest::RunMetrics => {
                let Some(ingest) = ingest else {
                    let _ = resp_tx.send(EngineResponse::Error(EngineError::NoData.to_string()));
                    continue;
                };
                let response = match run_metrics(kind, engine.as_ref(), init, ingest) {
                    Ok((burst, streak)) => EngineResponse::MetricsDone { burst, streak },
                    Err(e) => EngineResponse::Error(e.to_string()),
                };
                let _ = resp_tx.send(response);
            }
        }
    }
}

fn run_metrics(
    kind: EngineKind,
    engine: &dyn MetricsEngine,
    init: Duration,
    ingest: Duration,
) -> Result<(BenchmarkResult, BenchmarkResult)> {
    let start = Instant::now();
    let burst_count = engine.burst_count()?;
    let burst_compute = start.elapsed();

    let start = Instant::now();
    let streak_count = engine.streak_count()?;
    let streak_compute = start.elapsed();

    let result = |metric, compute, result_count| BenchmarkResult {
        engine: kind,
        metric,
        init,
        ingest,
        compute,
        total: init + ingest + compute,
        result_count,
    };
    Ok((
        result(MetricKind::Burst, burst_compute, burst_count),
        result(MetricKind::Streak, streak_compute, streak_count),
    ))
}

#[derive(Deserialize)]
struct PayloadRow {
    ts: Option<String>,
    skipped: Option<bool>,
}

/// Decode a raw JSON payload into (timestamp millis, skipped) rows.
///
/// Rows without a parseable timestamp cannot be placed on the timeline and
/// are dropped; both engines share this decoder so their datasets agree.
pub(crate) fn decode_rows(payload: &[u8]) -> Result<Vec<(i64, bool)>> {
    let rows: Vec<PayloadRow> =
        serde_json::from_slice(payload).map_err(|e| EngineError::BadPayload(e.to_string()))?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let ts = row.ts.as_deref().and_then(|s| DateTime::parse_from_rfc3339(s).ok())?;
            Some((ts.timestamp_millis(), row.skipped == Some(true)))
        })
        .collect())
}
