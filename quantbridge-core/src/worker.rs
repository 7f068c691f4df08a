//! Background worker thread for fetch, update, and alignment jobs.
//!
//! Communication with the caller is via `mpsc` channels. Every command
//! produces exactly one outcome (`Success`, `Aligned`, `Failure` or
//! `Cancelled`) followed by `Finished`, which is sent even if the handler
//! unwinds.
//!
//! Setting the shared cancel flag discards the commands still queued when
//! the worker next looks at the channel; the command in flight runs to
//! completion.

use crate::data::align::{AlignOptions, AlignOutcome, AlignmentEngine};
use crate::data::error::{Disposition, FetchError};
use crate::data::export::{export_series, ExportFormat};
use crate::data::gaps::{GapAnalyzer, GapReport};
use crate::data::router::{FetchRequest, SeriesSource};
use crate::data::store::{MasterStore, UpdateRequest};
use crate::domain::{Series, Timeframe};
use chrono::NaiveDateTime;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Shared services the worker runs commands against.
pub struct WorkerContext {
    pub source: Arc<dyn SeriesSource>,
    pub store: Arc<MasterStore>,
    pub aligner: AlignmentEngine,
    pub gaps: GapAnalyzer,
    pub export_dir: PathBuf,
}

/// Commands sent to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    Fetch {
        request: FetchRequest,
        export: Option<ExportFormat>,
    },
    Update {
        request: UpdateRequest,
        export: Option<ExportFormat>,
    },
    AlignFiles {
        path_a: PathBuf,
        path_b: PathBuf,
        options: AlignOptions,
    },
    AlignPair {
        base: String,
        target: String,
        timeframe: Timeframe,
        output_name: Option<String>,
    },
    Shutdown,
}

/// Responses sent from the worker back to the caller.
#[derive(Debug)]
pub enum WorkerResponse {
    Success {
        series: Series,
        gap: GapReport,
        exported: Option<PathBuf>,
    },
    Aligned {
        outcome: Box<AlignOutcome>,
    },
    Failure {
        message: String,
        disposition: Disposition,
    },
    Cancelled,
    /// Always follows the outcome of a command.
    Finished,
}

impl WorkerResponse {
    fn from_fetch_error(e: &FetchError) -> Self {
        WorkerResponse::Failure {
            message: e.to_string(),
            disposition: e.disposition(),
        }
    }
}

/// Sends `Finished` when dropped.
struct FinishGuard<'a>(&'a Sender<WorkerResponse>);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        let _ = self.0.send(WorkerResponse::Finished);
    }
}

/// Spawn the background worker thread.
pub fn spawn_worker(
    ctx: WorkerContext,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
    cancel: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("quantbridge-worker".into())
        .spawn(move || worker_loop(&ctx, rx, tx, cancel))
}

fn worker_loop(
    ctx: &WorkerContext,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
    cancel: Arc<AtomicBool>,
) {
    loop {
        match rx.recv() {
            Ok(WorkerCommand::Shutdown) | Err(_) => break,
            Ok(cmd) => {
                if cancel.swap(false, Ordering::Relaxed) {
                    if discard_pending(cmd, &rx, &tx) {
                        break;
                    }
                    continue;
                }
                handle_command(ctx, cmd, &tx);
            }
        }
    }
    debug!("worker stopped");
}

/// Answer `cmd` and everything queued behind it with `Cancelled`.
/// Returns true if a shutdown was among them.
fn discard_pending(
    first: WorkerCommand,
    rx: &Receiver<WorkerCommand>,
    tx: &Sender<WorkerResponse>,
) -> bool {
    let mut next = Some(first);
    let mut discarded = 0usize;
    while let Some(cmd) = next.take() {
        if matches!(cmd, WorkerCommand::Shutdown) {
            info!(discarded, "queued commands cancelled");
            return true;
        }
        let _guard = FinishGuard(tx);
        let _ = tx.send(WorkerResponse::Cancelled);
        discarded += 1;
        next = match rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => return true,
        };
    }
    info!(discarded, "queued commands cancelled");
    false
}

fn handle_command(ctx: &WorkerContext, cmd: WorkerCommand, tx: &Sender<WorkerResponse>) {
    let _guard = FinishGuard(tx);
    let response = match cmd {
        WorkerCommand::Fetch { request, export } => handle_fetch(ctx, &request, export),
        WorkerCommand::Update { request, export } => handle_update(ctx, &request, export),
        WorkerCommand::AlignFiles { path_a, path_b, options } => {
            aligned(ctx.aligner.align_files(&path_a, &path_b, &options))
        }
        WorkerCommand::AlignPair {
            base,
            target,
            timeframe,
            output_name,
        } => aligned(
            ctx.aligner
                .align_datasets(&base, &target, timeframe, output_name.as_deref()),
        ),
        WorkerCommand::Shutdown => return,
    };
    let _ = tx.send(response);
}

fn handle_fetch(
    ctx: &WorkerContext,
    request: &FetchRequest,
    export: Option<ExportFormat>,
) -> WorkerResponse {
    match ctx.source.fetch(request) {
        Ok(series) => success(ctx, series, request.start, request.end, export),
        Err(e) => WorkerResponse::from_fetch_error(&e),
    }
}

fn handle_update(
    ctx: &WorkerContext,
    request: &UpdateRequest,
    export: Option<ExportFormat>,
) -> WorkerResponse {
    match ctx.store.update(request, ctx.source.as_ref()) {
        Ok(series) => {
            let start = request
                .start
                .or_else(|| series.first_timestamp())
                .unwrap_or(request.end);
            success(ctx, series, start, request.end, export)
        }
        Err(e) => WorkerResponse::from_fetch_error(&e),
    }
}

fn success(
    ctx: &WorkerContext,
    series: Series,
    start: NaiveDateTime,
    end: NaiveDateTime,
    export: Option<ExportFormat>,
) -> WorkerResponse {
    let gap = ctx.gaps.analyze(&series, start, end);
    if gap.has_warning {
        warn!(key = %series.key, message = %gap.message, "coverage gap");
    }

    let exported = match export {
        Some(format) => match export_series(&series, &ctx.export_dir, start.date(), format) {
            Ok(path) => Some(path),
            Err(e) => {
                return WorkerResponse::Failure {
                    message: format!("export failed: {e}"),
                    disposition: Disposition::Unknown,
                }
            }
        },
        None => None,
    };

    WorkerResponse::Success {
        series,
        gap,
        exported,
    }
}

fn aligned<E: std::fmt::Display>(result: Result<AlignOutcome, E>) -> WorkerResponse {
    match result {
        Ok(outcome) => WorkerResponse::Aligned {
            outcome: Box::new(outcome),
        },
        Err(e) => WorkerResponse::Failure {
            message: e.to_string(),
            disposition: Disposition::FixInput,
        },
    }
}
