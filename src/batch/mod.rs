//! Drives the pipeline over a whole address column.
//!
//! Workers never share a result list: each finished outcome is sent back over
//! a channel and folded by the calling thread, which is also the only thread
//! that invokes the progress callback.

mod options;

/// Stops a batch from handing out further addresses; probes already in
/// flight finish normally. Usable from plain threads, no runtime needed.
pub use tokio_util::sync::CancellationToken;
pub use options::{
    BatchOptions, BatchResult, Concurrency, DEFAULT_WORKERS, Progress, ReportScope,
};

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;

use tracing::{info, warn};

use crate::cell::CellValue;
use crate::error::VerifyError;
use crate::pacing::Pacer;
use crate::pipeline::{Status, VerificationOutcome, VerificationPipeline};

pub struct BatchRunner<'p> {
    pipeline: &'p VerificationPipeline,
    scope: ReportScope,
    concurrency: Concurrency,
    pacer: Box<dyn Pacer>,
    cancel: CancellationToken,
}

impl<'p> BatchRunner<'p> {
    pub fn new(pipeline: &'p VerificationPipeline, options: BatchOptions) -> Self {
        Self {
            pipeline,
            scope: options.scope,
            concurrency: options.concurrency,
            pacer: options.pacing.build(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the policy built from [`BatchOptions::pacing`].
    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Verifies every address and returns the outcomes kept by the report
    /// scope. Never fails: per-address errors become `Status::Error`.
    pub fn run<F>(&self, addresses: &[CellValue], mut progress: F) -> BatchResult
    where
        F: FnMut(Progress),
    {
        let total = addresses.len();
        let mut result = BatchResult::new(total);
        info!(total, concurrency = ?self.concurrency, "batch started");

        let mut fold = |outcome: VerificationOutcome| {
            result.processed += 1;
            progress(Progress {
                completed: result.processed,
                total,
            });
            if self.scope.keeps(outcome.status) {
                result.outcomes.push(outcome);
            }
        };

        match self.concurrency {
            Concurrency::Sequential => self.run_sequential(addresses, &mut fold),
            Concurrency::Pooled { workers } => {
                self.run_pooled(addresses, workers.clamp(1, total.max(1)), &mut fold)
            }
        }

        result.cancelled = result.processed < total;
        info!(
            processed = result.processed,
            reported = result.outcomes.len(),
            cancelled = result.cancelled,
            "batch finished"
        );
        result
    }

    fn run_sequential(
        &self,
        addresses: &[CellValue],
        fold: &mut dyn FnMut(VerificationOutcome),
    ) {
        for (index, value) in addresses.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.pacer.pace();
            fold(self.verify_isolated(index, value));
        }
    }

    fn run_pooled(
        &self,
        addresses: &[CellValue],
        workers: usize,
        fold: &mut dyn FnMut(VerificationOutcome),
    ) {
        // Rendezvous channel: a job is only handed out once a worker is free,
        // so cancellation and pacing apply to every submission.
        let (job_tx, job_rx) = mpsc::sync_channel::<(usize, &CellValue)>(0);
        let job_rx = Mutex::new(job_rx);
        let (outcome_tx, outcome_rx) = mpsc::channel::<VerificationOutcome>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = &job_rx;
                let outcome_tx = outcome_tx.clone();
                scope.spawn(move || {
                    loop {
                        let job = job_rx
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .recv();
                        let Ok((index, value)) = job else { break };
                        if outcome_tx.send(self.verify_isolated(index, value)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(outcome_tx);

            scope.spawn(move || {
                for job in addresses.iter().enumerate() {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    self.pacer.pace();
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for outcome in outcome_rx {
                fold(outcome);
            }
        });
    }

    /// One address, with errors and panics turned into an `Error` outcome.
    fn verify_isolated(&self, index: usize, value: &CellValue) -> VerificationOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.verify(value)))
            .unwrap_or_else(|payload| Err(VerifyError::from_panic(payload)));
        match result {
            Ok(outcome) => outcome.at(index),
            Err(err) => {
                warn!(index, address = %value, error = %err, "unexpected verification failure");
                VerificationOutcome::new(value.clone(), Status::Error)
                    .with_detail(err.to_string())
                    .at(index)
            }
        }
    }
}

/// Convenience wrapper around [`BatchRunner`].
pub fn run_batch<F>(
    pipeline: &VerificationPipeline,
    addresses: &[CellValue],
    options: BatchOptions,
    progress: F,
) -> BatchResult
where
    F: FnMut(Progress),
{
    BatchRunner::new(pipeline, options).run(addresses, progress)
}
