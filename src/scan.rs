use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{Outcome, TrainPipeline};

/// Counts of outcomes for a finished scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub saved: usize,
    /// Saved outcomes that added a new row
    pub newly_stored: usize,
    pub no_issue: usize,
    pub no_data: usize,
    pub store_failed: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Saved { stored, .. } => {
                self.saved += 1;
                if *stored {
                    self.newly_stored += 1;
                }
            }
            Outcome::NoIssue { .. } => self.no_issue += 1,
            Outcome::NoData { .. } => self.no_data += 1,
            Outcome::StoreFailed { .. } => self.store_failed += 1,
        }
    }
}

/// Runs trains through a fixed pool of workers fed from a bounded queue
pub struct ScanCoordinator {
    pipeline: Arc<TrainPipeline>,
    workers: usize,
}

impl ScanCoordinator {
    pub fn new(pipeline: Arc<TrainPipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
        }
    }

    /// Start scanning `range`; outcomes arrive on the handle in completion order
    pub fn start(&self, range: Range<u32>, cancel: CancellationToken) -> ScanHandle {
        let (job_tx, job_rx) = mpsc::channel::<u32>(self.workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let feeder_cancel = cancel.clone();
        let feeder = tokio::spawn(async move {
            for train_number in range {
                tokio::select! {
                    biased;
                    _ = feeder_cancel.cancelled() => {
                        debug!(train_number, "Scan cancelled, no more trains queued");
                        break;
                    }
                    sent = job_tx.send(train_number) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let workers = (0..self.workers)
            .map(|worker| {
                let pipeline = self.pipeline.clone();
                let jobs = job_rx.clone();
                let outcomes = outcome_tx.clone();
                let cancel = cancel.clone();

                tokio::spawn(async move {
                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            train_number = async { jobs.lock().await.recv().await } => train_number,
                        };
                        let Some(train_number) = next else {
                            break;
                        };

                        let outcome = pipeline.process_train(train_number).await;
                        // The consumer may have gone away; the remaining trains still run
                        let _ = outcomes.send(outcome);
                    }
                    debug!(worker, "Worker finished");
                })
            })
            .collect();

        ScanHandle {
            outcomes: outcome_rx,
            feeder,
            workers,
        }
    }

    /// Scan `range` to completion, passing each outcome to `on_outcome`
    pub async fn run<F>(
        &self,
        range: Range<u32>,
        cancel: CancellationToken,
        mut on_outcome: F,
    ) -> RunSummary
    where
        F: FnMut(&Outcome),
    {
        let started = Instant::now();
        let total = range.len();
        info!(
            first = range.start,
            end = range.end,
            total,
            workers = self.workers,
            "Starting scan"
        );

        let mut summary = RunSummary::default();
        let mut handle = self.start(range, cancel);

        while let Some(outcome) = handle.next().await {
            summary.record(&outcome);
            on_outcome(&outcome);
        }
        handle.join().await;

        summary.elapsed = started.elapsed();
        info!(
            processed = summary.processed,
            saved = summary.saved,
            newly_stored = summary.newly_stored,
            no_issue = summary.no_issue,
            no_data = summary.no_data,
            store_failed = summary.store_failed,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Completed scan"
        );
        summary
    }
}

/// Running scan started by [`ScanCoordinator::start`]
pub struct ScanHandle {
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    feeder: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl ScanHandle {
    /// Next finished train, `None` once every worker has stopped
    pub async fn next(&mut self) -> Option<Outcome> {
        self.outcomes.recv().await
    }

    /// Wait for the feeder and all workers to exit
    pub async fn join(self) {
        drop(self.outcomes);

        if let Err(e) = self.feeder.await {
            warn!(error = %e, "Feeder task failed");
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Worker task failed");
            }
        }
    }
}
