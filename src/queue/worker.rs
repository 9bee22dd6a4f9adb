use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::analysis::Orchestrator;
use crate::error::{Error, Result};
use crate::models::AggregationResult;
use crate::queue::TaskReceiver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub received: u32,
    pub stored: u32,
    pub partial: u32,
    pub dropped: u32,
    pub failed: u32,
}

impl WorkerReport {
    fn tally(&mut self, outcome: std::result::Result<Result<AggregationResult>, tokio::task::JoinError>) {
        match outcome {
            Ok(Ok(result)) => {
                self.stored += 1;
                if result.is_partial() {
                    self.partial += 1;
                }
            }
            Ok(Err(Error::MalformedInput(_) | Error::MissingCredential)) => self.dropped += 1,
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                tracing::error!("Task panicked: {}", e);
                self.failed += 1;
            }
        }
    }
}

/// Consumes task messages until the queue closes or shutdown is signalled.
///
/// Shutdown stops intake only: tasks already started run to completion, so a
/// result is never cut off mid-write.
pub struct Worker {
    orchestrator: Arc<Orchestrator>,
    concurrency_limit: usize,
}

impl Worker {
    pub fn new(orchestrator: Arc<Orchestrator>, concurrency_limit: usize) -> Self {
        Self {
            orchestrator,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub async fn run(&self, mut rx: TaskReceiver, mut shutdown: watch::Receiver<bool>) -> WorkerReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut in_flight = JoinSet::new();
        let mut report = WorkerReport::default();
        let mut watching = !*shutdown.borrow();
        // A message is taken off the queue only once a slot is held, so the
        // shutdown branch stays live while every slot is busy.
        let mut slot: Option<OwnedSemaphorePermit> = None;

        tracing::info!("Worker is ready and listening for tasks...");

        if watching {
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown.changed(), if watching => match changed {
                        Ok(()) if *shutdown.borrow() => {
                            tracing::info!("Shutdown requested, finishing {} in-flight tasks", in_flight.len());
                            break;
                        }
                        Ok(()) => {}
                        // Sender gone: nobody can request shutdown any more.
                        Err(_) => watching = false,
                    },

                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        report.tally(joined);
                    }

                    acquired = semaphore.clone().acquire_owned(), if slot.is_none() => match acquired {
                        Ok(permit) => slot = Some(permit),
                        Err(_) => break,
                    },

                    message = rx.recv(), if slot.is_some() => {
                        let Some(payload) = message else {
                            tracing::info!("Task queue closed");
                            break;
                        };
                        report.received += 1;

                        let permit = slot.take();
                        let orchestrator = self.orchestrator.clone();
                        in_flight.spawn(async move {
                            let _permit = permit;
                            orchestrator.handle_message(&payload).await
                        });
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            report.tally(joined);
        }

        tracing::info!(
            "Worker stopped: {} received, {} stored ({} partial), {} dropped, {} failed",
            report.received,
            report.stored,
            report.partial,
            report.dropped,
            report.failed
        );
        report
    }
}
