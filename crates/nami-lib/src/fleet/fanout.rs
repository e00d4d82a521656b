//! Bounded fan-out with single-writer collection
//!
//! Workers run concurrently up to a fixed limit. Each sends its outcome to
//! one collector task that owns the result slots, so the merge target is
//! never shared. Results come back in dispatch order once every worker has
//! finished; failed workers become warnings.

use crate::abort::AbortSignal;
use crate::error::{Error, Result, Warning};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

pub const DEFAULT_CONCURRENCY: usize = 16;

/// Outcome of a fan-out run
#[derive(Debug, Clone)]
pub struct FanOutReport<T> {
    /// Successful results in dispatch order
    pub results: Vec<T>,
    /// One entry per failed worker, in dispatch order
    pub warnings: Vec<Warning>,
}

type Outcome<T> = std::result::Result<T, Warning>;

/// Bounded concurrent executor over a set of resources
#[derive(Debug, Clone)]
pub struct FanOut {
    concurrency: usize,
    abort: AbortSignal,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl FanOut {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            abort: AbortSignal::never(),
        }
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Run `worker` over every item and wait for all of them
    ///
    /// Items are labelled by their `Display` form in warnings. Fails only
    /// with [`Error::Cancelled`] when the abort signal is raised.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, worker: F) -> Result<FanOutReport<T>>
    where
        I: fmt::Display + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let worker = Arc::new(worker);
        let (tx, mut rx) = mpsc::channel::<(usize, Outcome<T>)>(self.concurrency);

        let collector = tokio::spawn(async move {
            let mut slots: Vec<Option<Outcome<T>>> = (0..total).map(|_| None).collect();
            while let Some((index, outcome)) = rx.recv().await {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            slots
        });

        let mut handles = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.abort.aborted() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let label = item.to_string();
            let tx = tx.clone();
            let worker = worker.clone();
            let abort = self.abort.clone();
            let task_label = label.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = tokio::select! {
                    biased;
                    _ = abort.aborted() => return,
                    result = (*worker)(item) => {
                        result.map_err(|err| Warning::new(task_label, err.to_string()))
                    }
                };
                let _ = tx.send((index, outcome)).await;
            });
            handles.push((index, label, handle));
        }

        // Join barrier: nothing is reported until every dispatched worker is done
        for (index, label, handle) in handles {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    let _ = tx
                        .send((index, Err(Warning::new(label, "worker panicked"))))
                        .await;
                }
            }
        }
        drop(tx);

        let slots = collector
            .await
            .map_err(|err| Error::upstream("collect results", err))?;

        if self.abort.is_aborted() {
            debug!(total, "Fan-out aborted");
            return Err(Error::Cancelled);
        }

        let mut report = FanOutReport {
            results: Vec::with_capacity(total),
            warnings: Vec::new(),
        };
        for outcome in slots.into_iter().flatten() {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(warning) => {
                    warn!(resource = %warning.resource, reason = %warning.reason, "Partial failure");
                    report.warnings.push(warning);
                }
            }
        }

        Ok(report)
    }
}
