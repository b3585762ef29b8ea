//! Bounded, partial-failure-tolerant fan-out over an ordered list of items.
//!
//! Items are split into contiguous chunks of `concurrency`. Each chunk runs
//! all of its transforms concurrently and settles completely before the next
//! chunk starts, so at most `concurrency` transforms are ever in flight. A
//! failing item becomes an [`ItemOutcome::Failure`] and the batch carries on;
//! only a batch with zero successes is an error.
//!
//! Routes that merge their outputs into a single artifact pass an
//! [`Accumulator`]. It is fed the successful outputs of each chunk strictly in
//! input order, on the coordinator's task, never concurrently.

use crate::error::{AppError, TransformError};
use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

/// An input the coordinator can name in failure reports.
pub trait BatchItem: Send {
    fn label(&self) -> String;
}

/// Converts one item. Implementations must not share mutable state between
/// calls: the coordinator runs several of them at once.
#[async_trait]
pub trait Transform: Send + Sync {
    type Input: BatchItem + 'static;
    type Output: Send + 'static;

    async fn apply(&self, input: Self::Input) -> Result<Self::Output, TransformError>;
}

/// Single-writer consumer of successful outputs.
pub trait Accumulator<T> {
    type Receipt;

    /// Consume one output. An error turns that item into a failure.
    fn accept(&mut self, name: &str, output: T) -> Result<Self::Receipt, TransformError>;
}

/// Keeps outputs as they are.
struct Collect;

impl<T> Accumulator<T> for Collect {
    type Receipt = T;

    fn accept(&mut self, _name: &str, output: T) -> Result<T, TransformError> {
        Ok(output)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    Success { name: String, artifact: T },
    Failure { name: String, reason: String },
}

impl<T> ItemOutcome<T> {
    pub fn name(&self) -> &str {
        match self {
            ItemOutcome::Success { name, .. } | ItemOutcome::Failure { name, .. } => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// Every outcome of a batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    outcomes: Vec<ItemOutcome<T>>,
}

impl<T> BatchResult<T> {
    pub fn from_outcomes(outcomes: Vec<ItemOutcome<T>>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[ItemOutcome<T>] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ItemOutcome<T>> {
        self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// `(name, reason)` of every failed item.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Failure { name, reason } => Some((name.as_str(), reason.as_str())),
            ItemOutcome::Success { .. } => None,
        })
    }

    fn first_failure(&self) -> Option<String> {
        self.failures()
            .next()
            .map(|(name, reason)| format!("{name}: {reason}"))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("none of the {total} items could be converted")]
    NoItemsConverted {
        total: usize,
        first_failure: Option<String>,
    },
}

impl BatchError {
    /// Request-level error, `subject` naming what was being converted
    /// ("files", "images", "pages").
    pub fn into_app_error(self, subject: &'static str) -> AppError {
        match self {
            BatchError::NoItemsConverted { first_failure, .. } => AppError::NoItemsConverted {
                subject,
                first_failure: first_failure.unwrap_or_else(|| "nothing to convert".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCoordinator {
    concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `transform` over `items` and collect every outcome.
    pub async fn run<T>(
        &self,
        items: Vec<T::Input>,
        transform: &T,
    ) -> Result<BatchResult<T::Output>, BatchError>
    where
        T: Transform,
    {
        self.run_folded(items, transform, &mut Collect).await
    }

    /// Like [`run`](Self::run), but successful outputs pass through `acc`
    /// in input order once their chunk has settled.
    pub async fn run_folded<T, A>(
        &self,
        items: Vec<T::Input>,
        transform: &T,
        acc: &mut A,
    ) -> Result<BatchResult<A::Receipt>, BatchError>
    where
        T: Transform,
        A: Accumulator<T::Output> + Send,
        A::Receipt: Send,
    {
        let total = items.len();
        let chunks = total.div_ceil(self.concurrency);
        let mut outcomes = Vec::with_capacity(total);
        let mut pending = items.into_iter();

        for chunk_index in 0..chunks {
            let chunk: Vec<T::Input> = pending.by_ref().take(self.concurrency).collect();
            debug!(
                chunk = chunk_index + 1,
                of = chunks,
                size = chunk.len(),
                "processing chunk"
            );

            let settled = join_all(chunk.into_iter().map(|item| async move {
                let name = item.label();
                let result = transform.apply(item).await;
                (name, result)
            }))
            .await;

            for (name, result) in settled {
                let folded = result.and_then(|output| acc.accept(&name, output));
                let outcome = match folded {
                    Ok(artifact) => ItemOutcome::Success { name, artifact },
                    Err(err) => {
                        warn!(item = %name, error = %err, "item failed");
                        ItemOutcome::Failure {
                            name,
                            reason: err.to_string(),
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        let result = BatchResult { outcomes };
        info!(
            total,
            succeeded = result.succeeded(),
            failed = result.failed(),
            "batch settled"
        );

        if result.succeeded() == 0 {
            return Err(BatchError::NoItemsConverted {
                total,
                first_failure: result.first_failure(),
            });
        }
        Ok(result)
    }
}
