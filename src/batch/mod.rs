//! Concurrent batch dispatch.
//!
//! Items run at the same time and independently; one failure never aborts
//! its siblings, and results come back in input order.

use std::sync::Arc;

use crate::errors::SkillforgeError;
use crate::executor::{Payload, RequestExecutor, RequestOptions};

/// One request inside a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Endpoint path or absolute URL
    pub endpoint: String,
    /// Options for this item
    pub options: RequestOptions,
}

impl BatchItem {
    /// Item with explicit options.
    pub fn new(endpoint: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            endpoint: endpoint.into(),
            options,
        }
    }

    /// Plain GET item.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, RequestOptions::default())
    }
}

/// How one batch item ended.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The item completed with a payload
    Fulfilled(Payload),
    /// The item failed with an error
    Rejected(SkillforgeError),
}

/// Result of one batch item, paired with the item that produced it.
#[derive(Debug)]
pub struct BatchResult {
    /// The originating request
    pub item: BatchItem,
    /// How it ended
    pub outcome: BatchOutcome,
}

impl BatchResult {
    /// True when the item completed.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Fulfilled(_))
    }

    /// The payload, when the item completed.
    pub fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            BatchOutcome::Fulfilled(payload) => Some(payload),
            BatchOutcome::Rejected(_) => None,
        }
    }

    /// The error, when the item failed.
    pub fn error(&self) -> Option<&SkillforgeError> {
        match &self.outcome {
            BatchOutcome::Fulfilled(_) => None,
            BatchOutcome::Rejected(error) => Some(error),
        }
    }
}

/// Runs batches of requests through the executor.
pub struct BatchDispatcher {
    executor: Arc<RequestExecutor>,
}

impl BatchDispatcher {
    /// Create a dispatcher over the given executor.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Run every item concurrently; results mirror input order.
    pub async fn dispatch(&self, items: Vec<BatchItem>) -> Vec<BatchResult> {
        let futures = items.into_iter().map(|item| {
            let executor = self.executor.clone();
            async move {
                let outcome = match executor.execute(&item.endpoint, item.options.clone()).await {
                    Ok(payload) => BatchOutcome::Fulfilled(payload),
                    Err(error) => BatchOutcome::Rejected(error),
                };
                BatchResult { item, outcome }
            }
        });
        futures::future::join_all(futures).await
    }
}
