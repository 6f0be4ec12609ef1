//! Retry queue for menu mutations that hit transient storage faults
//!
//! The services never retry on their own: a mutation that cannot get the write
//! lock within the busy timeout fails with a transient error. Callers that
//! expect heavy write contention wrap their calls in a [`RetryQueue`], which
//! re-runs the whole mutation (and therefore re-reads fresh state) with
//! exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use menutree_core::operations::RetryQueue;
//! use menutree_core::services::MenuService;
//!
//! # async fn example(service: MenuService) -> Result<(), Box<dyn std::error::Error>> {
//! let queue = RetryQueue::new(service).with_max_retries(3);
//!
//! // Retry up to 3 times with exponential backoff (10ms, 20ms, 40ms)
//! queue.reorder_with_retry("2f1c0b8e-4b1d-4f6a-9c57-0c8f7d3e2a11", 0).await?;
//! # Ok(())
//! # }
//! ```

use crate::models::{DeleteResult, MenuNode, NewMenuNode};
use crate::services::{MenuService, MenuServiceError};
use std::future::Future;
use tokio::time::Duration;

/// Retries used by [`RetryQueue::new`]
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Delay before retry number `attempt` (0-based): 10ms, 20ms, 40ms, ...
pub fn backoff_delay(attempt: usize) -> Duration {
    let exponent = attempt.min(16) as u32;
    Duration::from_millis(10u64 * (1u64 << exponent))
}

/// Runs mutations with automatic retry on transient failures
#[derive(Clone)]
pub struct RetryQueue {
    service: MenuService,
    max_retries: usize,
}

impl RetryQueue {
    pub fn new(service: MenuService) -> Self {
        Self {
            service,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Maximum number of retries (0 = single attempt, no retries)
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of retries
    ///
    /// # Retry Behavior
    ///
    /// - **Retry on**: errors where `MenuServiceError::is_transient()` holds
    /// - **Backoff**: Exponential (10ms, 20ms, 40ms, 80ms, ...)
    /// - **Fresh data**: every attempt is a new transaction
    /// - **Other errors**: Fail immediately without retry
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<T, MenuServiceError>
    where
        F: FnMut(MenuService) -> Fut,
        Fut: Future<Output = Result<T, MenuServiceError>>,
    {
        let mut attempt = 0;

        loop {
            match operation(self.service.clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!("{} succeeded after {} retry(ies)", label, attempt);
                    }
                    return Ok(value);
                }

                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::debug!(
                        "Transient failure on attempt {}/{} of {}: {}. Retrying in {:?}...",
                        attempt + 1,
                        self.max_retries + 1,
                        label,
                        e,
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }

                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(
                            "Max retries ({}) exceeded for {}: {}",
                            self.max_retries,
                            label,
                            e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    pub async fn create_with_retry(
        &self,
        input: NewMenuNode,
    ) -> Result<MenuNode, MenuServiceError> {
        self.run("create", |service| {
            let input = input.clone();
            async move { service.create(input).await }
        })
        .await
    }

    pub async fn reorder_with_retry(
        &self,
        id: &str,
        new_order: u32,
    ) -> Result<MenuNode, MenuServiceError> {
        self.run("reorder", |service| {
            let id = id.to_string();
            async move { service.reorder(&id, new_order).await }
        })
        .await
    }

    pub async fn move_with_retry(
        &self,
        id: &str,
        new_parent_id: Option<&str>,
        new_order: Option<u32>,
    ) -> Result<MenuNode, MenuServiceError> {
        self.run("move", |service| {
            let id = id.to_string();
            let new_parent_id = new_parent_id.map(str::to_string);
            async move {
                service
                    .move_node(&id, new_parent_id.as_deref(), new_order)
                    .await
            }
        })
        .await
    }

    pub async fn remove_with_retry(&self, id: &str) -> Result<DeleteResult, MenuServiceError> {
        self.run("remove", |service| {
            let id = id.to_string();
            async move { service.remove(&id).await }
        })
        .await
    }
}
