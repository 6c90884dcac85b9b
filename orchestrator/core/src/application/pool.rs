// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bounded Worker Pool
//!
//! Runs one task per item with at most `max_workers` in flight:
//!
//! - results come back in completion order, not submission order,
//! - [`WorkerPool::run`] returns only after every task finished (full barrier),
//! - a failing or panicking task never cancels its siblings; a panic is
//!   reported as [`TaskPanicked`] for that item.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Fan-out primitive shared by the batch coordinator and the auditor

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::config::DEFAULT_MAX_WORKERS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("worker task panicked: {0}")]
pub struct TaskPanicked(pub String);

/// One finished task and the item it was started with.
#[derive(Debug)]
pub struct Completed<T, R> {
    pub item: T,
    pub outcome: Result<R, TaskPanicked>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_workers: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl WorkerPool {
    /// `max_workers` is clamped to at least 1.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<Completed<T, R>>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let task = Arc::new(task);
        let mut set = JoinSet::new();

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            set.spawn(async move {
                // The semaphore is never closed, so the permit is always granted.
                let _permit = semaphore.acquire_owned().await;
                let outcome = AssertUnwindSafe(task(item.clone()))
                    .catch_unwind()
                    .await
                    .map_err(|panic| TaskPanicked(panic_message(panic.as_ref())));
                Completed { item, outcome }
            });
        }

        let mut completed = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(done) => completed.push(done),
                // Tasks are never aborted and panics are caught inside the task.
                Err(e) => tracing::error!(error = %e, "worker task failed to join"),
            }
        }

        tracing::debug!(
            total,
            completed = completed.len(),
            max_workers = self.max_workers,
            "worker pool drained"
        );
        completed
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
