// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Outbound request throttle.
//!
//! A priority queue drained by a single worker that dispatches queued calls
//! with a minimum spacing between consecutive starts, keeping bursts of
//! detail/photo fetches under Strava's rate limits. Higher priority runs
//! first; ties drain in arrival order. Jobs are spawned after the spacing
//! sleep, so in-flight calls may overlap — callers bound the overlap
//! themselves (see the detail fan-out in the fetcher).
//!
//! A job failure rejects only that caller; the queue keeps draining.

use crate::error::AppError;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};

/// Minimum gap between consecutive dispatches.
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(120);

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueuedCall {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedCall {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedCall {}

impl PartialOrd for QueuedCall {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCall {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: highest priority first, then earliest arrival.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    queue: Mutex<BinaryHeap<QueuedCall>>,
    notify: Notify,
    next_seq: AtomicU64,
}

/// Serial dispatcher with minimum inter-call spacing.
#[derive(Clone)]
pub struct RequestThrottle {
    inner: Arc<Inner>,
    shutdown_tx: Arc<mpsc::Sender<()>>,
}

impl RequestThrottle {
    pub fn new(min_spacing: Duration) -> Self {
        let inner = Arc::new(Inner {
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_seq: AtomicU64::new(0),
        });
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let worker = inner.clone();
        tokio::spawn(async move {
            loop {
                let call = loop {
                    let popped = {
                        let mut queue = worker.queue.lock().unwrap_or_else(|p| p.into_inner());
                        queue.pop()
                    };
                    match popped {
                        Some(call) => break call,
                        None => {
                            tokio::select! {
                                _ = worker.notify.notified() => {}
                                _ = shutdown_rx.recv() => return,
                            }
                        }
                    }
                };

                tokio::time::sleep(min_spacing).await;
                tokio::spawn(call.job);
            }
        });

        Self {
            inner,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Queue a call and await its result.
    ///
    /// The future starts only once the worker reaches it; its error reaches
    /// this caller alone.
    pub async fn enqueue<T, F>(&self, priority: i32, fut: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(fut.await);
        });

        {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|p| p.into_inner());
            queue.push(QueuedCall {
                priority,
                seq: self.inner.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
                job,
            });
        }
        self.inner.notify.notify_one();

        rx.await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("throttle worker dropped the call")))?
    }
}

impl Drop for RequestThrottle {
    fn drop(&mut self) {
        if Arc::strong_count(&self.shutdown_tx) == 1 {
            let _ = self.shutdown_tx.try_send(());
        }
    }
}
