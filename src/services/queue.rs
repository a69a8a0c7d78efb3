use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::job::WorkToken;

/// Producer half of the in-process work queue.
///
/// Unbounded multi-producer/single-consumer FIFO of work tokens. Enqueue
/// never blocks and never drops; there is no priority, dedup, or
/// backpressure, so a slow consumer lets the queue grow without limit.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::UnboundedSender<WorkToken>,
    depth: Arc<AtomicUsize>,
}

/// Consumer half, owned by the single worker task.
pub struct WorkReceiver {
    rx: mpsc::UnboundedReceiver<WorkToken>,
    depth: Arc<AtomicUsize>,
}

impl IngestQueue {
    /// Create a queue, returning the cloneable producer and the one receiver.
    pub fn new() -> (Self, WorkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                depth: Arc::clone(&depth),
            },
            WorkReceiver { rx, depth },
        )
    }

    /// Publish a work token. Fails only when the consumer is gone, which
    /// means the process is shutting down.
    pub fn enqueue(&self, token: WorkToken) -> Result<(), QueueError> {
        // Count before sending so a fast consumer can never observe the
        // depth underflowing past zero.
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        if self.tx.send(token).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Err(QueueError::Closed);
        }
        metrics::gauge!("ingest_queue_depth").set(depth as f64);
        Ok(())
    }

    /// Number of tokens currently waiting (for health checks and metrics).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// True once the consumer half has been dropped, meaning no worker will
    /// ever drain this queue again.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl WorkReceiver {
    /// Wait for the next token. Suspends while the queue is empty and
    /// resolves `None` once every producer handle is dropped and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<WorkToken> {
        let token = self.rx.recv().await;
        if token.is_some() {
            let depth = self.depth.fetch_sub(1, Ordering::Relaxed) - 1;
            metrics::gauge!("ingest_queue_depth").set(depth as f64);
        }
        token
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Work queue is closed")]
    Closed,
}
