//! Bounded FIFO work queue shared by the worker pool.
//!
//! A single producer feeds the queue and closes it by dropping the sender after
//! the last item; workers share one receiver, so every item is delivered to
//! exactly one worker and `recv` returns `None` once the queue is drained.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::ingest::cancel::CancelSignal;

/// Shared receiver for multiple workers pulling from one bounded channel.
pub struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Next item, or `None` when the queue is closed and empty
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Close the queue and take whatever is still buffered
    pub async fn drain(&self) -> Vec<T> {
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut left = Vec::new();
        while let Ok(item) = rx.try_recv() {
            left.push(item);
        }
        left
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Create a bounded queue holding at most `capacity` pending items
pub fn work_queue<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, SharedReceiver::new(rx))
}

/// Push `items` into the queue in order, then close it.
///
/// Stops early on cancellation (or if every receiver is gone) and returns the
/// items that were never enqueued.
pub async fn feed<T>(tx: mpsc::Sender<T>, items: Vec<T>, cancel: CancelSignal) -> Vec<T> {
    let mut items = items.into_iter();
    let mut left = Vec::new();

    while let Some(item) = items.next() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                left.push(item);
                break;
            }
            permit = tx.reserve() => match permit {
                Ok(permit) => permit.send(item),
                Err(_) => {
                    left.push(item);
                    break;
                }
            },
        }
    }

    left.extend(items);
    left
}
