//! Debounce utility for coalescing rapid events.
//!
//! Editors commonly save through a write-temp-then-rename dance that
//! produces several filesystem events for one logical change. The debouncer
//! holds each key until a quiet period has passed since its last arrival,
//! then emits the key once, so downstream sees one change event per file.
//!
//! A background task keeps a map of pending keys and their deadlines. A new
//! arrival for a pending key resets its deadline; when a deadline expires
//! the key is emitted on the output channel.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Capacity of the internal channel feeding the debounce task.
const INPUT_CHANNEL_CAPACITY: usize = 1000;

/// Error type for debouncer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebouncerError {
    /// The debouncer's background task has terminated.
    #[error("debouncer channel closed")]
    ChannelClosed,

    /// The internal channel is full; the event was dropped.
    #[error("debouncer channel full, event dropped")]
    ChannelFull,
}

/// A debouncer that coalesces rapid events by key.
///
/// Keys are held until `interval` has passed since the last arrival for
/// that key, at which point the key is emitted once on the output channel.
#[derive(Debug)]
pub struct Debouncer<K>
where
    K: Clone + Eq + Hash + Send + Debug + 'static,
{
    input_tx: mpsc::Sender<K>,
    /// Kept for cleanup; the task exits when the input channel closes.
    #[allow(dead_code)]
    task_handle: tokio::task::JoinHandle<()>,
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + Send + Debug + 'static,
{
    /// Creates a debouncer emitting on `output_tx` after `interval` of
    /// quiet per key.
    #[must_use]
    pub fn new(interval: Duration, output_tx: mpsc::Sender<K>) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);

        let task_handle = tokio::spawn(async move {
            run_debounce_loop(interval, input_rx, output_tx).await;
        });

        Self {
            input_tx,
            task_handle,
        }
    }

    /// Creates a debouncer with the default interval.
    #[must_use]
    pub fn with_default_interval(output_tx: mpsc::Sender<K>) -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS), output_tx)
    }

    /// Sends a key to be debounced, waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the background task has
    /// terminated.
    pub async fn send(&self, key: K) -> Result<(), DebouncerError> {
        self.input_tx
            .send(key)
            .await
            .map_err(|_| DebouncerError::ChannelClosed)
    }

    /// Sends a key without waiting. Intended for synchronous callers such
    /// as the notify callback thread, which must never block.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelFull`] if the channel is at
    /// capacity, or [`DebouncerError::ChannelClosed`] if the background
    /// task has terminated.
    pub fn try_send(&self, key: K) -> Result<(), DebouncerError> {
        self.input_tx.try_send(key).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DebouncerError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => DebouncerError::ChannelClosed,
        })
    }
}

/// Background loop: track deadlines per key, emit on expiry.
async fn run_debounce_loop<K>(
    interval: Duration,
    mut input_rx: mpsc::Receiver<K>,
    output_tx: mpsc::Sender<K>,
) where
    K: Clone + Eq + Hash + Send + Debug + 'static,
{
    let mut pending: HashMap<K, Instant> = HashMap::new();

    loop {
        let next_deadline = pending.values().min().copied();

        tokio::select! {
            maybe_key = input_rx.recv() => {
                match maybe_key {
                    Some(key) => {
                        trace!(?key, "debounce timer reset");
                        pending.insert(key, Instant::now() + interval);
                    }
                    None => break,
                }
            }

            () = sleep_until_or_forever(next_deadline) => {
                let now = Instant::now();
                let expired: Vec<K> = pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(key, _)| key.clone())
                    .collect();

                for key in expired {
                    pending.remove(&key);
                    if output_tx.send(key).await.is_err() {
                        warn!("debounce output channel closed, stopping");
                        return;
                    }
                }
            }
        }
    }

    // Input closed: flush whatever is still pending.
    for (key, _) in pending.drain() {
        let _ = output_tx.send(key).await;
    }
}

/// Sleeps until the deadline, or forever when there is nothing pending.
async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
