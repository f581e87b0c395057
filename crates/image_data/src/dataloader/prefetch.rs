//! Double-buffered batch production on a background thread.
//!
//! A fixed set of [`Batch`] buffers circulates between two bounded channels:
//!
//! ```text
//!                 free channel (empty buffers)
//!   consumer ─────────────────────────────────────► producer thread
//!      ▲                                                  │ load_batch(&mut batch)
//!      └──────────────────────────────────────────────────┘
//!                 full channel (Result<Batch>)
//! ```
//!
//! - The producer blocks only while waiting for a free buffer.
//! - The consumer gets a [`PrefetchedBatch`] guard that sends the buffer back
//!   to the free channel when dropped.
//! - Stopping is cooperative: the flag is checked between batches, never in
//!   the middle of one.
//! - The first production error is forwarded to the consumer, then the
//!   producer exits.

use crate::dataloader::common::thread::init_transform_rng;
use crate::minibatch::Batch;
use anyhow::{anyhow, ensure, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// How often an idle producer re-checks the stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const PREFETCH_THREAD_NAME: &str = "image-data-prefetch";

/// Owns the producer thread and both ends of the buffer ring the consumer uses.
pub struct PrefetchThread {
    handle: Option<thread::JoinHandle<()>>,
    free_tx: Option<Sender<Batch>>,
    full_rx: Receiver<Result<Batch>>,
    shutdown: Arc<AtomicBool>,
    timeout: Duration,
}

impl PrefetchThread {
    /// Starts the producer thread with `batches` as the buffer ring.
    ///
    /// The thread seeds its transform RNG from `seed`, then calls `produce`
    /// once per free buffer until stopped or until `produce` fails.
    pub fn spawn<F>(batches: Vec<Batch>, timeout: Duration, seed: u64, produce: F) -> Result<Self>
    where
        F: FnMut(&mut Batch) -> Result<()> + Send + 'static,
    {
        ensure!(
            !batches.is_empty(),
            "Cannot start prefetching without at least one batch buffer"
        );

        let capacity = batches.len();
        let (free_tx, free_rx) = bounded(capacity);
        let (full_tx, full_rx) = bounded(capacity);
        for batch in batches {
            free_tx
                .send(batch)
                .map_err(|_| anyhow!("Free batch channel closed during setup"))?;
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = shutdown.clone();
        let handle = thread::Builder::new()
            .name(PREFETCH_THREAD_NAME.to_string())
            .spawn(move || {
                init_transform_rng(seed);
                produce_batches(free_rx, full_tx, stop, produce);
            })
            .context("Failed to spawn prefetch thread")?;

        debug!("Started {} with {} batch buffers", PREFETCH_THREAD_NAME, capacity);
        Ok(Self {
            handle: Some(handle),
            free_tx: Some(free_tx),
            full_rx,
            shutdown,
            timeout,
        })
    }

    /// Waits up to the configured timeout for the next filled batch.
    pub fn recv(&self) -> Result<PrefetchedBatch<'_>> {
        let free_tx = self
            .free_tx
            .as_ref()
            .ok_or_else(|| anyhow!("Prefetch thread is shutting down"))?;

        match self.full_rx.recv_timeout(self.timeout) {
            Ok(Ok(batch)) => Ok(PrefetchedBatch { batch, free_tx }),
            Ok(Err(err)) => Err(err.context("Batch production failed")),
            Err(RecvTimeoutError::Timeout) => Err(anyhow!(
                "Timed out after {:?} waiting for a prefetched batch",
                self.timeout
            )),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("Prefetch thread has stopped")),
        }
    }
}

fn produce_batches<F>(
    free_rx: Receiver<Batch>,
    full_tx: Sender<Result<Batch>>,
    stop: Arc<AtomicBool>,
    mut produce: F,
) where
    F: FnMut(&mut Batch) -> Result<()>,
{
    while !stop.load(Ordering::Acquire) {
        let mut batch = match free_rx.recv_timeout(STOP_POLL_INTERVAL) {
            Ok(batch) => batch,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match produce(&mut batch) {
            Ok(()) => {
                if full_tx.send(Ok(batch)).is_err() {
                    break;
                }
            }
            Err(err) => {
                error!("Prefetch thread stopped: {:#}", err);
                let _ = full_tx.send(Err(err));
                break;
            }
        }
    }
    debug!("{} exiting", PREFETCH_THREAD_NAME);
}

impl Drop for PrefetchThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        // Closing the free channel wakes a producer waiting for a buffer.
        self.free_tx.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("{} panicked", PREFETCH_THREAD_NAME);
            }
        }
    }
}

// ============================================================================
// PrefetchedBatch
// ============================================================================

/// A filled batch on loan to the consumer.
///
/// Dropping the guard hands the buffer back to the producer, which will
/// overwrite it. Use `Tensor::copy` (or move the data to another device) to
/// keep values beyond the guard's lifetime.
pub struct PrefetchedBatch<'a> {
    batch: Batch,
    free_tx: &'a Sender<Batch>,
}

impl Deref for PrefetchedBatch<'_> {
    type Target = Batch;

    fn deref(&self) -> &Batch {
        &self.batch
    }
}

impl DerefMut for PrefetchedBatch<'_> {
    fn deref_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }
}

impl Drop for PrefetchedBatch<'_> {
    fn drop(&mut self) {
        // The ring holds as many slots as there are buffers, so this never blocks.
        let _ = self.free_tx.send(self.batch.shallow_clone());
    }
}
