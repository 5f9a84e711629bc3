//! Deferred I/O completion.
//!
//! Submissions through a [`CompletionQueue`] perform the transfer right away,
//! while the caller's buffer is still in reach, and defer only the
//! notification. A synchronous [`ControlBlock`] gets the result back from
//! the submit call itself. An asynchronous one gets [`Submitted::Queued`],
//! and a background worker delivers the result to its receiver once a short
//! delay has passed.
//!
//! Each queued submission is notified exactly once. If the queue cannot take
//! the notification (full or shut down) the submit call returns the result
//! directly instead. Notifications come out roughly in submission order, but
//! callers with overlapping submissions must not rely on it.
//!
//! # Examples
//!
//! ```
//! use quantadev::completion::{CompletionQueue, ControlBlock, Submitted};
//! use quantadev::{DeviceSet, DriverConfig, OpenMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DriverConfig::default().with_device_count(1);
//! let devices = DeviceSet::new(&config)?;
//! let file = devices.get(0).unwrap().open(OpenMode::ReadWrite).await?;
//! let queue = CompletionQueue::from_config(&config);
//!
//! let (control, done) = ControlBlock::with_notification();
//! let submitted = queue.submit_write(&file, control, b"later".as_slice(), 0).await;
//! assert_eq!(submitted, Submitted::Queued);
//! assert_eq!(done.await?, Ok(5));
//!
//! queue.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::DriverConfig;
use crate::device::{DeviceError, OpenFile, UserSink, UserSource};

pub type IoResult = Result<usize, DeviceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Read,
    Write,
}

/// Receives the result of one asynchronous submission.
#[derive(Debug)]
pub struct Notifier {
    tx: oneshot::Sender<IoResult>,
}

impl Notifier {
    fn deliver(self, result: IoResult) {
        if self.tx.send(result).is_err() {
            tracing::trace!("Completion receiver dropped before delivery");
        }
    }
}

/// Describes how the submitter wants to learn about completion.
#[derive(Debug)]
pub enum ControlBlock {
    /// The submitter waits for the result of the submit call itself.
    Sync,
    /// The submitter is notified through a channel.
    Async(Notifier),
}

impl ControlBlock {
    pub fn sync() -> Self {
        ControlBlock::Sync
    }

    /// An asynchronous control block and the receiver its result arrives on.
    pub fn with_notification() -> (Self, oneshot::Receiver<IoResult>) {
        let (tx, rx) = oneshot::channel();
        (ControlBlock::Async(Notifier { tx }), rx)
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, ControlBlock::Sync)
    }
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// The result, delivered right away.
    Done(IoResult),
    /// The result will arrive on the control block's receiver.
    Queued,
}

struct Deferred {
    kind: IoKind,
    notifier: Notifier,
    result: IoResult,
    due: Instant,
}

/// A single-consumer queue of pending completion notices and the worker
/// task that delivers them.
///
/// Must be started from within a Tokio runtime.
pub struct CompletionQueue {
    tx: mpsc::Sender<Deferred>,
    worker: JoinHandle<()>,
    delay: Duration,
}

impl CompletionQueue {
    pub fn start(delay: Duration, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let worker = tokio::spawn(Self::run(rx));
        Self { tx, worker, delay }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::start(config.completion_delay, config.completion_queue_depth)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    async fn run(mut rx: mpsc::Receiver<Deferred>) {
        while let Some(job) = rx.recv().await {
            tokio::time::sleep_until(job.due).await;
            tracing::trace!("Delivering deferred {:?} completion", job.kind);
            job.notifier.deliver(job.result);
        }
        tracing::debug!("Completion worker drained");
    }

    /// Reads into `dst` at `offset` now and reports completion per `control`.
    ///
    /// The transfer is positional; the file position does not move.
    pub async fn submit_read<B: UserSink + ?Sized>(
        &self,
        file: &OpenFile,
        control: ControlBlock,
        dst: &mut B,
        offset: u64,
    ) -> Submitted {
        let result = file
            .device()
            .read_at(offset, dst, file.cancellation())
            .await;
        self.complete(IoKind::Read, control, result)
    }

    /// Writes `src` at `offset` now and reports completion per `control`.
    ///
    /// The transfer is positional; the file position does not move.
    pub async fn submit_write<B: UserSource + ?Sized>(
        &self,
        file: &OpenFile,
        control: ControlBlock,
        src: &B,
        offset: u64,
    ) -> Submitted {
        let result = file
            .device()
            .write_at(offset, src, file.cancellation())
            .await;
        self.complete(IoKind::Write, control, result)
    }

    fn complete(&self, kind: IoKind, control: ControlBlock, result: IoResult) -> Submitted {
        let notifier = match control {
            ControlBlock::Sync => return Submitted::Done(result),
            ControlBlock::Async(notifier) => notifier,
        };

        let job = Deferred {
            kind,
            notifier,
            result,
            due: Instant::now() + self.delay,
        };
        match self.tx.try_send(job) {
            Ok(()) => Submitted::Queued,
            Err(err) => {
                tracing::warn!("Completion queue unavailable, completing {:?} now", kind);
                Submitted::Done(err.into_inner().result)
            }
        }
    }

    /// Stops accepting notices, delivers every pending one and waits for the
    /// worker to finish.
    pub async fn shutdown(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        if let Err(err) = worker.await {
            tracing::warn!("Completion worker ended abnormally: {}", err);
        }
    }
}

impl std::fmt::Debug for CompletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionQueue")
            .field("delay", &self.delay)
            .field("capacity", &self.tx.capacity())
            .finish()
    }
}
