//! Transfer progress notifications.
//!
//! Built on `tokio::sync::watch`: publishing never waits for a reader, and a
//! slow observer only ever sees the latest value.

use tokio::sync::watch;

/// Bytes transferred so far out of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub transferred: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(transferred: u64, total: u64) -> Self {
        Self { transferred, total }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.transferred >= self.total
    }

    /// Percentage in `0.0..=100.0`; zero-length transfers count as done.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.transferred.min(self.total) as f64 / self.total as f64) * 100.0
    }
}

/// Publishing side, held by the Transfer Unit.
#[derive(Debug)]
pub struct ProgressSender {
    tx: watch::Sender<Progress>,
}

/// Observing side, handed to whoever renders progress.
pub type ProgressReceiver = watch::Receiver<Progress>;

/// Create a progress channel for a transfer of `total` bytes.
pub fn progress_channel(total: u64) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = watch::channel(Progress::new(0, total));
    (ProgressSender { tx }, rx)
}

impl ProgressSender {
    /// A sender with no observer, for transfers nobody watches.
    pub fn detached(total: u64) -> Self {
        progress_channel(total).0
    }

    /// Record `transferred` bytes. Values lower than the last published one are
    /// ignored so observers see a non-decreasing sequence.
    pub fn update(&self, transferred: u64, total: u64) {
        self.tx.send_if_modified(|current| {
            if transferred < current.transferred {
                return false;
            }
            let changed = transferred != current.transferred || total != current.total;
            current.transferred = transferred;
            current.total = total;
            changed
        });
    }

    pub fn current(&self) -> Progress {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }
}
