//! Wake signal for the commit loop.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

/// Tells the scheduler another commit is needed.
///
/// Signals coalesce: any number of signals before a wait wake it once.
#[derive(Clone)]
pub struct Trigger {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Trigger {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self { sender, receiver }
    }

    pub fn signal(&self) {
        let _ = self.sender.try_send(());
    }

    /// Blocks until signaled or `timeout` elapses. Returns whether a signal
    /// was received.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.receiver.recv_timeout(timeout).is_ok()
    }

    /// Consumes a pending signal without blocking.
    pub fn take(&self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("pending", &!self.receiver.is_empty())
            .finish()
    }
}
