//! Identification mailbox
//!
//! One-shot, one-way channel carrying a single `u32` from the control side
//! to a compute unit at startup. Both ends are consumed by use, so a value
//! can be sent and received at most once.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// Handshake errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    #[error("No identity received within {0:?}")]
    Timeout(Duration),

    #[error("Mailbox closed before an identity was sent")]
    Closed,
}

/// Control side of the mailbox
#[derive(Debug)]
pub struct MailboxWriter {
    tx: Sender<u32>,
}

/// Compute unit side of the mailbox
#[derive(Debug)]
pub struct MailboxReader {
    rx: Receiver<u32>,
}

/// Create a connected writer/reader pair
pub fn channel() -> (MailboxWriter, MailboxReader) {
    let (tx, rx) = bounded(1);
    (MailboxWriter { tx }, MailboxReader { rx })
}

impl MailboxWriter {
    /// Deliver the identity scalar
    ///
    /// Never blocks: the slot is empty because the writer is single-use.
    /// Fails only if the reader was already dropped.
    pub fn send(self, value: u32) -> Result<(), MailboxError> {
        self.tx.send(value).map_err(|_| MailboxError::Closed)
    }
}

impl MailboxReader {
    /// Wait at most `timeout` for the identity scalar
    pub fn recv_timeout(self, timeout: Duration) -> Result<u32, MailboxError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => MailboxError::Timeout(timeout),
            RecvTimeoutError::Disconnected => MailboxError::Closed,
        })
    }

    /// Wait without bound for the identity scalar
    pub fn recv(self) -> Result<u32, MailboxError> {
        self.rx.recv().map_err(|_| MailboxError::Closed)
    }
}
