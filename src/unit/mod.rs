//! Co-processor entry routine
//!
//! What a compute unit executes once its context is run:
//!
//! 1. **Await-Identity**: block (bounded) on the identification mailbox
//! 2. **Execute**: recognize the job, report timing, emit the text, free the
//!    image, return
//!
//! Returning is the completion signal; the control side observes it as the
//! end of its blocking run call.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::job::JobDescriptor;
use crate::ocr::{OcrError, Recognizer, SharedSink};
use crate::platform::mailbox::{MailboxError, MailboxReader};
use crate::platform::ProgramImage;

/// Everything a unit receives at start
#[derive(Debug)]
pub struct UnitEnv {
    /// Platform id of the unit
    pub speid: u64,
    /// Identification mailbox, control to unit
    pub inbound: MailboxReader,
    /// The unit's own job copy
    pub job: JobDescriptor,
}

/// Result of a completed entry routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// Identity received in the handshake
    pub identity: u32,
    pub speid: u64,
    /// Lines written to the output sink
    pub lines: usize,
    /// Time since the job was marked started
    pub elapsed: Duration,
}

/// Entry routine failures
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Identification handshake failed: {0}")]
    Handshake(#[from] MailboxError),

    #[error("Recognition failed: {0}")]
    Recognition(#[from] OcrError),

    #[error("Output failed: {0}")]
    Output(#[from] io::Error),
}

/// Phase of the entry routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    AwaitIdentity,
    Execute,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitIdentity => f.write_str("await-identity"),
            Self::Execute => f.write_str("execute"),
        }
    }
}

/// The OCR program run on every compute unit
pub struct OcrProgram {
    recognizer: Arc<dyn Recognizer>,
    sink: SharedSink,
    handshake_timeout: Duration,
}

impl OcrProgram {
    /// Image name of the unit program
    pub const NAME: &'static str = "ocr_spu";

    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        sink: SharedSink,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            sink,
            handshake_timeout,
        }
    }

    /// Run the entry routine on the calling thread
    pub fn entry(&self, env: UnitEnv) -> Result<UnitReport, UnitError> {
        let UnitEnv {
            speid,
            inbound,
            mut job,
        } = env;

        tracing::trace!("unit {:x}: {}", speid, UnitState::AwaitIdentity);
        let identity = inbound.recv_timeout(self.handshake_timeout)?;
        tracing::info!("Hello world! unit {:x} identified as {}", speid, identity);

        tracing::trace!("unit {:x}: {}", speid, UnitState::Execute);
        self.recognizer.recognize(&mut job)?;
        let elapsed = job.elapsed().unwrap_or_default();
        mark_end(&job, elapsed);
        let lines = self.sink.emit(&mut job)?;
        job.free_image();

        Ok(UnitReport {
            identity,
            speid,
            lines,
            elapsed,
        })
    }

    /// Package the program as a loadable image
    pub fn into_image(self) -> ProgramImage {
        ProgramImage::new(Self::NAME, move |env| self.entry(env))
    }
}

/// Report elapsed time when verbose
fn mark_end(job: &JobDescriptor, elapsed: Duration) {
    if job.cfg.verbose == 0 {
        return;
    }
    let secs = elapsed.as_secs();
    tracing::info!(
        "Elapsed time: {}:{:02}.{:03}",
        secs / 60,
        secs % 60,
        elapsed.subsec_millis()
    );
}
