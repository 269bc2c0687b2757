//! Co-processor platform abstraction
//!
//! A platform discovers compute units and hands out execution contexts for
//! them. The dispatcher only talks to these traits.
//!
//! # Lifecycle
//!
//! ```text
//! Platform::create_context() ──► ContextHandle
//!                                   │ load(&ProgramImage)   exactly once
//!                                   │ run(RunArgs)          at most once, blocking
//!                                   ▼
//! Platform::destroy_context(handle)                         consumes the handle
//! ```
//!
//! `sim` provides software compute units running on native threads.

pub mod mailbox;
mod sim;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::job::JobDescriptor;
use crate::unit::{UnitEnv, UnitError, UnitReport};

pub use sim::{SimContext, SimPlatform};

/// Errors reported by a platform backend
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// No co-processor state left to allocate
    #[error("Resources exhausted: {0}")]
    Exhausted(String),

    /// Program image rejected or already installed
    #[error("Invalid program image: {0}")]
    BadImage(String),

    /// Context used out of order
    #[error("Context not runnable: {0}")]
    NotRunnable(String),

    /// Run did not complete in time
    #[error("Run did not complete within {0:?}")]
    Timeout(Duration),

    /// Entry routine on the unit failed
    #[error("Unit failed: {0}")]
    Unit(#[from] UnitError),

    /// Any other backend failure
    #[error("Platform fault: {0}")]
    Fault(String),
}

impl PlatformError {
    /// Bounded wait expired, either for the run or for the unit's handshake
    pub fn timed_out_after(&self) -> Option<Duration> {
        match self {
            Self::Timeout(after) => Some(*after),
            Self::Unit(UnitError::Handshake(mailbox::MailboxError::Timeout(after))) => {
                Some(*after)
            }
            _ => None,
        }
    }
}

/// Entry routine signature of a program image
pub type EntryFn = dyn Fn(UnitEnv) -> Result<UnitReport, UnitError> + Send + Sync;

/// Compiled payload installed into every context
///
/// Read-only and cheap to clone; all contexts share one instance.
#[derive(Clone)]
pub struct ProgramImage {
    name: Arc<str>,
    entry: Arc<EntryFn>,
}

impl ProgramImage {
    pub fn new<F>(name: &str, entry: F) -> Self
    where
        F: Fn(UnitEnv) -> Result<UnitReport, UnitError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            entry: Arc::new(entry),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the entry routine on the calling thread
    pub fn start(&self, env: UnitEnv) -> Result<UnitReport, UnitError> {
        (self.entry)(env)
    }
}

impl fmt::Debug for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramImage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Arguments of one context run
#[derive(Debug)]
pub struct RunArgs {
    /// Scalar delivered through the identification mailbox
    pub identity: u32,
    /// This context's own job descriptor
    pub job: JobDescriptor,
    /// Upper bound on the blocking run
    pub timeout: Duration,
}

/// Control-side handle of one loaded, runnable program instance
pub trait ContextHandle: Send + 'static {
    /// Install the program image
    fn load(&mut self, image: &ProgramImage) -> Result<(), PlatformError>;

    /// Start the program and block until it returns or the timeout expires
    fn run(&mut self, args: RunArgs) -> Result<UnitReport, PlatformError>;
}

/// Source of compute units and execution contexts
pub trait Platform: Send + Sync + 'static {
    type Handle: ContextHandle;

    /// Backend name for logs
    fn name(&self) -> &str;

    /// Number of usable compute units, before any cap is applied
    fn usable_units(&self) -> usize;

    /// Allocate a context for the unit at `index`
    fn create_context(&self, index: usize) -> Result<Self::Handle, PlatformError>;

    /// Release a context
    fn destroy_context(&self, handle: Self::Handle) -> Result<(), PlatformError>;
}
