//! Execution context
//!
//! Wraps a platform handle with its identity index and lifecycle stage and
//! enforces load-once, run-at-most-once ordering on top of whatever the
//! backend checks itself.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DispatchError, Result};
use crate::platform::{ContextHandle, ProgramImage, RunArgs};
use crate::unit::UnitReport;

/// Context shared between the dispatcher and its control thread
///
/// The dispatcher keeps one reference for teardown; the control thread
/// holds the other only for the duration of the run.
pub type SharedContext<H> = Arc<Mutex<ExecutionContext<H>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    Created,
    Loaded,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Loaded => "loaded",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One loaded, runnable program instance
pub struct ExecutionContext<H> {
    index: usize,
    stage: LifecycleStage,
    handle: H,
}

impl<H: ContextHandle> ExecutionContext<H> {
    pub fn new(index: usize, handle: H) -> Self {
        Self {
            index,
            stage: LifecycleStage::Created,
            handle,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Install the program image; allowed exactly once, before running
    pub fn load_program(&mut self, image: &ProgramImage) -> Result<()> {
        if self.stage != LifecycleStage::Created {
            return Err(DispatchError::ProgramLoadFailed {
                index: self.index,
                reason: format!("context is {}, not created", self.stage),
            });
        }

        self.handle
            .load(image)
            .map_err(|e| DispatchError::ProgramLoadFailed {
                index: self.index,
                reason: e.to_string(),
            })?;
        self.stage = LifecycleStage::Loaded;
        Ok(())
    }

    /// Run the loaded program, blocking until it returns or times out
    pub fn run(&mut self, args: RunArgs) -> Result<UnitReport> {
        if self.stage != LifecycleStage::Loaded {
            return Err(DispatchError::ContextRunFailed {
                index: self.index,
                reason: format!("context is {}, not loaded", self.stage),
            });
        }

        self.stage = LifecycleStage::Running;
        match self.handle.run(args) {
            Ok(report) => {
                self.stage = LifecycleStage::Completed;
                Ok(report)
            }
            Err(e) => {
                self.stage = LifecycleStage::Failed;
                Err(match e.timed_out_after() {
                    Some(after) => DispatchError::Timeout {
                        index: self.index,
                        after,
                    },
                    None => DispatchError::ContextRunFailed {
                        index: self.index,
                        reason: e.to_string(),
                    },
                })
            }
        }
    }

    /// Give up the wrapper for teardown
    pub fn into_handle(self) -> H {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ImageSource, JobConfig, JobDescriptor};
    use crate::platform::mock::{identity_image, Faults, MockPlatform};
    use crate::platform::Platform;
    use std::time::Duration;

    fn args(identity: u32) -> RunArgs {
        RunArgs {
            identity,
            job: JobDescriptor::new(ImageSource::from_bytes(Vec::new()), JobConfig::default()),
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_stage_progression() {
        let platform = MockPlatform::new(1);
        let mut ctx = ExecutionContext::new(0, platform.create_context(0).unwrap());
        assert_eq!(ctx.stage(), LifecycleStage::Created);

        ctx.load_program(&identity_image()).unwrap();
        assert_eq!(ctx.stage(), LifecycleStage::Loaded);

        let report = ctx.run(args(5)).unwrap();
        assert_eq!(report.identity, 5);
        assert_eq!(ctx.stage(), LifecycleStage::Completed);
    }

    #[test]
    fn test_load_twice_rejected() {
        let platform = MockPlatform::new(1);
        let mut ctx = ExecutionContext::new(0, platform.create_context(0).unwrap());
        ctx.load_program(&identity_image()).unwrap();

        let err = ctx.load_program(&identity_image()).unwrap_err();
        assert!(matches!(err, DispatchError::ProgramLoadFailed { index: 0, .. }));
    }

    #[test]
    fn test_run_requires_load_and_happens_once() {
        let platform = MockPlatform::new(1);
        let mut ctx = ExecutionContext::new(3, platform.create_context(3).unwrap());
        assert!(matches!(
            ctx.run(args(0)),
            Err(DispatchError::ContextRunFailed { index: 3, .. })
        ));

        ctx.load_program(&identity_image()).unwrap();
        ctx.run(args(0)).unwrap();
        assert!(matches!(
            ctx.run(args(0)),
            Err(DispatchError::ContextRunFailed { index: 3, .. })
        ));
    }

    #[test]
    fn test_run_failure_and_timeout_mapping() {
        let platform = MockPlatform::with_faults(
            2,
            Faults {
                run_at: Some(0),
                hang_at: Some(1),
                ..Default::default()
            },
        );

        let mut failing = ExecutionContext::new(0, platform.create_context(0).unwrap());
        failing.load_program(&identity_image()).unwrap();
        assert!(matches!(
            failing.run(args(0)),
            Err(DispatchError::ContextRunFailed { index: 0, .. })
        ));
        assert_eq!(failing.stage(), LifecycleStage::Failed);

        let mut hanging = ExecutionContext::new(1, platform.create_context(1).unwrap());
        hanging.load_program(&identity_image()).unwrap();
        assert_eq!(
            hanging.run(args(1)),
            Err(DispatchError::Timeout {
                index: 1,
                after: Duration::from_millis(50)
            })
        );
    }
}
