//! Simulated co-processor platform
//!
//! Each compute unit is a native thread started when its context is run.
//! The control side delivers the identity through the mailbox and waits for
//! the unit's completion with a bounded wait.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, RecvTimeoutError};

use super::mailbox;
use super::{ContextHandle, Platform, PlatformError, ProgramImage, RunArgs};
use crate::unit::{UnitEnv, UnitReport};

/// First unit id handed out; ids are shown in hex in unit logs
const SPEID_BASE: u64 = 0x1000;

/// Software compute units
pub struct SimPlatform {
    units: usize,
    /// Units held by a context or by a still running unit thread
    live: Arc<AtomicUsize>,
    next_speid: AtomicU64,
}

impl SimPlatform {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            live: Arc::new(AtomicUsize::new(0)),
            next_speid: AtomicU64::new(SPEID_BASE),
        }
    }

    /// Number of units currently allocated
    ///
    /// A unit detached at teardown stays allocated until its thread exits.
    pub fn live_contexts(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl Platform for SimPlatform {
    type Handle = SimContext;

    fn name(&self) -> &str {
        "sim"
    }

    fn usable_units(&self) -> usize {
        self.units
    }

    fn create_context(&self, index: usize) -> Result<SimContext, PlatformError> {
        let units = self.units;
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < units).then_some(live + 1)
            })
            .map_err(|live| {
                PlatformError::Exhausted(format!("{} of {} units in use", live, units))
            })?;

        Ok(SimContext {
            index,
            speid: self.next_speid.fetch_add(1, Ordering::Relaxed),
            image: None,
            unit: None,
            reported: false,
            slot: Arc::new(UnitSlot {
                live: Arc::clone(&self.live),
            }),
        })
    }

    fn destroy_context(&self, mut handle: SimContext) -> Result<(), PlatformError> {
        match handle.unit.take() {
            Some(unit) if handle.reported || unit.is_finished() => {
                if unit.join().is_err() {
                    tracing::warn!("unit {:x} panicked", handle.speid);
                }
                Ok(())
            }
            Some(unit) => {
                // Detached; the unit keeps its slot until the thread exits
                drop(unit);
                Err(PlatformError::Fault(format!(
                    "unit {:x} still running",
                    handle.speid
                )))
            }
            None => Ok(()),
        }
    }
}

/// Allocation of one unit, released when the last holder drops it
///
/// Shared by the context and its unit thread.
struct UnitSlot {
    live: Arc<AtomicUsize>,
}

impl Drop for UnitSlot {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Context on a simulated unit
pub struct SimContext {
    index: usize,
    speid: u64,
    image: Option<ProgramImage>,
    unit: Option<JoinHandle<()>>,
    /// The unit delivered its result, so its thread is about to exit
    reported: bool,
    slot: Arc<UnitSlot>,
}

impl SimContext {
    pub fn speid(&self) -> u64 {
        self.speid
    }
}

impl ContextHandle for SimContext {
    fn load(&mut self, image: &ProgramImage) -> Result<(), PlatformError> {
        if let Some(loaded) = &self.image {
            return Err(PlatformError::BadImage(format!(
                "context {} already holds {}",
                self.index,
                loaded.name()
            )));
        }
        self.image = Some(image.clone());
        Ok(())
    }

    fn run(&mut self, args: RunArgs) -> Result<UnitReport, PlatformError> {
        if self.unit.is_some() {
            return Err(PlatformError::NotRunnable(format!(
                "context {} already ran",
                self.index
            )));
        }
        let image = self.image.clone().ok_or_else(|| {
            PlatformError::NotRunnable(format!("context {} has no program loaded", self.index))
        })?;

        let (writer, reader) = mailbox::channel();
        let (done_tx, done_rx) = bounded(1);
        let env = UnitEnv {
            speid: self.speid,
            inbound: reader,
            job: args.job,
        };

        let slot = Arc::clone(&self.slot);
        let unit = thread::Builder::new()
            .name(format!("unit-{}", self.index))
            .spawn(move || {
                let _slot = slot;
                let _ = done_tx.send(image.start(env));
            })
            .map_err(|e| PlatformError::Fault(format!("failed to start unit: {}", e)))?;
        self.unit = Some(unit);

        if let Err(e) = writer.send(args.identity) {
            // Unit is already gone; its result says why
            tracing::debug!("unit {:x}: {}", self.speid, e);
        }

        match done_rx.recv_timeout(args.timeout) {
            Ok(result) => {
                self.reported = true;
                result.map_err(PlatformError::from)
            }
            Err(RecvTimeoutError::Timeout) => Err(PlatformError::Timeout(args.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                self.reported = true;
                Err(PlatformError::Fault(format!(
                    "unit {:x} terminated without reporting",
                    self.speid
                )))
            }
        }
    }
}

impl Drop for SimContext {
    fn drop(&mut self) {
        if let Some(unit) = self.unit.take() {
            if self.reported || unit.is_finished() {
                if unit.join().is_err() {
                    tracing::warn!("unit {:x} panicked", self.speid);
                }
            } else {
                tracing::warn!(
                    "unit {:x} still running at teardown, detaching it",
                    self.speid
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ImageSource, JobConfig, JobDescriptor};
    use crate::unit::UnitError;
    use std::time::{Duration, Instant};

    fn echo_image() -> ProgramImage {
        ProgramImage::new("echo", |env: UnitEnv| {
            let identity = env.inbound.recv_timeout(Duration::from_secs(5))?;
            Ok(UnitReport {
                identity,
                speid: env.speid,
                lines: 0,
                elapsed: Duration::ZERO,
            })
        })
    }

    fn args(identity: u32, timeout: Duration) -> RunArgs {
        RunArgs {
            identity,
            job: JobDescriptor::new(ImageSource::from_bytes(Vec::new()), JobConfig::default()),
            timeout,
        }
    }

    #[test]
    fn test_create_is_bounded_by_units() {
        let platform = SimPlatform::new(2);
        let a = platform.create_context(0).unwrap();
        let _b = platform.create_context(1).unwrap();
        assert!(matches!(
            platform.create_context(2),
            Err(PlatformError::Exhausted(_))
        ));

        platform.destroy_context(a).unwrap();
        assert_eq!(platform.live_contexts(), 1);
        assert!(platform.create_context(2).is_ok());
    }

    #[test]
    fn test_run_delivers_identity() {
        let platform = SimPlatform::new(1);
        let mut ctx = platform.create_context(0).unwrap();
        ctx.load(&echo_image()).unwrap();

        let report = ctx.run(args(3, Duration::from_secs(5))).unwrap();
        assert_eq!(report.identity, 3);
        assert_eq!(report.speid, ctx.speid());

        platform.destroy_context(ctx).unwrap();
        assert_eq!(platform.live_contexts(), 0);
    }

    #[test]
    fn test_load_once_run_once() {
        let platform = SimPlatform::new(1);
        let mut ctx = platform.create_context(0).unwrap();
        assert!(matches!(
            ctx.run(args(0, Duration::from_secs(1))),
            Err(PlatformError::NotRunnable(_))
        ));

        ctx.load(&echo_image()).unwrap();
        assert!(matches!(
            ctx.load(&echo_image()),
            Err(PlatformError::BadImage(_))
        ));

        ctx.run(args(0, Duration::from_secs(5))).unwrap();
        assert!(matches!(
            ctx.run(args(0, Duration::from_secs(1))),
            Err(PlatformError::NotRunnable(_))
        ));
    }

    #[test]
    fn test_run_timeout() {
        let platform = SimPlatform::new(1);
        let mut ctx = platform.create_context(0).unwrap();
        let stall = ProgramImage::new("stall", |_env: UnitEnv| {
            thread::sleep(Duration::from_millis(300));
            Err(UnitError::Output(std::io::Error::other("late")))
        });
        ctx.load(&stall).unwrap();

        let err = ctx.run(args(0, Duration::from_millis(20))).unwrap_err();
        assert_eq!(err.timed_out_after(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_destroy_while_unit_running_keeps_slot() {
        let platform = SimPlatform::new(1);
        let mut ctx = platform.create_context(0).unwrap();
        let stall = ProgramImage::new("stall", |_env: UnitEnv| {
            thread::sleep(Duration::from_millis(300));
            Err(UnitError::Output(std::io::Error::other("late")))
        });
        ctx.load(&stall).unwrap();
        assert!(ctx.run(args(0, Duration::from_millis(20))).is_err());

        assert!(matches!(
            platform.destroy_context(ctx),
            Err(PlatformError::Fault(_))
        ));
        // The detached unit still occupies the only unit
        assert_eq!(platform.live_contexts(), 1);
        assert!(matches!(
            platform.create_context(1),
            Err(PlatformError::Exhausted(_))
        ));

        let deadline = Instant::now() + Duration::from_secs(5);
        while platform.live_contexts() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(platform.live_contexts(), 0);
        assert!(platform.create_context(1).is_ok());
    }

    #[test]
    fn test_destroy_after_report_joins_unit() {
        let platform = SimPlatform::new(4);
        for index in 0..4 {
            let mut ctx = platform.create_context(index).unwrap();
            ctx.load(&echo_image()).unwrap();
            ctx.run(args(index as u32, Duration::from_secs(5))).unwrap();
            platform.destroy_context(ctx).unwrap();
        }
        assert_eq!(platform.live_contexts(), 0);
    }

    #[test]
    fn test_unit_panic_is_a_fault() {
        let platform = SimPlatform::new(1);
        let mut ctx = platform.create_context(0).unwrap();
        ctx.load(&ProgramImage::new("boom", |_env: UnitEnv| panic!("unit crashed")))
            .unwrap();

        assert!(matches!(
            ctx.run(args(0, Duration::from_secs(5))),
            Err(PlatformError::Fault(_))
        ));
    }
}
