//! Dispatcher
//!
//! Discovers usable units, then in a single pass creates, loads and spawns
//! one context per unit. All control threads are joined before any context
//! is torn down. A failure while setting up context `i` stops the pass; the
//! contexts already created are still joined and destroyed.
//!
//! ```text
//! for i in 0..min(usable, cap):   create(i) → load(i) → spawn(i)
//!                                          │ failure: stop creating
//! join_all(threads)               ── full barrier ──
//! destroy_all(contexts)           every created context, run or not
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::job::JobDescriptor;
use crate::platform::{Platform, ProgramImage};
use crate::unit::UnitReport;

use super::context::{ExecutionContext, SharedContext};
use super::control::ControlThread;
use super::report::{ContextOutcome, ContextStatus, DispatchReport};

/// Hard cap on contexts per dispatch, independent of hardware
pub const MAX_UNITS: usize = 6;

/// Drives one program image across a platform's compute units
pub struct Dispatcher<P: Platform> {
    platform: Arc<P>,
    image: ProgramImage,
    config: DispatchConfig,
    /// Context index whose control thread fails to start
    #[cfg(test)]
    spawn_fault: Option<usize>,
}

impl<P: Platform> Dispatcher<P> {
    pub fn new(platform: Arc<P>, image: ProgramImage, config: DispatchConfig) -> Self {
        Self {
            platform,
            image,
            config,
            #[cfg(test)]
            spawn_fault: None,
        }
    }

    #[cfg(test)]
    fn with_spawn_fault(mut self, index: Option<usize>) -> Self {
        self.spawn_fault = index;
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Usable units, clamped to the cap; zero is a valid answer
    pub fn discover_unit_count(&self) -> usize {
        self.platform.usable_units().min(self.config.unit_cap())
    }

    /// Allocate the context for unit `index`
    pub fn create_context(&self, index: usize) -> Result<ExecutionContext<P::Handle>> {
        let handle = self.platform.create_context(index).map_err(|e| {
            DispatchError::ContextCreateFailed {
                index,
                reason: e.to_string(),
            }
        })?;
        tracing::debug!("Context {} created on {}", index, self.platform.name());
        Ok(ExecutionContext::new(index, handle))
    }

    /// Install the shared program image into a context
    pub fn load_program(&self, ctx: &mut ExecutionContext<P::Handle>) -> Result<()> {
        ctx.load_program(&self.image)?;
        tracing::debug!("Context {} loaded {}", ctx.index(), self.image.name());
        Ok(())
    }

    /// Start the control thread of a loaded context
    ///
    /// The thread gets its own copy of `job` and the context index as its
    /// identity.
    pub fn spawn(&self, slot: SharedContext<P::Handle>, job: &JobDescriptor) -> Result<ControlThread> {
        let index = slot.lock().index();
        #[cfg(test)]
        if self.spawn_fault == Some(index) {
            return Err(DispatchError::ThreadCreateFailed {
                index,
                reason: "injected spawn failure".to_string(),
            });
        }
        let thread = ControlThread::spawn(slot, job.clone(), index as u32, self.config.run_timeout)?;
        tracing::debug!("Context {} handed to its control thread", index);
        Ok(thread)
    }

    /// Wait for every control thread, whatever their outcome
    pub fn join_all(&self, threads: Vec<ControlThread>) -> Vec<(usize, Result<UnitReport>)> {
        threads
            .into_iter()
            .map(|thread| (thread.index(), thread.join()))
            .collect()
    }

    /// Release one context; its control thread must have been joined
    pub fn destroy(&self, slot: SharedContext<P::Handle>) -> Result<()> {
        let index = slot.lock().index();
        let ctx = Arc::try_unwrap(slot)
            .map_err(|_| DispatchError::ContextDestroyFailed {
                index,
                reason: "context is still referenced by a control thread".to_string(),
            })?
            .into_inner();

        self.platform
            .destroy_context(ctx.into_handle())
            .map_err(|e| DispatchError::ContextDestroyFailed {
                index,
                reason: e.to_string(),
            })?;
        tracing::debug!("Context {} destroyed", index);
        Ok(())
    }

    /// Release every context, attempting all of them even after a failure
    pub fn destroy_all(&self, slots: Vec<SharedContext<P::Handle>>) -> Vec<(usize, Result<()>)> {
        slots
            .into_iter()
            .map(|slot| {
                let index = slot.lock().index();
                (index, self.destroy(slot))
            })
            .collect()
    }

    /// Full dispatch pass for `job`
    pub fn run(&self, job: &JobDescriptor) -> DispatchReport {
        let units = self.discover_unit_count();
        let mut report = DispatchReport::new(self.platform.name(), units);

        if units == 0 {
            tracing::info!("No usable units on {}, nothing to dispatch", self.platform.name());
            return report;
        }
        tracing::info!(
            "Dispatching {} to {} units on {} ({} usable, cap {})",
            self.image.name(),
            units,
            self.platform.name(),
            self.platform.usable_units(),
            self.config.unit_cap()
        );

        let mut slots: Vec<SharedContext<P::Handle>> = Vec::with_capacity(units);
        let mut threads = Vec::with_capacity(units);

        for index in 0..units {
            let mut ctx = match self.create_context(index) {
                Ok(ctx) => ctx,
                Err(e) => {
                    tracing::error!("{}", e);
                    report.record_error(e);
                    break;
                }
            };
            report.created += 1;
            report.contexts.push(ContextOutcome::new(index));

            let loaded = self.load_program(&mut ctx);
            let slot = Arc::new(Mutex::new(ctx));
            slots.push(Arc::clone(&slot));
            if let Err(e) = loaded {
                tracing::error!("{}", e);
                report.record_error(e);
                break;
            }

            match self.spawn(slot, job) {
                Ok(thread) => {
                    report.spawned += 1;
                    threads.push(thread);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    report.record_error(e);
                    break;
                }
            }
        }

        for (index, outcome) in self.join_all(threads) {
            match outcome {
                Ok(unit) => {
                    report.completed += 1;
                    if let Some(ctx) = report.context_mut(index) {
                        ctx.complete(&unit);
                    }
                }
                Err(e) => {
                    if let Some(ctx) = report.context_mut(index) {
                        ctx.status = ContextStatus::Failed;
                    }
                    report.record_error(e);
                }
            }
        }

        for (index, outcome) in self.destroy_all(slots) {
            match outcome {
                Ok(()) => {
                    report.destroyed += 1;
                    if let Some(ctx) = report.context_mut(index) {
                        ctx.destroyed = true;
                    }
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    report.record_error(e);
                }
            }
        }

        if report.is_success() {
            tracing::info!("{}", report);
        } else {
            tracing::warn!("{}", report);
        }
        report
    }
}
