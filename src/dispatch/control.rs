//! Control threads
//!
//! One native thread per execution context. It prepares its own job copy,
//! runs the context to completion and hands the outcome back through
//! `join`. Failures end only this thread.

use std::any::Any;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{DispatchError, Result};
use crate::job::JobDescriptor;
use crate::platform::{ContextHandle, RunArgs};
use crate::unit::UnitReport;

use super::context::SharedContext;

/// Handle of a spawned control thread
pub struct ControlThread {
    index: usize,
    handle: JoinHandle<Result<UnitReport>>,
}

impl ControlThread {
    /// Spawn a thread bound to one loaded context; it starts running at once
    pub fn spawn<H: ContextHandle>(
        slot: SharedContext<H>,
        job: JobDescriptor,
        identity: u32,
        run_timeout: Duration,
    ) -> Result<Self> {
        let index = slot.lock().index();
        let handle = thread::Builder::new()
            .name(format!("ctl-{}", index))
            .spawn(move || drive(slot, job, identity, run_timeout))
            .map_err(|e| DispatchError::ThreadCreateFailed {
                index,
                reason: e.to_string(),
            })?;

        Ok(Self { index, handle })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Wait for the thread and collect its outcome
    pub fn join(self) -> Result<UnitReport> {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(panic) => Err(DispatchError::JoinFailed {
                index: self.index,
                reason: panic_message(panic.as_ref()),
            }),
        }
    }
}

/// Thread body: per-worker setup, then the blocking run
fn drive<H: ContextHandle>(
    slot: SharedContext<H>,
    mut job: JobDescriptor,
    identity: u32,
    timeout: Duration,
) -> Result<UnitReport> {
    let mut ctx = slot.lock();
    let index = ctx.index();

    if let Err(e) = job.init_image() {
        tracing::error!("Context {}: worker setup failed: {}", index, e);
        return Err(DispatchError::ContextRunFailed {
            index,
            reason: format!("worker setup: {}", e),
        });
    }
    job.mark_start();

    let outcome = ctx.run(RunArgs {
        identity,
        job,
        timeout,
    });

    match &outcome {
        Ok(report) => tracing::info!(
            "Context {} completed: unit {:x}, {} lines in {:?}",
            index,
            report.speid,
            report.lines,
            report.elapsed
        ),
        Err(e) => tracing::error!("{}", e),
    }
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "control thread panicked".to_string()
    }
}
