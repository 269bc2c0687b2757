//! Mock platform for testing
//!
//! Records every lifecycle call in an event log and fails on request at a
//! chosen context index. Runs execute the loaded image inline on the
//! calling control thread, handshake included.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::mailbox;
use super::{ContextHandle, Platform, PlatformError, ProgramImage, RunArgs};
use crate::unit::{UnitEnv, UnitReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Load,
    RunStart,
    RunEnd,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub index: usize,
    pub kind: EventKind,
}

/// Context indices at which an operation fails
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub create_at: Option<usize>,
    pub load_at: Option<usize>,
    pub run_at: Option<usize>,
    pub destroy_at: Option<usize>,
    /// Control thread fails to start; enforced by the dispatcher
    pub spawn_at: Option<usize>,
    /// Run blocks until its timeout expires
    pub hang_at: Option<usize>,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub struct MockPlatform {
    units: usize,
    faults: Faults,
    log: EventLog,
}

impl MockPlatform {
    pub fn new(units: usize) -> Self {
        Self::with_faults(units, Faults::default())
    }

    pub fn with_faults(units: usize, faults: Faults) -> Self {
        Self {
            units,
            faults,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().clone()
    }

    /// Events of one context, in order
    pub fn events_for(&self, index: usize) -> Vec<EventKind> {
        self.log
            .lock()
            .iter()
            .filter(|e| e.index == index)
            .map(|e| e.kind)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.log.lock().iter().filter(|e| e.kind == kind).count()
    }
}

fn record(log: &EventLog, index: usize, kind: EventKind) {
    log.lock().push(Event { index, kind });
}

impl Platform for MockPlatform {
    type Handle = MockContext;

    fn name(&self) -> &str {
        "mock"
    }

    fn usable_units(&self) -> usize {
        self.units
    }

    fn create_context(&self, index: usize) -> Result<MockContext, PlatformError> {
        if self.faults.create_at == Some(index) {
            return Err(PlatformError::Exhausted("injected create failure".into()));
        }
        record(&self.log, index, EventKind::Create);
        Ok(MockContext {
            index,
            image: None,
            faults: self.faults.clone(),
            log: Arc::clone(&self.log),
        })
    }

    fn destroy_context(&self, handle: MockContext) -> Result<(), PlatformError> {
        record(&self.log, handle.index, EventKind::Destroy);
        if self.faults.destroy_at == Some(handle.index) {
            return Err(PlatformError::Fault("injected destroy failure".into()));
        }
        Ok(())
    }
}

pub struct MockContext {
    index: usize,
    image: Option<ProgramImage>,
    faults: Faults,
    log: EventLog,
}

impl ContextHandle for MockContext {
    fn load(&mut self, image: &ProgramImage) -> Result<(), PlatformError> {
        if self.faults.load_at == Some(self.index) {
            return Err(PlatformError::BadImage("injected load failure".into()));
        }
        record(&self.log, self.index, EventKind::Load);
        self.image = Some(image.clone());
        Ok(())
    }

    fn run(&mut self, args: RunArgs) -> Result<UnitReport, PlatformError> {
        let image = self
            .image
            .clone()
            .ok_or_else(|| PlatformError::NotRunnable("no program loaded".into()))?;

        record(&self.log, self.index, EventKind::RunStart);
        let result = if self.faults.run_at == Some(self.index) {
            Err(PlatformError::Fault("injected run failure".into()))
        } else if self.faults.hang_at == Some(self.index) {
            thread::sleep(args.timeout);
            Err(PlatformError::Timeout(args.timeout))
        } else {
            let (writer, reader) = mailbox::channel();
            writer
                .send(args.identity)
                .map_err(|e| PlatformError::Fault(e.to_string()))?;
            image
                .start(UnitEnv {
                    speid: 0x2000 + self.index as u64,
                    inbound: reader,
                    job: args.job,
                })
                .map_err(PlatformError::from)
        };
        record(&self.log, self.index, EventKind::RunEnd);
        result
    }
}

/// Image that answers with the received identity and no output
pub fn identity_image() -> ProgramImage {
    ProgramImage::new("identity", |env: UnitEnv| {
        let identity = env.inbound.recv_timeout(Duration::from_secs(5))?;
        Ok(UnitReport {
            identity,
            speid: env.speid,
            lines: 0,
            elapsed: Duration::ZERO,
        })
    })
}
