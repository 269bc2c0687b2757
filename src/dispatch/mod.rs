//! Dispatch Module
//!
//! Fans one program image out across every usable compute unit, one
//! execution context and one control thread per unit, then joins and tears
//! everything down and reports what happened.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cbe_ocr::dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::new(platform, image, config.dispatch);
//! let report = dispatcher.run(&job);
//! std::process::exit(report.exit_code() as i32);
//! ```

mod context;
mod control;
mod dispatcher;
mod report;

pub use context::{ExecutionContext, LifecycleStage, SharedContext};
pub use control::ControlThread;
pub use dispatcher::{Dispatcher, MAX_UNITS};
pub use report::{ContextOutcome, ContextStatus, DispatchReport, ErrorSummary};
