//! cbe-ocr
//!
//! Runs a gocr recognition job on every usable co-processor unit. The
//! control processor creates one execution context per unit, loads the
//! recognition program into it, hands it to a dedicated control thread and
//! delivers the unit's identity through a mailbox. Every context is joined
//! before any is destroyed; failures are collected into a report.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod ocr;
pub mod platform;
pub mod unit;

pub use config::Config;
pub use dispatch::{DispatchReport, Dispatcher, MAX_UNITS};
pub use error::{DispatchError, ErrorKind};
pub use job::{ImageSource, JobConfig, JobDescriptor};
pub use platform::{Platform, ProgramImage, SimPlatform};
pub use unit::OcrProgram;
