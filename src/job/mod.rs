//! Recognition job
//!
//! The job descriptor consumed by the OCR collaborators: input image,
//! recognition options, result line list and timing.

mod config;
mod descriptor;

pub use config::{JobConfig, OutputFormat};
pub use descriptor::{ImageSource, JobDescriptor, JobResults, Pixmap, SourceImage, Timing};

/// Job setup errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
