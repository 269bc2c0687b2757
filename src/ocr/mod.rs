//! OCR Module
//!
//! Recognition and output collaborators used by the co-processor entry
//! routine. Recognition itself is delegated to an external engine:
//! - gocr (default)
//! - Tesseract
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cbe_ocr::ocr::{CommandRecognizer, OcrEngine, OutputSink, Recognizer};
//!
//! let recognizer = CommandRecognizer::new(OcrEngine::Gocr, None, "eng");
//! recognizer.recognize(&mut job)?;
//! OutputSink::stdout().emit(&mut job)?;
//! ```

mod output;
mod recognizer;
mod types;

pub use output::{render_lines, OutputSink, SharedSink};
pub use recognizer::{CommandRecognizer, Recognizer};
pub use types::{OcrEngine, OcrError};

#[cfg(test)]
pub(crate) use output::CaptureBuffer;
#[cfg(test)]
pub(crate) use recognizer::StaticRecognizer;
