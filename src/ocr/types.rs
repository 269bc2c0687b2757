//! OCR Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External recognition engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    /// gocr command line engine
    #[default]
    Gocr,
    /// Tesseract command line engine
    Tesseract,
}

impl OcrEngine {
    /// Executable looked up on `PATH` when no override is configured
    pub fn default_program(&self) -> &'static str {
        match self {
            Self::Gocr => "gocr",
            Self::Tesseract => "tesseract",
        }
    }
}

impl fmt::Display for OcrEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_program())
    }
}

impl FromStr for OcrEngine {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gocr" => Ok(Self::Gocr),
            "tesseract" => Ok(Self::Tesseract),
            other => Err(OcrError::EngineNotAvailable(format!(
                "unknown engine: {}",
                other
            ))),
        }
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("Job has no decoded image")]
    NoImage,

    #[error("Failed to stage image for the engine: {0}")]
    ImageStaging(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_parse() {
        assert_eq!("gocr".parse::<OcrEngine>().unwrap(), OcrEngine::Gocr);
        assert_eq!(
            "Tesseract".parse::<OcrEngine>().unwrap(),
            OcrEngine::Tesseract
        );
        assert!("ollama".parse::<OcrEngine>().is_err());
    }
}
