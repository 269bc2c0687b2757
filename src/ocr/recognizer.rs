//! Recognizers
//!
//! Defines the recognizer trait and the command line engine backend.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::job::{JobConfig, JobDescriptor};

use super::types::{OcrEngine, OcrError};

/// Recognition collaborator invoked by the co-processor entry routine
pub trait Recognizer: Send + Sync {
    /// Get the engine type
    fn engine(&self) -> OcrEngine;

    /// Check if the engine can be invoked
    fn is_available(&self) -> bool;

    /// Recognize the job's decoded image, appending lines to `job.res.lines`
    fn recognize(&self, job: &mut JobDescriptor) -> Result<(), OcrError>;
}

/// Runs an external OCR executable on the job's image
pub struct CommandRecognizer {
    engine: OcrEngine,
    program: PathBuf,
    /// Tesseract language
    language: String,
}

impl CommandRecognizer {
    pub fn new(engine: OcrEngine, program: Option<PathBuf>, language: &str) -> Self {
        let program = program.unwrap_or_else(|| PathBuf::from(engine.default_program()));
        Self {
            engine,
            program,
            language: language.to_string(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command line for one invocation on `input`
    pub fn build_args(&self, input: &Path, cfg: &JobConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self.engine {
            OcrEngine::Gocr => {
                let mut push = |flag: &str, value: String| {
                    args.push(flag.into());
                    args.push(value.into());
                };
                push("-f", cfg.out_format.as_str().to_string());
                push("-l", cfg.grey_level.to_string());
                push("-d", cfg.dust_size.to_string());
                push("-s", cfg.space_width.to_string());
                push("-m", cfg.mode.to_string());
                push("-n", u8::from(cfg.only_numbers).to_string());
                push("-a", cfg.certainty.to_string());
                push("-u", cfg.unrecognized_marker.clone());
                push("-p", cfg.db_path.display().to_string());
                if let Some(list) = &cfg.char_list {
                    push("-c", list.clone());
                }
                if let Some(filter) = &cfg.char_filter {
                    push("-C", filter.clone());
                }
                args.push(input.into());
            }
            OcrEngine::Tesseract => {
                args.push(input.into());
                args.push("stdout".into());
                args.push("-l".into());
                args.push(self.language.clone().into());
            }
        }
        args
    }

    fn stage_image(&self, job: &JobDescriptor) -> Result<PathBuf, OcrError> {
        let image = job.source.image.as_ref().ok_or(OcrError::NoImage)?;
        let path = std::env::temp_dir().join(format!("cbe_ocr_{}.pgm", uuid::Uuid::new_v4()));

        image::save_buffer_with_format(
            &path,
            image.pixels(),
            image.width,
            image.height,
            image::ColorType::L8,
            image::ImageFormat::Pnm,
        )
        .map_err(|e| OcrError::ImageStaging(format!("{}: {}", path.display(), e)))?;

        Ok(path)
    }
}

impl Recognizer for CommandRecognizer {
    fn engine(&self) -> OcrEngine {
        self.engine
    }

    fn is_available(&self) -> bool {
        let check_flag = match self.engine {
            OcrEngine::Gocr => "-h",
            OcrEngine::Tesseract => "--version",
        };
        Command::new(&self.program).arg(check_flag).output().is_ok()
    }

    fn recognize(&self, job: &mut JobDescriptor) -> Result<(), OcrError> {
        let input = self.stage_image(job)?;
        let args = self.build_args(&input, &job.cfg);

        tracing::debug!("Running {} {:?}", self.program.display(), args);
        let output = Command::new(&self.program).args(&args).output();

        // Clean up staged image
        let _ = std::fs::remove_file(&input);

        let output = output.map_err(|e| {
            OcrError::EngineNotAvailable(format!("{}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "{} exited with {}: {}",
                self.engine,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }

        tracing::debug!("{} recognized {} lines", self.engine, lines.len());
        job.res.lines.extend(lines);
        Ok(())
    }
}

/// Recognizer returning fixed lines, for testing
#[cfg(test)]
pub struct StaticRecognizer {
    pub lines: Vec<String>,
    pub fail: bool,
}

#[cfg(test)]
impl StaticRecognizer {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            fail: false,
        }
    }
}

#[cfg(test)]
impl Recognizer for StaticRecognizer {
    fn engine(&self) -> OcrEngine {
        OcrEngine::Gocr
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, job: &mut JobDescriptor) -> Result<(), OcrError> {
        if self.fail {
            return Err(OcrError::ProcessingError("static failure".to_string()));
        }
        job.res.lines.extend(self.lines.iter().cloned());
        Ok(())
    }
}
