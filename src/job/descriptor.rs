//! Job descriptor
//!
//! Input image, configuration, results and timing for one recognition job.
//! Each control thread works on its own clone; only the decoded pixels are
//! shared, and they are never mutated after decoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{JobConfig, JobError};

/// Where the input image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file on disk
    Path(PathBuf),
    /// Image read up front, e.g. from stdin
    Bytes(Arc<Vec<u8>>),
}

impl ImageSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::Bytes(Arc::new(data))
    }

    /// Human readable name for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(data) => format!("<stdin, {} bytes>", data.len()),
        }
    }
}

/// Decoded 8-bit grey image
#[derive(Debug, Clone)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    pixels: Arc<[u8]>,
}

impl Pixmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, JobError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(JobError::ImageDecode(format!(
                "pixel buffer holds {} bytes, expected {}x{} = {}",
                pixels.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Whether two pixmaps share the same pixel storage
    pub fn shares_pixels(&self, other: &Pixmap) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// Source image state
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub origin: ImageSource,
    pub image: Option<Pixmap>,
}

/// Recognized text lines, drained by the output sink
#[derive(Debug, Clone, Default)]
pub struct JobResults {
    pub lines: Vec<String>,
}

/// Timing snapshot
#[derive(Debug, Clone, Default)]
pub struct Timing {
    pub started: Option<Instant>,
}

/// One recognition job
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub source: SourceImage,
    pub cfg: JobConfig,
    pub res: JobResults,
    pub timing: Timing,
}

impl JobDescriptor {
    pub fn new(origin: ImageSource, cfg: JobConfig) -> Self {
        Self {
            source: SourceImage {
                origin,
                image: None,
            },
            cfg,
            res: JobResults::default(),
            timing: Timing::default(),
        }
    }

    /// Decode the source image into a grey pixmap
    ///
    /// Does nothing when the image is already decoded, so clones of a
    /// prepared descriptor do not decode again.
    pub fn init_image(&mut self) -> Result<(), JobError> {
        if self.source.image.is_some() {
            return Ok(());
        }

        let decoded = match &self.source.origin {
            ImageSource::Path(path) => image::open(path)
                .map_err(|e| JobError::ImageDecode(format!("{}: {}", path.display(), e)))?,
            ImageSource::Bytes(data) => image::load_from_memory(data)
                .map_err(|e| JobError::ImageDecode(e.to_string()))?,
        };

        let grey = decoded.to_luma8();
        let (width, height) = grey.dimensions();
        let pixmap = Pixmap::new(width, height, grey.into_raw())?;

        tracing::debug!(
            "Decoded {} as {}x{} grey image",
            self.source.origin.describe(),
            width,
            height
        );

        self.source.image = Some(pixmap);
        Ok(())
    }

    /// Record the start of work on this job
    pub fn mark_start(&mut self) {
        self.timing.started = Some(Instant::now());
        if self.cfg.verbose > 0 {
            tracing::info!(
                "options are: -l {} -s {} -v {} -c {} -m {} -d {} -n {} -a {} -C \"{}\"",
                self.cfg.grey_level,
                self.cfg.space_width,
                self.cfg.verbose,
                self.cfg.char_list.as_deref().unwrap_or("(null)"),
                self.cfg.mode,
                self.cfg.dust_size,
                u8::from(self.cfg.only_numbers),
                self.cfg.certainty,
                self.cfg.char_filter.as_deref().unwrap_or("(null)"),
            );
            tracing::info!("file: {}", self.source.origin.describe());
            if self.cfg.loads_database() {
                tracing::info!("database: {}", self.cfg.db_path.display());
            }
        }
    }

    /// Time since [`mark_start`](Self::mark_start), if it was called
    pub fn elapsed(&self) -> Option<Duration> {
        self.timing.started.map(|start| start.elapsed())
    }

    /// Drop this copy's reference to the decoded pixels
    pub fn free_image(&mut self) {
        self.source.image = None;
    }
}
