//! Output emission
//!
//! Writes recognized lines in the job's output format. All units share one
//! sink; a job's lines are written as a single block so output from
//! concurrently finishing units never interleaves.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::job::{JobDescriptor, OutputFormat};

/// Shared output sink
pub type SharedSink = Arc<OutputSink>;

/// Mutex-guarded destination for recognized text
pub struct OutputSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl OutputSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Create (truncate) an output file
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Drain the job's line list into the sink
    ///
    /// Returns the number of lines written.
    pub fn emit(&self, job: &mut JobDescriptor) -> io::Result<usize> {
        let lines = std::mem::take(&mut job.res.lines);
        let block = render_lines(&lines, job.cfg.out_format);

        let mut writer = self.writer.lock();
        writer.write_all(block.as_bytes())?;
        writer.flush()?;
        Ok(lines.len())
    }
}

/// Render lines the way the engine's text output is framed
///
/// HTML lines get a `<br />`; every format except XML ends lines with a
/// newline.
pub fn render_lines(lines: &[String], format: OutputFormat) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        if format == OutputFormat::Html {
            out.push_str("<br />");
        }
        if format != OutputFormat::Xml {
            out.push('\n');
        }
    }
    out
}

/// In-memory writer that can be inspected after being handed to a sink
#[cfg(test)]
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

#[cfg(test)]
impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
