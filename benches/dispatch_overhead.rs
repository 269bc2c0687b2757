//! Dispatch Overhead Benchmarks
//!
//! Cost of a full create / load / spawn / join / destroy pass on simulated
//! units, with recognition reduced to a no-op so only the orchestration is
//! measured.
//!
//! Run with: `cargo bench --bench dispatch_overhead`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use cbe_ocr::config::DispatchConfig;
use cbe_ocr::job::Pixmap;
use cbe_ocr::ocr::{OcrEngine, OcrError, OutputSink, Recognizer};
use cbe_ocr::{
    Dispatcher, ImageSource, JobConfig, JobDescriptor, OcrProgram, SimPlatform, MAX_UNITS,
};

/// Recognizer producing one line without touching the image
struct NoopRecognizer;

impl Recognizer for NoopRecognizer {
    fn engine(&self) -> OcrEngine {
        OcrEngine::Gocr
    }

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, job: &mut JobDescriptor) -> Result<(), OcrError> {
        job.res.lines.push(String::from("0"));
        Ok(())
    }
}

/// Job with the image already decoded, so threads skip decoding
fn prepared_job() -> JobDescriptor {
    let mut job = JobDescriptor::new(ImageSource::from_bytes(Vec::new()), JobConfig::default());
    job.source.image = Pixmap::new(64, 64, vec![255; 64 * 64]).ok();
    job
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(5));

    let job = prepared_job();
    let config = DispatchConfig {
        max_units: MAX_UNITS,
        handshake_timeout: Duration::from_secs(5),
        run_timeout: Duration::from_secs(5),
    };

    for units in 1..=MAX_UNITS {
        group.bench_with_input(BenchmarkId::new("sim_units", units), &units, |b, &units| {
            b.iter(|| {
                let program = OcrProgram::new(
                    Arc::new(NoopRecognizer),
                    Arc::new(OutputSink::new(io::sink())),
                    config.handshake_timeout,
                );
                let dispatcher = Dispatcher::new(
                    Arc::new(SimPlatform::new(units)),
                    program.into_image(),
                    config.clone(),
                );
                black_box(dispatcher.run(black_box(&job)))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
