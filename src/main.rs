//! cbe-ocr
//!
//! Command line front end: parses the gocr option set, builds one job and
//! dispatches it to every usable compute unit.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cbe_ocr::job::OutputFormat;
use cbe_ocr::ocr::{CommandRecognizer, OcrEngine, OutputSink, Recognizer};
use cbe_ocr::{Config, Dispatcher, ImageSource, JobConfig, JobDescriptor, OcrProgram, SimPlatform};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cbe-ocr")]
#[command(about = "Run gocr recognition on every usable co-processor unit")]
struct Args {
    /// Input image (`-` reads stdin)
    #[arg(short = 'i', value_name = "FILE")]
    input: Option<String>,

    /// Input image, same as -i
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Output file (`-` is stdout)
    #[arg(short = 'o', value_name = "FILE", default_value = "-")]
    output: String,

    /// Log file (`-` is stdout, default stderr)
    #[arg(short = 'e', value_name = "FILE")]
    log: Option<String>,

    /// Character database path, including the final slash
    #[arg(short = 'p', value_name = "PATH", default_value = "./db/")]
    db_path: PathBuf,

    /// Output format: ISO8859_1 TeX HTML XML SGML UTF8 ASCII
    #[arg(short = 'f', value_name = "FORMAT", default_value = "UTF8")]
    format: String,

    /// Grey level 0..255, 0 = autodetect
    #[arg(short = 'l', value_name = "LEVEL", default_value_t = 0)]
    grey_level: i32,

    /// Dust size, -1 = autodetect
    #[arg(short = 'd', value_name = "SIZE", default_value_t = -1, allow_hyphen_values = true)]
    dust_size: i32,

    /// Space width in dots, 0 = autodetect
    #[arg(short = 's', value_name = "DOTS", default_value_t = 0)]
    space_width: i32,

    /// Verbosity
    #[arg(short = 'v', value_name = "LEVEL", default_value_t = 0)]
    verbose: u32,

    /// Only recognize these characters
    #[arg(short = 'c', value_name = "CHARS")]
    char_list: Option<String>,

    /// Character filter, e.g. 0-9A-Fx
    #[arg(short = 'C', value_name = "FILTER")]
    char_filter: Option<String>,

    /// Operation mode bits
    #[arg(short = 'm', value_name = "MODE", default_value_t = 0)]
    mode: u32,

    /// Numbers only (1 = on)
    #[arg(short = 'n', value_name = "N", default_value_t = 0)]
    numbers: u32,

    /// Certainty in percent
    #[arg(short = 'a', value_name = "PERCENT", default_value_t = 95)]
    certainty: u8,

    /// Marker for unrecognized characters
    #[arg(short = 'u', value_name = "STRING", default_value = "_")]
    unrecognized: String,

    /// Usable compute units on the simulated platform
    #[arg(long)]
    units: Option<usize>,

    /// Recognition engine
    #[arg(long)]
    engine: Option<OcrEngine>,

    /// Summary format printed to stderr after the run
    #[arg(long, value_enum, default_value = "text")]
    report: ReportFormat,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("cbe-ocr: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let default_level = if args.verbose > 0 {
        "cbe_ocr=debug"
    } else {
        "cbe_ocr=info"
    };

    let writer = match args.log.as_deref() {
        None => BoxMakeWriter::new(io::stderr),
        Some("-") => BoxMakeWriter::new(io::stdout),
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();
    Ok(())
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let mut config = Config::from_env().context("Failed to load config from env")?;
    if let Some(units) = args.units {
        config.platform.units = units;
    }
    if let Some(engine) = args.engine {
        config.ocr.engine = engine;
    }

    let Some(input) = args.input.clone().or_else(|| args.file.clone()) else {
        Args::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let cfg = job_config(&args);
    cfg.validate()?;

    let origin = if input == "-" {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read image from stdin")?;
        ImageSource::from_bytes(data)
    } else {
        ImageSource::from_path(&input)
    };
    let mut job = JobDescriptor::new(origin, cfg);
    // Decode once; every unit's copy then shares these pixels
    job.init_image()
        .with_context(|| format!("Failed to load image {}", job.source.origin.describe()))?;

    let recognizer = CommandRecognizer::new(
        config.ocr.engine,
        config.ocr.program.clone(),
        &config.ocr.language,
    );
    if !recognizer.is_available() {
        tracing::warn!(
            "{} engine not found at {}",
            config.ocr.engine,
            recognizer.program().display()
        );
    }

    let sink = if args.output == "-" {
        OutputSink::stdout()
    } else {
        OutputSink::create(&args.output)
            .with_context(|| format!("Failed to create output file {}", args.output))?
    };

    let program = OcrProgram::new(
        Arc::new(recognizer),
        Arc::new(sink),
        config.dispatch.handshake_timeout,
    );
    let platform = Arc::new(SimPlatform::new(config.platform.units));
    tracing::info!(
        "Recognizing {} with {} on up to {} units",
        job.source.origin.describe(),
        config.ocr.engine,
        config.dispatch.unit_cap()
    );

    let dispatcher = Dispatcher::new(platform, program.into_image(), config.dispatch);
    let report = dispatcher.run(&job);

    match args.report {
        ReportFormat::Text => eprintln!("{}", report),
        ReportFormat::Json => eprintln!("{}", report.to_json()?),
    }
    Ok(ExitCode::from(report.exit_code()))
}

/// Recognition options from the command line
fn job_config(args: &Args) -> JobConfig {
    let out_format = args.format.parse::<OutputFormat>().unwrap_or_else(|e| {
        tracing::warn!("{}, using {}", e, OutputFormat::default());
        OutputFormat::default()
    });

    JobConfig {
        db_path: args.db_path.clone(),
        out_format,
        char_list: args.char_list.clone(),
        char_filter: args.char_filter.clone(),
        dust_size: args.dust_size,
        grey_level: args.grey_level,
        space_width: args.space_width,
        verbose: args.verbose,
        mode: args.mode,
        only_numbers: args.numbers != 0,
        certainty: args.certainty,
        unrecognized_marker: args.unrecognized.clone(),
    }
}
