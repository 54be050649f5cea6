use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use ocr_layout_server::batch::{self, BatchReport};
use ocr_layout_server::config::{ImageKind, ServerConfig, SupportedExtensions};
use ocr_layout_server::server::{self, AppState};
use ocr_layout_server::{LayoutParams, Processor, ProcessorOptions, TesseractRecognizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocr_layout_server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Layout-preserving OCR over HTTP or on the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Directory holding the Tesseract language data
    #[arg(long, env = "OCR_TESSDATA")]
    tessdata: Option<PathBuf>,

    /// Tesseract language code(s), e.g. "eng" or "eng+chi_sim"
    #[arg(long, default_value = "eng", env = "OCR_LANG")]
    lang: String,

    /// TrueType font used for overlays (defaults to a system font)
    #[arg(long, env = "OCR_FONT")]
    font: Option<PathBuf>,

    /// Timeout for fetching URL identifiers, in seconds
    #[arg(long, default_value_t = 5, env = "OCR_FETCH_TIMEOUT")]
    fetch_timeout: u64,

    /// Keep at most this many entries per cache (unbounded when omitted)
    #[arg(long, env = "OCR_CACHE_CAPACITY")]
    cache_capacity: Option<usize>,
}

#[derive(Args)]
struct LayoutArgs {
    /// Maximum vertical distance, in pixels, from a line's first fragment
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    line_height_threshold: f32,

    /// Spaces emitted per pixel of horizontal gap
    #[arg(long, default_value_t = 0.05, allow_negative_numbers = true)]
    char_per_pixel: f32,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "OCR_HOST")]
        host: String,

        /// Port to listen on
        #[arg(long, short, default_value = "5001", env = "OCR_PORT")]
        port: u16,

        /// Where uploads are stored
        #[arg(long, default_value = "uploads")]
        upload_dir: PathBuf,

        /// Where generated files are written
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Number of worker threads (defaults to number of CPUs)
        #[arg(long, env = "OCR_WORKERS")]
        workers: Option<usize>,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Write a layout-preserving transcript of one image (path or URL)
    Transcribe {
        identifier: String,

        /// Output file (defaults to output/<name>.txt)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Draw the recognized text of one image (path or URL) onto it
    Overlay {
        identifier: String,

        /// Output file (defaults to output/<name>_text<ext>)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Blank the source image before drawing
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        white_background: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Transcribe every image in a directory
    BatchTxt {
        input_dir: PathBuf,
        output_dir: PathBuf,

        /// Extensions to pick up
        #[arg(long, value_enum, value_delimiter = ',', default_values_t = [ImageKind::Jpg, ImageKind::Jpeg, ImageKind::Png, ImageKind::Bmp, ImageKind::Gif])]
        extensions: Vec<ImageKind>,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Overlay every image in a directory
    BatchImg {
        input_dir: PathBuf,
        output_dir: PathBuf,

        /// Blank the source images before drawing
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        white_background: bool,

        /// Extensions to pick up
        #[arg(long, value_enum, value_delimiter = ',', default_values_t = [ImageKind::Jpg, ImageKind::Jpeg, ImageKind::Png, ImageKind::Bmp, ImageKind::Gif])]
        extensions: Vec<ImageKind>,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            upload_dir,
            output_dir,
            workers,
            engine,
            layout,
        } => {
            let params = layout_params(&layout)?;
            let font = engine.font.clone();
            let processor = build_processor(&engine)?;
            let state = AppState::new(processor, params, upload_dir, output_dir, font)
                .context("failed to create upload/output directories")?;
            let config = ServerConfig {
                host,
                port,
                workers,
            };
            actix_web::rt::System::new().block_on(server::run_server(config, state))?;
        }
        Commands::Transcribe {
            identifier,
            output,
            engine,
            layout,
        } => {
            let params = layout_params(&layout)?;
            let processor = build_processor(&engine)?;
            let output = match output {
                Some(output) => output,
                None => default_output(&format!("{}.txt", base_name(&identifier)))?,
            };
            processor.transcribe_with_layout(&identifier, &output, params)?;
            info!(output = %output.display(), "done");
        }
        Commands::Overlay {
            identifier,
            output,
            white_background,
            engine,
        } => {
            let processor = build_processor(&engine)?;
            let output = match output {
                Some(output) => output,
                None => {
                    let (base, ext) = split_identifier(&identifier);
                    default_output(&format!("{}_text{}", base, ext))?
                }
            };
            processor.render_text_overlay(&identifier, &output, white_background, engine.font.as_deref())?;
            info!(output = %output.display(), "done");
        }
        Commands::BatchTxt {
            input_dir,
            output_dir,
            extensions,
            engine,
            layout,
        } => {
            let params = layout_params(&layout)?;
            let processor = build_processor(&engine)?;
            let report = batch::batch_transcribe(
                &processor,
                &input_dir,
                &output_dir,
                &SupportedExtensions::new(extensions),
                params,
            )?;
            summarize(&report)?;
        }
        Commands::BatchImg {
            input_dir,
            output_dir,
            white_background,
            extensions,
            engine,
        } => {
            let processor = build_processor(&engine)?;
            let report = batch::batch_overlay(
                &processor,
                &input_dir,
                &output_dir,
                &SupportedExtensions::new(extensions),
                white_background,
                engine.font.as_deref(),
            )?;
            summarize(&report)?;
        }
    }

    Ok(())
}

fn build_processor(engine: &EngineArgs) -> anyhow::Result<Arc<Processor>> {
    let recognizer = TesseractRecognizer::new(engine.tessdata.clone(), engine.lang.clone())?;
    Ok(Arc::new(Processor::new(
        Arc::new(recognizer),
        ProcessorOptions {
            fetch_timeout: Duration::from_secs(engine.fetch_timeout),
            cache_capacity: engine.cache_capacity,
            default_font: engine.font.clone(),
        },
    )))
}

fn layout_params(layout: &LayoutArgs) -> anyhow::Result<LayoutParams> {
    Ok(LayoutParams::new(layout.line_height_threshold, layout.char_per_pixel)?)
}

/// Last path segment of a path or URL, without query string.
fn file_name(identifier: &str) -> &str {
    let trimmed = identifier.split(['?', '#']).next().unwrap_or(identifier);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

fn split_identifier(identifier: &str) -> (String, String) {
    let name = Path::new(file_name(identifier));
    let base = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| ".png".to_string());
    (base, ext)
}

fn base_name(identifier: &str) -> String {
    split_identifier(identifier).0
}

fn default_output(name: &str) -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from("output");
    std::fs::create_dir_all(&dir).context("failed to create output directory")?;
    Ok(dir.join(name))
}

fn summarize(report: &BatchReport) -> anyhow::Result<()> {
    for item in report.failures() {
        if let Err(e) = &item.outcome {
            error!(input = %item.input.display(), error = %e, "not processed");
        }
    }
    info!(
        processed = report.succeeded(),
        total = report.items.len(),
        "batch finished"
    );
    if !report.all_succeeded() {
        bail!(
            "{} of {} files failed",
            report.items.len() - report.succeeded(),
            report.items.len()
        );
    }
    Ok(())
}
