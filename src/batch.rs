//! Directory-wide runs of the two output modes.

use crate::config::SupportedExtensions;
use crate::error::OcrError;
use crate::layout::LayoutParams;
use crate::processor::Processor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome for one input file.
#[derive(Debug)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Result<(), OcrError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().filter(|i| i.outcome.is_err())
    }

    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(|i| i.outcome.is_ok())
    }
}

/// Writes `<base>.txt` into `output_dir` for every matching image in `input_dir`.
pub fn batch_transcribe(
    processor: &Processor,
    input_dir: &Path,
    output_dir: &Path,
    extensions: &SupportedExtensions,
    params: LayoutParams,
) -> Result<BatchReport, OcrError> {
    run(input_dir, output_dir, extensions, |input, output_dir| {
        let output = output_dir.join(format!("{}.txt", stem(input)));
        let outcome = processor.transcribe_with_layout(&identifier(input), &output, params);
        (output, outcome)
    })
}

/// Writes `<base>_processed<ext>` into `output_dir` for every matching image.
pub fn batch_overlay(
    processor: &Processor,
    input_dir: &Path,
    output_dir: &Path,
    extensions: &SupportedExtensions,
    white_background: bool,
    font_path: Option<&Path>,
) -> Result<BatchReport, OcrError> {
    run(input_dir, output_dir, extensions, |input, output_dir| {
        let output = output_dir.join(format!("{}_processed{}", stem(input), dotted_extension(input)));
        let outcome =
            processor.render_text_overlay(&identifier(input), &output, white_background, font_path);
        (output, outcome)
    })
}

fn run(
    input_dir: &Path,
    output_dir: &Path,
    extensions: &SupportedExtensions,
    mut process: impl FnMut(&Path, &Path) -> (PathBuf, Result<(), OcrError>),
) -> Result<BatchReport, OcrError> {
    std::fs::create_dir_all(output_dir)?;

    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        if path.is_file() && extensions.matches(&path) {
            inputs.push(path);
        }
    }
    inputs.sort();

    let mut report = BatchReport::default();
    for input in inputs {
        let (output, outcome) = process(&input, output_dir);
        match &outcome {
            Ok(()) => info!(input = %input.display(), output = %output.display(), "processed"),
            Err(e) => warn!(input = %input.display(), error = %e, "failed"),
        }
        report.items.push(BatchItem {
            input,
            output,
            outcome,
        });
    }
    Ok(report)
}

fn identifier(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
