//! The two output modes, backed by per-identifier caches.

use crate::cache::Cache;
use crate::error::OcrError;
use crate::fonts::FontCache;
use crate::layout::{self, LayoutParams};
use crate::loader::ImageLoader;
use crate::overlay;
use crate::recognizer::{Recognition, Recognizer};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Glyph size used for overlays.
pub const OVERLAY_FONT_SIZE: u32 = 20;

/// Construction options for [`Processor`].
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub fetch_timeout: Duration,
    /// `None` keeps every entry for the life of the process.
    pub cache_capacity: Option<usize>,
    pub default_font: Option<PathBuf>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
            cache_capacity: None,
            default_font: None,
        }
    }
}

pub struct Processor {
    recognizer: Arc<dyn Recognizer>,
    results: Cache<String, Recognition>,
    images: ImageLoader,
    fonts: FontCache,
}

impl Processor {
    pub fn new(recognizer: Arc<dyn Recognizer>, options: ProcessorOptions) -> Self {
        Self {
            recognizer,
            results: Cache::with_capacity(options.cache_capacity),
            images: ImageLoader::new(options.fetch_timeout, options.cache_capacity),
            fonts: FontCache::new(options.default_font),
        }
    }

    /// Recognition result for `identifier`, running the engine on first use only.
    pub fn recognition(&self, identifier: &str) -> Result<Arc<Recognition>, OcrError> {
        self.results
            .get_or_try_insert_with(&identifier.to_string(), || -> Result<Recognition, OcrError> {
                let image = self.images.load(identifier)?;
                let start = Instant::now();
                let recognition = self.recognizer.recognize(&image)?;
                info!(
                    identifier,
                    fragments = recognition.len(),
                    ocr_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "recognition completed"
                );
                Ok(recognition)
            })
    }

    /// Writes a layout-approximating transcript of `identifier` to `output`.
    pub fn transcribe_with_layout(
        &self,
        identifier: &str,
        output: &Path,
        params: LayoutParams,
    ) -> Result<(), OcrError> {
        let recognition = self.recognition(identifier)?;
        let file = File::create(output)?;
        layout::write_transcript(&recognition, params, BufWriter::new(file))?;
        info!(identifier, output = %output.display(), "transcript written");
        Ok(())
    }

    /// Writes `identifier` with its recognized text drawn on top to `output`.
    ///
    /// With `white_background` the source pixels are replaced by white first.
    /// The output format follows the extension of `output`.
    pub fn render_text_overlay(
        &self,
        identifier: &str,
        output: &Path,
        white_background: bool,
        font_path: Option<&Path>,
    ) -> Result<(), OcrError> {
        let recognition = self.recognition(identifier)?;
        let mut image = self.images.load(identifier)?;

        if white_background {
            overlay::blank(&mut image);
        }
        if !recognition.is_empty() {
            let font = self.fonts.get(font_path, OVERLAY_FONT_SIZE)?;
            overlay::draw_fragments(&mut image, &recognition, &font);
        }

        image
            .save(output)
            .map_err(|e| OcrError::Render(format!("{}: {}", output.display(), e)))?;
        info!(identifier, output = %output.display(), white_background, "overlay written");
        Ok(())
    }
}
