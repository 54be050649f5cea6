//! Recognition results and the engine seam that produces them.

use crate::error::OcrError;
use image::RgbImage;
use leptess::LepTess;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One recognized string and the polygon it was detected in.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub polygon: Vec<Point>,
}

impl Fragment {
    pub fn new(text: impl Into<String>, polygon: Vec<Point>) -> Self {
        Self {
            text: text.into(),
            polygon,
        }
    }

    /// Fragment whose polygon is the single anchor point `(x, y)`.
    pub fn at(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self::new(text, vec![Point::new(x, y)])
    }

    /// First polygon vertex; the origin for a fragment without geometry.
    pub fn anchor(&self) -> Point {
        self.polygon.first().copied().unwrap_or(Point::new(0.0, 0.0))
    }
}

/// Fragments in the order the engine reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub fragments: Vec<Fragment>,
}

impl Recognition {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Text detection + recognition engine.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<Recognition, OcrError>;
}

/// Tesseract through `leptess`, recognizing one fragment per text line.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    data_path: Option<PathBuf>,
    lang: String,
}

impl TesseractRecognizer {
    /// Verifies the language data loads before the engine is handed out.
    pub fn new(data_path: Option<PathBuf>, lang: impl Into<String>) -> Result<Self, OcrError> {
        let recognizer = Self {
            data_path,
            lang: lang.into(),
        };
        recognizer.engine()?;
        Ok(recognizer)
    }

    fn engine(&self) -> Result<LepTess, OcrError> {
        let data_path = self.data_path.as_ref().and_then(|p| p.to_str());
        LepTess::new(data_path, &self.lang).map_err(|e| {
            OcrError::Recognition(format!(
                "Failed to initialize Tesseract with language '{}': {}",
                self.lang, e
            ))
        })
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, image: &RgbImage) -> Result<Recognition, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Recognition::default());
        }

        // LepTess is not Sync, so every call gets its own engine.
        let mut lt = self.engine()?;

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| OcrError::Recognition(format!("Failed to encode image: {}", e)))?;
        lt.set_image_from_mem(png.get_ref())
            .map_err(|e| OcrError::Recognition(format!("Failed to set image: {}", e)))?;

        // None means no text was found at all.
        let boxes = match lt.get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_TEXTLINE, true) {
            Some(boxes) => boxes,
            None => return Ok(Recognition::default()),
        };

        let mut fragments = Vec::new();
        for bbox in &boxes {
            let geom = bbox.get_geometry();
            lt.set_rectangle(geom.x, geom.y, geom.w, geom.h);

            let text = lt
                .get_utf8_text()
                .map_err(|e| OcrError::Recognition(format!("Invalid UTF-8 from engine: {}", e)))?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let (x, y, w, h) = (geom.x as f32, geom.y as f32, geom.w as f32, geom.h as f32);
            debug!(text, x, y, w, h, "recognized line");
            fragments.push(Fragment::new(
                text,
                vec![
                    Point::new(x, y),
                    Point::new(x + w, y),
                    Point::new(x + w, y + h),
                    Point::new(x, y + h),
                ],
            ));
        }

        Ok(Recognition::new(fragments))
    }
}
