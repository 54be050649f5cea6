//! Font resources for overlay rendering, cached per (file, size).

use crate::cache::Cache;
use crate::error::OcrError;
use ab_glyph::{FontVec, PxScale};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Locations tried when no font file is configured.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A parsed font together with the pixel size it is drawn at.
pub struct SizedFont {
    pub font: FontVec,
    pub scale: PxScale,
}

pub struct FontCache {
    fonts: Cache<(PathBuf, u32), SizedFont>,
    default_path: Option<PathBuf>,
}

impl FontCache {
    /// `default_path` is used when callers do not ask for a specific file.
    pub fn new(default_path: Option<PathBuf>) -> Self {
        Self {
            fonts: Cache::unbounded(),
            default_path,
        }
    }

    pub fn get(&self, path: Option<&Path>, size: u32) -> Result<Arc<SizedFont>, OcrError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.resolve_default()?,
        };
        self.fonts
            .get_or_try_insert_with(&(path.clone(), size), || load(&path, size))
    }

    fn resolve_default(&self) -> Result<PathBuf, OcrError> {
        if let Some(path) = &self.default_path {
            return Ok(path.clone());
        }
        FALLBACK_FONTS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .ok_or_else(|| {
                OcrError::Font("no font configured and no system fallback font found".into())
            })
    }
}

fn load(path: &Path, size: u32) -> Result<SizedFont, OcrError> {
    let data = std::fs::read(path)
        .map_err(|e| OcrError::Font(format!("{}: {}", path.display(), e)))?;
    let font = FontVec::try_from_vec(data)
        .map_err(|e| OcrError::Font(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), size, "loaded font");
    Ok(SizedFont {
        font,
        scale: PxScale::from(size as f32),
    })
}
