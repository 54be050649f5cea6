//! Runtime configuration shared by the server and the batch commands.

use clap::ValueEnum;
use std::path::Path;

/// Image file kinds picked up by directory processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageKind {
    Jpg,
    Jpeg,
    Png,
    Bmp,
    Gif,
}

impl ImageKind {
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpg => "jpg",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Bmp => "bmp",
            ImageKind::Gif => "gif",
        }
    }
}

/// The set of extensions a batch run accepts, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedExtensions {
    kinds: Vec<ImageKind>,
}

impl Default for SupportedExtensions {
    fn default() -> Self {
        Self::new(vec![
            ImageKind::Jpg,
            ImageKind::Jpeg,
            ImageKind::Png,
            ImageKind::Bmp,
            ImageKind::Gif,
        ])
    }
}

impl SupportedExtensions {
    pub fn new(kinds: Vec<ImageKind>) -> Self {
        Self { kinds }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.kinds
            .iter()
            .any(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }
}

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}
