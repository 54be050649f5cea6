//! Image OCR with layout-preserving transcripts and text overlays,
//! served over HTTP or run over whole directories.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod loader;
pub mod overlay;
pub mod processor;
pub mod recognizer;
pub mod server;

pub use error::OcrError;
pub use layout::LayoutParams;
pub use processor::{Processor, ProcessorOptions};
pub use recognizer::{Fragment, Point, Recognition, Recognizer, TesseractRecognizer};
