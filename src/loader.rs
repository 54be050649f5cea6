//! Resolves image identifiers (local paths or HTTP(S) URLs) to pixels.

use crate::cache::Cache;
use crate::error::OcrError;
use image::RgbImage;
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::{debug, info};

/// True for identifiers fetched over the network.
pub fn is_remote(identifier: &str) -> bool {
    identifier.starts_with("http://") || identifier.starts_with("https://")
}

pub struct ImageLoader {
    images: Cache<String, RgbImage>,
    timeout: Duration,
    client: OnceCell<reqwest::blocking::Client>,
}

impl ImageLoader {
    pub fn new(timeout: Duration, cache_capacity: Option<usize>) -> Self {
        Self {
            images: Cache::with_capacity(cache_capacity),
            timeout,
            client: OnceCell::new(),
        }
    }

    /// Decoded image for `identifier`.
    ///
    /// The result is an owned copy; callers may paint over it without
    /// touching the cached original.
    pub fn load(&self, identifier: &str) -> Result<RgbImage, OcrError> {
        let cached = self
            .images
            .get_or_try_insert_with(&identifier.to_string(), || self.fetch(identifier))?;
        Ok(cached.as_ref().clone())
    }

    fn fetch(&self, identifier: &str) -> Result<RgbImage, OcrError> {
        if is_remote(identifier) {
            let bytes = self.download(identifier)?;
            info!(url = identifier, bytes = bytes.len(), "downloaded image");
            decode(&bytes)
        } else {
            debug!(path = identifier, "reading image from disk");
            // Format comes from the content, not the extension.
            let bytes = std::fs::read(identifier)
                .map_err(|e| OcrError::ImageLoad(format!("{}: {}", identifier, e)))?;
            decode(&bytes)
        }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, OcrError> {
        // Built lazily: the blocking client must not be created on an async worker.
        let client = self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| OcrError::Download(format!("Failed to build HTTP client: {}", e)))
        })?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| OcrError::Download(format!("Failed to fetch URL: {}", e)))?;

        if !response.status().is_success() {
            return Err(OcrError::Download(format!("HTTP error: {}", response.status())));
        }

        let bytes = response
            .bytes()
            .map_err(|e| OcrError::Download(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

fn decode(bytes: &[u8]) -> Result<RgbImage, OcrError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| OcrError::ImageLoad(format!("Failed to decode image: {}", e)))?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn loader() -> ImageLoader {
        ImageLoader::new(Duration::from_secs(5), None)
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://example.com/a.png"));
        assert!(is_remote("http://example.com/a.png"));
        assert!(!is_remote("uploads/http.png"));
        assert!(!is_remote("/tmp/scan.jpg"));
    }

    #[test]
    fn loads_local_file_and_returns_independent_copies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(4, 3, Rgb([200, 10, 10])).save(&path).unwrap();
        let id = path.to_str().unwrap();

        let loader = loader();
        let mut first = loader.load(id).unwrap();
        first.put_pixel(0, 0, Rgb([0, 0, 0]));

        let second = loader.load(id).unwrap();
        assert_eq!(second.dimensions(), (4, 3));
        assert_eq!(second.get_pixel(0, 0), &Rgb([200, 10, 10]));
    }

    #[test]
    fn cached_image_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        RgbImage::new(2, 2).save(&path).unwrap();
        let id = path.to_str().unwrap().to_string();

        let loader = loader();
        loader.load(&id).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(loader.load(&id).is_ok());
    }

    #[test]
    fn content_decides_format_not_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        RgbImage::from_pixel(5, 4, Rgb([10, 200, 30]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        let nameless = dir.path().join("upload");
        std::fs::copy(&path, &nameless).unwrap();

        let loader = loader();
        let img = loader.load(path.to_str().unwrap()).unwrap();
        assert_eq!(img.dimensions(), (5, 4));
        assert_eq!(img.get_pixel(4, 3), &Rgb([10, 200, 30]));
        assert!(loader.load(nameless.to_str().unwrap()).is_ok());
    }

    #[test]
    fn unreadable_input_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let err = loader().load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, OcrError::ImageLoad(_)));

        let err = loader().load("/definitely/missing.png").unwrap_err();
        assert!(matches!(err, OcrError::ImageLoad(_)));
    }
}
