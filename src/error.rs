//! Error taxonomy shared by the processing routines and the HTTP layer.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("No image uploaded")]
    NoImageUploaded,

    #[error("Malformed upload: {0}")]
    Upload(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("OCR processing failed: {0}")]
    Recognition(String),

    #[error("Failed to load font: {0}")]
    Font(String),

    #[error("Failed to write output: {0}")]
    Render(String),

    #[error("Processing was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for OcrError {
    fn status_code(&self) -> StatusCode {
        match self {
            OcrError::NoImageUploaded | OcrError::Upload(_) | OcrError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            OcrError::ImageLoad(_) | OcrError::Download(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OcrError::Recognition(_)
            | OcrError::Font(_)
            | OcrError::Render(_)
            | OcrError::Cancelled
            | OcrError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
