//! HTTP surface: upload an image, download a transcript or an overlay.

use crate::config::ServerConfig;
use crate::error::OcrError;
use crate::layout::LayoutParams;
use crate::processor::Processor;
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use futures::{StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared by every worker.
pub struct AppState {
    pub processor: Arc<Processor>,
    pub layout: LayoutParams,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub font: Option<PathBuf>,
}

impl AppState {
    /// Creates the upload and output directories if they are missing.
    pub fn new(
        processor: Arc<Processor>,
        layout: LayoutParams,
        upload_dir: PathBuf,
        output_dir: PathBuf,
        font: Option<PathBuf>,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&upload_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            processor,
            layout,
            upload_dir,
            output_dir,
            font,
        })
    }
}

/// A stored upload plus the form fields that came with it.
struct Upload {
    path: PathBuf,
    base: String,
    ext: String,
    white_background: Option<String>,
}

/// Registers all routes; the caller provides `web::Data<AppState>`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .service(web::resource("/img_txt").route(web::post().to(image_to_text)))
        .service(web::resource("/img_img").route(web::post().to(image_to_image)));
}

pub async fn run_server(config: ServerConfig, state: AppState) -> std::io::Result<()> {
    let state = web::Data::new(state);
    info!(
        host = %config.host,
        port = config.port,
        uploads = %state.upload_dir.display(),
        output = %state.output_dir.display(),
        "starting server"
    );

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(routes)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind((config.host.as_str(), config.port))?.run().await
}

async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn image_to_text(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, OcrError> {
    let upload = save_upload(payload, &state.upload_dir).await?;
    let download_name = format!("{}.txt", upload.base);
    let output = state.output_dir.join(&download_name);

    let identifier = upload.path.to_string_lossy().into_owned();
    let job_output = output.clone();
    let job_state = state.clone();
    web::block(move || {
        job_state
            .processor
            .transcribe_with_layout(&identifier, &job_output, job_state.layout)
    })
    .await
    .map_err(|_| OcrError::Cancelled)??;

    attachment(&output, &download_name, "text/plain; charset=utf-8").await
}

async fn image_to_image(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, OcrError> {
    let upload = save_upload(payload, &state.upload_dir).await?;
    let white_background = upload
        .white_background
        .as_deref()
        .map_or(true, |v| v.trim().eq_ignore_ascii_case("true"));
    let download_name = format!("{}_text{}", upload.base, upload.ext);
    let output = state.output_dir.join(&download_name);

    let identifier = upload.path.to_string_lossy().into_owned();
    let job_output = output.clone();
    let job_state = state.clone();
    web::block(move || {
        job_state.processor.render_text_overlay(
            &identifier,
            &job_output,
            white_background,
            job_state.font.as_deref(),
        )
    })
    .await
    .map_err(|_| OcrError::Cancelled)??;

    let content_type = image::ImageFormat::from_path(&output)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    attachment(&output, &download_name, content_type).await
}

/// Stores the `image` field under `upload_dir` and collects the other form fields.
async fn save_upload(mut payload: Multipart, upload_dir: &Path) -> Result<Upload, OcrError> {
    let mut upload: Option<(PathBuf, String, String)> = None;
    let mut white_background = None;
    let mut seen_field = false;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| upload_error(e, seen_field))?
    {
        seen_field = true;
        let content_disposition = field.content_disposition();
        let name = content_disposition.get_name().unwrap_or_default().to_string();
        let filename = content_disposition.get_filename().map(str::to_string);

        // Collecting field bytes
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| OcrError::Upload(e.to_string()))?;
            bytes.extend_from_slice(&data);
        }

        match name.as_str() {
            "image" => {
                let filename = safe_filename(filename.as_deref());
                let path = upload_dir.join(&filename);
                let (base, ext) = split_extension(&filename);
                std::fs::write(&path, &bytes)?;
                debug!(path = %path.display(), bytes = bytes.len(), "stored upload");
                upload = Some((path, base, ext));
            }
            "white_background" => {
                white_background = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            other => debug!(field = other, "ignoring form field"),
        }
    }

    let (path, base, ext) = upload.ok_or(OcrError::NoImageUploaded)?;
    Ok(Upload {
        path,
        base,
        ext,
        white_background,
    })
}

/// A request that carries no multipart form at all has no image in it;
/// anything that breaks once parts have started arriving is malformed.
fn upload_error(err: MultipartError, seen_field: bool) -> OcrError {
    match err {
        MultipartError::NoContentType | MultipartError::ParseContentType => {
            OcrError::NoImageUploaded
        }
        MultipartError::Boundary | MultipartError::Incomplete if !seen_field => {
            OcrError::NoImageUploaded
        }
        other => OcrError::Upload(other.to_string()),
    }
}

/// Client filename stripped of path components and reserved characters.
fn safe_filename(client_name: Option<&str>) -> String {
    let sanitized = sanitize_filename::sanitize(client_name.unwrap_or_default());
    let sanitized = sanitized.trim().replace(' ', "_");
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        sanitized
    }
}

/// `("scan", ".png")` for `scan.png`; the extension keeps its dot.
fn split_extension(filename: &str) -> (String, String) {
    let path = Path::new(filename);
    let base = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (base, ext)
}

async fn attachment(
    path: &Path,
    download_name: &str,
    content_type: &str,
) -> Result<HttpResponse, OcrError> {
    let owned = path.to_path_buf();
    let body = web::block(move || std::fs::read(owned))
        .await
        .map_err(|_| OcrError::Cancelled)??;

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(download_disposition(download_name))
        .body(body))
}

/// `attachment` header; non-ASCII names get an ASCII `filename` plus a UTF-8 `filename*`.
fn download_disposition(name: &str) -> ContentDisposition {
    if name.is_ascii() {
        return ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(name.to_string())],
        };
    }
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![
            DispositionParam::Filename(fallback),
            DispositionParam::FilenameExt(ExtendedValue {
                charset: Charset::Ext(String::from("UTF-8")),
                language_tag: None,
                value: name.as_bytes().to_vec(),
            }),
        ],
    }
}
