use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use image::{Rgb, RgbImage};
use ocr_layout_server::server::{self, AppState};
use ocr_layout_server::{
    Fragment, LayoutParams, OcrError, Processor, ProcessorOptions, Recognition, Recognizer,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

const BOUNDARY: &str = "----ocr-test-boundary";

struct Fixed(Recognition);

impl Recognizer for Fixed {
    fn recognize(&self, _image: &RgbImage) -> Result<Recognition, OcrError> {
        Ok(self.0.clone())
    }
}

fn state(root: &Path, recognition: Recognition) -> web::Data<AppState> {
    let processor = Processor::new(Arc::new(Fixed(recognition)), ProcessorOptions::default());
    let state = AppState::new(
        Arc::new(processor),
        LayoutParams::new(10.0, 0.05).unwrap(),
        root.join("uploads"),
        root.join("output"),
        None,
    )
    .unwrap();
    web::Data::new(state)
}

fn png(color: [u8; 3]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbImage::from_pixel(24, 16, Rgb(color))
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Builds a multipart/form-data body; `filename` marks file fields.
fn form(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn post(uri: &str, body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

fn disposition(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn missing_image_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), Recognition::default()))
            .configure(server::routes),
    )
    .await;

    let req = post("/img_txt", form(&[("white_background", None, &b"true"[..])])).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "error": "No image uploaded" }));
}

#[actix_web::test]
async fn request_without_form_reports_no_image_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), Recognition::default()))
            .configure(server::routes),
    )
    .await;

    let bare = test::TestRequest::post().uri("/img_txt").to_request();
    let resp = test::call_service(&app, bare).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "error": "No image uploaded" }));

    let json = test::TestRequest::post()
        .uri("/img_img")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{}")
        .to_request();
    let resp = test::call_service(&app, json).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "error": "No image uploaded" }));
}

#[actix_web::test]
async fn upload_named_after_another_format_is_still_read() {
    let dir = tempfile::tempdir().unwrap();
    let recognition = Recognition::new(vec![Fragment::at("ok", 0.0, 0.0)]);
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), recognition))
            .configure(server::routes),
    )
    .await;

    let upload = png([90, 90, 90]);
    let req = post("/img_txt", form(&[("image", Some("photo.jpg"), upload.as_slice())])).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"ok\n");
}

#[actix_web::test]
async fn image_to_text_returns_layout_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let recognition = Recognition::new(vec![
        Fragment::at("C", 0.0, 20.0),
        Fragment::at("A", 0.0, 0.0),
        Fragment::at("B", 50.0, 0.0),
    ]);
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), recognition))
            .configure(server::routes),
    )
    .await;

    let upload = png([30, 30, 30]);
    let req = post("/img_txt", form(&[("image", Some("scan.png"), upload.as_slice())])).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cd = disposition(&resp);
    assert!(cd.starts_with("attachment"), "{}", cd);
    assert!(cd.contains("scan.txt"), "{}", cd);

    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"A  B\nC\n");
    assert!(dir.path().join("uploads/scan.png").exists());
    assert!(dir.path().join("output/scan.txt").exists());
}

#[actix_web::test]
async fn image_to_image_blanks_background_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), Recognition::default()))
            .configure(server::routes),
    )
    .await;

    let upload = png([200, 0, 0]);
    let req = post("/img_img", form(&[("image", Some("photo.png"), upload.as_slice())])).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(disposition(&resp).contains("photo_text.png"));

    let body = test::read_body(resp).await;
    let rendered = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(rendered.dimensions(), (24, 16));
    assert!(rendered.pixels().all(|p| *p == Rgb([255, 255, 255])));
}

#[actix_web::test]
async fn image_to_image_can_keep_background() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), Recognition::default()))
            .configure(server::routes),
    )
    .await;

    let upload = png([0, 120, 0]);
    let req = post(
        "/img_img",
        form(&[
            ("white_background", None, &b"False"[..]),
            ("image", Some("keep.png"), upload.as_slice()),
        ]),
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let rendered = image::load_from_memory(&body).unwrap().to_rgb8();
    assert!(rendered.pixels().all(|p| *p == Rgb([0, 120, 0])));
}

#[actix_web::test]
async fn undecodable_upload_reports_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), Recognition::default()))
            .configure(server::routes),
    )
    .await;

    let req = post(
        "/img_txt",
        form(&[("image", Some("broken.png"), &b"not an image"[..])]),
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Failed to load image"));
}

#[actix_web::test]
async fn landing_page_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(state(dir.path(), Recognition::default()))
            .configure(server::routes),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("img_txt"));
}
