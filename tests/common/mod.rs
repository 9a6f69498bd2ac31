#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

use momentos::captions::{CaptionError, CaptionSuggester, PhotoDataUri};
use momentos::config::Config;
use momentos::db;
use momentos::db::models::Event;
use momentos::events::NewEvent;
use momentos::media::normalizer::RawUpload;
use momentos::plans::{PlanId, PlanPolicy};
use momentos::state::AppState;

/// Always suggests the same caption.
pub struct FixedCaption;

#[async_trait]
impl CaptionSuggester for FixedCaption {
    async fn suggest(&self, _photo: &PhotoDataUri) -> Result<String, CaptionError> {
        Ok("A toast to the happy couple".to_string())
    }
}

/// App state over a throwaway data directory. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn test_state() -> (TempDir, AppState) {
    test_state_with(|_| {}).await
}

/// Like `test_state`, with a chance to adjust the config first.
pub async fn test_state_with(adjust: impl FnOnce(&mut Config)) -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default().resolve_paths(dir.path());
    adjust(&mut config);
    let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let plans = Arc::new(PlanPolicy::load(config.plans_path()).await);
    let state = AppState::with_captions(pool, config, plans, Arc::new(FixedCaption));
    (dir, state)
}

pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

pub async fn create_event(state: &AppState, plan: PlanId) -> Event {
    state
        .events
        .create(NewEvent {
            couple_names: "Ana & Luis".to_string(),
            date: today(),
            plan,
            price: None,
            logo: None,
        })
        .await
        .unwrap()
}

pub fn png_bytes() -> Bytes {
    let img = RgbImage::from_pixel(16, 12, Rgb([200, 120, 80]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    Bytes::from(out.into_inner())
}

pub fn png_upload() -> RawUpload {
    RawUpload {
        file_name: Some("toast.png".to_string()),
        content_type: Some("image/png".to_string()),
        data: png_bytes(),
    }
}

pub fn video_upload() -> RawUpload {
    RawUpload {
        file_name: Some("dance.mp4".to_string()),
        content_type: Some("video/mp4".to_string()),
        data: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42 not really a movie"),
    }
}

/// Number of files under `dir`, recursively.
pub fn count_files(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// A file part for `multipart_body`.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub const BOUNDARY: &str = "momentos-test-boundary";

/// A `multipart/form-data` body with text fields and an optional file.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
