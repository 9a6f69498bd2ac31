pub mod admin;
pub mod api;
pub mod assets;
pub mod blobs;
pub mod guest;
pub mod home;
pub mod views;

use axum::extract::{DefaultBodyLimit, Multipart};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::collections::HashMap;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::media::normalizer::RawUpload;
use crate::state::AppState;

const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// The full application router.
pub fn router(state: AppState) -> Router {
    let body_limit =
        (state.config.media.max_video_mb as usize) * 1024 * 1024 + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(home::index))
        .route("/go", get(home::go))
        .route("/assets/{*path}", get(assets::serve))
        .route("/media/{*path}", get(blobs::serve))
        .merge(api::router())
        .merge(admin::router())
        .merge(guest::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Text fields plus at most one file from a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    pub file: Option<RawUpload>,
}

impl UploadForm {
    /// Drain `multipart`. The part named `file_field` is taken as the file.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data: Bytes = field.bytes().await?;
                // An empty file input still submits a part
                if !data.is_empty() || file_name.as_deref().is_some_and(|n| !n.is_empty()) {
                    form.file = Some(RawUpload {
                        file_name,
                        content_type,
                        data,
                    });
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn parsed<T>(&self, name: &str) -> AppResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| AppError::BadRequest(format!("Invalid {}: {}", name, e)))
            })
            .transpose()
    }
}
