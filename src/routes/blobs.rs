use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::MaybeAdmin;
use crate::error::{AppError, AppResult};
use crate::events::ensure_guest_access;
use crate::state::AppState;
use crate::storage::event_of_media_url;

#[derive(Deserialize)]
pub struct BlobQuery {
    download: Option<String>,
}

/// Stored media bytes, behind the owning event's guest gate. `?download=1`
/// asks for an attachment, which the event's plan must allow.
pub async fn serve(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<BlobQuery>,
    MaybeAdmin(admin): MaybeAdmin,
) -> AppResult<Response> {
    let download = matches!(query.download.as_deref(), Some("1" | "true"));
    match event_of_media_url(&path) {
        Some(event_id) => {
            let event = state.events.get(event_id).await?;
            // Moderators still see media of closed events
            if admin.is_none() {
                ensure_guest_access(&event, Utc::now().date_naive())?;
            }
            if download && !event.features.allow_download {
                return Err(AppError::Forbidden(
                    "Downloads are not available for this event.".into(),
                ));
            }
        }
        // Logos stay public; only event media can be downloaded
        None if download => return Err(AppError::NotFound),
        None => {}
    }

    let data = state.blobs.read(&path).await?.ok_or(AppError::NotFound)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    let disposition = if download {
        let file_name = path.rsplit('/').next().unwrap_or("media");
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        "inline".to_string()
    };

    Ok((
        [
            (header::CONTENT_TYPE, mime.essence_str().to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
