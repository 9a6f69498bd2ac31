//! Guest JSON API: event info, photos, likes, comments, live stream, captions.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::auth::MaybeGuest;
use crate::captions::PhotoDataUri;
use crate::db::models::{Comment, FilterTag, GuestAccess, MediaItem};
use crate::error::{AppError, AppResult};
use crate::media::{accepted_mime_types, FeedEvent, LikeDelta, NewMedia};
use crate::plans::{FeatureBundle, PlanId};
use crate::routes::UploadForm;
use crate::state::AppState;

// --- Request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub id: String,
    pub couple_names: String,
    pub date: String,
    pub plan: PlanId,
    pub logo_url: Option<String>,
    pub features: FeatureBundle,
    pub accepted_types: Vec<&'static str>,
    pub max_image_mb: u64,
    pub max_video_mb: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub is_video: bool,
    pub mime_type: String,
    pub size: usize,
    pub preview: Option<String>,
}

#[derive(Deserialize)]
pub struct LikeRequest {
    pub delta: LikeDelta,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub likes: i64,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionRequest {
    pub photo_data_uri: String,
}

#[derive(Serialize)]
pub struct CaptionResponse {
    pub success: bool,
    pub caption: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events/{event_id}", get(event_info))
        .route(
            "/api/events/{event_id}/photos",
            get(list_photos).post(upload_photo),
        )
        .route("/api/events/{event_id}/photos/preview", post(preview_photo))
        .route("/api/events/{event_id}/photos/stream", get(photo_stream))
        .route(
            "/api/events/{event_id}/photos/{photo_id}/like",
            post(like_photo),
        )
        .route(
            "/api/events/{event_id}/photos/{photo_id}/comments",
            post(comment_photo),
        )
        .route("/api/events/{event_id}/captions", post(suggest_caption))
}

// --- Handlers ---

async fn event_info(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Json<EventInfo>> {
    let event = state.events.open_for_guests(&event_id).await?;
    Ok(Json(EventInfo {
        accepted_types: accepted_mime_types(&event.features),
        max_image_mb: state.config.media.max_image_mb,
        max_video_mb: state.config.media.max_video_mb,
        id: event.id,
        couple_names: event.couple_names,
        date: event.date,
        plan: event.plan,
        logo_url: event.logo_url,
        features: event.features,
    }))
}

async fn list_photos(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Json<Vec<MediaItem>>> {
    let event = state.events.open_for_guests(&event_id).await?;
    Ok(Json(state.media.list(&event.id).await?))
}

async fn upload_photo(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    MaybeGuest(guest): MaybeGuest,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MediaItem>)> {
    let event = state.events.open_for_guests(&event_id).await?;
    let mut form = read_upload(&state, multipart).await?;

    // The session name wins; a bare author field only serves clients without one
    let author = match guest {
        Some(guest) => guest.name,
        None => form.text("author").ok_or(AppError::Unauthorized)?,
    };
    let file = form
        .file
        .take()
        .ok_or_else(|| AppError::BadRequest("A file is required.".into()))?;
    let filter = form.parsed::<FilterTag>("filter")?.unwrap_or_default();

    let item = state
        .media
        .create(
            &event,
            NewMedia {
                author,
                caption: form.text("caption"),
                filter,
                file,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn preview_photo(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<PreviewResponse>> {
    let event = state.events.open_for_guests(&event_id).await?;
    let form = read_upload(&state, multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("A file is required.".into()))?;

    let media = state.media.prepare(&event, file).await?;
    Ok(Json(PreviewResponse {
        is_video: media.is_video(),
        size: media.data.len(),
        mime_type: media.mime_type,
        preview: media.preview,
    }))
}

/// The body limit is sized for the largest video, so that is the limit to report.
async fn read_upload(state: &AppState, multipart: Multipart) -> AppResult<UploadForm> {
    UploadForm::read(multipart, "file").await.map_err(|e| match e {
        AppError::PayloadTooLarge(_) => AppError::PayloadTooLarge(format!(
            "Maximum video size is {}MB.",
            state.config.media.max_video_mb
        )),
        other => other,
    })
}

async fn like_photo(
    State(state): State<AppState>,
    Path((event_id, photo_id)): Path<(String, String)>,
    MaybeGuest(guest): MaybeGuest,
    Json(request): Json<LikeRequest>,
) -> AppResult<Json<LikeResponse>> {
    let event = state.events.open_for_guests(&event_id).await?;
    guest.ok_or(AppError::Unauthorized)?;
    let likes = state.media.like(&event.id, &photo_id, request.delta).await?;
    Ok(Json(LikeResponse { likes }))
}

async fn comment_photo(
    State(state): State<AppState>,
    Path((event_id, photo_id)): Path<(String, String)>,
    MaybeGuest(guest): MaybeGuest,
    Json(request): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let event = state.events.open_for_guests(&event_id).await?;
    let guest = guest.ok_or(AppError::Unauthorized)?;
    let comment = state
        .media
        .comment(&event.id, &photo_id, &guest.name, &request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Live feed changes for one event, as server-sent events.
async fn photo_stream(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let event = state.events.open_for_guests(&event_id).await?;
    let event_id = event.id.clone();
    let rx = state.media.hub().subscribe();

    // Ends once the event stops admitting guests
    let stream = BroadcastStream::new(rx)
        .take_while(move |message| match message {
            Ok(FeedEvent::Closed { event_id: closed }) => closed != &event.id,
            _ => event.guest_access(Utc::now().date_naive()) == GuestAccess::Open,
        })
        .filter_map(move |message| match message {
            Ok(change) if change.event_id() == event_id => SseEvent::default()
                .event(change.name())
                .json_data(&change)
                .ok()
                .map(Ok),
            Ok(_) => None,
            // Missed notifications; the page reloads its list
            Err(BroadcastStreamRecvError::Lagged(skipped)) => Some(Ok(SseEvent::default()
                .event("resync")
                .data(skipped.to_string()))),
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn suggest_caption(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<CaptionRequest>,
) -> AppResult<Json<CaptionResponse>> {
    state.events.open_for_guests(&event_id).await?;
    let photo = PhotoDataUri::parse(&request.photo_data_uri)?;
    let caption = state.captions.suggest(&photo).await?;
    Ok(Json(CaptionResponse {
        success: true,
        caption,
    }))
}
