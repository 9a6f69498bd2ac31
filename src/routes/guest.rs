//! Guest-facing pages: join, feed, upload form and the TV carousel.

use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::{GuestSession, MaybeGuest};
use crate::db::models::{Event, FilterTag};
use crate::error::{AppError, AppResult};
use crate::events::ensure_guest_access;
use crate::media::accepted_mime_types;
use crate::routes::home::Html;
use crate::routes::views::PhotoCard;
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/join.html")]
pub struct JoinTemplate {
    pub event: Event,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/feed.html")]
pub struct FeedTemplate {
    pub event: Event,
    pub guest_name: String,
    pub photos: Vec<PhotoCard>,
}

pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
    pub class: &'static str,
}

#[derive(Template)]
#[template(path = "pages/upload.html")]
pub struct UploadTemplate {
    pub event: Event,
    pub guest_name: String,
    pub accept: String,
    pub filters: Vec<FilterOption>,
    pub max_image_mb: u64,
    pub max_video_mb: u64,
}

#[derive(Template)]
#[template(path = "pages/tv.html")]
pub struct TvTemplate {
    pub event: Event,
    pub photos: Vec<PhotoCard>,
    pub poll_seconds: u64,
    pub slide_seconds: u64,
}

#[derive(Template)]
#[template(path = "pages/unavailable.html")]
pub struct UnavailableTemplate {
    pub title: String,
    pub message: String,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct JoinForm {
    pub name: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{event_id}", get(join_page))
        .route("/{event_id}/join", post(join))
        .route("/{event_id}/leave", post(leave))
        .route("/{event_id}/feed", get(feed_page))
        .route("/{event_id}/upload", get(upload_page))
        .route("/{event_id}/tv", get(tv_page))
}

// --- Gate ---

/// The guest access gate for pages: closed events render the unavailable page.
fn check_access(event: &Event) -> Result<(), Response> {
    ensure_guest_access(event, Utc::now().date_naive()).map_err(|_| {
        unavailable(
            "Access unavailable",
            &format!(
                "The photo album for {} is not open right now.",
                event.couple_names
            ),
        )
    })
}

fn unavailable(title: &str, message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(UnavailableTemplate {
            title: title.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn to_join(event_id: &str) -> Response {
    Redirect::to(&format!("/{}", event_id)).into_response()
}

// --- Handlers ---

async fn join_page(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    MaybeGuest(guest): MaybeGuest,
) -> AppResult<Response> {
    let event = state.events.get(&event_id).await?;
    if let Err(page) = check_access(&event) {
        return Ok(page);
    }
    if guest.is_some() {
        return Ok(Redirect::to(&format!("/{}/feed", event.id)).into_response());
    }
    Ok(Html(JoinTemplate { event, error: None }).into_response())
}

async fn join(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Form(form): Form<JoinForm>,
) -> AppResult<Response> {
    let event = state.events.get(&event_id).await?;
    if let Err(page) = check_access(&event) {
        return Ok(page);
    }

    let session = match GuestSession::join(&event.id, &form.name) {
        Ok(session) => session,
        Err(AppError::BadRequest(msg)) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Html(JoinTemplate {
                    event,
                    error: Some(msg),
                }),
            )
                .into_response());
        }
        Err(e) => return Err(e),
    };

    tracing::info!("Guest {} joined event {}", session.name, event.id);
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, format!("/{}/feed", event.id)),
            (header::SET_COOKIE, session.set_cookie()),
        ],
    )
        .into_response())
}

async fn leave(Path(event_id): Path<String>) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, format!("/{}", event_id)),
            (header::SET_COOKIE, GuestSession::clear_cookie(&event_id)),
        ],
    )
        .into_response()
}

async fn feed_page(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    MaybeGuest(guest): MaybeGuest,
) -> AppResult<Response> {
    let event = state.events.get(&event_id).await?;
    if let Err(page) = check_access(&event) {
        return Ok(page);
    }
    let Some(guest) = guest else {
        return Ok(to_join(&event.id));
    };

    let items = state.media.list(&event.id).await?;
    let photos = PhotoCard::list(items, &event);
    Ok(Html(FeedTemplate {
        event,
        guest_name: guest.name,
        photos,
    })
    .into_response())
}

async fn upload_page(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    MaybeGuest(guest): MaybeGuest,
) -> AppResult<Response> {
    let event = state.events.get(&event_id).await?;
    if let Err(page) = check_access(&event) {
        return Ok(page);
    }
    let Some(guest) = guest else {
        return Ok(to_join(&event.id));
    };

    let filters = if event.features.allow_filters {
        FilterTag::ALL
            .iter()
            .map(|f| FilterOption {
                value: f.as_str(),
                label: f.label(),
                class: f.css_class(),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(Html(UploadTemplate {
        accept: accepted_mime_types(&event.features).join(","),
        filters,
        max_image_mb: state.config.media.max_image_mb,
        max_video_mb: state.config.media.max_video_mb,
        guest_name: guest.name,
        event,
    })
    .into_response())
}

async fn tv_page(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    MaybeGuest(guest): MaybeGuest,
) -> AppResult<Response> {
    let event = state.events.get(&event_id).await?;
    if let Err(page) = check_access(&event) {
        return Ok(page);
    }
    if guest.is_none() {
        return Ok(to_join(&event.id));
    }
    if !event.features.tv_carousel {
        return Ok(unavailable(
            "TV mode unavailable",
            "The TV carousel is not included in this event's plan.",
        ));
    }

    let items = state.media.list(&event.id).await?;
    Ok(Html(TvTemplate {
        photos: PhotoCard::list(items, &event),
        poll_seconds: state.config.tv.poll_seconds,
        slide_seconds: state.config.tv.slide_seconds,
        event,
    })
    .into_response())
}
