//! Admin console: login, moderation dashboard, events, plans, analytics.

use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, patch, post};
use axum::{Form, Json, Router};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};

use crate::auth::admin::{clear_session_cookie, credentials_match, session_cookie};
use crate::auth::{cookie_value, session, AdminUser, MaybeAdmin};
use crate::db::models::{Event, EventStatus, MediaItem};
use crate::error::{AppError, AppResult};
use crate::events::{EventPatch, EventStats, NewEvent};
use crate::media::{DeleteOutcome, MediaStats};
use crate::plans::{Plan, PlanId};
use crate::routes::home::Html;
use crate::routes::views::PhotoCard;
use crate::routes::UploadForm;
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/admin_login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/admin_dashboard.html")]
pub struct DashboardTemplate {
    pub admin_email: String,
    pub events: Vec<EventOption>,
    pub photos: Vec<PhotoCard>,
    pub analytics: Analytics,
}

pub struct EventOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "pages/admin_events.html")]
pub struct EventsTemplate {
    pub admin_email: String,
    pub events: Vec<Event>,
    pub plans: Vec<Plan>,
    pub public_url: String,
}

#[derive(Template)]
#[template(path = "pages/admin_plans.html")]
pub struct PlansTemplate {
    pub admin_email: String,
    pub plans: Vec<Plan>,
}

// --- Request/response types ---

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct EventFilter {
    pub event_id: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteMediaQuery {
    pub storage_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub events: EventStats,
    pub media: MediaStats,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin_root))
        .route("/admin/login", get(login_page).post(login))
        .route("/admin/logout", post(logout))
        .route("/admin/dashboard", get(dashboard_page))
        .route("/admin/events", get(events_page))
        .route("/admin/plans", get(plans_page))
        .route("/admin/api/media", get(list_media))
        .route(
            "/admin/api/events/{event_id}/photos/{photo_id}",
            axum::routing::delete(delete_media),
        )
        .route("/admin/api/events", get(list_events).post(create_event))
        .route(
            "/admin/api/events/{event_id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/admin/api/events/{event_id}/status", patch(toggle_status))
        .route("/admin/api/events/{event_id}/qr", get(event_qr))
        .route("/admin/api/plans", get(list_plans).put(save_plans))
        .route("/admin/api/analytics", get(analytics))
}

fn to_login() -> Response {
    Redirect::to("/admin/login").into_response()
}

// --- Session handlers ---

async fn admin_root(MaybeAdmin(admin): MaybeAdmin) -> Response {
    match admin {
        Some(_) => Redirect::to("/admin/dashboard").into_response(),
        None => to_login(),
    }
}

async fn login_page(MaybeAdmin(admin): MaybeAdmin) -> Response {
    if admin.is_some() {
        return Redirect::to("/admin/dashboard").into_response();
    }
    Html(LoginTemplate { error: None }).into_response()
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let admin = &state.config.admin;
    if !credentials_match(admin, &form.email, &form.password) {
        tracing::warn!("Failed admin login for {}", form.email.trim());
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(LoginTemplate {
                error: Some("Invalid email or password.".into()),
            }),
        )
            .into_response());
    }

    let token = session::create_session(&state.db, admin.email.as_str(), admin.session_hours)?;
    tracing::info!("Admin {} signed in", admin.email);
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/admin/dashboard".to_string()),
            (header::SET_COOKIE, session_cookie(admin, &token)),
        ],
    )
        .into_response())
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let admin = &state.config.admin;
    if let Some(token) = cookie_value(&headers, &admin.cookie_name) {
        session::delete_session(&state.db, token)?;
    }
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/admin/login".to_string()),
            (header::SET_COOKIE, clear_session_cookie(admin)),
        ],
    )
        .into_response())
}

// --- Pages ---

async fn dashboard_page(
    State(state): State<AppState>,
    MaybeAdmin(admin): MaybeAdmin,
    Query(filter): Query<EventFilter>,
) -> AppResult<Response> {
    let Some(admin) = admin else {
        return Ok(to_login());
    };

    let events = state.events.list().await?;
    let selected = filter.event_id.filter(|id| !id.is_empty());
    let items = state.media.list_all(selected.as_deref()).await?;

    let mut photos = Vec::with_capacity(items.len());
    for item in items {
        match events.iter().find(|e| e.id == item.event_id) {
            Some(event) => photos.push(PhotoCard::new(item, event)),
            None => tracing::warn!("Media {} has no event", item.id),
        }
    }

    let options = events
        .into_iter()
        .map(|e| EventOption {
            selected: selected.as_deref() == Some(e.id.as_str()),
            label: format!("{} ({})", e.couple_names, e.date),
            id: e.id,
        })
        .collect();

    Ok(Html(DashboardTemplate {
        admin_email: admin.email,
        analytics: collect_analytics(&state).await?,
        events: options,
        photos,
    })
    .into_response())
}

async fn events_page(
    State(state): State<AppState>,
    MaybeAdmin(admin): MaybeAdmin,
) -> AppResult<Response> {
    let Some(admin) = admin else {
        return Ok(to_login());
    };
    Ok(Html(EventsTemplate {
        admin_email: admin.email,
        events: state.events.list().await?,
        plans: state.plans.list().await,
        public_url: state.config.public_url(),
    })
    .into_response())
}

async fn plans_page(
    State(state): State<AppState>,
    MaybeAdmin(admin): MaybeAdmin,
) -> AppResult<Response> {
    let Some(admin) = admin else {
        return Ok(to_login());
    };
    Ok(Html(PlansTemplate {
        admin_email: admin.email,
        plans: state.plans.list().await,
    })
    .into_response())
}

// --- Moderation API ---

async fn list_media(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<EventFilter>,
) -> AppResult<Json<Vec<MediaItem>>> {
    let event_id = filter.event_id.filter(|id| !id.is_empty());
    Ok(Json(state.media.list_all(event_id.as_deref()).await?))
}

async fn delete_media(
    State(state): State<AppState>,
    admin: AdminUser,
    Path((event_id, photo_id)): Path<(String, String)>,
    Query(query): Query<DeleteMediaQuery>,
) -> AppResult<Json<DeleteOutcome>> {
    let outcome = state
        .media
        .delete(&event_id, &photo_id, query.storage_url.as_deref())
        .await?;
    tracing::info!(
        "Admin {} removed media {} (record: {}, blob: {})",
        admin.email,
        photo_id,
        outcome.removed_record,
        outcome.removed_blob
    );
    Ok(Json(outcome))
}

// --- Events API ---

async fn list_events(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<Event>>> {
    Ok(Json(state.events.list().await?))
}

async fn create_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Event>)> {
    let mut form = UploadForm::read(multipart, "logo").await?;
    let new = NewEvent {
        couple_names: form.text("couple_names").unwrap_or_default(),
        date: form.text("date").unwrap_or_default(),
        plan: form
            .parsed::<PlanId>("plan")?
            .ok_or_else(|| AppError::BadRequest("A plan is required".into()))?,
        price: form.parsed::<i64>("price")?,
        logo: form.file.take(),
    };
    let event = state.events.create(new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn get_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
) -> AppResult<Json<Event>> {
    Ok(Json(state.events.get(&event_id).await?))
}

async fn update_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Event>> {
    let mut form = UploadForm::read(multipart, "logo").await?;
    let patch = EventPatch {
        couple_names: form.text("couple_names"),
        date: form.text("date"),
        plan: form.parsed::<PlanId>("plan")?,
        price: form.parsed::<i64>("price")?,
        status: form.parsed::<EventStatus>("status")?,
        logo: form.file.take(),
    };
    Ok(Json(state.events.update(&event_id, patch).await?))
}

async fn toggle_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
) -> AppResult<Json<Event>> {
    let event = state.events.get(&event_id).await?;
    let patch = EventPatch {
        status: Some(event.status.toggled()),
        ..EventPatch::default()
    };
    Ok(Json(state.events.update(&event_id, patch).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
) -> AppResult<StatusCode> {
    state.events.delete(&event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// SVG QR code pointing guests at the event's join page.
async fn event_qr(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
) -> AppResult<Response> {
    let event = state.events.get(&event_id).await?;
    let svg = join_qr_svg(&join_url(&state.config.public_url(), &event.id))?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

pub fn join_url(public_url: &str, event_id: &str) -> String {
    format!("{}/{}", public_url.trim_end_matches('/'), event_id)
}

fn join_qr_svg(url: &str) -> AppResult<String> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| AppError::Internal(format!("QR encode failed: {}", e)))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build())
}

// --- Plans & analytics API ---

async fn list_plans(State(state): State<AppState>, _admin: AdminUser) -> Json<Vec<Plan>> {
    Json(state.plans.list().await)
}

async fn save_plans(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(plans): Json<Vec<Plan>>,
) -> AppResult<Json<Vec<Plan>>> {
    let saved = state.plans.replace_all(plans).await?;
    tracing::info!("Admin {} saved the plan table", admin.email);
    Ok(Json(saved))
}

async fn analytics(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Analytics>> {
    Ok(Json(collect_analytics(&state).await?))
}

async fn collect_analytics(state: &AppState) -> AppResult<Analytics> {
    Ok(Analytics {
        events: state.events.stats().await?,
        media: state.media.stats().await?,
    })
}
