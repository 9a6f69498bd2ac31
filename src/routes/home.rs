use askama::Template;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub error: Option<String>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Deserialize)]
pub struct GoQuery {
    code: Option<String>,
}

pub async fn index() -> Html<HomeTemplate> {
    Html(HomeTemplate { error: None })
}

/// Event code form target: jump to that event's join page.
pub async fn go(Query(query): Query<GoQuery>) -> Response {
    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-'));
    match code {
        Some(code) => Redirect::to(&format!("/{}", code)).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Html(HomeTemplate {
                error: Some("Please enter a valid event code.".into()),
            }),
        )
            .into_response(),
    }
}
