use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::{cookie_value, session};
use crate::config::AdminConfig;
use crate::error::AppError;
use crate::state::AppState;

/// A signed-in administrator. Rejects with 401 when there is no live session.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.admin.cookie_name)
            .ok_or(AppError::Unauthorized)?;
        match session::find_session(&state.db, token)? {
            Some(email) => Ok(AdminUser { email }),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Optional admin for pages that redirect to the login form instead of failing.
pub struct MaybeAdmin(pub Option<AdminUser>);

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AdminUser::from_request_parts(parts, state).await {
            Ok(admin) => Ok(MaybeAdmin(Some(admin))),
            Err(AppError::Unauthorized) => Ok(MaybeAdmin(None)),
            Err(e) => Err(e),
        }
    }
}

/// Compare submitted credentials with the configured administrator.
pub fn credentials_match(config: &AdminConfig, email: &str, password: &str) -> bool {
    email.trim().eq_ignore_ascii_case(config.email.trim()) && password == config.password
}

pub fn session_cookie(config: &AdminConfig, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        config.cookie_name,
        token,
        config.session_hours * 3600
    )
}

pub fn clear_session_cookie(config: &AdminConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        config.cookie_name
    )
}
