//! Guest identity: a self-asserted display name kept in a per-event cookie.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::collections::HashMap;

use crate::auth::cookie_value;
use crate::error::AppError;
use crate::media::validate_author;
use crate::state::AppState;

const COOKIE_PREFIX: &str = "momentos_guest_";
const COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSession {
    pub event_id: String,
    pub name: String,
}

impl GuestSession {
    /// Start a session; the name goes through the same check as upload authors.
    pub fn join(event_id: &str, name: &str) -> Result<Self, AppError> {
        Ok(Self {
            event_id: event_id.to_string(),
            name: validate_author(name)?,
        })
    }

    pub fn cookie_name(event_id: &str) -> String {
        format!("{}{}", COOKIE_PREFIX, event_id)
    }

    pub fn from_headers(headers: &HeaderMap, event_id: &str) -> Option<Self> {
        let raw = cookie_value(headers, &Self::cookie_name(event_id))?;
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        let name = String::from_utf8(bytes).ok()?;
        let name = validate_author(&name).ok()?;
        Some(Self {
            event_id: event_id.to_string(),
            name,
        })
    }

    pub fn set_cookie(&self) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            Self::cookie_name(&self.event_id),
            URL_SAFE_NO_PAD.encode(self.name.as_bytes()),
            COOKIE_MAX_AGE_SECS
        )
    }

    pub fn clear_cookie(event_id: &str) -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
            Self::cookie_name(event_id)
        )
    }
}

/// Guest session for the `{event_id}` in the route, if the cookie is present.
pub struct MaybeGuest(pub Option<GuestSession>);

impl FromRequestParts<AppState> for MaybeGuest {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        let session = params
            .get("event_id")
            .and_then(|event_id| GuestSession::from_headers(&parts.headers, event_id));
        Ok(MaybeGuest(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn cookie_round_trips_non_ascii_names() {
        let session = GuestSession::join("e1", "  Tia Conceição ").unwrap();
        let set = session.set_cookie();
        assert!(set.starts_with("momentos_guest_e1="));

        let pair = set.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());

        let read = GuestSession::from_headers(&headers, "e1").unwrap();
        assert_eq!(read.name, "Tia Conceição");
        assert!(GuestSession::from_headers(&headers, "e2").is_none());
    }

    #[test]
    fn garbage_cookie_is_no_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("momentos_guest_e1=%%%"),
        );
        assert!(GuestSession::from_headers(&headers, "e1").is_none());
    }

    #[test]
    fn join_requires_a_name() {
        assert!(GuestSession::join("e1", "   ").is_err());
        assert!(GuestSession::clear_cookie("e1").contains("Max-Age=0"));
    }
}
