pub mod feed;
pub mod normalizer;
pub mod repository;
pub mod store;

use crate::db::models::FilterTag;
use crate::error::{AppError, AppResult};
use crate::plans::FeatureBundle;

pub use self::feed::{FeedEvent, FeedHub};
pub use self::repository::{MediaRepository, MediaStats, SqliteMediaRepository};
pub use self::store::{DeleteOutcome, LikeDelta, MediaStore, NewMedia};

pub const CAPTION_MAX_CHARS: usize = 280;
pub const AUTHOR_MAX_CHARS: usize = 80;
pub const COMMENT_MAX_CHARS: usize = 500;

const IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/bmp",
    "image/tiff",
];

/// Only accepted when the event's plan allows GIFs and videos.
const EXTENDED_TYPES: &[&str] = &["image/gif", "video/mp4", "video/quicktime", "video/webm"];

/// MIME types an event's upload form accepts.
pub fn accepted_mime_types(features: &FeatureBundle) -> Vec<&'static str> {
    let mut types = IMAGE_TYPES.to_vec();
    if features.allow_gifs {
        types.extend_from_slice(EXTENDED_TYPES);
    }
    types
}

pub fn check_mime_allowed(mime_type: &str, features: &FeatureBundle) -> AppResult<()> {
    if IMAGE_TYPES.contains(&mime_type) {
        return Ok(());
    }
    if EXTENDED_TYPES.contains(&mime_type) {
        if features.allow_gifs {
            return Ok(());
        }
        return Err(AppError::UnsupportedMedia(
            "Videos and GIFs are not available for this event.".into(),
        ));
    }
    Err(AppError::UnsupportedMedia(format!(
        "Unsupported file type: {}",
        mime_type
    )))
}

pub fn check_filter_allowed(filter: FilterTag, features: &FeatureBundle) -> AppResult<()> {
    if filter != FilterTag::None && !features.allow_filters {
        return Err(AppError::BadRequest(
            "Filters are not available for this event.".into(),
        ));
    }
    Ok(())
}

/// Trimmed guest display name, 1..=80 chars.
pub fn validate_author(author: &str) -> AppResult<String> {
    let author = author.trim();
    if author.is_empty() {
        return Err(AppError::BadRequest(
            "Please tell us your name before sharing.".into(),
        ));
    }
    if author.chars().count() > AUTHOR_MAX_CHARS {
        return Err(AppError::BadRequest(format!(
            "Name must be {} characters or less",
            AUTHOR_MAX_CHARS
        )));
    }
    Ok(author.to_string())
}

pub fn validate_caption(caption: Option<&str>) -> AppResult<Option<String>> {
    let caption = caption.map(str::trim).filter(|c| !c.is_empty());
    match caption {
        Some(c) if c.chars().count() > CAPTION_MAX_CHARS => Err(AppError::BadRequest(
            "The caption is too long.".into(),
        )),
        other => Ok(other.map(str::to_string)),
    }
}

pub fn validate_comment(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if text.chars().count() > COMMENT_MAX_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            COMMENT_MAX_CHARS
        )));
    }
    Ok(text.to_string())
}
