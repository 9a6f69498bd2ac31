use chrono::{DateTime, NaiveDateTime, Utc};

use crate::db::models::{Event, MediaItem, MediaKind};

// --- View structs ---

pub struct CommentView {
    pub author: String,
    pub text: String,
    pub created_label: String,
}

pub struct PhotoCard {
    pub id: String,
    pub event_id: String,
    pub url: String,
    pub is_video: bool,
    pub mime_type: String,
    pub caption: Option<String>,
    pub author: String,
    pub likes: i64,
    pub filter_class: &'static str,
    pub created_label: String,
    pub comments: Vec<CommentView>,
    pub download_url: Option<String>,
}

impl PhotoCard {
    pub fn new(item: MediaItem, event: &Event) -> Self {
        let download_url = event
            .features
            .allow_download
            .then(|| format!("{}?download=1", item.url));
        Self {
            created_label: relative_time(&item.created_at),
            is_video: item.kind == MediaKind::Video,
            filter_class: item.filter.css_class(),
            comments: item
                .comments
                .into_iter()
                .map(|c| CommentView {
                    created_label: relative_time(&c.created_at),
                    author: c.author,
                    text: c.text,
                })
                .collect(),
            id: item.id,
            event_id: item.event_id,
            url: item.url,
            mime_type: item.mime_type,
            caption: item.caption,
            author: item.author,
            likes: item.likes,
            download_url,
        }
    }

    pub fn list(items: Vec<MediaItem>, event: &Event) -> Vec<Self> {
        items.into_iter().map(|item| Self::new(item, event)).collect()
    }
}

// --- Time formatting ---

/// Relative label for a stored RFC 3339 timestamp; unparseable input is shown raw.
pub fn relative_time(stored: &str) -> String {
    DateTime::parse_from_rfc3339(stored)
        .map(|dt| format_relative_time(&dt.naive_utc()))
        .unwrap_or_else(|_| stored.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let diff = Utc::now().naive_utc().signed_duration_since(*dt);

    if diff.num_seconds() < 60 {
        return "just now".to_string();
    }
    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }
    dt.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn recent_times_are_relative() {
        let now = Utc::now().naive_utc();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - Duration::minutes(5))), "5m ago");
        assert_eq!(format_relative_time(&(now - Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - Duration::days(2))), "2d ago");
    }

    #[test]
    fn old_times_show_the_date() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_relative_time(&dt), "Jan 15, 2025");
        assert_eq!(relative_time("2025-01-15T12:00:00.000Z"), "Jan 15, 2025");
    }

    #[test]
    fn bad_timestamps_are_shown_raw() {
        assert_eq!(relative_time("not-a-date"), "not-a-date");
    }
}
