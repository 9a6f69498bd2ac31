use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::plans::{FeatureBundle, PlanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Inactive,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Inactive => "inactive",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            EventStatus::Active => EventStatus::Inactive,
            EventStatus::Inactive => EventStatus::Active,
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" | "ativo" => Ok(EventStatus::Active),
            "inactive" | "inativo" => Ok(EventStatus::Inactive),
            other => Err(format!("Unknown event status: {}", other)),
        }
    }
}

/// Outcome of the guest access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestAccess {
    Open,
    Inactive,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub couple_names: String,
    pub date: String,
    pub plan: PlanId,
    pub price: i64,
    pub status: EventStatus,
    pub created_at: String,
    pub logo_url: Option<String>,
    pub features: FeatureBundle,
}

impl Event {
    /// Inactive events refuse guests outright. Otherwise access lasts
    /// `accessDurationDays` past the event date (0 = forever).
    pub fn guest_access(&self, today: NaiveDate) -> GuestAccess {
        if self.status == EventStatus::Inactive {
            return GuestAccess::Inactive;
        }
        let days = self.features.access_duration_days;
        if days == 0 {
            return GuestAccess::Open;
        }
        // A closing day past the calendar's range never arrives
        let closes = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.checked_add_signed(Duration::days(i64::from(days))));
        match closes {
            Some(last_day) if today > last_day => GuestAccess::Expired,
            _ => GuestAccess::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("Unknown media kind: {}", other)),
        }
    }
}

/// Visual filter applied when rendering a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterTag {
    #[default]
    None,
    Sepia,
    Grayscale,
    Contrast,
    Brightness,
    Saturate,
}

impl FilterTag {
    pub const ALL: [FilterTag; 6] = [
        FilterTag::None,
        FilterTag::Sepia,
        FilterTag::Grayscale,
        FilterTag::Contrast,
        FilterTag::Brightness,
        FilterTag::Saturate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterTag::None => "none",
            FilterTag::Sepia => "sepia",
            FilterTag::Grayscale => "grayscale",
            FilterTag::Contrast => "contrast",
            FilterTag::Brightness => "brightness",
            FilterTag::Saturate => "saturate",
        }
    }

    /// CSS class used by the feed and TV pages.
    pub fn css_class(&self) -> &'static str {
        match self {
            FilterTag::None => "filter-none",
            FilterTag::Sepia => "filter-sepia",
            FilterTag::Grayscale => "filter-grayscale",
            FilterTag::Contrast => "filter-contrast-125",
            FilterTag::Brightness => "filter-brightness-110",
            FilterTag::Saturate => "filter-saturate-150",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterTag::None => "Normal",
            FilterTag::Sepia => "Sepia",
            FilterTag::Grayscale => "B&W",
            FilterTag::Contrast => "Contrast",
            FilterTag::Brightness => "Bright",
            FilterTag::Saturate => "Saturated",
        }
    }
}

impl fmt::Display for FilterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(FilterTag::None);
        }
        FilterTag::ALL
            .into_iter()
            .find(|f| f.as_str() == s || f.css_class() == s)
            .ok_or_else(|| format!("Unknown filter: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub event_id: String,
    pub kind: MediaKind,
    pub url: String,
    pub mime_type: String,
    pub caption: Option<String>,
    pub author: String,
    pub likes: i64,
    pub comments: Vec<Comment>,
    pub filter: FilterTag,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: EventStatus, date: &str, days: u32) -> Event {
        Event {
            id: "e1".into(),
            couple_names: "Ana & Bruno".into(),
            date: date.into(),
            plan: PlanId::Basico,
            price: 1000,
            status,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            logo_url: None,
            features: FeatureBundle {
                allow_filters: false,
                allow_gifs: false,
                tv_carousel: false,
                allow_download: false,
                access_duration_days: days,
            },
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn inactive_event_is_closed_even_with_unlimited_access() {
        let e = event(EventStatus::Inactive, "2026-05-01", 0);
        assert_eq!(e.guest_access(day("2026-05-01")), GuestAccess::Inactive);
    }

    #[test]
    fn access_expires_after_duration() {
        let e = event(EventStatus::Active, "2026-05-01", 90);
        assert_eq!(e.guest_access(day("2026-07-30")), GuestAccess::Open);
        assert_eq!(e.guest_access(day("2026-07-31")), GuestAccess::Expired);
    }

    #[test]
    fn huge_duration_never_expires() {
        let e = event(EventStatus::Active, "2026-05-01", u32::MAX);
        assert_eq!(e.guest_access(day("2026-05-02")), GuestAccess::Open);
    }

    #[test]
    fn unparseable_date_does_not_expire() {
        let e = event(EventStatus::Active, "someday", 1);
        assert_eq!(e.guest_access(day("2030-01-01")), GuestAccess::Open);
    }

    #[test]
    fn filter_accepts_css_class_names() {
        assert_eq!(
            "filter-saturate-150".parse::<FilterTag>().unwrap(),
            FilterTag::Saturate
        );
        assert_eq!("sepia".parse::<FilterTag>().unwrap(), FilterTag::Sepia);
        assert_eq!("".parse::<FilterTag>().unwrap(), FilterTag::None);
        assert!("vintage".parse::<FilterTag>().is_err());
    }

    #[test]
    fn status_parses_portuguese_labels() {
        assert_eq!("Ativo".parse::<EventStatus>().unwrap(), EventStatus::Active);
        assert_eq!(
            "inactive".parse::<EventStatus>().unwrap(),
            EventStatus::Inactive
        );
        assert_eq!(EventStatus::Active.toggled(), EventStatus::Inactive);
    }
}
