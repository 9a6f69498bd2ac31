//! Event registry: create/update/delete events and guard guest access.

pub mod repository;

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::db::models::{Event, EventStatus, GuestAccess};
use crate::error::{AppError, AppResult};
use crate::media::normalizer::{self, MediaLimits, RawUpload};
use crate::media::{FeedEvent, FeedHub};
use crate::plans::{PlanId, PlanPolicy};
use crate::repository::now_timestamp;
use crate::storage::{BlobStore, Namespace};

pub use self::repository::{EventRepository, EventStats, SqliteEventRepository};

const COUPLE_NAMES_MAX_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub couple_names: String,
    pub date: String,
    pub plan: PlanId,
    /// Defaults to the plan's minimum price.
    pub price: Option<i64>,
    pub logo: Option<RawUpload>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub couple_names: Option<String>,
    pub date: Option<String>,
    pub plan: Option<PlanId>,
    pub price: Option<i64>,
    pub status: Option<EventStatus>,
    pub logo: Option<RawUpload>,
}

#[derive(Clone)]
pub struct EventRegistry {
    repo: Arc<dyn EventRepository>,
    plans: Arc<PlanPolicy>,
    blobs: BlobStore,
    limits: MediaLimits,
    hub: FeedHub,
}

impl EventRegistry {
    pub fn new(
        repo: Arc<dyn EventRepository>,
        plans: Arc<PlanPolicy>,
        blobs: BlobStore,
        limits: MediaLimits,
        hub: FeedHub,
    ) -> Self {
        Self {
            repo,
            plans,
            blobs,
            limits,
            hub,
        }
    }

    pub async fn create(&self, new: NewEvent) -> AppResult<Event> {
        let couple_names = validate_couple_names(&new.couple_names)?;
        let date = validate_date(&new.date)?;
        let plan = self.plans.get(new.plan).await;
        let price = new.price.unwrap_or(plan.price.min);
        if !plan.price.contains(price) {
            return Err(price_error(&plan.name, plan.price.min, plan.price.max));
        }

        let id = uuid::Uuid::now_v7().to_string();
        let logo_url = match new.logo {
            Some(logo) => Some(self.store_logo(&id, logo).await?),
            None => None,
        };

        let event = Event {
            id,
            couple_names,
            date,
            plan: plan.name,
            price,
            status: EventStatus::Active,
            created_at: now_timestamp(),
            logo_url,
            features: plan.features,
        };

        if let Err(e) = self.repo.insert(&event).await {
            if let Some(url) = &event.logo_url {
                if let Err(cleanup) = self.blobs.delete(url).await {
                    tracing::warn!("Could not remove logo {} of unsaved event: {}", url, cleanup);
                }
            }
            return Err(e.into());
        }

        tracing::info!(
            "Event {} created for {} on plan {}",
            event.id,
            event.couple_names,
            event.plan
        );
        Ok(event)
    }

    pub async fn update(&self, id: &str, patch: EventPatch) -> AppResult<Event> {
        let mut event = self.get(id).await?;

        if let Some(names) = patch.couple_names {
            event.couple_names = validate_couple_names(&names)?;
        }
        if let Some(date) = patch.date {
            event.date = validate_date(&date)?;
        }
        if let Some(status) = patch.status {
            event.status = status;
        }

        // Setting a plan always re-snapshots its current features
        if let Some(plan_id) = patch.plan {
            let plan = self.plans.get(plan_id).await;
            event.plan = plan.name;
            event.features = plan.features;
            if patch.price.is_none() && !plan.price.contains(event.price) {
                event.price = plan.price.min;
            }
        }
        if let Some(price) = patch.price {
            let range = self.plans.get(event.plan).await.price;
            if !range.contains(price) {
                return Err(price_error(&event.plan, range.min, range.max));
            }
            event.price = price;
        }

        let previous_logo = match patch.logo {
            Some(logo) => {
                let url = self.store_logo(&event.id, logo).await?;
                event.logo_url.replace(url)
            }
            None => None,
        };

        self.repo.update(&event).await?;

        if let Some(old) = previous_logo {
            if let Err(e) = self.blobs.delete(&old).await {
                tracing::warn!("Could not remove replaced logo {}: {}", old, e);
            }
        }

        if event.guest_access(Utc::now().date_naive()) != GuestAccess::Open {
            self.hub.publish(FeedEvent::Closed {
                event_id: event.id.clone(),
            });
        }

        tracing::info!("Event {} updated", event.id);
        Ok(event)
    }

    /// Delete the event, its media records and every stored byte it owns.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound);
        }
        self.blobs
            .delete_namespace(&Namespace::EventMedia(id.to_string()))
            .await?;
        self.blobs
            .delete_namespace(&Namespace::EventLogo(id.to_string()))
            .await?;
        self.hub.publish(FeedEvent::Closed {
            event_id: id.to_string(),
        });
        tracing::info!("Event {} deleted", id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> AppResult<Event> {
        self.repo.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> AppResult<Vec<Event>> {
        Ok(self.repo.list().await?)
    }

    pub async fn stats(&self) -> AppResult<EventStats> {
        Ok(self.repo.stats().await?)
    }

    /// Load an event for a guest-facing request, refusing inactive or expired ones.
    pub async fn open_for_guests(&self, id: &str) -> AppResult<Event> {
        let event = self.get(id).await?;
        ensure_guest_access(&event, Utc::now().date_naive())?;
        Ok(event)
    }

    async fn store_logo(&self, event_id: &str, logo: RawUpload) -> AppResult<String> {
        if !logo.mime_type().starts_with("image/") {
            return Err(AppError::UnsupportedMedia(
                "The logo must be an image.".into(),
            ));
        }
        let image = normalizer::normalize(logo, self.limits).await?;
        let blob = self
            .blobs
            .put(
                &Namespace::EventLogo(event_id.to_string()),
                &image.extension,
                image.data,
            )
            .await?;
        Ok(blob.url)
    }
}

pub fn ensure_guest_access(event: &Event, today: NaiveDate) -> AppResult<()> {
    match event.guest_access(today) {
        GuestAccess::Open => Ok(()),
        GuestAccess::Inactive | GuestAccess::Expired => Err(AppError::EventUnavailable),
    }
}

fn validate_couple_names(names: &str) -> AppResult<String> {
    let names = names.trim();
    if names.is_empty() {
        return Err(AppError::BadRequest("Couple names are required".into()));
    }
    if names.chars().count() > COUPLE_NAMES_MAX_CHARS {
        return Err(AppError::BadRequest(format!(
            "Couple names must be {} characters or less",
            COUPLE_NAMES_MAX_CHARS
        )));
    }
    Ok(names.to_string())
}

fn validate_date(date: &str) -> AppResult<String> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::BadRequest("Date must be YYYY-MM-DD".into()))
}

fn price_error(plan: &PlanId, min: i64, max: i64) -> AppError {
    AppError::BadRequest(format!(
        "Price for {} must be between {} and {}",
        plan, min, max
    ))
}
