use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::models::{Comment, Event, FilterTag, MediaItem};
use crate::error::{AppError, AppResult};
use crate::media::feed::{FeedEvent, FeedHub};
use crate::media::normalizer::{self, MediaLimits, NormalizedMedia, RawUpload};
use crate::media::repository::{MediaRepository, MediaStats};
use crate::media::{
    check_filter_allowed, check_mime_allowed, validate_author, validate_caption, validate_comment,
};
use crate::repository::now_timestamp;
use crate::storage::{event_of_media_url, BlobStore, Namespace};

/// A guest upload as it arrives from the upload form.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub author: String,
    pub caption: Option<String>,
    pub filter: FilterTag,
    pub file: RawUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LikeDelta {
    Up,
    Down,
}

impl LikeDelta {
    pub fn value(self) -> i64 {
        match self {
            LikeDelta::Up => 1,
            LikeDelta::Down => -1,
        }
    }
}

impl TryFrom<i64> for LikeDelta {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LikeDelta::Up),
            -1 => Ok(LikeDelta::Down),
            other => Err(format!("like delta must be +1 or -1, got {}", other)),
        }
    }
}

impl From<LikeDelta> for i64 {
    fn from(delta: LikeDelta) -> Self {
        delta.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub removed_record: bool,
    pub removed_blob: bool,
}

/// Media metadata plus stored bytes, gated by each event's feature snapshot.
#[derive(Clone)]
pub struct MediaStore {
    repo: Arc<dyn MediaRepository>,
    blobs: BlobStore,
    hub: FeedHub,
    limits: MediaLimits,
}

impl MediaStore {
    pub fn new(
        repo: Arc<dyn MediaRepository>,
        blobs: BlobStore,
        hub: FeedHub,
        limits: MediaLimits,
    ) -> Self {
        Self {
            repo,
            blobs,
            hub,
            limits,
        }
    }

    pub fn hub(&self) -> &FeedHub {
        &self.hub
    }

    /// Plan gate plus normalization, without storing anything.
    pub async fn prepare(&self, event: &Event, file: RawUpload) -> AppResult<NormalizedMedia> {
        let mime_type = file.mime_type();
        check_mime_allowed(&mime_type, &event.features)?;
        Ok(normalizer::normalize(file, self.limits).await?)
    }

    /// Validate, normalize, write the bytes, then the record.
    pub async fn create(&self, event: &Event, new: NewMedia) -> AppResult<MediaItem> {
        let author = validate_author(&new.author)?;
        let caption = validate_caption(new.caption.as_deref())?;
        check_filter_allowed(new.filter, &event.features)?;
        let media = self.prepare(event, new.file).await?;

        let blob = self
            .blobs
            .put(
                &Namespace::EventMedia(event.id.clone()),
                &media.extension,
                media.data.clone(),
            )
            .await?;

        let item = MediaItem {
            id: uuid::Uuid::now_v7().to_string(),
            event_id: event.id.clone(),
            kind: media.kind,
            url: blob.url.clone(),
            mime_type: media.mime_type,
            caption,
            author,
            likes: 0,
            comments: Vec::new(),
            filter: new.filter,
            created_at: now_timestamp(),
        };

        if let Err(e) = self.repo.insert(&item).await {
            tracing::warn!(
                "Metadata write failed for {}; blob left orphaned: {}",
                blob.url,
                e
            );
            return Err(e.into());
        }

        tracing::info!(
            "Media {} ({}, {} bytes) added to event {} by {}",
            item.id,
            item.kind.as_str(),
            blob.size,
            item.event_id,
            item.author
        );
        self.hub.publish(FeedEvent::Created {
            event_id: item.event_id.clone(),
            media_id: item.id.clone(),
        });
        Ok(item)
    }

    pub async fn list(&self, event_id: &str) -> AppResult<Vec<MediaItem>> {
        Ok(self.repo.list(Some(event_id)).await?)
    }

    /// Moderation view across one or all events.
    pub async fn list_all(&self, event_id: Option<&str>) -> AppResult<Vec<MediaItem>> {
        Ok(self.repo.list(event_id).await?)
    }

    pub async fn get(&self, event_id: &str, media_id: &str) -> AppResult<MediaItem> {
        self.repo
            .get(event_id, media_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn like(&self, event_id: &str, media_id: &str, delta: LikeDelta) -> AppResult<i64> {
        self.repo
            .apply_like(event_id, media_id, delta.value())
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn comment(
        &self,
        event_id: &str,
        media_id: &str,
        author: &str,
        text: &str,
    ) -> AppResult<Comment> {
        let comment = Comment {
            id: uuid::Uuid::now_v7().to_string(),
            author: validate_author(author)?,
            text: validate_comment(text)?,
            created_at: now_timestamp(),
        };
        if !self
            .repo
            .append_comment(event_id, media_id, &comment)
            .await?
        {
            return Err(AppError::NotFound);
        }
        Ok(comment)
    }

    /// Remove the record, then its bytes. Both steps tolerate absence, so a
    /// repeated delete succeeds with nothing removed.
    pub async fn delete(
        &self,
        event_id: &str,
        media_id: &str,
        storage_url: Option<&str>,
    ) -> AppResult<DeleteOutcome> {
        let record_url = self.repo.delete(event_id, media_id).await?;
        let removed_record = record_url.is_some();

        // A caller-supplied URL may only point into this event's namespace,
        // and never at bytes another record still uses
        let url = match record_url {
            Some(url) => Some(url),
            None => match storage_url.filter(|url| event_of_media_url(url) == Some(event_id)) {
                Some(url) if !self.repo.url_in_use(url).await? => Some(url.to_string()),
                Some(url) => {
                    tracing::warn!("Refusing to delete {}: still referenced", url);
                    None
                }
                None => None,
            },
        };
        let removed_blob = match url {
            Some(url) => self.blobs.delete(&url).await?,
            None => false,
        };

        if removed_record {
            tracing::info!("Media {} deleted from event {}", media_id, event_id);
            self.hub.publish(FeedEvent::Deleted {
                event_id: event_id.to_string(),
                media_id: media_id.to_string(),
            });
        } else {
            tracing::debug!("Media {} already deleted", media_id);
        }

        Ok(DeleteOutcome {
            removed_record,
            removed_blob,
        })
    }

    pub async fn stats(&self) -> AppResult<MediaStats> {
        Ok(self.repo.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_delta_accepts_only_unit_steps() {
        assert_eq!(serde_json::from_str::<LikeDelta>("1").unwrap(), LikeDelta::Up);
        assert_eq!(serde_json::from_str::<LikeDelta>("-1").unwrap(), LikeDelta::Down);
        assert!(serde_json::from_str::<LikeDelta>("5").is_err());
        assert_eq!(serde_json::to_string(&LikeDelta::Down).unwrap(), "-1");
    }
}
