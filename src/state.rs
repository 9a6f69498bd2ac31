use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::captions::{self, CaptionSuggester};
use crate::config::Config;
use crate::events::{EventRegistry, SqliteEventRepository};
use crate::media::normalizer::MediaLimits;
use crate::media::{FeedHub, MediaStore, SqliteMediaRepository};
use crate::plans::PlanPolicy;
use crate::storage::BlobStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub plans: Arc<PlanPolicy>,
    pub events: EventRegistry,
    pub media: MediaStore,
    pub blobs: BlobStore,
    pub captions: Arc<dyn CaptionSuggester>,
}

impl AppState {
    /// Wire the services over an already migrated pool.
    pub async fn new(db: DbPool, config: Config) -> Self {
        let plans = Arc::new(PlanPolicy::load(config.plans_path()).await);
        let captions: Arc<dyn CaptionSuggester> = Arc::from(captions::from_config(&config.captions));
        Self::with_captions(db, config, plans, captions)
    }

    pub fn with_captions(
        db: DbPool,
        config: Config,
        plans: Arc<PlanPolicy>,
        captions: Arc<dyn CaptionSuggester>,
    ) -> Self {
        let limits = MediaLimits::from(&config.media);
        let blobs = BlobStore::new(config.uploads_path());

        let hub = FeedHub::default();

        let events = EventRegistry::new(
            Arc::new(SqliteEventRepository::new(db.clone())),
            plans.clone(),
            blobs.clone(),
            limits,
            hub.clone(),
        );
        let media = MediaStore::new(
            Arc::new(SqliteMediaRepository::new(db.clone())),
            blobs.clone(),
            hub,
            limits,
        );

        Self {
            db,
            config,
            plans,
            events,
            media,
            blobs,
            captions,
        }
    }
}
