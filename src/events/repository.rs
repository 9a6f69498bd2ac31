// Event persistence
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::{Event, EventStatus};
use crate::plans::{FeatureBundle, PlanId};
use crate::repository::{parse_column, RepositoryError};
use crate::state::DbPool;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub events: i64,
    pub active: i64,
    pub per_plan: BTreeMap<PlanId, i64>,
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: &Event) -> Result<(), RepositoryError>;

    /// Overwrite every mutable column of an existing event.
    async fn update(&self, event: &Event) -> Result<(), RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Event>, RepositoryError>;

    /// Newest first.
    async fn list(&self) -> Result<Vec<Event>, RepositoryError>;

    /// Delete an event; its media and comments go with it.
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;

    async fn stats(&self) -> Result<EventStats, RepositoryError>;
}

pub struct SqliteEventRepository {
    pool: DbPool,
}

impl SqliteEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str =
    "id, couple_names, event_date, plan, price, status, logo_url, features_json, created_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let features_json: String = row.get(7)?;
    let features: FeatureBundle = serde_json::from_str(&features_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Event {
        id: row.get(0)?,
        couple_names: row.get(1)?,
        date: row.get(2)?,
        plan: parse_column::<PlanId>(3, row.get(3)?)?,
        price: row.get(4)?,
        status: parse_column::<EventStatus>(5, row.get(5)?)?,
        logo_url: row.get(6)?,
        features,
        created_at: row.get(8)?,
    })
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let features_json = serde_json::to_string(&event.features)?;
        conn.execute(
            "INSERT INTO events (id, couple_names, event_date, plan, price, status, logo_url, features_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.couple_names,
                event.date,
                event.plan.as_str(),
                event.price,
                event.status.as_str(),
                event.logo_url,
                features_json,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    async fn update(&self, event: &Event) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let features_json = serde_json::to_string(&event.features)?;
        let rows = conn.execute(
            "UPDATE events SET couple_names = ?2, event_date = ?3, plan = ?4, price = ?5,
                    status = ?6, logo_url = ?7, features_json = ?8
             WHERE id = ?1",
            params![
                event.id,
                event.couple_names,
                event.date,
                event.plan.as_str(),
                event.price,
                event.status.as_str(),
                event.logo_url,
                features_json,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound(format!("event {}", event.id)));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Event>, RepositoryError> {
        let conn = self.pool.get()?;
        let event = conn
            .query_row(
                &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS),
                params![id],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    async fn list(&self) -> Result<Vec<Event>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM events ORDER BY created_at DESC, id DESC",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map([], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn stats(&self) -> Result<EventStats, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT plan, status, COUNT(*) FROM events GROUP BY plan, status")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                parse_column::<PlanId>(0, row.get(0)?)?,
                parse_column::<EventStatus>(1, row.get(1)?)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = EventStats {
            per_plan: PlanId::ALL.iter().map(|id| (*id, 0)).collect(),
            ..EventStats::default()
        };
        for row in rows {
            let (plan, status, count) = row?;
            stats.events += count;
            if status == EventStatus::Active {
                stats.active += count;
            }
            *stats.per_plan.entry(plan).or_default() += count;
        }
        Ok(stats)
    }
}
