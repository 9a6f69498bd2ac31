// Media metadata persistence
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::models::{Comment, FilterTag, MediaItem, MediaKind};
use crate::repository::{parse_column, RepositoryError};
use crate::state::DbPool;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStats {
    pub media: i64,
    pub videos: i64,
    pub likes: i64,
    pub comments: i64,
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn insert(&self, item: &MediaItem) -> Result<(), RepositoryError>;

    /// Newest first; comments oldest first.
    async fn list(&self, event_id: Option<&str>) -> Result<Vec<MediaItem>, RepositoryError>;

    async fn get(&self, event_id: &str, media_id: &str)
        -> Result<Option<MediaItem>, RepositoryError>;

    /// Apply a relative like delta, clamped at zero. `None` if no such item.
    async fn apply_like(
        &self,
        event_id: &str,
        media_id: &str,
        delta: i64,
    ) -> Result<Option<i64>, RepositoryError>;

    /// Append a comment. `false` if no such item.
    async fn append_comment(
        &self,
        event_id: &str,
        media_id: &str,
        comment: &Comment,
    ) -> Result<bool, RepositoryError>;

    /// Delete the record, returning its blob URL if it existed.
    async fn delete(&self, event_id: &str, media_id: &str)
        -> Result<Option<String>, RepositoryError>;

    /// Whether any live record points at this blob URL.
    async fn url_in_use(&self, url: &str) -> Result<bool, RepositoryError>;

    async fn stats(&self) -> Result<MediaStats, RepositoryError>;
}

pub struct SqliteMediaRepository {
    pool: DbPool,
}

impl SqliteMediaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const MEDIA_COLUMNS: &str =
    "id, event_id, kind, url, mime_type, caption, author, likes, filter, created_at";

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
    Ok(MediaItem {
        id: row.get(0)?,
        event_id: row.get(1)?,
        kind: parse_column::<MediaKind>(2, row.get(2)?)?,
        url: row.get(3)?,
        mime_type: row.get(4)?,
        caption: row.get(5)?,
        author: row.get(6)?,
        likes: row.get(7)?,
        filter: parse_column::<FilterTag>(8, row.get(8)?)?,
        created_at: row.get(9)?,
        comments: Vec::new(),
    })
}

fn attach_comments(
    conn: &Connection,
    items: &mut [MediaItem],
    event_id: Option<&str>,
) -> Result<(), RepositoryError> {
    let mut stmt = conn.prepare(
        "SELECT c.media_id, c.id, c.author, c.body, c.created_at
         FROM comments c
         JOIN media m ON m.id = c.media_id
         WHERE (?1 IS NULL OR m.event_id = ?1)
         ORDER BY c.created_at ASC, c.id ASC",
    )?;
    let mut by_media: HashMap<String, Vec<Comment>> = HashMap::new();
    let rows = stmt.query_map(params![event_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            Comment {
                id: row.get(1)?,
                author: row.get(2)?,
                text: row.get(3)?,
                created_at: row.get(4)?,
            },
        ))
    })?;
    for row in rows {
        let (media_id, comment) = row?;
        by_media.entry(media_id).or_default().push(comment);
    }
    for item in items.iter_mut() {
        if let Some(comments) = by_media.remove(&item.id) {
            item.comments = comments;
        }
    }
    Ok(())
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn insert(&self, item: &MediaItem) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO media (id, event_id, kind, url, mime_type, caption, author, likes, filter, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id,
                item.event_id,
                item.kind.as_str(),
                item.url,
                item.mime_type,
                item.caption,
                item.author,
                item.likes,
                item.filter.as_str(),
                item.created_at,
            ],
        )?;
        Ok(())
    }

    async fn list(&self, event_id: Option<&str>) -> Result<Vec<MediaItem>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media
             WHERE (?1 IS NULL OR event_id = ?1)
             ORDER BY created_at DESC, id DESC",
            MEDIA_COLUMNS
        ))?;
        let mut items = stmt
            .query_map(params![event_id], media_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        attach_comments(&conn, &mut items, event_id)?;
        Ok(items)
    }

    async fn get(
        &self,
        event_id: &str,
        media_id: &str,
    ) -> Result<Option<MediaItem>, RepositoryError> {
        let conn = self.pool.get()?;
        let item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM media WHERE id = ?1 AND event_id = ?2",
                    MEDIA_COLUMNS
                ),
                params![media_id, event_id],
                media_from_row,
            )
            .optional()?;

        let Some(item) = item else {
            return Ok(None);
        };
        let mut items = [item];
        attach_comments(&conn, &mut items, Some(event_id))?;
        let [item] = items;
        Ok(Some(item))
    }

    async fn apply_like(
        &self,
        event_id: &str,
        media_id: &str,
        delta: i64,
    ) -> Result<Option<i64>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let likes: Option<i64> = tx
            .query_row(
                "UPDATE media SET likes = MAX(likes + ?1, 0)
                 WHERE id = ?2 AND event_id = ?3
                 RETURNING likes",
                params![delta, media_id, event_id],
                |row| row.get(0),
            )
            .optional()?;
        tx.commit()?;
        Ok(likes)
    }

    async fn append_comment(
        &self,
        event_id: &str,
        media_id: &str,
        comment: &Comment,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO comments (id, media_id, author, body, created_at)
             SELECT ?1, id, ?2, ?3, ?4 FROM media WHERE id = ?5 AND event_id = ?6",
            params![
                comment.id,
                comment.author,
                comment.text,
                comment.created_at,
                media_id,
                event_id
            ],
        )?;
        tx.commit()?;
        Ok(inserted == 1)
    }

    async fn delete(
        &self,
        event_id: &str,
        media_id: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let url: Option<String> = tx
            .query_row(
                "DELETE FROM media WHERE id = ?1 AND event_id = ?2 RETURNING url",
                params![media_id, event_id],
                |row| row.get(0),
            )
            .optional()?;
        tx.commit()?;
        Ok(url)
    }

    async fn url_in_use(&self, url: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let found = conn
            .query_row("SELECT 1 FROM media WHERE url = ?1", params![url], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    async fn stats(&self) -> Result<MediaStats, RepositoryError> {
        let conn = self.pool.get()?;
        let (media, videos, likes): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(kind = 'video'), 0),
                    COALESCE(SUM(likes), 0)
             FROM media",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let comments: i64 =
            conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(MediaStats {
            media,
            videos,
            likes,
            comments,
        })
    }
}
