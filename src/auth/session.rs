use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::repository::RepositoryError;
use crate::state::DbPool;

/// Open an admin session. Returns the session token.
pub fn create_session(pool: &DbPool, email: &str, hours: u64) -> Result<String, RepositoryError> {
    let conn = pool.get()?;

    // Expired sessions are swept whenever a new one starts
    conn.execute(
        "DELETE FROM admin_sessions WHERE expires_at <= datetime('now')",
        [],
    )?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO admin_sessions (id, email, token, expires_at)
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, email, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Email of the admin owning `token`, if the session is still live.
pub fn find_session(pool: &DbPool, token: &str) -> Result<Option<String>, RepositoryError> {
    let conn = pool.get()?;
    let email = conn
        .query_row(
            "SELECT email FROM admin_sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .optional()?;
    Ok(email)
}

pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), RepositoryError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM admin_sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// 32 random bytes, hex encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
