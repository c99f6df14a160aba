//! Notification rows. Delivery is someone else's problem; the engine only
//! records them, fire-and-forget.

use super::{now_ms, Database};
use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: String,
    pub verb: String,
    pub task_id: Option<String>,
    pub created_at: i64,
}

impl Database {
    /// Record a notification for a recipient.
    pub fn create_notification(
        &self,
        recipient_id: &str,
        verb: &str,
        task_id: Option<&str>,
    ) -> Result<i64> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (recipient_id, verb, task_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![recipient_id, verb, task_id, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// List notifications for a recipient, newest first.
    pub fn list_notifications_for(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, recipient_id, verb, task_id, created_at
                 FROM notifications WHERE recipient_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let notifications = stmt
                .query_map(params![recipient_id], |row| {
                    Ok(Notification {
                        id: row.get(0)?,
                        recipient_id: row.get(1)?,
                        verb: row.get(2)?,
                        task_id: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();
            Ok(notifications)
        })
    }
}
