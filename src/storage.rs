use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::models::{ConversationKey, ConversationSummary};
use crate::error::{ClientError, Result};

fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "CateringChat")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

// Conversation list cache so the sidebar shows something before the API answers
pub struct Cache {
    conn: Connection,
}

impl Cache {
    pub fn open_default() -> Result<Self> {
        let path = db_path().ok_or_else(|| ClientError::Config("no data dir".into()))?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let cache = Self { conn: Connection::open(path)? };
        cache.init()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self> {
        let cache = Self { conn: Connection::open_in_memory()? };
        cache.init()?;
        Ok(cache)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                counterpart_name TEXT NOT NULL,
                last_message TEXT,
                last_activity TEXT NOT NULL,
                unread_count INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;
        Ok(())
    }

    pub fn upsert_conversations(&mut self, items: &[ConversationSummary]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for c in items {
            tx.execute(
                r#"
                INSERT INTO conversations (id, counterpart_name, last_message, last_activity, unread_count)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    counterpart_name=excluded.counterpart_name,
                    last_message=excluded.last_message,
                    last_activity=excluded.last_activity,
                    unread_count=excluded.unread_count
                "#,
                params![c.id.as_str(), c.counterpart_name, c.last_message, c.last_activity, c.unread_count],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn conversations(&self, limit: Option<usize>) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, counterpart_name, last_message, last_activity, unread_count
             FROM conversations ORDER BY last_activity DESC, counterpart_name ASC LIMIT ?1",
        )?;
        let lim = limit.unwrap_or(500) as i64;
        let rows = stmt.query_map(params![lim], |row| {
            Ok(ConversationSummary {
                id: ConversationKey(row.get(0)?),
                counterpart_name: row.get(1)?,
                last_message: row.get(2)?,
                last_activity: row.get(3)?,
                unread_count: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Drops everything; used on sign-out.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM conversations", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn summary(id: &str, name: &str, hour: u32, unread: u32) -> ConversationSummary {
        ConversationSummary {
            id: ConversationKey::new(id),
            counterpart_name: name.into(),
            last_message: Some(format!("hello from {name}")),
            last_activity: Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap(),
            unread_count: unread,
        }
    }

    #[test]
    fn lists_most_recent_first() {
        let mut cache = Cache::in_memory().unwrap();
        cache
            .upsert_conversations(&[summary("a", "Ayşe", 8, 0), summary("b", "Mehmet", 11, 2)])
            .unwrap();
        let listed = cache.conversations(None).unwrap();
        assert_eq!(listed.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(listed[0], summary("b", "Mehmet", 11, 2));
        assert_eq!(cache.conversations(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn upsert_replaces_existing_rows() {
        let mut cache = Cache::in_memory().unwrap();
        cache.upsert_conversations(&[summary("a", "Ayşe", 8, 3)]).unwrap();
        cache.upsert_conversations(&[summary("a", "Ayşe", 14, 0)]).unwrap();
        let listed = cache.conversations(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].unread_count, 0);
        assert_eq!(listed[0].last_activity, Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap());
    }

    #[test]
    fn clear_empties_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("cache.sqlite");
        let mut cache = Cache::open(&path).unwrap();
        cache.upsert_conversations(&[summary("a", "Ayşe", 8, 0)]).unwrap();
        cache.clear().unwrap();
        assert!(cache.conversations(None).unwrap().is_empty());
        assert!(path.exists());
    }
}
