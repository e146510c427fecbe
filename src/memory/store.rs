// src/memory/store.rs — SQLite operations for the lesson store

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::schema;
use crate::infra::errors::ForgeError;

/// A stored lesson. Created on approval, never mutated afterwards. The
/// table layout mirrors this struct so dashboards can read it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub topic: String,
    pub context: String,
    pub outcome: String,
    pub solution: String,
    pub created_at: String,
    pub embedding: Option<Vec<f32>>,
}

/// Low-level lesson persistence. Single-writer: callers that share a store
/// across tasks must serialize access themselves.
pub struct LessonStore {
    conn: Connection,
}

impl LessonStore {
    pub fn open(path: &std::path::Path) -> Result<Self, ForgeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        schema::run_migrations(&conn).map_err(ForgeError::Other)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, ForgeError> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn).map_err(ForgeError::Other)?;
        Ok(Self { conn })
    }

    /// Append a lesson and persist it synchronously. Returns the generated id.
    pub fn insert(
        &self,
        topic: &str,
        context: &str,
        outcome: &str,
        solution: &str,
        embedding: Option<&[f32]>,
    ) -> Result<String, ForgeError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();
        let embedding_json = match embedding {
            Some(vector) => Some(serde_json::to_string(vector).map_err(|e| {
                ForgeError::Config(format!("failed to encode embedding: {}", e))
            })?),
            None => None,
        };

        self.conn.execute(
            "INSERT INTO lessons (id, topic, context, outcome, solution, created_at, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, topic, context, outcome, solution, created_at, embedding_json],
        )?;

        tracing::info!(topic, id = %id, "lesson stored");
        Ok(id)
    }

    /// All lessons, oldest first.
    pub fn all(&self) -> Result<Vec<Lesson>, ForgeError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, topic, context, outcome, solution, created_at, embedding
             FROM lessons ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map([], row_to_lesson)?;

        let mut lessons = Vec::new();
        for row in rows {
            lessons.push(row?);
        }
        Ok(lessons)
    }

    /// Most recent lessons first, for display.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<Lesson>, ForgeError> {
        let mut lessons = self.all()?;
        lessons.reverse();
        if let Some(limit) = limit {
            lessons.truncate(limit);
        }
        Ok(lessons)
    }

    pub fn get(&self, id: &str) -> Result<Option<Lesson>, ForgeError> {
        let lesson = self
            .conn
            .query_row(
                "SELECT id, topic, context, outcome, solution, created_at, embedding
                 FROM lessons WHERE id = ?1",
                params![id],
                row_to_lesson,
            )
            .optional()?;
        Ok(lesson)
    }

    /// Delete at most one lesson. Returns whether a removal occurred.
    pub fn delete(&self, id: &str) -> Result<bool, ForgeError> {
        let removed = self
            .conn
            .execute("DELETE FROM lessons WHERE id = ?1", params![id])?;
        if removed > 0 {
            tracing::info!(id, "lesson deleted");
        } else {
            tracing::warn!(id, "lesson not found for deletion");
        }
        Ok(removed > 0)
    }

    pub fn count(&self) -> Result<usize, ForgeError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lessons", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_lesson(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lesson> {
    let embedding_json: Option<String> = row.get(6)?;
    // A corrupt embedding column degrades to keyword retrieval for that
    // lesson rather than failing the whole query.
    let embedding = embedding_json.and_then(|json| serde_json::from_str(&json).ok());

    Ok(Lesson {
        id: row.get(0)?,
        topic: row.get(1)?,
        context: row.get(2)?,
        outcome: row.get(3)?,
        solution: row.get(4)?,
        created_at: row.get(5)?,
        embedding,
    })
}
