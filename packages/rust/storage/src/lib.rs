//! libSQL storage layer (local, offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding topics and curated
//! papers and implements [`CuratorStore`] for the repository in
//! `curator-core`. Bulk puts run inside a transaction so a failed write leaves
//! the previous rows in place.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use curator_shared::{CuratorError, CuratorStore, Paper, Result, Topic, TopicId};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CuratorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        tracing::debug!(path = %path.display(), "storage opened");
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CuratorError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

#[async_trait]
impl CuratorStore for Storage {
    // -----------------------------------------------------------------------
    // Topic operations
    // -----------------------------------------------------------------------

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, search_prompt, last_updated FROM topics ORDER BY id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_topic(&row)?);
        }
        Ok(results)
    }

    async fn put_topic(&self, topic: &Topic) -> Result<()> {
        upsert_topic(&self.conn, topic).await
    }

    async fn put_topics(&self, topics: &[Topic]) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(db_err)?;
        for topic in topics {
            upsert_topic(&tx, topic).await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_topic(&self, id: &TopicId) -> Result<()> {
        self.conn
            .execute("DELETE FROM topics WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Paper operations
    // -----------------------------------------------------------------------

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, topic_id, title, authors_json, published_date, url, summary,
                        abstract, abstract_ja, engagement_score, engagement_reason,
                        impact_badge, citation_count, web_mention_count, image_url
                 FROM papers ORDER BY published_date DESC, id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_paper(&row)?);
        }
        Ok(results)
    }

    async fn put_paper(&self, paper: &Paper) -> Result<()> {
        upsert_paper(&self.conn, paper).await
    }

    async fn put_papers(&self, papers: &[Paper]) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(db_err)?;
        for paper in papers {
            // Dropping `tx` on error rolls the batch back.
            upsert_paper(&tx, paper).await?;
        }
        tx.commit().await.map_err(db_err)?;
        tracing::debug!(count = papers.len(), "papers written");
        Ok(())
    }

    async fn delete_paper(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM papers WHERE id = ?1", params![id])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_papers_for_topic(&self, topic_id: &TopicId) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM papers WHERE topic_id = ?1",
                params![topic_id.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(removed)
    }

    async fn put_topic_papers(
        &self,
        topic_id: &TopicId,
        papers: &[Paper],
        stamped_at: DateTime<Utc>,
    ) -> Result<bool> {
        let tx = self.conn.transaction().await.map_err(db_err)?;
        let touched = tx
            .execute(
                "UPDATE topics SET last_updated = ?2 WHERE id = ?1",
                params![topic_id.as_str(), stamped_at.to_rfc3339()],
            )
            .await
            .map_err(db_err)?;
        if touched == 0 {
            // Dropping `tx` rolls back; nothing was written.
            tracing::debug!(topic_id = %topic_id, "topic gone, batch not written");
            return Ok(false);
        }
        for paper in papers {
            upsert_paper(&tx, paper).await?;
        }
        tx.commit().await.map_err(db_err)?;
        tracing::debug!(topic_id = %topic_id, count = papers.len(), "topic batch written");
        Ok(true)
    }
}

async fn upsert_topic(conn: &Connection, topic: &Topic) -> Result<()> {
    let last_updated = topic.last_updated.map(|t| t.to_rfc3339());
    conn.execute(
        "INSERT INTO topics (id, title, search_prompt, last_updated)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           search_prompt = excluded.search_prompt,
           last_updated = excluded.last_updated",
        params![
            topic.id.as_str(),
            topic.title.as_str(),
            topic.search_prompt.as_str(),
            last_updated.as_deref(),
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn upsert_paper(conn: &Connection, paper: &Paper) -> Result<()> {
    let authors_json = serde_json::to_string(&paper.authors)
        .map_err(|e| CuratorError::Storage(format!("encode authors: {e}")))?;
    conn.execute(
        "INSERT INTO papers (id, topic_id, title, authors_json, published_date, url, summary,
                             abstract, abstract_ja, engagement_score, engagement_reason,
                             impact_badge, citation_count, web_mention_count, image_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(id) DO UPDATE SET
           topic_id = excluded.topic_id,
           title = excluded.title,
           authors_json = excluded.authors_json,
           published_date = excluded.published_date,
           url = excluded.url,
           summary = excluded.summary,
           abstract = excluded.abstract,
           abstract_ja = excluded.abstract_ja,
           engagement_score = excluded.engagement_score,
           engagement_reason = excluded.engagement_reason,
           impact_badge = excluded.impact_badge,
           citation_count = excluded.citation_count,
           web_mention_count = excluded.web_mention_count,
           image_url = excluded.image_url",
        params![
            paper.id.as_str(),
            paper.topic_id.as_str(),
            paper.title.as_str(),
            authors_json,
            paper.published_date.format("%Y-%m-%d").to_string(),
            paper.url.as_str(),
            paper.summary.as_str(),
            paper.r#abstract.as_str(),
            paper.abstract_ja.as_deref(),
            i64::from(paper.engagement_score),
            paper.engagement_reason.as_str(),
            paper.impact_badge.as_deref(),
            paper.citation_count.as_deref(),
            paper.web_mention_count.as_deref(),
            paper.image_url.as_deref(),
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

fn db_err(e: libsql::Error) -> CuratorError {
    CuratorError::Storage(e.to_string())
}

/// Convert a database row to a [`Topic`].
fn row_to_topic(row: &libsql::Row) -> Result<Topic> {
    let last_updated = match row.get::<String>(3).ok() {
        Some(s) => Some(
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| CuratorError::Storage(format!("invalid timestamp: {e}")))?,
        ),
        None => None,
    };

    Ok(Topic {
        id: TopicId(row.get::<String>(0).map_err(db_err)?),
        title: row.get::<String>(1).map_err(db_err)?,
        search_prompt: row.get::<String>(2).map_err(db_err)?,
        last_updated,
    })
}

/// Convert a database row to a [`Paper`].
fn row_to_paper(row: &libsql::Row) -> Result<Paper> {
    let authors_json: String = row.get(3).map_err(db_err)?;
    let authors: Vec<String> = serde_json::from_str(&authors_json)
        .map_err(|e| CuratorError::Storage(format!("invalid authors: {e}")))?;

    let date: String = row.get(4).map_err(db_err)?;
    let published_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| CuratorError::Storage(format!("invalid date {date:?}: {e}")))?;

    let score: i64 = row.get(9).map_err(db_err)?;

    Ok(Paper {
        id: row.get::<String>(0).map_err(db_err)?,
        topic_id: TopicId(row.get::<String>(1).map_err(db_err)?),
        title: row.get::<String>(2).map_err(db_err)?,
        authors,
        published_date,
        url: row.get::<String>(5).map_err(db_err)?,
        summary: row.get::<String>(6).map_err(db_err)?,
        r#abstract: row.get::<String>(7).map_err(db_err)?,
        abstract_ja: row.get::<String>(8).ok(),
        engagement_score: score.clamp(0, 100) as u8,
        engagement_reason: row.get::<String>(10).map_err(db_err)?,
        impact_badge: row.get::<String>(11).ok(),
        citation_count: row.get::<String>(12).ok(),
        web_mention_count: row.get::<String>(13).ok(),
        image_url: row.get::<String>(14).ok(),
    })
}
