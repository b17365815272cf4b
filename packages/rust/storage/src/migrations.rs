//! SQL migration definitions for the curator database.
//!
//! Migrations are applied in order on database open. Each migration carries a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: topics, papers",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Research topics
CREATE TABLE IF NOT EXISTS topics (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    search_prompt TEXT NOT NULL,
    last_updated  TEXT
);

-- Curated papers. Topic cascade is handled by the repository, which deletes
-- a topic's papers explicitly.
CREATE TABLE IF NOT EXISTS papers (
    id                TEXT PRIMARY KEY,
    topic_id          TEXT NOT NULL,
    title             TEXT NOT NULL,
    authors_json      TEXT NOT NULL,
    published_date    TEXT NOT NULL,
    url               TEXT NOT NULL,
    summary           TEXT NOT NULL,
    abstract          TEXT NOT NULL,
    abstract_ja       TEXT,
    engagement_score  INTEGER NOT NULL,
    engagement_reason TEXT NOT NULL,
    impact_badge      TEXT,
    citation_count    TEXT,
    web_mention_count TEXT,
    image_url         TEXT
);

CREATE INDEX IF NOT EXISTS idx_papers_topic_id ON papers(topic_id);
CREATE INDEX IF NOT EXISTS idx_papers_published_date ON papers(published_date);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
