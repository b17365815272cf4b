//! Core domain types for the paper curator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CuratorError, Result};

// ---------------------------------------------------------------------------
// TopicId
// ---------------------------------------------------------------------------

/// Opaque topic identifier. New ids are UUID v7 strings (time-sortable), but
/// any string loaded from storage is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub String);

impl TopicId {
    /// Generate a new time-sortable topic identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TopicId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TopicId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A user-defined research interest with a natural-language search prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Immutable once created.
    pub id: TopicId,
    /// Display title.
    pub title: String,
    /// Prompt handed to the search stage.
    pub search_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// User input for creating or editing a topic. Validated before it reaches
/// the repository.
#[derive(Debug, Clone, Default)]
pub struct TopicDraft {
    pub title: String,
    pub search_prompt: String,
}

impl TopicDraft {
    pub fn new(title: impl Into<String>, search_prompt: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            search_prompt: search_prompt.into(),
        }
    }

    /// Trim both fields and reject empty ones.
    pub fn validate(&self) -> Result<(String, String)> {
        let title = self.title.trim();
        let prompt = self.search_prompt.trim();
        if title.is_empty() {
            return Err(CuratorError::validation("topic title must not be empty"));
        }
        if prompt.is_empty() {
            return Err(CuratorError::validation(
                "topic search prompt must not be empty",
            ));
        }
        Ok((title.to_string(), prompt.to_string()))
    }

    /// Build a brand-new topic with a fresh id.
    pub fn into_topic(self) -> Result<Topic> {
        let (title, search_prompt) = self.validate()?;
        Ok(Topic {
            id: TopicId::new(),
            title,
            search_prompt,
            last_updated: None,
        })
    }

    /// Apply this draft as an edit of `existing`. The id and `last_updated`
    /// are carried over unchanged.
    pub fn apply_to(self, existing: &Topic) -> Result<Topic> {
        let (title, search_prompt) = self.validate()?;
        Ok(Topic {
            id: existing.id.clone(),
            title,
            search_prompt,
            last_updated: existing.last_updated,
        })
    }
}

// ---------------------------------------------------------------------------
// Paper
// ---------------------------------------------------------------------------

/// A curated record describing one research artifact, scored and attributed
/// to a topic. Replaced wholesale on re-curation, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Canonical URL, or a random fallback id.
    pub id: String,
    pub topic_id: TopicId,
    pub title: String,
    pub authors: Vec<String>,
    pub published_date: NaiveDate,
    pub url: String,
    /// One-sentence punchline.
    pub summary: String,
    pub r#abstract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_ja: Option<String>,
    /// Opaque ranking key in `0..=100`.
    pub engagement_score: u8,
    pub engagement_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_mention_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One day's worth of papers in the timeline. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub papers: Vec<Paper>,
}

// ---------------------------------------------------------------------------
// Pipeline status
// ---------------------------------------------------------------------------

/// Lifecycle of one curation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Searching,
    Analyzing,
    Complete,
    Error,
}

impl FetchStatus {
    /// Whether a new run may start from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Complete | Self::Error)
    }

    /// Whether a run is in flight.
    pub fn is_busy(self) -> bool {
        !self.can_start()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Analyzing => "analyzing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the user-facing progress message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PipelineState {
    pub status: FetchStatus,
    pub message: String,
}

impl PipelineState {
    pub fn new(status: FetchStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
