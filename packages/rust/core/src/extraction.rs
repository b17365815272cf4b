//! Scoring/extraction contract.
//!
//! Raw search text goes to the extraction service together with the scoring
//! policy and a fixed response schema. The payload that comes back is decoded
//! at a strict boundary: either every element decodes into a typed
//! [`Candidate`], or the whole batch is rejected and the run sees zero
//! candidates. Accepted candidates are then post-processed into [`Paper`]s
//! (trust-normalized URL, stamped topic, defaulted counts).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use curator_shared::{ExtractionService, Paper, Result, TopicId};
use curator_trust::normalize_url;

use crate::prompts;

/// Score above which a paper gets the "Must Read" badge by default.
const MUST_READ_THRESHOLD: u8 = 80;
const BADGE_MUST_READ: &str = "Must Read";
const BADGE_NEW_ARRIVAL: &str = "New Arrival";
const DEFAULT_CITATION_COUNT: &str = "0";
const DEFAULT_WEB_MENTION_COUNT: &str = "N/A";

// ---------------------------------------------------------------------------
// Decode boundary
// ---------------------------------------------------------------------------

/// Why an extraction payload was rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    #[error("payload is not a JSON array")]
    NotArray,

    #[error("element {index} does not match the paper schema: {source}")]
    Element {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One paper as emitted by the extraction service, after strict decoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(deserialize_with = "flexible_date")]
    pub published_date: NaiveDate,
    pub url: String,
    pub summary: String,
    pub r#abstract: String,
    #[serde(default)]
    pub abstract_ja: Option<String>,
    pub engagement_score: f64,
    #[serde(default)]
    pub engagement_reason: Option<String>,
    #[serde(default)]
    pub impact_badge: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub citation_count: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub web_mention_count: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Decode a raw payload into candidates, all or nothing.
pub fn decode_candidates(payload: &str) -> std::result::Result<Vec<Candidate>, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(DecodeError::NotJson)?;
    let serde_json::Value::Array(items) = value else {
        return Err(DecodeError::NotArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Candidate::deserialize(item).map_err(|source| DecodeError::Element { index, source })
        })
        .collect()
}

/// `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
fn parse_published_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn flexible_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_published_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid publishedDate {raw:?}")))
}

/// Count fields are strings by schema; accept bare numbers too.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(
        Option::<TextOrNumber>::deserialize(deserializer)?.map(|v| match v {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => n.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

/// Turn a decoded candidate into a paper attributed to `topic_id`.
pub fn into_paper(candidate: Candidate, topic_id: &TopicId) -> Paper {
    let url = normalize_url(&candidate.url, &candidate.title);
    let id = if url.is_empty() {
        Uuid::now_v7().to_string()
    } else {
        url.clone()
    };

    let engagement_score = clamp_score(candidate.engagement_score);
    let impact_badge = non_empty(candidate.impact_badge).unwrap_or_else(|| {
        if engagement_score > MUST_READ_THRESHOLD {
            BADGE_MUST_READ.to_string()
        } else {
            BADGE_NEW_ARRIVAL.to_string()
        }
    });

    Paper {
        id,
        topic_id: topic_id.clone(),
        title: candidate.title,
        authors: candidate.authors,
        published_date: candidate.published_date,
        url,
        summary: candidate.summary,
        r#abstract: candidate.r#abstract,
        abstract_ja: non_empty(candidate.abstract_ja),
        engagement_score,
        engagement_reason: candidate.engagement_reason.unwrap_or_default(),
        impact_badge: Some(impact_badge),
        citation_count: Some(
            non_empty(candidate.citation_count)
                .unwrap_or_else(|| DEFAULT_CITATION_COUNT.to_string()),
        ),
        web_mention_count: Some(
            non_empty(candidate.web_mention_count)
                .unwrap_or_else(|| DEFAULT_WEB_MENTION_COUNT.to_string()),
        ),
        image_url: candidate.image_url.filter(|u| is_absolute_http_url(u)),
    }
}

/// Round and clamp into `0..=100`.
fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn is_absolute_http_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the extraction stage for one topic.
///
/// A failing extraction call is an error. An absent or malformed payload is
/// not: it yields an empty list.
#[instrument(skip_all, fields(topic_id = %topic_id))]
pub async fn curate(
    extractor: &dyn ExtractionService,
    topic_id: &TopicId,
    raw_search_text: &str,
) -> Result<Vec<Paper>> {
    let instructions = prompts::extraction_instructions(raw_search_text, Utc::now().date_naive());
    let payload = extractor
        .extract(&instructions, prompts::response_schema())
        .await?;

    let Some(payload) = payload else {
        warn!("extraction service returned no payload");
        return Ok(Vec::new());
    };

    let candidates = match decode_candidates(&payload) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, payload_len = payload.len(), "extraction payload rejected");
            return Ok(Vec::new());
        }
    };

    debug!(count = candidates.len(), "candidates decoded");
    let papers: Vec<Paper> = candidates
        .into_iter()
        .map(|c| into_paper(c, topic_id))
        .collect();
    info!(candidates = papers.len(), "curation complete");
    Ok(papers)
}
