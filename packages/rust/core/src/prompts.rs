//! Instructions and response schema handed to the search and extraction
//! services.

use std::sync::LazyLock;

use chrono::NaiveDate;
use serde_json::{Value, json};

/// Keys the extraction service must always emit.
pub const REQUIRED_FIELDS: &[&str] = &[
    "title",
    "authors",
    "publishedDate",
    "url",
    "summary",
    "abstract",
    "abstractJa",
    "engagementScore",
    "citationCount",
    "webMentionCount",
];

static RESPONSE_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "authors": { "type": "ARRAY", "items": { "type": "STRING" } },
                "publishedDate": { "type": "STRING" },
                "url": { "type": "STRING" },
                "summary": { "type": "STRING" },
                "abstract": { "type": "STRING" },
                "abstractJa": { "type": "STRING" },
                "engagementScore": { "type": "NUMBER" },
                "engagementReason": { "type": "STRING" },
                "impactBadge": { "type": "STRING" },
                "citationCount": { "type": "STRING" },
                "webMentionCount": { "type": "STRING" },
                "imageUrl": { "type": "STRING" }
            },
            "required": REQUIRED_FIELDS,
        }
    })
});

/// Schema for the extraction stage: an array of paper objects.
pub fn response_schema() -> &'static Value {
    &RESPONSE_SCHEMA
}

/// Prompt for the grounded search stage.
pub fn search_instructions(query: &str) -> String {
    format!(
        r#"Act as a senior research assistant.
Goal: find the 3-5 LATEST and MOST IMPACTFUL research papers about: "{query}".

STEPS:
1. Search: find high-quality papers (arXiv, NeurIPS, CVPR, Nature, etc.) published recently.
2. Web presence check: for each paper, search the web for its exact title in double quotes.
   - Report the total hit count if the search metadata shows one (e.g. "12,400 results").
   - Otherwise count results from non-academic sources (blogs, X/Twitter, Reddit, news, GitHub)
     and report that (e.g. "5+ news sources", "Discussed on X/Reddit").
   - If nothing turns up outside academic venues, write "Academic only".

OUTPUT (plain-text report), for each paper:
- Title
- Authors
- Published Date
- URL
- Citation Count (e.g. "124" or "0")
- Web Buzz (e.g. "12,000 hits", "Viral on X", "8+ blog posts", "Academic only")
- Abstract/Summary in English
"#
    )
}

/// Prompt for the structured extraction stage. `today` anchors the recency
/// bonus.
pub fn extraction_instructions(source_text: &str, today: NaiveDate) -> String {
    format!(
        r#"You are a data extraction specialist. Today is {today}.

SOURCE TEXT:
{source_text}

TASK:
1. Extract the research papers from the source text above.
2. Compute engagementScore (0-100):
   - Base: 50.
   - Citations: +1 per citation, at most +30.
   - Web buzz:
     - thousands of hits ("k" or more than 1000): +40
     - "Viral", "Trending", "Reddit", "Twitter", "X": +30
     - more than 10 sources or posts: +20
     - "Academic only" or "0": +0
   - Recency: published within the last 30 days: +10.
3. Translate the summary to Japanese.
4. Return strict JSON.

FIELDS:
- title
- authors (array of strings)
- publishedDate (YYYY-MM-DD)
- url
- summary (Japanese, one-sentence punchline)
- abstract (English original)
- abstractJa (Japanese translation)
- engagementScore (number)
- engagementReason (short explanation, e.g. "New but Viral: 12k hits")
- impactBadge (short label, e.g. "Viral Hit", "Highly Cited", "New Arrival")
- citationCount (string, e.g. "0" or "150")
- webMentionCount (string, e.g. "12.5k hits", "Viral on X", "Academic only"; "N/A" if unknown)
- imageUrl (string, optional)
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_core_fields() {
        let required = response_schema()["items"]["required"]
            .as_array()
            .expect("required list");
        assert_eq!(required.len(), REQUIRED_FIELDS.len());
        assert!(required.iter().any(|v| v == "webMentionCount"));
        assert!(!required.iter().any(|v| v == "imageUrl"));
    }

    #[test]
    fn prompts_embed_inputs() {
        assert!(search_instructions("diffusion models").contains("\"diffusion models\""));
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let text = extraction_instructions("RAW REPORT", today);
        assert!(text.contains("RAW REPORT"));
        assert!(text.contains("2024-03-01"));
    }
}
