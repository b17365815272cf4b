//! Gemini REST adapter for the search and extraction services.
//!
//! One [`GeminiClient`] serves both stages of a curation run:
//! - search: a grounded `generateContent` call with the web search tool
//!   enabled, returning free text;
//! - extraction: a `generateContent` call constrained to JSON under a
//!   response schema, returning the raw payload for local decoding.

mod protocol;

use std::time::Duration;

use async_trait::async_trait;
use curator_shared::{CuratorError, ExtractionService, GeminiConfig, Result, SearchService};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use protocol::{GenerateContentRequest, GenerateContentResponse};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection establishment timeout. Generation itself is unbounded.
const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Longest error body excerpt kept in error messages.
const MAX_ERROR_EXCERPT: usize = 300;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("curator/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    search_model: String,
    extract_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("search_model", &self.search_model)
            .field("extract_model", &self.extract_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from the `[gemini]` config section and a resolved key.
    pub fn new(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CuratorError::config("Gemini API key is empty"));
        }
        Ok(Self {
            http: build_client()?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_model: config.search_model.clone(),
            extract_model: config.extract_model.clone(),
        })
    }

    /// Override the API root (for tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    /// POST a request and return the decoded response envelope.
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse> {
        let url = self.endpoint(model);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CuratorError::Network(format!("{model}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(MAX_ERROR_EXCERPT).collect();
            warn!(%status, model, "generateContent rejected");
            return Err(CuratorError::Network(format!(
                "{model}: HTTP {status}: {excerpt}"
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| CuratorError::Extraction(format!("{model}: invalid response body: {e}")))
    }
}

#[async_trait]
impl SearchService for GeminiClient {
    #[instrument(skip_all, fields(model = %self.search_model))]
    async fn search(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest::user_text(prompt).with_search_tool();
        let response = self.generate(&self.search_model, &request).await?;
        let text = response.text().unwrap_or_default();
        debug!(chars = text.len(), "search stage returned");
        Ok(text)
    }
}

#[async_trait]
impl ExtractionService for GeminiClient {
    #[instrument(skip_all, fields(model = %self.extract_model))]
    async fn extract(
        &self,
        instructions: &str,
        response_schema: &serde_json::Value,
    ) -> Result<Option<String>> {
        let request = GenerateContentRequest::user_text(instructions).with_json_schema(response_schema);
        let response = self.generate(&self.extract_model, &request).await?;
        let payload = response.text();
        debug!(
            chars = payload.as_ref().map_or(0, String::len),
            "extraction stage returned"
        );
        Ok(payload)
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| CuratorError::Network(format!("failed to build HTTP client: {e}")))
}
