//! Hub HTTP client used by the tagging tools for reading and adding repo tags.

use std::time::Duration;

use curator_core::truncate_chars;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const ERROR_BODY_PREVIEW_MAX_CHARS: usize = 240;

#[derive(Debug, Error)]
/// Enumerates supported `HubError` values.
pub enum HubError {
    #[error("missing hub token")]
    MissingToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("hub returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid hub response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Deserialize)]
struct RepoTagsResponse {
    tags: Vec<String>,
}

#[derive(Debug, Clone)]
/// Public struct `HubClient` used across Curator components.
pub struct HubClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl HubClient {
    pub fn new(
        api_base: impl Into<String>,
        token: &str,
        request_timeout_ms: u64,
    ) -> Result<Self, HubError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(HubError::MissingToken);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("curator-hub-client"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let bearer = format!("Bearer {token}");
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&bearer)
                .map_err(|e| HubError::InvalidResponse(format!("invalid token header: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
        })
    }

    fn repo_tags_url(&self, repo_name: &str) -> String {
        format!("{}/api/repos/{}/tags", self.api_base, repo_name.trim())
    }

    /// Reads the current tag set of `repo_name`.
    pub async fn get_repo_tags(&self, repo_name: &str) -> Result<Vec<String>, HubError> {
        let url = self.repo_tags_url(repo_name);
        let body = self
            .request_with_retry(|| self.http.get(&url))
            .await?;
        let parsed: RepoTagsResponse = serde_json::from_str(&body)
            .map_err(|e| HubError::InvalidResponse(format!("tag listing did not parse: {e}")))?;
        Ok(parsed.tags)
    }

    /// Adds `tag` to `repo_name`. The hub treats re-adding an existing tag as
    /// a conflict; callers are expected to read before writing.
    pub async fn add_repo_tag(&self, repo_name: &str, tag: &str) -> Result<(), HubError> {
        let url = self.repo_tags_url(repo_name);
        let payload = json!({ "tag": tag });
        self.request_with_retry(|| self.http.post(&url).json(&payload))
            .await?;
        Ok(())
    }

    async fn request_with_retry<F>(&self, build: F) -> Result<String, HubError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let response = build().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await?;
                    if status.is_success() {
                        return Ok(body);
                    }
                    if attempt + 1 < self.retry_max_attempts
                        && is_retryable_hub_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(attempt, self.retry_base_delay_ms)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(HubError::HttpStatus {
                        status: status.as_u16(),
                        body: truncate_chars(&body, ERROR_BODY_PREVIEW_MAX_CHARS),
                    });
                }
                Err(error) => {
                    if attempt + 1 < self.retry_max_attempts
                        && (error.is_timeout() || error.is_connect())
                    {
                        tokio::time::sleep(retry_delay(attempt, self.retry_base_delay_ms)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(HubError::Http(error));
                }
            }
        }
    }
}

fn is_retryable_hub_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

fn retry_delay(attempt: usize, base_delay_ms: u64) -> Duration {
    let shift = attempt.min(6);
    Duration::from_millis(base_delay_ms.saturating_mul(1_u64 << shift))
}
