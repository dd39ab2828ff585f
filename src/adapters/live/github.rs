//! Live adapter for the `IssueClient` port using the GitHub REST API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::ports::issues::{IssueClient, IssueClientError, IssueFuture, RemoteIssue};

/// Default GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const GITHUB_API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
const MAX_ERROR_BODY_CHARS: usize = 400;
/// Longest wait taken from a `retry-after` or `x-ratelimit-reset` header.
/// GitHub rate-limit windows are one hour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Issue client that talks to GitHub (or a GitHub-compatible API).
#[derive(Clone)]
pub struct GithubIssueClient {
    http: Client,
    api_base: String,
}

impl GithubIssueClient {
    /// Creates a client for `api_base`, authenticating with `token` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(api_base: &str, token: Option<&str>, timeout: Duration) -> Result<Self, String> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("issuesync"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(GITHUB_API_VERSION));
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| format!("Invalid GitHub token: {e}"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build GitHub HTTP client: {e}"))?;
        Ok(Self { http, api_base: api_base.trim_end_matches('/').to_string() })
    }

    fn issues_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/issues", self.api_base)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, IssueClientError> {
        let response = request.send().await.map_err(|e| classify_transport(operation, &e))?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                IssueClientError::Decode(format!("failed to decode github {operation}: {e}"))
            });
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &headers, &body, Utc::now()))
    }
}

/// Issue representation returned by the GitHub API.
#[derive(Debug, Deserialize)]
struct GithubIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl From<GithubIssue> for RemoteIssue {
    fn from(issue: GithubIssue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            description: issue.body.unwrap_or_default(),
            state: issue.state,
            has_linked_change: issue.pull_request.is_some(),
            url: issue.html_url,
        }
    }
}

impl IssueClient for GithubIssueClient {
    fn list<'a>(&'a self, owner: &'a str, repo: &'a str) -> IssueFuture<'a, Vec<RemoteIssue>> {
        Box::pin(async move {
            let url = self.issues_url(owner, repo);
            let mut issues = Vec::new();
            let mut page = 1_u32;
            loop {
                let request = self.http.get(&url).query(&[
                    ("state", "all"),
                    ("per_page", "100"),
                    ("page", page.to_string().as_str()),
                ]);
                let chunk: Vec<GithubIssue> = self.send_json("list issues", request).await?;
                let chunk_len = chunk.len();
                issues.extend(chunk.into_iter().map(RemoteIssue::from));
                if chunk_len < PAGE_SIZE {
                    break;
                }
                page = page.saturating_add(1);
            }
            debug!(owner, repo, count = issues.len(), "listed github issues");
            Ok(issues)
        })
    }

    fn create<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        title: &'a str,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.issues_url(owner, repo))
                .json(&json!({ "title": title, "body": body }));
            let issue: GithubIssue = self.send_json("create issue", request).await?;
            Ok(issue.into())
        })
    }

    fn edit<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        number: u64,
        body: &'a str,
    ) -> IssueFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let request = self
                .http
                .patch(format!("{}/{number}", self.issues_url(owner, repo)))
                .json(&json!({ "body": body }));
            let issue: GithubIssue = self.send_json("edit issue", request).await?;
            Ok(issue.into())
        })
    }

    fn close<'a>(&'a self, owner: &'a str, repo: &'a str, number: u64)
        -> IssueFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let request = self
                .http
                .patch(format!("{}/{number}", self.issues_url(owner, repo)))
                .json(&json!({ "state": "closed" }));
            let issue: GithubIssue = self.send_json("close issue", request).await?;
            Ok(issue.into())
        })
    }
}

/// Maps a non-success HTTP status to an error class.
fn classify_status(
    status: u16,
    headers: &HeaderMap,
    body: &str,
    now: DateTime<Utc>,
) -> IssueClientError {
    let message = format!("github returned {status}: {}", truncate_for_error(body, MAX_ERROR_BODY_CHARS));
    match status {
        401 => IssueClientError::Unauthorized(message),
        403 | 429 => {
            let retry_after = parse_retry_after(headers);
            let exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0");
            if retry_after.is_some() || exhausted || status == 429 {
                let retry_after = retry_after.or_else(|| rate_limit_reset(headers, now));
                IssueClientError::RateLimited { retry_after, message }
            } else {
                IssueClientError::Rejected { status, message }
            }
        }
        404 => IssueClientError::NotFound(message),
        408 | 500..=599 => IssueClientError::Transient(message),
        _ => IssueClientError::Rejected { status, message },
    }
}

/// Maps a failed send to an error class.
fn classify_transport(operation: &str, error: &reqwest::Error) -> IssueClientError {
    let message = format!("github {operation} request failed: {error}");
    if error.is_decode() {
        IssueClientError::Decode(message)
    } else {
        IssueClientError::Transient(message)
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = header_str(headers, "retry-after")?.parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

/// Time until the primary rate-limit window resets, from `x-ratelimit-reset` (epoch seconds).
fn rate_limit_reset(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let reset = header_str(headers, "x-ratelimit-reset")?.parse::<i64>().ok()?;
    let remaining = reset.saturating_sub(now.timestamp()).max(0);
    // One extra second so the retry lands after the window rolls over.
    Some(Duration::from_secs(remaining.unsigned_abs().saturating_add(1)).min(MAX_RETRY_AFTER))
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
