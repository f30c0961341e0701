//! Code-hosting API client
//!
//! [`CodeHost`] is the seam the discovery stages talk to. [`GitHubClient`]
//! implements it over the GitHub REST API with page-number pagination.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::DiscoveryConfig;

/// Items requested per page
const PER_PAGE: usize = 100;

/// Errors from the code-hosting API
#[derive(Debug, Error)]
pub enum CodeHostError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unexpected status {status} for {path}")]
    Status { status: u16, path: String },
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A contributor of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
    pub is_bot: bool,
}

/// Repository listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    /// `owner/name`
    pub full_name: String,
    pub default_branch: String,
    pub fork: bool,
    pub archived: bool,
}

impl RepoSummary {
    pub fn new(full_name: impl Into<String>, default_branch: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            default_branch: default_branch.into(),
            fork: false,
            archived: false,
        }
    }

    /// Repository name without the owner
    pub fn name(&self) -> &str {
        self.full_name
            .split_once('/')
            .map_or(self.full_name.as_str(), |(_, name)| name)
    }
}

/// Read access to a code-hosting platform
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Contributors of `owner/name`
    async fn contributors(&self, repo: &str) -> Result<Vec<Contributor>, CodeHostError>;

    async fn user_repositories(&self, user: &str) -> Result<Vec<RepoSummary>, CodeHostError>;

    /// Organization logins the user belongs to
    async fn user_organizations(&self, user: &str) -> Result<Vec<String>, CodeHostError>;

    /// Up to `limit` repositories starred by the user
    async fn starred_repositories(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<RepoSummary>, CodeHostError>;

    async fn org_repositories(&self, org: &str) -> Result<Vec<RepoSummary>, CodeHostError>;

    /// Whether `path` exists in `repo` at `git_ref`
    async fn path_exists(&self, repo: &str, git_ref: &str, path: &str) -> Result<bool, CodeHostError>;
}

#[derive(Debug, Deserialize)]
struct ApiContributor {
    login: Option<String>,
    #[serde(default)]
    contributions: u64,
    #[serde(rename = "type", default)]
    account_type: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    full_name: String,
    #[serde(default = "default_branch")]
    default_branch: String,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

impl From<ApiRepo> for RepoSummary {
    fn from(repo: ApiRepo) -> Self {
        Self {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
            fork: repo.fork,
            archived: repo.archived,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiOrg {
    login: String,
}

/// GitHub REST API client
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    /// Pages fetched per listing at most
    max_pages: usize,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<String>, user_agent: &str) -> Result<Self, CodeHostError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        match &token {
            Some(token) => {
                let auth = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| CodeHostError::Config(format!("Invalid API token: {}", e)))?;
                headers.insert(AUTHORIZATION, auth);
            }
            None => tracing::warn!("No code-host token configured; API rate limits will be low"),
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_pages: 10,
        })
    }

    pub fn from_config(config: &DiscoveryConfig, user_agent: &str) -> Result<Self, CodeHostError> {
        Self::new(&config.api_base_url, config.token(), user_agent)
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn get_page<T: DeserializeOwned>(&self, path: &str, page: usize) -> Result<Vec<T>, CodeHostError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("per_page", PER_PAGE), ("page", page)])
            .send()
            .await?;

        check_status(&response, path)?;
        Ok(response.json::<Vec<T>>().await?)
    }

    /// Follow pages until a short page, `limit` items, or the page cap
    async fn paginate<T: DeserializeOwned>(&self, path: &str, limit: usize) -> Result<Vec<T>, CodeHostError> {
        let mut items = Vec::new();
        for page in 1..=self.max_pages {
            let batch: Vec<T> = self.get_page(path, page).await?;
            let short = batch.len() < PER_PAGE;
            items.extend(batch);
            if short || items.len() >= limit {
                break;
            }
        }
        items.truncate(limit);
        tracing::debug!(path, count = items.len(), "listed");
        Ok(items)
    }
}

fn check_status(response: &reqwest::Response, path: &str) -> Result<(), CodeHostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let remaining_zero = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(CodeHostError::RateLimited {
            retry_after_secs: retry_after(response),
        }),
        StatusCode::FORBIDDEN if remaining_zero => Err(CodeHostError::RateLimited {
            retry_after_secs: retry_after(response),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CodeHostError::Unauthorized(path.to_string()))
        }
        StatusCode::NOT_FOUND => Err(CodeHostError::NotFound(path.to_string())),
        _ => Err(CodeHostError::Status {
            status: status.as_u16(),
            path: path.to_string(),
        }),
    }
}

fn retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Bot accounts are typed `Bot` or carry a `[bot]` suffix
pub(crate) fn is_bot_login(login: &str, account_type: &str) -> bool {
    account_type.eq_ignore_ascii_case("bot") || login.to_ascii_lowercase().ends_with("[bot]")
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn contributors(&self, repo: &str) -> Result<Vec<Contributor>, CodeHostError> {
        let raw: Vec<ApiContributor> = self
            .paginate(&format!("/repos/{}/contributors", repo), usize::MAX)
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|c| {
                let login = c.login?;
                Some(Contributor {
                    is_bot: is_bot_login(&login, &c.account_type),
                    login,
                    contributions: c.contributions,
                })
            })
            .collect())
    }

    async fn user_repositories(&self, user: &str) -> Result<Vec<RepoSummary>, CodeHostError> {
        let raw: Vec<ApiRepo> = self.paginate(&format!("/users/{}/repos", user), usize::MAX).await?;
        Ok(raw.into_iter().map(RepoSummary::from).collect())
    }

    async fn user_organizations(&self, user: &str) -> Result<Vec<String>, CodeHostError> {
        let raw: Vec<ApiOrg> = self.paginate(&format!("/users/{}/orgs", user), usize::MAX).await?;
        Ok(raw.into_iter().map(|o| o.login).collect())
    }

    async fn starred_repositories(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<RepoSummary>, CodeHostError> {
        let raw: Vec<ApiRepo> = self.paginate(&format!("/users/{}/starred", user), limit).await?;
        Ok(raw.into_iter().map(RepoSummary::from).collect())
    }

    async fn org_repositories(&self, org: &str) -> Result<Vec<RepoSummary>, CodeHostError> {
        let raw: Vec<ApiRepo> = self.paginate(&format!("/orgs/{}/repos", org), usize::MAX).await?;
        Ok(raw.into_iter().map(RepoSummary::from).collect())
    }

    async fn path_exists(&self, repo: &str, git_ref: &str, path: &str) -> Result<bool, CodeHostError> {
        let api_path = format!("/repos/{}/contents/{}", repo, path.trim_start_matches('/'));
        let response = self
            .client
            .get(format!("{}{}", self.base_url, api_path))
            .query(&[("ref", git_ref)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(&response, &api_path)?;
        Ok(true)
    }
}
