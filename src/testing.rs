//! In-process fakes for the network seams
//!
//! [`StaticFetcher`] serves canned pages and [`StaticCodeHost`] serves canned
//! code-host listings, so crawls and discovery run without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

use crate::config::DEFAULT_USER_AGENT;
use crate::discovery::{CodeHost, CodeHostError, Contributor, RepoSummary};
use crate::scraping::{normalize_url, FetchError, FetchResult, PageFetcher};

enum Canned {
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    Failure(String),
}

/// Serves registered URLs; everything else is a 404
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, Canned>>,
    requests: Mutex<HashMap<String, usize>>,
}

fn key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => normalize_url(&parsed),
        Err(_) => url.to_string(),
    }
}

fn content_type_for(url: &Url) -> &'static str {
    let path = url.path();
    if path.ends_with(".xml") {
        "application/xml"
    } else if path.ends_with(".txt") {
        "text/plain"
    } else {
        "text/html; charset=utf-8"
    }
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 and a content type guessed from the path
    pub fn add_page(&self, url: &str, body: &str) {
        let content_type = Url::parse(url)
            .map(|u| content_type_for(&u))
            .unwrap_or("text/html");
        self.add_response(url, 200, &[("content-type", content_type)], body);
    }

    pub fn add_response(&self, url: &str, status: u16, headers: &[(&str, &str)], body: &str) {
        self.pages.lock().insert(
            key(url),
            Canned::Response {
                status,
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body: body.to_string(),
            },
        );
    }

    /// Fail requests for `url` with a transport error
    pub fn fail_with(&self, url: &str, message: &str) {
        self.pages
            .lock()
            .insert(key(url), Canned::Failure(message.to_string()));
    }

    /// How many times `url` was fetched
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().get(&key(url)).copied().unwrap_or(0)
    }

    /// Total requests served
    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }

    /// Build a response as the fetcher would serve it
    pub fn response(url: &Url, status: u16, body: &str) -> FetchResult {
        FetchResult {
            headers: vec![("content-type".to_string(), content_type_for(url).to_string())],
            final_url: url.clone(),
            status_code: status,
            body: body.to_string(),
            fetch_duration: Duration::ZERO,
        }
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
        let key = normalize_url(url);
        *self.requests.lock().entry(key.clone()).or_default() += 1;

        let pages = self.pages.lock();
        match pages.get(&key) {
            Some(Canned::Response {
                status,
                headers,
                body,
            }) => Ok(FetchResult {
                final_url: url.clone(),
                status_code: *status,
                headers: headers.clone(),
                body: body.clone(),
                fetch_duration: Duration::ZERO,
            }),
            Some(Canned::Failure(message)) => Err(FetchError::Transport(message.clone())),
            None => Ok(FetchResult {
                final_url: url.clone(),
                status_code: 404,
                headers: vec![("content-type".to_string(), "text/html".to_string())],
                body: String::new(),
                fetch_duration: Duration::ZERO,
            }),
        }
    }

    fn user_agent(&self) -> &str {
        DEFAULT_USER_AGENT
    }
}

#[derive(Default)]
struct HostData {
    contributors: HashMap<String, Vec<Contributor>>,
    user_repos: HashMap<String, Vec<RepoSummary>>,
    user_orgs: HashMap<String, Vec<String>>,
    starred: HashMap<String, Vec<RepoSummary>>,
    org_repos: HashMap<String, Vec<RepoSummary>>,
    /// (repo, ref, path)
    paths: HashSet<(String, String, String)>,
}

/// Canned code host. Unknown repositories and organizations are not found;
/// unknown users simply have nothing.
#[derive(Default)]
pub struct StaticCodeHost {
    data: Mutex<HostData>,
}

impl StaticCodeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contributor(&self, repo: &str, login: &str, contributions: u64) {
        self.push_contributor(repo, login, contributions, false);
    }

    pub fn add_bot(&self, repo: &str, login: &str, contributions: u64) {
        self.push_contributor(repo, login, contributions, true);
    }

    fn push_contributor(&self, repo: &str, login: &str, contributions: u64, is_bot: bool) {
        self.data
            .lock()
            .contributors
            .entry(repo.to_string())
            .or_default()
            .push(Contributor {
                login: login.to_string(),
                contributions,
                is_bot,
            });
    }

    pub fn add_user_repo(&self, user: &str, repo: RepoSummary) {
        self.data.lock().user_repos.entry(user.to_string()).or_default().push(repo);
    }

    pub fn add_user_org(&self, user: &str, org: &str) {
        self.data
            .lock()
            .user_orgs
            .entry(user.to_string())
            .or_default()
            .push(org.to_string());
    }

    pub fn add_starred(&self, user: &str, repo: RepoSummary) {
        self.data.lock().starred.entry(user.to_string()).or_default().push(repo);
    }

    pub fn add_org_repo(&self, org: &str, repo: RepoSummary) {
        self.data.lock().org_repos.entry(org.to_string()).or_default().push(repo);
    }

    /// Make `path` exist in `repo` at `git_ref`
    pub fn add_path(&self, repo: &str, git_ref: &str, path: &str) {
        self.data
            .lock()
            .paths
            .insert((repo.to_string(), git_ref.to_string(), path.to_string()));
    }
}

#[async_trait]
impl CodeHost for StaticCodeHost {
    async fn contributors(&self, repo: &str) -> Result<Vec<Contributor>, CodeHostError> {
        self.data
            .lock()
            .contributors
            .get(repo)
            .cloned()
            .ok_or_else(|| CodeHostError::NotFound(format!("/repos/{}/contributors", repo)))
    }

    async fn user_repositories(&self, user: &str) -> Result<Vec<RepoSummary>, CodeHostError> {
        Ok(self.data.lock().user_repos.get(user).cloned().unwrap_or_default())
    }

    async fn user_organizations(&self, user: &str) -> Result<Vec<String>, CodeHostError> {
        Ok(self.data.lock().user_orgs.get(user).cloned().unwrap_or_default())
    }

    async fn starred_repositories(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<RepoSummary>, CodeHostError> {
        let mut starred = self.data.lock().starred.get(user).cloned().unwrap_or_default();
        starred.truncate(limit);
        Ok(starred)
    }

    async fn org_repositories(&self, org: &str) -> Result<Vec<RepoSummary>, CodeHostError> {
        self.data
            .lock()
            .org_repos
            .get(org)
            .cloned()
            .ok_or_else(|| CodeHostError::NotFound(format!("/orgs/{}/repos", org)))
    }

    async fn path_exists(&self, repo: &str, git_ref: &str, path: &str) -> Result<bool, CodeHostError> {
        Ok(self
            .data
            .lock()
            .paths
            .contains(&(repo.to_string(), git_ref.to_string(), path.to_string())))
    }
}
