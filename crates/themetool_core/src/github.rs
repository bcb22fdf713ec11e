use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

const PLACEHOLDER: &str = "Unknown";

/// Display metadata for one repository. Absent values carry the
/// "Unknown" placeholder so callers never branch on fetch failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoMetadata {
    pub repo: String,
    pub description: String,
    pub created_at: String,
    pub stars: u64,
    pub archived: bool,
}

impl RepoMetadata {
    pub fn placeholder(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            description: PLACEHOLDER.to_string(),
            created_at: PLACEHOLDER.to_string(),
            stars: 0,
            archived: false,
        }
    }
}

/// Seam for repository metadata lookups; the display path is best-effort
/// and tests substitute a canned source.
pub trait RepoMetadataSource {
    fn fetch(&self, repo: &str) -> RepoMetadata;
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    description: Option<String>,
    created_at: Option<String>,
    stargazers_count: Option<u64>,
    archived: Option<bool>,
}

fn from_api(repo: &str, api: ApiRepo) -> RepoMetadata {
    RepoMetadata {
        repo: repo.to_string(),
        description: api.description.unwrap_or_else(|| PLACEHOLDER.to_string()),
        created_at: api.created_at.unwrap_or_else(|| PLACEHOLDER.to_string()),
        stars: api.stargazers_count.unwrap_or(0),
        archived: api.archived.unwrap_or(false),
    }
}

pub struct GithubClient {
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(timeout: Duration, user_agent: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .context("failed to build github client")?;
        Ok(Self { client, token })
    }

    fn try_fetch(&self, repo: &str) -> Result<RepoMetadata> {
        let url = format!("https://api.github.com/repos/{repo}");
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        if !response.status().is_success() {
            bail!("{url} returned {}", response.status());
        }
        let api: ApiRepo = response
            .json()
            .with_context(|| format!("failed to decode response from {url}"))?;
        Ok(from_api(repo, api))
    }
}

impl RepoMetadataSource for GithubClient {
    /// Any failure degrades to placeholders; metadata display never blocks
    /// the catalog workflow.
    fn fetch(&self, repo: &str) -> RepoMetadata {
        self.try_fetch(repo)
            .unwrap_or_else(|_| RepoMetadata::placeholder(repo))
    }
}
