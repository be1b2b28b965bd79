//! GitHub pull request API
//!
//! Provides:
//! - Changed files of a pull request
//! - Creating, updating and deleting the coverage comment
//! - Pull request detection from the Actions environment

mod event;

pub use event::*;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestFile {
    filename: String,
}

/// The pull request operations the action needs
pub trait PullRequestApi {
    fn changed_files(&self, pr_number: u64) -> Result<Vec<String>>;
    fn comments(&self, pr_number: u64) -> Result<Vec<IssueComment>>;
    fn add_comment(&self, pr_number: u64, body: &str) -> Result<()>;
    fn update_comment(&self, comment_id: u64, body: &str) -> Result<()>;
    fn delete_comment(&self, comment_id: u64) -> Result<()>;
}

pub struct GitHubClient {
    client: Client,
    token: String,
    repository: String,
    api_url: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, repository: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("jacoco-report")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            token: token.into(),
            repository: repository.into(),
            api_url: API_URL.to_string(),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }

    fn send(&self, builder: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .request(builder)
            .send()
            .with_context(|| format!("Failed to {}", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            anyhow::bail!("Failed to {}: {} - {}", what, status, text);
        }

        Ok(response)
    }

    /// Fetch every page of a listing endpoint
    fn paginate<T: for<'de> Deserialize<'de>>(&self, url: &str, what: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            debug!("GET {} page {}", url, page);
            let builder = self
                .client
                .get(url)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let page_items: Vec<T> = self
                .send(builder, what)?
                .json()
                .with_context(|| format!("Failed to decode response to {}", what))?;

            let count = page_items.len();
            items.extend(page_items);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

impl PullRequestApi for GitHubClient {
    fn changed_files(&self, pr_number: u64) -> Result<Vec<String>> {
        let url = format!("{}/repos/{}/pulls/{}/files", self.api_url, self.repository, pr_number);
        let files: Vec<PullRequestFile> = self.paginate(&url, "list pull request files")?;

        let files: Vec<String> = files.into_iter().map(|f| f.filename).collect();
        info!("{} changed file(s) in pull request #{}", files.len(), pr_number);
        Ok(files)
    }

    fn comments(&self, pr_number: u64) -> Result<Vec<IssueComment>> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.api_url, self.repository, pr_number
        );
        self.paginate(&url, "list pull request comments")
    }

    fn add_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.api_url, self.repository, pr_number
        );
        self.send(self.client.post(&url).json(&json!({ "body": body })), "add comment")?;
        Ok(())
    }

    fn update_comment(&self, comment_id: u64, body: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/issues/comments/{}",
            self.api_url, self.repository, comment_id
        );
        self.send(self.client.patch(&url).json(&json!({ "body": body })), "update comment")?;
        Ok(())
    }

    fn delete_comment(&self, comment_id: u64) -> Result<()> {
        let url = format!(
            "{}/repos/{}/issues/comments/{}",
            self.api_url, self.repository, comment_id
        );
        self.send(self.client.delete(&url), "delete comment")?;
        Ok(())
    }
}

/// What happened to the coverage comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created,
    Updated(u64),
    Deleted(u64),
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct PublishPolicy {
    pub update_comment: bool,
    pub skip_unchanged: bool,
}

/// Create, update or delete the comment that starts with `title`.
///
/// An existing comment is updated while the pull request has changed files
/// and removed once it has none (both only with `update_comment`).
pub fn publish_comment(
    api: &dyn PullRequestApi,
    pr_number: u64,
    title: &str,
    body: &str,
    policy: PublishPolicy,
    changed_files_count: usize,
) -> Result<CommentAction> {
    let existing = if title.is_empty() {
        None
    } else {
        api.comments(pr_number)?
            .into_iter()
            .find(|comment| comment.body.starts_with(title))
    };

    if let Some(comment) = existing.filter(|_| policy.update_comment) {
        if changed_files_count > 0 {
            info!("Updating comment {}", comment.id);
            api.update_comment(comment.id, body)?;
            return Ok(CommentAction::Updated(comment.id));
        }

        info!("No changed files, deleting comment {}", comment.id);
        api.delete_comment(comment.id)?;
        return Ok(CommentAction::Deleted(comment.id));
    }

    if policy.skip_unchanged && changed_files_count == 0 {
        info!("No changed files in pull request, skipping comment");
        return Ok(CommentAction::Skipped);
    }

    info!("Adding comment to pull request #{}", pr_number);
    api.add_comment(pr_number, body)?;
    Ok(CommentAction::Created)
}
