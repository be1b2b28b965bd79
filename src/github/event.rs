//! Pull request context from the GitHub Actions environment

use serde::Deserialize;
use std::env;
use std::fs;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    pull_request: Option<PullRequestPayload>,
    #[serde(default)]
    number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
}

/// Name of the triggering event (`GITHUB_EVENT_NAME`)
pub fn event_name() -> Option<String> {
    env::var("GITHUB_EVENT_NAME").ok().filter(|name| !name.is_empty())
}

/// `owner/repo` of the running workflow (`GITHUB_REPOSITORY`)
pub fn repository() -> Option<String> {
    env::var("GITHUB_REPOSITORY").ok().filter(|repo| !repo.is_empty())
}

/// The explicit input wins, then the event payload, then `GITHUB_REF`
pub fn detect_pr_number(explicit: Option<u64>) -> Option<u64> {
    if explicit.is_some() {
        return explicit;
    }

    if let Ok(event_path) = env::var("GITHUB_EVENT_PATH") {
        match fs::read_to_string(&event_path) {
            Ok(content) => {
                if let Some(number) = pr_number_from_event(&content) {
                    debug!("Pull request number {} from event payload", number);
                    return Some(number);
                }
            }
            Err(e) => warn!("Failed to read event payload {}: {}", event_path, e),
        }
    }

    env::var("GITHUB_REF")
        .ok()
        .and_then(|github_ref| pr_number_from_ref(&github_ref))
}

pub fn pr_number_from_event(content: &str) -> Option<u64> {
    let payload: EventPayload = serde_json::from_str(content).ok()?;
    payload
        .pull_request
        .map(|pr| pr.number)
        .or(payload.number)
}

/// Number from a `refs/pull/<n>/merge` reference
pub fn pr_number_from_ref(github_ref: &str) -> Option<u64> {
    github_ref
        .strip_prefix("refs/pull/")?
        .strip_suffix("/merge")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_number_from_event() {
        let payload = r#"{"action": "synchronize", "number": 12, "pull_request": {"number": 12, "title": "x"}}"#;
        assert_eq!(pr_number_from_event(payload), Some(12));

        assert_eq!(pr_number_from_event(r#"{"number": 5}"#), Some(5));
        assert_eq!(pr_number_from_event(r#"{"ref": "refs/heads/main"}"#), None);
        assert_eq!(pr_number_from_event("not json"), None);
    }

    #[test]
    fn test_pr_number_from_ref() {
        assert_eq!(pr_number_from_ref("refs/pull/42/merge"), Some(42));
        assert_eq!(pr_number_from_ref("refs/heads/main"), None);
        assert_eq!(pr_number_from_ref("refs/pull/abc/merge"), None);
        assert_eq!(pr_number_from_ref("refs/pull/42/head"), None);
    }

    #[test]
    fn test_explicit_number_wins() {
        assert_eq!(detect_pr_number(Some(3)), Some(3));
    }
}
