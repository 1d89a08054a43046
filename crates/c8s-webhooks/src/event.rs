//! Provider payload parsing (section 4.6 step 3): each provider's push
//! payload is normalized into one shape carrying everything the reconciler
//! and the resulting `PipelineRun` need.
//!
//! Grounds the parsing idiom — `Option`-chained `serde_json::Value` lookups
//! returning `None` on any missing field rather than a typed provider
//! schema — on `buildit_core::repository::PushEvent::from_github_payload`.

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPushEvent {
    /// All clone URLs (HTTPS, SSH, ...) the event's repository is reachable
    /// under, in provider-preference order, for RepositoryConnection lookup.
    pub clone_urls: Vec<String>,
    pub commit: String,
    pub branch: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

fn strip_branch_ref(r#ref: &str) -> Option<String> {
    r#ref.strip_prefix("refs/heads/").map(|s| s.to_string())
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_str()
}

pub fn from_github_payload(payload: &Value) -> Option<NormalizedPushEvent> {
    let r#ref = str_at(payload, &["ref"])?;
    let commit = str_at(payload, &["after"])?.to_string();
    let branch = strip_branch_ref(r#ref);

    let mut clone_urls = Vec::new();
    if let Some(url) = str_at(payload, &["repository", "clone_url"]) {
        clone_urls.push(url.to_string());
    }
    if let Some(url) = str_at(payload, &["repository", "ssh_url"]) {
        clone_urls.push(url.to_string());
    }
    if clone_urls.is_empty() {
        return None;
    }

    let author = str_at(payload, &["head_commit", "author", "name"]).map(str::to_string);
    let author_email = str_at(payload, &["head_commit", "author", "email"]).map(str::to_string);
    let message = str_at(payload, &["head_commit", "message"]).map(str::to_string);
    let timestamp = str_at(payload, &["head_commit", "timestamp"])
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(NormalizedPushEvent {
        clone_urls,
        commit,
        branch,
        author,
        author_email,
        message,
        timestamp,
    })
}

pub fn from_gitlab_payload(payload: &Value) -> Option<NormalizedPushEvent> {
    let r#ref = str_at(payload, &["ref"])?;
    let commit = str_at(payload, &["checkout_sha"])
        .or_else(|| str_at(payload, &["after"]))?
        .to_string();
    let branch = strip_branch_ref(r#ref);

    let mut clone_urls = Vec::new();
    for key in ["http_url", "git_http_url"] {
        if let Some(url) = str_at(payload, &["project", key]) {
            clone_urls.push(url.to_string());
        }
    }
    if let Some(url) = str_at(payload, &["project", "git_ssh_url"]) {
        clone_urls.push(url.to_string());
    }
    if clone_urls.is_empty() {
        return None;
    }

    let commits = payload.get("commits").and_then(|c| c.as_array());
    let head_commit = commits.and_then(|c| c.last());

    let author = str_at(payload, &["user_name"])
        .or_else(|| head_commit.and_then(|c| str_at(c, &["author", "name"])))
        .map(str::to_string);
    let author_email = head_commit
        .and_then(|c| str_at(c, &["author", "email"]))
        .or_else(|| str_at(payload, &["user_email"]))
        .map(str::to_string);
    let message = head_commit.and_then(|c| str_at(c, &["message"])).map(str::to_string);
    let timestamp = head_commit
        .and_then(|c| str_at(c, &["timestamp"]))
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(NormalizedPushEvent {
        clone_urls,
        commit,
        branch,
        author,
        author_email,
        message,
        timestamp,
    })
}

pub fn from_bitbucket_payload(payload: &Value) -> Option<NormalizedPushEvent> {
    let change = payload
        .get("push")
        .and_then(|p| p.get("changes"))
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.last())?;
    let new_head = change.get("new")?;
    let branch = str_at(new_head, &["name"]).map(str::to_string);
    let target = new_head.get("target")?;
    let commit = str_at(target, &["hash"])?.to_string();

    let mut clone_urls = Vec::new();
    if let Some(links) = payload
        .get("repository")
        .and_then(|r| r.get("links"))
        .and_then(|l| l.get("clone"))
        .and_then(|c| c.as_array())
    {
        for preferred in ["https", "ssh"] {
            for link in links {
                if str_at(link, &["name"]) == Some(preferred) {
                    if let Some(href) = str_at(link, &["href"]) {
                        clone_urls.push(href.to_string());
                    }
                }
            }
        }
    }
    if clone_urls.is_empty() {
        return None;
    }

    let message = str_at(target, &["message"]).map(str::to_string);
    let author = str_at(target, &["author", "raw"]).map(str::to_string);
    let timestamp = str_at(target, &["date"])
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(NormalizedPushEvent {
        clone_urls,
        commit,
        branch,
        author,
        author_email: None,
        message,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn github_push_strips_branch_prefix() {
        let payload = json!({
            "ref": "refs/heads/main",
            "before": "0".repeat(40),
            "after": "a".repeat(40),
            "repository": {"full_name": "acme/widgets", "clone_url": "https://github.com/acme/widgets.git", "ssh_url": "git@github.com:acme/widgets.git"},
            "head_commit": {"message": "fix thing", "timestamp": "2026-01-01T00:00:00Z", "author": {"name": "Ada", "email": "ada@example.com"}},
            "pusher": {"name": "ada"}
        });
        let event = from_github_payload(&payload).unwrap();
        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.clone_urls[0], "https://github.com/acme/widgets.git");
        assert_eq!(event.message.as_deref(), Some("fix thing"));
    }

    #[test]
    fn gitlab_push_prefers_checkout_sha() {
        let payload = json!({
            "ref": "refs/heads/dev",
            "checkout_sha": "abc123",
            "project": {"http_url": "https://gitlab.com/acme/widgets.git", "git_ssh_url": "git@gitlab.com:acme/widgets.git"},
            "commits": [{"message": "wip", "author": {"name": "Bea", "email": "bea@example.com"}, "timestamp": "2026-01-02T00:00:00Z"}],
        });
        let event = from_gitlab_payload(&payload).unwrap();
        assert_eq!(event.commit, "abc123");
        assert_eq!(event.branch.as_deref(), Some("dev"));
    }

    #[test]
    fn bitbucket_push_takes_last_change() {
        let payload = json!({
            "push": {"changes": [{"new": {"name": "main", "target": {"hash": "deadbeef", "message": "m", "author": {"raw": "Cai <cai@example.com>"}, "date": "2026-01-03T00:00:00Z"}}}]},
            "repository": {"links": {"clone": [{"name": "https", "href": "https://bitbucket.org/acme/widgets.git"}, {"name": "ssh", "href": "git@bitbucket.org:acme/widgets.git"}]}}
        });
        let event = from_bitbucket_payload(&payload).unwrap();
        assert_eq!(event.commit, "deadbeef");
        assert_eq!(event.clone_urls[0], "https://bitbucket.org/acme/widgets.git");
    }

    #[test]
    fn missing_clone_urls_yields_none() {
        let payload = json!({"ref": "refs/heads/main", "after": "a".repeat(40)});
        assert!(from_github_payload(&payload).is_none());
    }
}
