//! github.add_issue_comment
//!
//! 必須 inputs: `repo_owner`, `repo_name`, `issue_number`（整数）, `comment_body`, `access_token`。
//! 欠けていれば codec が `missing field ...` の Validation エラーにする。
//! owner / repo は path に入るので名前の形を検査し、segment として encode する。

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use relay_core::{Handler, HandlerError, Task};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

const GITHUB_API: &str = "https://api.github.com";

static REPO_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("repo name regex"));

fn check_name(field: &str, value: &str) -> Result<(), HandlerError> {
    // `.` and `..` would be dropped from the path instead of encoded
    if !REPO_PART.is_match(value) || value.chars().all(|c| c == '.') {
        return Err(HandlerError::validation(format!("Invalid {field}")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AddIssueComment {
    pub repo_owner: String,
    pub repo_name: String,
    pub issue_number: u64,
    pub comment_body: String,
    pub access_token: String,
}

impl Task for AddIssueComment {
    const TYPE: &'static str = "github.add_issue_comment";
    type Output = IssueComment;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueComment {
    pub comment_id: u64,
    pub comment_url: String,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    id: u64,
    html_url: String,
}

pub struct AddIssueCommentHandler {
    http: Client,
    base_url: String,
}

impl AddIssueCommentHandler {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: GITHUB_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn comments_url(&self, task: &AddIssueComment) -> Result<Url, HandlerError> {
        check_name("repo_owner", &task.repo_owner)?;
        check_name("repo_name", &task.repo_name)?;

        let mut url = Url::parse(&self.base_url).map_err(|e| {
            HandlerError::internal(format!("invalid GitHub base URL: {e}")).with_source(e)
        })?;
        let issue_number = task.issue_number.to_string();
        url.path_segments_mut()
            .map_err(|()| HandlerError::internal("GitHub base URL cannot carry a path"))?
            .pop_if_empty()
            .extend([
                "repos",
                task.repo_owner.as_str(),
                task.repo_name.as_str(),
                "issues",
                issue_number.as_str(),
                "comments",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl Handler<AddIssueComment> for AddIssueCommentHandler {
    async fn handle(&self, task: AddIssueComment) -> Result<IssueComment, HandlerError> {
        let url = self.comments_url(&task)?;

        let response = self
            .http
            .post(url)
            .header("Authorization", format!("token {}", task.access_token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "relay")
            .json(&json!({ "body": task.comment_body }))
            .send()
            .await
            .map_err(|e| {
                HandlerError::upstream(format!("Failed to add comment: {e}")).with_source(e)
            })?;

        match response.status() {
            StatusCode::CREATED => {
                let comment: CommentResponse = response.json().await.map_err(|e| {
                    HandlerError::upstream(format!("Failed to add comment: {e}")).with_source(e)
                })?;
                info!(
                    repo = %format!("{}/{}", task.repo_owner, task.repo_name),
                    issue = task.issue_number,
                    "comment added"
                );
                Ok(IssueComment {
                    comment_id: comment.id,
                    comment_url: comment.html_url,
                })
            }
            StatusCode::FORBIDDEN => Err(HandlerError::upstream(
                "Rate limit exceeded. Please try again later.",
            )),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(HandlerError::upstream(format!(
                    "Failed to add comment: {} {}",
                    status.as_u16(),
                    text
                )))
            }
        }
    }
}
