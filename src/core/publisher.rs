use crate::core::comment::LineComment;
use crate::core::event::PullRequestRef;
use crate::core::review::ReviewResult;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const REVIEW_HEADING: &str = "## Automated code review";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub commit_id: String,
    pub body: String,
    pub event: String,
    pub comments: Vec<LineComment>,
}

/// The pull request hosting service.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    async fn head_sha(&self, pr: &PullRequestRef) -> Result<String>;
    async fn create_issue_comment(&self, pr: &PullRequestRef, body: &str) -> Result<()>;
    async fn create_review(&self, pr: &PullRequestRef, review: &ReviewDraft) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Review { comments: usize },
    Comment,
    FallbackComment { reason: String },
}

pub struct ReviewPublisher<'a> {
    host: &'a dyn PullRequestHost,
}

impl<'a> ReviewPublisher<'a> {
    pub fn new(host: &'a dyn PullRequestHost) -> Self {
        Self { host }
    }

    pub async fn publish(&self, pr: &PullRequestRef, result: &ReviewResult) -> Result<PublishOutcome> {
        let body = format_body(&result.summary);
        let comments: Vec<LineComment> = result.line_comments().cloned().collect();

        if comments.is_empty() {
            self.host.create_issue_comment(pr, &body).await?;
            info!("Posted review comment to {}", pr);
            return Ok(PublishOutcome::Comment);
        }

        let count = comments.len();
        match self.submit_review(pr, body.clone(), comments).await {
            Ok(()) => {
                info!("Posted review with {} line comments to {}", count, pr);
                Ok(PublishOutcome::Review { comments: count })
            }
            Err(err) => {
                warn!("Inline review failed, falling back to a single comment: {}", err);
                let reason = err.to_string();
                let fallback = format_fallback_body(&body, &reason, result);
                self.host.create_issue_comment(pr, &fallback).await?;
                info!("Posted fallback comment to {}", pr);
                Ok(PublishOutcome::FallbackComment { reason })
            }
        }
    }

    async fn submit_review(
        &self,
        pr: &PullRequestRef,
        body: String,
        comments: Vec<LineComment>,
    ) -> Result<()> {
        let commit_id = self.host.head_sha(pr).await?;
        let draft = ReviewDraft {
            commit_id,
            body,
            event: "COMMENT".to_string(),
            comments,
        };
        self.host.create_review(pr, &draft).await
    }
}

pub fn format_body(summary: &str) -> String {
    format!("{}\n\n{}", REVIEW_HEADING, summary.trim())
}

fn format_fallback_body(body: &str, reason: &str, result: &ReviewResult) -> String {
    let mut output = String::from(body);
    output.push_str("\n\n---\n\n");
    output.push_str(&format!(
        "_Line comments could not be posted as an inline review ({}). They are listed below instead._\n",
        reason
    ));
    for comment in result.line_comments() {
        output.push_str(&format!(
            "\n- `{}` line {}: {}",
            comment.path, comment.line, comment.body
        ));
    }
    output
}
