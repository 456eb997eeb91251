use crate::core::event::PullRequestRef;
use crate::core::publisher::{PullRequestHost, ReviewDraft};
use crate::error::{Result, ReviewError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.github.com";

pub struct GitHubClient {
    client: Client,
    token: String,
    api_url: String,
}

#[derive(Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    head: HeadRef,
}

#[derive(Deserialize)]
struct HeadRef {
    sha: String,
}

impl GitHubClient {
    pub fn new(token: String, api_url: Option<String>, timeout_secs: Option<u64>) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(ReviewError::Auth("GitHub token is empty".to_string()));
        }

        let api_url = api_url
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            token,
            api_url,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }

    fn repo_url(&self, pr: &PullRequestRef, tail: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, pr.repository, tail)
    }
}

async fn api_error(response: Response) -> ReviewError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ReviewError::Api { status, body }
}

#[async_trait]
impl PullRequestHost for GitHubClient {
    async fn head_sha(&self, pr: &PullRequestRef) -> Result<String> {
        let url = self.repo_url(pr, &format!("pulls/{}", pr.number));
        debug!("GET {}", url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let text = response.text().await?;
        let pull: PullRequestResponse = serde_json::from_str(&text)
            .map_err(|e| ReviewError::Parse(format!("pull request metadata: {}", e)))?;
        Ok(pull.head.sha)
    }

    async fn create_issue_comment(&self, pr: &PullRequestRef, body: &str) -> Result<()> {
        let url = self.repo_url(pr, &format!("issues/{}/comments", pr.number));
        debug!("POST {}", url);
        let response = self
            .authorized(self.client.post(&url))
            .json(&CreateCommentRequest { body })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    async fn create_review(&self, pr: &PullRequestRef, review: &ReviewDraft) -> Result<()> {
        let url = self.repo_url(pr, &format!("pulls/{}/reviews", pr.number));
        debug!("POST {} ({} comments)", url, review.comments.len());
        let response = self
            .authorized(self.client.post(&url))
            .json(review)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewError::Publish {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
