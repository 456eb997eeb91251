use crate::adapters::llm::LLMAdapter;
use crate::config::RunConfig;
use crate::core::comment::{CommentExtractor, LineComment};
use crate::core::event::PullRequestRef;
use crate::core::git::DiffSource;
use crate::core::prompt::PromptBuilder;
use crate::core::publisher::{PublishOutcome, PullRequestHost, ReviewPublisher};
use crate::core::review::{FileChange, ReviewResult};
use crate::error::Result;
use tracing::{debug, info, warn};

pub struct Orchestrator<'a> {
    config: RunConfig,
    diffs: &'a dyn DiffSource,
    llm: &'a dyn LLMAdapter,
    prompts: PromptBuilder,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: RunConfig,
        diffs: &'a dyn DiffSource,
        llm: &'a dyn LLMAdapter,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            config,
            diffs,
            llm,
            prompts,
        }
    }

    /// Builds the review without publishing it. `None` means there is nothing
    /// to review.
    pub async fn review(&self) -> Result<Option<ReviewResult>> {
        let base_ref = &self.config.base_ref;
        let diff = self.diffs.whole_diff(base_ref)?;
        if diff.trim().is_empty() {
            info!("No changes against {}", base_ref);
            return Ok(None);
        }

        let changes = if self.config.per_file_comments {
            self.diffs.changed_files(base_ref)?
        } else {
            Vec::new()
        };
        info!("{} changed files against {}", changes.len(), base_ref);

        info!("Requesting overall review from {}", self.llm.model_name());
        let response = self.llm.complete(self.prompts.review_request(&diff)).await?;
        if let Some(usage) = &response.usage {
            debug!(
                "Overall review used {} tokens ({} prompt, {} completion)",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }
        let mut result = ReviewResult::new(response.content);

        for change in changes.iter().filter(|c| c.status.is_reviewable()) {
            match self.review_file(change).await {
                Ok(Some(comments)) => {
                    info!("{}: {} line comments", change.path, comments.len());
                    result.file_comments.insert(change.path.clone(), comments);
                }
                Ok(None) => {}
                Err(err) => warn!("Skipping {}: {}", change.path, err),
            }
        }

        Ok(Some(result))
    }

    async fn review_file(&self, change: &FileChange) -> Result<Option<Vec<LineComment>>> {
        let diff = self.diffs.file_diff(&self.config.base_ref, &change.path)?;
        if diff.trim().is_empty() {
            debug!("{}: no textual changes", change.path);
            return Ok(None);
        }

        let size = diff.chars().count();
        if size > self.config.max_file_diff_chars {
            info!(
                "{}: diff is {} characters (limit {}), skipping",
                change.path, size, self.config.max_file_diff_chars
            );
            return Ok(None);
        }

        let response = self
            .llm
            .complete(self.prompts.file_request(&change.path, &diff))
            .await?;
        let comments = CommentExtractor::extract(&response.content)
            .into_iter()
            .map(|c| c.into_line_comment(&change.path))
            .collect();
        Ok(Some(comments))
    }

    pub async fn publish(
        &self,
        host: &dyn PullRequestHost,
        pr: &PullRequestRef,
        result: &ReviewResult,
    ) -> Result<PublishOutcome> {
        ReviewPublisher::new(host).publish(pr, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::{LLMRequest, LLMResponse};
    use crate::core::prompt::PromptConfig;
    use crate::core::publisher::tests::{HostCall, RecordingHost};
    use crate::core::review::ChangeStatus;
    use crate::error::ReviewError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeDiffs {
        whole: String,
        files: Vec<FileChange>,
        per_file: HashMap<String, String>,
    }

    impl DiffSource for FakeDiffs {
        fn whole_diff(&self, _base_ref: &str) -> Result<String> {
            Ok(self.whole.clone())
        }

        fn changed_files(&self, _base_ref: &str) -> Result<Vec<FileChange>> {
            Ok(self.files.clone())
        }

        fn file_diff(&self, _base_ref: &str, path: &str) -> Result<String> {
            self.per_file
                .get(path)
                .cloned()
                .ok_or_else(|| ReviewError::Vcs(format!("unknown path {}", path)))
        }
    }

    /// Answers file prompts by path; the overall prompt gets `summary`.
    struct FakeLlm {
        summary: String,
        by_path: HashMap<String, String>,
        failing_paths: Vec<String>,
        fail_overall: bool,
        requests: Mutex<Vec<LLMRequest>>,
    }

    impl FakeLlm {
        fn new(summary: &str) -> Self {
            Self {
                summary: summary.to_string(),
                by_path: HashMap::new(),
                failing_paths: Vec::new(),
                fail_overall: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests_mentioning(&self, path: &str) -> usize {
            let needle = format!("`{}`", path);
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_prompt.contains(&needle))
                .count()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LLMAdapter for FakeLlm {
        async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());

            let path = self
                .by_path
                .keys()
                .chain(self.failing_paths.iter())
                .find(|p| request.user_prompt.contains(&format!("`{}`", p)))
                .cloned();

            let content = match path {
                Some(p) if self.failing_paths.contains(&p) => {
                    return Err(ReviewError::Api {
                        status: 500,
                        body: "upstream".to_string(),
                    })
                }
                Some(p) => self.by_path[&p].clone(),
                None if self.fail_overall => {
                    return Err(ReviewError::Api {
                        status: 401,
                        body: "bad key".to_string(),
                    })
                }
                None => self.summary.clone(),
            };

            Ok(LLMResponse {
                content,
                model: "fake".to_string(),
                usage: None,
            })
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn run_config() -> RunConfig {
        RunConfig {
            openai_api_key: "sk".to_string(),
            github_token: Some("gh".to_string()),
            event_path: None,
            base_ref: "origin/master".to_string(),
            max_file_diff_chars: 10_000,
            per_file_comments: true,
        }
    }

    fn modified(path: &str) -> FileChange {
        FileChange {
            path: path.to_string(),
            status: ChangeStatus::Modified,
        }
    }

    fn prompts() -> PromptBuilder {
        PromptBuilder::new(PromptConfig::default())
    }

    #[tokio::test]
    async fn end_to_end_posts_review_with_line_comments() {
        let diffs = FakeDiffs {
            whole: "diff --git a/app.py b/app.py\n+x = 1\n".to_string(),
            files: vec![modified("app.py")],
            per_file: HashMap::from([("app.py".to_string(), "+x = 1\n".to_string())]),
        };
        let mut llm = FakeLlm::new("Looks reasonable overall.");
        llm.by_path.insert(
            "app.py".to_string(),
            "Findings:\n- **Line 3**: unused variable\nnoise\n- **Line 10**: missing test".to_string(),
        );
        let host = RecordingHost::default();
        let pr = PullRequestRef::new(8, "octo/widgets").unwrap();

        let orchestrator = Orchestrator::new(run_config(), &diffs, &llm, prompts());
        let result = orchestrator.review().await.unwrap().unwrap();
        let outcome = orchestrator.publish(&host, &pr, &result).await.unwrap();

        assert_eq!(outcome, PublishOutcome::Review { comments: 2 });
        let review = host
            .calls()
            .into_iter()
            .find_map(|c| match c {
                HostCall::Review(draft) => Some(draft),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            review.body,
            "## Automated code review\n\nLooks reasonable overall."
        );
        let anchors: Vec<(&str, u32)> = review
            .comments
            .iter()
            .map(|c| (c.path.as_str(), c.line))
            .collect();
        assert_eq!(anchors, vec![("app.py", 3), ("app.py", 10)]);
    }

    #[tokio::test]
    async fn oversized_file_diff_is_never_sent() {
        let big = "+".repeat(10_001);
        let diffs = FakeDiffs {
            whole: "diff".to_string(),
            files: vec![modified("big.rs"), modified("small.rs")],
            per_file: HashMap::from([
                ("big.rs".to_string(), big),
                ("small.rs".to_string(), "+fn a() {}".to_string()),
            ]),
        };
        let mut llm = FakeLlm::new("summary");
        llm.by_path
            .insert("small.rs".to_string(), "Line 1: ok".to_string());

        let result = Orchestrator::new(run_config(), &diffs, &llm, prompts())
            .review()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(llm.requests_mentioning("big.rs"), 0);
        assert_eq!(llm.requests_mentioning("small.rs"), 1);
        assert!(!result.file_comments.contains_key("big.rs"));
        assert_eq!(result.comment_count(), 1);
    }

    #[tokio::test]
    async fn per_file_failures_are_skipped() {
        let diffs = FakeDiffs {
            whole: "diff".to_string(),
            files: vec![modified("bad.py"), modified("good.py"), modified("gone.py")],
            per_file: HashMap::from([
                ("bad.py".to_string(), "+a".to_string()),
                ("good.py".to_string(), "+b".to_string()),
            ]),
        };
        let mut llm = FakeLlm::new("summary");
        llm.failing_paths.push("bad.py".to_string());
        llm.by_path
            .insert("good.py".to_string(), "Línea 2: bien".to_string());

        let result = Orchestrator::new(run_config(), &diffs, &llm, prompts())
            .review()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.summary, "summary");
        assert_eq!(
            result.file_comments.keys().collect::<Vec<_>>(),
            vec!["good.py"]
        );
        assert!(result
            .line_comments()
            .all(|c| diffs.files.iter().any(|f| f.path == c.path)));
    }

    #[tokio::test]
    async fn overall_review_failure_is_fatal() {
        let diffs = FakeDiffs {
            whole: "diff".to_string(),
            files: vec![modified("a.py")],
            per_file: HashMap::new(),
        };
        let mut llm = FakeLlm::new("unused");
        llm.fail_overall = true;

        let err = Orchestrator::new(run_config(), &diffs, &llm, prompts())
            .review()
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn empty_diff_makes_no_model_calls() {
        let diffs = FakeDiffs {
            whole: "\n".to_string(),
            files: Vec::new(),
            per_file: HashMap::new(),
        };
        let llm = FakeLlm::new("unused");

        let result = Orchestrator::new(run_config(), &diffs, &llm, prompts())
            .review()
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(llm.request_count(), 0);
    }

    #[tokio::test]
    async fn non_reviewable_changes_are_not_analysed() {
        let diffs = FakeDiffs {
            whole: "diff".to_string(),
            files: vec![FileChange {
                path: "renamed.py".to_string(),
                status: ChangeStatus::Other,
            }],
            per_file: HashMap::new(),
        };
        let llm = FakeLlm::new("summary");

        let result = Orchestrator::new(run_config(), &diffs, &llm, prompts())
            .review()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(llm.request_count(), 1);
        assert_eq!(result.comment_count(), 0);
    }

    #[tokio::test]
    async fn summary_only_mode_skips_per_file_requests() {
        let diffs = FakeDiffs {
            whole: "diff".to_string(),
            files: vec![modified("a.py")],
            per_file: HashMap::from([("a.py".to_string(), "+a".to_string())]),
        };
        let llm = FakeLlm::new("summary");
        let config = RunConfig {
            per_file_comments: false,
            ..run_config()
        };

        let result = Orchestrator::new(config, &diffs, &llm, prompts())
            .review()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(llm.request_count(), 1);
        assert!(result.file_comments.is_empty());
    }
}
