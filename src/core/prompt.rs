use crate::adapters::llm::LLMRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub review_template: String,
    pub file_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: r#"You are an expert code reviewer. You review pull request diffs for correctness, security, performance and maintainability, and you give concrete, actionable feedback."#.to_string(),
            review_template: r#"Review the following pull request diff. Give an overall assessment of the change, then list the most important problems and suggestions.

<diff>
{diff}
</diff>"#.to_string(),
            file_template: r#"Review the changes to the file `{path}` shown in the diff below.

<diff>
{diff}
</diff>

For every issue, write one line in exactly this format, where the number is the line in the new version of the file:
- **Line [number]**: [comment]

Example:
- **Line 42**: User input is passed straight into the SQL query. Use a parameterized query.

Only comment on lines that appear in the diff. If there is nothing to point out, answer with "No comments"."#.to_string(),
        }
    }
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn review_request(&self, diff: &str) -> LLMRequest {
        LLMRequest {
            system_prompt: self.config.system_prompt.clone(),
            user_prompt: self.config.review_template.replace("{diff}", diff),
        }
    }

    pub fn file_request(&self, path: &str, diff: &str) -> LLMRequest {
        // Substitute the path first so a diff containing "{path}" stays intact.
        let user_prompt = self
            .config
            .file_template
            .replace("{path}", path)
            .replace("{diff}", diff);
        LLMRequest {
            system_prompt: self.config.system_prompt.clone(),
            user_prompt,
        }
    }
}
