use crate::core::comment::LineComment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Other,
}

impl ChangeStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "M" => ChangeStatus::Modified,
            "A" => ChangeStatus::Added,
            "D" => ChangeStatus::Deleted,
            _ => ChangeStatus::Other,
        }
    }

    /// Only added and modified files get line comments.
    pub fn is_reviewable(self) -> bool {
        matches!(self, ChangeStatus::Added | ChangeStatus::Modified)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: ChangeStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewResult {
    pub summary: String,
    pub file_comments: BTreeMap<String, Vec<LineComment>>,
}

impl ReviewResult {
    pub fn new(summary: String) -> Self {
        Self {
            summary,
            file_comments: BTreeMap::new(),
        }
    }

    pub fn line_comments(&self) -> impl Iterator<Item = &LineComment> {
        self.file_comments.values().flatten()
    }

    pub fn comment_count(&self) -> usize {
        self.file_comments.values().map(Vec::len).sum()
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("# Code Review\n\n");
        output.push_str(self.summary.trim());
        output.push('\n');

        if self.comment_count() > 0 {
            output.push_str("\n## Line Comments\n");
            for (path, comments) in &self.file_comments {
                if comments.is_empty() {
                    continue;
                }
                output.push_str(&format!("\n### `{}`\n\n", path));
                for comment in comments {
                    output.push_str(&format!("- **Line {}**: {}\n", comment.line, comment.body));
                }
            }
        }

        output
    }
}
