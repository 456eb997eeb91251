pub mod comment;
pub mod event;
pub mod git;
pub mod orchestrator;
pub mod prompt;
pub mod publisher;
pub mod review;

pub use event::PullRequestRef;
pub use git::GitCli;
pub use orchestrator::Orchestrator;
pub use prompt::{PromptBuilder, PromptConfig};
pub use publisher::PublishOutcome;
pub use review::ReviewResult;
