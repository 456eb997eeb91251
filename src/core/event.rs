use crate::error::{Result, ReviewError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// The pull request a run reviews and publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub repository: String,
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

#[derive(Deserialize)]
struct EventPayload {
    number: Option<u64>,
    pull_request: Option<PullRequestPayload>,
    repository: Option<RepositoryPayload>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
}

#[derive(Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

impl PullRequestRef {
    pub fn new(number: u64, repository: impl Into<String>) -> Result<Self> {
        let repository = repository.into();
        let valid = repository
            .split_once('/')
            .map_or(false, |(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            });
        if !valid {
            return Err(ReviewError::Config(format!(
                "repository must be \"owner/name\", got {:?}",
                repository
            )));
        }
        if number == 0 {
            return Err(ReviewError::Config("pull request number must be positive".to_string()));
        }
        Ok(Self { number, repository })
    }

    pub fn from_event_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReviewError::Config(format!("cannot read event file {}: {}", path.display(), e))
        })?;
        Self::from_event_json(&content)
    }

    pub fn from_event_json(content: &str) -> Result<Self> {
        let payload: EventPayload = serde_json::from_str(content)
            .map_err(|e| ReviewError::Config(format!("invalid event payload: {}", e)))?;

        let number = payload
            .pull_request
            .map(|pr| pr.number)
            .or(payload.number)
            .ok_or_else(|| {
                ReviewError::Config("event payload has no pull request number".to_string())
            })?;
        let repository = payload
            .repository
            .map(|repo| repo.full_name)
            .ok_or_else(|| {
                ReviewError::Config("event payload has no repository full_name".to_string())
            })?;

        Self::new(number, repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_pull_request_event() {
        let json = r#"{
            "action": "opened",
            "number": 17,
            "pull_request": {"number": 17, "head": {"sha": "abc"}},
            "repository": {"full_name": "octo/widgets"}
        }"#;
        let pr = PullRequestRef::from_event_json(json).unwrap();
        assert_eq!(pr.number, 17);
        assert_eq!(pr.repository, "octo/widgets");
        assert_eq!(pr.to_string(), "octo/widgets#17");
    }

    #[test]
    fn falls_back_to_top_level_number() {
        let json = r#"{"number": 4, "repository": {"full_name": "a/b"}}"#;
        assert_eq!(PullRequestRef::from_event_json(json).unwrap().number, 4);
    }

    #[test]
    fn missing_fields_are_config_errors() {
        let no_number = r#"{"repository": {"full_name": "a/b"}}"#;
        let no_repo = r#"{"number": 3}"#;
        assert!(matches!(
            PullRequestRef::from_event_json(no_number),
            Err(ReviewError::Config(_))
        ));
        assert!(matches!(
            PullRequestRef::from_event_json(no_repo),
            Err(ReviewError::Config(_))
        ));
    }

    #[test]
    fn rejects_malformed_repository_names() {
        assert!(PullRequestRef::new(1, "no-slash").is_err());
        assert!(PullRequestRef::new(1, "a/b/c").is_err());
        assert!(PullRequestRef::new(0, "a/b").is_err());
    }

    #[test]
    fn reads_event_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pull_request": {{"number": 99}}, "repository": {{"full_name": "org/repo"}}}}"#
        )
        .unwrap();

        let pr = PullRequestRef::from_event_file(file.path()).unwrap();
        assert_eq!(pr, PullRequestRef::new(99, "org/repo").unwrap());
    }

    #[test]
    fn missing_event_file_is_a_config_error() {
        let err = PullRequestRef::from_event_file(Path::new("/nonexistent/event.json"));
        assert!(matches!(err, Err(ReviewError::Config(_))));
    }
}
