use crate::error::{Result, ReviewError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAMES: [&str; 2] = [".pr-reviewer.yml", ".pr-reviewer.yaml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,

    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub system_prompt: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub github_token: Option<String>,
    pub github_api_url: Option<String>,
    pub event_path: Option<PathBuf>,

    #[serde(default = "default_base_ref")]
    pub base_ref: String,

    #[serde(default = "default_max_file_diff_chars")]
    pub max_file_diff_chars: usize,

    #[serde(default = "default_true")]
    pub per_file_comments: bool,

    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            openai_api_key: None,
            openai_base_url: None,
            github_token: None,
            github_api_url: None,
            event_path: None,
            base_ref: default_base_ref(),
            max_file_diff_chars: default_max_file_diff_chars(),
            per_file_comments: true,
            request_timeout_secs: None,
        }
    }
}

/// Validated settings for a single run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub openai_api_key: String,
    pub github_token: Option<String>,
    pub event_path: Option<PathBuf>,
    pub base_ref: String,
    pub max_file_diff_chars: usize,
    pub per_file_comments: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."), dirs::home_dir().as_deref())
    }

    /// Reads the first config file found in `dir`, then in `home`. A missing
    /// file yields defaults; an unreadable or invalid one is an error.
    pub fn load_from(dir: &Path, home: Option<&Path>) -> Result<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        if let Some(home_dir) = home {
            let home_config = home_dir.join(CONFIG_FILE_NAMES[0]);
            if home_config.exists() {
                return Self::from_file(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| ReviewError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github_token = Some(token);
        }
        if let Some(url) = lookup("GITHUB_API_URL") {
            self.github_api_url = Some(url);
        }
        if let Some(path) = lookup("GITHUB_EVENT_PATH") {
            self.event_path = Some(PathBuf::from(path));
        }
        if let Some(model) = lookup("PR_REVIEWER_MODEL") {
            self.model = model;
        }
        if let Some(base_ref) = lookup("PR_REVIEWER_BASE_REF") {
            self.base_ref = base_ref;
        }
    }

    pub fn merge_with_cli(&mut self, cli_model: Option<String>, cli_base_ref: Option<String>) {
        if let Some(model) = cli_model {
            self.model = model;
        }
        if let Some(base_ref) = cli_base_ref {
            self.base_ref = base_ref;
        }
    }

    /// Checks that everything a run needs is present before any network call.
    ///
    /// `publish` requires the hosting token; `need_event` requires the event
    /// payload path (it can be skipped when the pull request is given on the
    /// command line).
    pub fn resolve(&self, publish: bool, need_event: bool) -> Result<RunConfig> {
        let openai_api_key = self
            .openai_api_key
            .clone()
            .ok_or_else(|| ReviewError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let github_token = self.github_token.clone();
        if publish && github_token.is_none() {
            return Err(ReviewError::Config("GITHUB_TOKEN is not set".to_string()));
        }

        if need_event && self.event_path.is_none() {
            return Err(ReviewError::Config(
                "GITHUB_EVENT_PATH is not set and no --pr/--repo was given".to_string(),
            ));
        }

        if self.base_ref.trim().is_empty() {
            return Err(ReviewError::Config("base_ref must not be empty".to_string()));
        }

        if self.max_file_diff_chars == 0 {
            return Err(ReviewError::Config(
                "max_file_diff_chars must be greater than zero".to_string(),
            ));
        }

        Ok(RunConfig {
            openai_api_key,
            github_token,
            event_path: self.event_path.clone(),
            base_ref: self.base_ref.clone(),
            max_file_diff_chars: self.max_file_diff_chars,
            per_file_comments: self.per_file_comments,
        })
    }
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_base_ref() -> String {
    "origin/master".to_string()
}

fn default_max_file_diff_chars() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}
