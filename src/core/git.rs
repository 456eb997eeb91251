use crate::core::review::{ChangeStatus, FileChange};
use crate::error::{Result, ReviewError};
use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Source of the diffs under review.
pub trait DiffSource {
    fn whole_diff(&self, base_ref: &str) -> Result<String>;
    fn changed_files(&self, base_ref: &str) -> Result<Vec<FileChange>>;
    fn file_diff(&self, base_ref: &str, path: &str) -> Result<String>;
}

/// Runs the `git` executable inside a discovered work tree.
pub struct GitCli {
    repo: Repository,
    workdir: PathBuf,
}

impl GitCli {
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| ReviewError::Vcs(format!("failed to find git repository: {}", e)))?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| ReviewError::Vcs("repository has no work tree".to_string()))?;
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| ReviewError::Vcs(e.to_string()))?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    pub fn remote_url(&self) -> Result<Option<String>> {
        let remote = self
            .repo
            .find_remote("origin")
            .map_err(|e| ReviewError::Vcs(e.to_string()))?;
        Ok(remote.url().map(|s| s.to_string()))
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        debug!("Running git {}", args.join(" "));
        let output = Command::new("git")
            .args(GLOBAL_ARGS)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| ReviewError::Vcs(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReviewError::Vcs(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// Unquoted non-ASCII paths in diff headers; pathspecs match file names verbatim.
const GLOBAL_ARGS: &[&str] = &["-c", "core.quotePath=false", "--literal-pathspecs"];

impl DiffSource for GitCli {
    fn whole_diff(&self, base_ref: &str) -> Result<String> {
        check_ref(base_ref)?;
        self.run(&["diff", base_ref])
    }

    fn changed_files(&self, base_ref: &str) -> Result<Vec<FileChange>> {
        check_ref(base_ref)?;
        let output = self.run(&["diff", "--name-status", "-z", base_ref])?;
        Ok(parse_name_status(&output))
    }

    fn file_diff(&self, base_ref: &str, path: &str) -> Result<String> {
        check_ref(base_ref)?;
        self.run(&["diff", base_ref, "--", path])
    }
}

/// Refs starting with `-` would be read as options by git.
fn check_ref(base_ref: &str) -> Result<()> {
    if base_ref.is_empty() || base_ref.starts_with('-') {
        return Err(ReviewError::Vcs(format!("invalid base ref: {:?}", base_ref)));
    }
    Ok(())
}

/// Parses `git diff --name-status -z` output, dropping deleted files.
///
/// Records are NUL-separated: a status code followed by one path, or by the
/// old and new paths for renames and copies.
pub fn parse_name_status(output: &str) -> Vec<FileChange> {
    let mut fields = output.split('\0');
    let mut changes = Vec::new();

    while let Some(code) = fields.next() {
        if code.is_empty() {
            continue;
        }
        let path = if code.starts_with('R') || code.starts_with('C') {
            fields.next();
            fields.next()
        } else {
            fields.next()
        };
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            break;
        };

        let status = ChangeStatus::from_code(code);
        if status != ChangeStatus::Deleted {
            changes.push(FileChange {
                path: path.to_string(),
                status,
            });
        }
    }

    changes
}
