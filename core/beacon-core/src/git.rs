//! Git branch lookup for session records.

use std::path::Path;
use std::process::Command;

/// Branch name reported when the directory is not a repo, HEAD is detached,
/// or git is unavailable.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Current branch of the repository containing `dir`.
pub fn current_branch(dir: &Path) -> String {
    let output = Command::new("git")
        .args(["branch", "--show-current"])
        .current_dir(dir)
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if branch.is_empty() {
                UNKNOWN_BRANCH.to_string()
            } else {
                branch
            }
        }
        Ok(output) => {
            tracing::debug!(dir = %dir.display(), status = %output.status, "git branch lookup failed");
            UNKNOWN_BRANCH.to_string()
        }
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "git not runnable");
            UNKNOWN_BRANCH.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_not_a_repo_is_unknown() {
        let temp = tempdir().unwrap();
        assert_eq!(current_branch(temp.path()), UNKNOWN_BRANCH);
    }

    #[test]
    fn test_missing_dir_is_unknown() {
        assert_eq!(
            current_branch(Path::new("/this/path/does/not/exist/at/all")),
            UNKNOWN_BRANCH
        );
    }

    #[test]
    fn test_fresh_repo_reports_branch() {
        let temp = tempdir().unwrap();
        let init = Command::new("git")
            .args(["init", "-q", "-b", "trunk"])
            .current_dir(temp.path())
            .status();
        // Skip when git is unavailable or too old for `-b`.
        if !matches!(init, Ok(status) if status.success()) {
            return;
        }
        assert_eq!(current_branch(temp.path()), "trunk");
    }
}
