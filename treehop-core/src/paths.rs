use crate::constants::{
    WORKTREE_DIR_DEDUP_MAX_ATTEMPTS, WORKTREE_DIR_NAME, WORKTREE_NAME_SEPARATOR,
};
use std::path::{Path, PathBuf};

/// Expand a leading `~` to the user's home directory.
///
/// Returns `None` when the path starts with `~` but the home directory
/// cannot be determined. Other paths are returned as-is.
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if path == "~" {
        dirs::home_dir()
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}

/// Directory name of the repository's main worktree, used to namespace
/// worktree directories.
pub fn repo_name(main_worktree: &Path) -> String {
    main_worktree
        .file_name()
        .map_or_else(|| "repo".to_string(), |n| n.to_string_lossy().into_owned())
}

/// Pick a fresh directory for a new worktree of `branch`.
///
/// `root` overrides the default `<parent of main worktree>/.treehop_worktrees`.
/// Collisions get a numeric suffix.
pub fn worktree_dir(
    main_worktree: &Path,
    root: Option<&Path>,
    branch: &str,
) -> anyhow::Result<PathBuf> {
    let worktree_root = match root {
        Some(root) => root.to_path_buf(),
        None => main_worktree
            .parent()
            .unwrap_or(main_worktree)
            .join(WORKTREE_DIR_NAME),
    };
    let safe_branch = branch.replace(['/', '\\'], "-");
    let base = format!(
        "{}{WORKTREE_NAME_SEPARATOR}{safe_branch}",
        repo_name(main_worktree)
    );
    let candidate = worktree_root.join(&base);
    if !candidate.exists() {
        return Ok(candidate);
    }
    for i in 2..WORKTREE_DIR_DEDUP_MAX_ATTEMPTS {
        let candidate = worktree_root.join(format!("{base}-{i}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    anyhow::bail!(
        "Could not find an available worktree directory name after {WORKTREE_DIR_DEDUP_MAX_ATTEMPTS} attempts"
    )
}
