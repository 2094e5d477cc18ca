use super::repo::Worktree;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub trait GitProvider: Send + Sync {
    /// Top level of the worktree containing `cwd`.
    fn toplevel(&self, cwd: &Path) -> Result<PathBuf>;
    /// The git directory shared by all worktrees of the repository.
    fn common_dir(&self, cwd: &Path) -> Result<PathBuf>;
    fn list_worktrees(&self, repo_path: &Path) -> Result<Vec<Worktree>>;
    fn is_valid_branch_name(&self, repo_path: &Path, name: &str) -> bool;
    fn branch_exists(&self, repo_path: &Path, name: &str) -> bool;
    /// Check out `branch` into `worktree_path`, creating the branch from
    /// `base` (or HEAD) when `create_branch` is set.
    fn add_worktree(
        &self,
        repo_path: &Path,
        branch: &str,
        worktree_path: &Path,
        base: Option<&str>,
        create_branch: bool,
    ) -> Result<()>;
    fn remove_worktree(&self, repo_path: &Path, worktree_path: &Path, force: bool) -> Result<()>;
}
