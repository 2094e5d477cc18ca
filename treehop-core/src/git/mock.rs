use super::{provider::GitProvider, repo::Worktree};
use anyhow::Result;
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

/// In-memory [`GitProvider`] for tests. Results default to success.
#[derive(Default)]
pub struct MockGitProvider {
    pub toplevel: Option<PathBuf>,
    pub common_dir: Option<PathBuf>,
    pub worktrees: Mutex<Vec<Worktree>>,
    pub branches: Vec<String>,
    pub invalid_branch_names: Vec<String>,
    pub add_worktree_result: Mutex<Option<Result<()>>>,
    pub add_worktree_calls: Mutex<Vec<(String, PathBuf, Option<String>, bool)>>,
    pub remove_worktree_result: Mutex<Option<Result<()>>>,
    pub remove_worktree_calls: Mutex<Vec<(PathBuf, bool)>>,
    /// Worktrees whose removal always fails, as git does for a dirty tree.
    pub remove_worktree_failures: Vec<PathBuf>,
}

impl MockGitProvider {
    pub fn with_worktrees(worktrees: Vec<Worktree>) -> Self {
        let toplevel = worktrees.first().map(|wt| wt.path.clone());
        Self {
            common_dir: toplevel.as_ref().map(|p| p.join(".git")),
            toplevel,
            worktrees: Mutex::new(worktrees),
            ..Self::default()
        }
    }
}

fn missing(what: &str) -> anyhow::Error {
    anyhow::anyhow!("mock has no {what} configured")
}

impl GitProvider for MockGitProvider {
    fn toplevel(&self, _cwd: &Path) -> Result<PathBuf> {
        self.toplevel.clone().ok_or_else(|| missing("toplevel"))
    }

    fn common_dir(&self, _cwd: &Path) -> Result<PathBuf> {
        self.common_dir.clone().ok_or_else(|| missing("common dir"))
    }

    fn list_worktrees(&self, _repo_path: &Path) -> Result<Vec<Worktree>> {
        Ok(self.worktrees.lock().unwrap().clone())
    }

    fn is_valid_branch_name(&self, _repo_path: &Path, name: &str) -> bool {
        !name.is_empty() && !self.invalid_branch_names.iter().any(|n| n == name)
    }

    fn branch_exists(&self, _repo_path: &Path, name: &str) -> bool {
        self.branches.iter().any(|b| b == name)
    }

    fn add_worktree(
        &self,
        _repo_path: &Path,
        branch: &str,
        worktree_path: &Path,
        base: Option<&str>,
        create_branch: bool,
    ) -> Result<()> {
        self.add_worktree_calls.lock().unwrap().push((
            branch.to_string(),
            worktree_path.to_path_buf(),
            base.map(String::from),
            create_branch,
        ));
        let result = self
            .add_worktree_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.worktrees.lock().unwrap().push(Worktree {
                path: worktree_path.to_path_buf(),
                branch: Some(branch.to_string()),
                head: None,
                is_main: false,
                detached: false,
                locked: false,
                prunable: false,
            });
        }
        result
    }

    fn remove_worktree(&self, _repo_path: &Path, worktree_path: &Path, force: bool) -> Result<()> {
        self.remove_worktree_calls
            .lock()
            .unwrap()
            .push((worktree_path.to_path_buf(), force));
        if self.remove_worktree_failures.iter().any(|p| p == worktree_path) {
            anyhow::bail!(
                "fatal: '{}' contains modified or untracked files",
                worktree_path.display()
            );
        }
        let result = self
            .remove_worktree_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.worktrees
                .lock()
                .unwrap()
                .retain(|wt| wt.path != worktree_path);
        }
        result
    }
}
