use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Worktree {
    pub path: PathBuf,
    /// Short branch name; `None` when detached or on an unborn HEAD with no ref line.
    pub branch: Option<String>,
    pub head: Option<String>,
    pub is_main: bool,
    pub detached: bool,
    pub locked: bool,
    pub prunable: bool,
}

impl Worktree {
    /// Branch name, or the abbreviated commit for a detached worktree.
    pub fn display_name(&self) -> String {
        match (&self.branch, &self.head) {
            (Some(branch), _) => branch.clone(),
            (None, Some(head)) => format!("({})", head.chars().take(7).collect::<String>()),
            (None, None) => "(detached)".to_string(),
        }
    }

    pub fn dir_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }

    /// Whether `name` refers to this worktree by branch or directory name.
    pub fn matches(&self, name: &str) -> bool {
        self.branch.as_deref() == Some(name) || self.dir_name() == name
    }

    pub fn contains(&self, dir: &Path) -> bool {
        dir.starts_with(&self.path)
    }
}
