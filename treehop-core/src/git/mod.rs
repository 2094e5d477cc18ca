pub mod cli;
pub mod mock;
pub mod provider;
pub mod repo;

pub use cli::CliGitProvider;
pub use provider::GitProvider;
pub use repo::Worktree;

use std::path::PathBuf;

#[derive(Default)]
struct Entry {
    path: Option<PathBuf>,
    head: Option<String>,
    branch: Option<String>,
    detached: bool,
    locked: bool,
    prunable: bool,
}

impl Entry {
    fn finish(&mut self, is_main: bool) -> Option<Worktree> {
        let entry = std::mem::take(self);
        entry.path.map(|path| Worktree {
            path,
            branch: entry.branch,
            head: entry.head,
            is_main,
            detached: entry.detached,
            locked: entry.locked,
            prunable: entry.prunable,
        })
    }
}

/// Parse `git worktree list --porcelain` output into worktrees. The first
/// entry is always the main worktree.
pub fn parse_worktree_porcelain(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current = Entry::default();

    for line in output.lines() {
        if let Some(p) = line.strip_prefix("worktree ") {
            // A new record without a blank separator still starts fresh.
            if let Some(wt) = current.finish(worktrees.is_empty()) {
                worktrees.push(wt);
            }
            current.path = Some(PathBuf::from(p));
        } else if let Some(h) = line.strip_prefix("HEAD ") {
            current.head = Some(h.to_string());
        } else if let Some(b) = line.strip_prefix("branch ") {
            current.branch = Some(b.strip_prefix("refs/heads/").unwrap_or(b).to_string());
        } else if line == "detached" {
            current.detached = true;
        } else if line == "locked" || line.starts_with("locked ") {
            current.locked = true;
        } else if line == "prunable" || line.starts_with("prunable ") {
            current.prunable = true;
        } else if line.is_empty()
            && let Some(wt) = current.finish(worktrees.is_empty())
        {
            worktrees.push(wt);
        }
    }

    if let Some(wt) = current.finish(worktrees.is_empty()) {
        worktrees.push(wt);
    }

    worktrees
}
