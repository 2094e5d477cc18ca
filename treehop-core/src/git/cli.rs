use super::{parse_worktree_porcelain, provider::GitProvider, repo::Worktree};
use crate::process::{CmdOutput, CommandRunner, SystemRunner};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// [`GitProvider`] backed by the `git` binary.
pub struct CliGitProvider<R = SystemRunner> {
    runner: R,
}

impl CliGitProvider {
    pub fn new() -> Self {
        Self {
            runner: SystemRunner,
        }
    }
}

impl Default for CliGitProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> CliGitProvider<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    fn git(&self, repo_path: &Path, args: &[&str]) -> Result<CmdOutput> {
        self.runner.run("git", args, Some(repo_path))
    }

    /// Run git and fail with its most relevant stderr line on a non-zero exit.
    fn git_ok(&self, repo_path: &Path, args: &[&str]) -> Result<String> {
        let output = self.git(repo_path, args)?;
        if !output.success() {
            let command = args[..2.min(args.len())].join(" ");
            anyhow::bail!("git {command} failed: {}", output.error_line());
        }
        Ok(output.stdout)
    }
}

impl<R: CommandRunner> GitProvider for CliGitProvider<R> {
    fn toplevel(&self, cwd: &Path) -> Result<PathBuf> {
        let stdout = self
            .git_ok(cwd, &["rev-parse", "--show-toplevel"])
            .with_context(|| format!("{} is not inside a git worktree", cwd.display()))?;
        Ok(PathBuf::from(stdout.trim_end_matches(['\n', '\r'])))
    }

    fn common_dir(&self, cwd: &Path) -> Result<PathBuf> {
        let stdout = self
            .git_ok(cwd, &["rev-parse", "--git-common-dir"])
            .with_context(|| format!("{} is not inside a git repository", cwd.display()))?;
        let dir = PathBuf::from(stdout.trim_end_matches(['\n', '\r']));
        // Older git prints this relative to the working directory.
        Ok(if dir.is_absolute() { dir } else { cwd.join(dir) })
    }

    fn list_worktrees(&self, repo_path: &Path) -> Result<Vec<Worktree>> {
        let stdout = self.git_ok(repo_path, &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_porcelain(&stdout))
    }

    fn is_valid_branch_name(&self, repo_path: &Path, name: &str) -> bool {
        if name.is_empty() || name.starts_with('-') {
            return false;
        }
        self.git(repo_path, &["check-ref-format", "--branch", name])
            .is_ok_and(|output| output.success())
    }

    fn branch_exists(&self, repo_path: &Path, name: &str) -> bool {
        let refname = format!("refs/heads/{name}");
        self.git(repo_path, &["show-ref", "--verify", "--quiet", &refname])
            .is_ok_and(|output| output.success())
    }

    fn add_worktree(
        &self,
        repo_path: &Path,
        branch: &str,
        worktree_path: &Path,
        base: Option<&str>,
        create_branch: bool,
    ) -> Result<()> {
        let path = worktree_path.to_string_lossy();
        let mut args = vec!["worktree", "add"];
        if create_branch {
            args.extend(["-b", branch, &*path]);
            args.extend(base);
        } else {
            args.extend([&*path, branch]);
        }
        self.git_ok(repo_path, &args)?;
        log::info!("added worktree {} for {branch}", worktree_path.display());
        Ok(())
    }

    fn remove_worktree(&self, repo_path: &Path, worktree_path: &Path, force: bool) -> Result<()> {
        let path = worktree_path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&*path);
        self.git_ok(repo_path, &args)?;
        log::info!("removed worktree {}", worktree_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, process::Command, sync::Mutex};

    fn git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {args:?} failed: {output:?}");
    }

    fn init_test_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(dir, &["config", "user.email", "test@test.com"]);
        git(dir, &["config", "user.name", "Test"]);
        fs::write(dir.join("README.md"), "# test").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "init"]);
    }

    fn repo() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let repo_dir = tmp.path().join("project");
        fs::create_dir_all(&repo_dir).unwrap();
        init_test_repo(&repo_dir);
        // git reports resolved paths; macOS temp dirs live behind a symlink.
        let repo_dir = fs::canonicalize(&repo_dir).unwrap();
        (tmp, repo_dir)
    }

    #[test]
    fn test_list_worktrees_of_fresh_repo() {
        let (_tmp, repo_dir) = repo();
        let wts = CliGitProvider::new().list_worktrees(&repo_dir).unwrap();
        assert_eq!(wts.len(), 1);
        assert!(wts[0].is_main);
        assert_eq!(wts[0].branch.as_deref(), Some("main"));
        assert_eq!(wts[0].path, repo_dir);
    }

    #[test]
    fn test_toplevel_and_common_dir() {
        let (_tmp, repo_dir) = repo();
        let sub = repo_dir.join("nested");
        fs::create_dir_all(&sub).unwrap();
        let provider = CliGitProvider::new();
        assert_eq!(provider.toplevel(&sub).unwrap(), repo_dir);
        let common = provider.common_dir(&sub).unwrap();
        assert_eq!(fs::canonicalize(&common).unwrap(), repo_dir.join(".git"));
    }

    #[test]
    fn test_not_a_repo() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CliGitProvider::new().toplevel(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("not inside a git worktree"));
    }

    #[test]
    fn test_add_and_remove_worktree() {
        let (tmp, repo_dir) = repo();
        let provider = CliGitProvider::new();
        let wt_path = tmp.path().join("project--feat");

        assert!(!provider.branch_exists(&repo_dir, "feat"));
        provider
            .add_worktree(&repo_dir, "feat", &wt_path, None, true)
            .unwrap();
        assert!(provider.branch_exists(&repo_dir, "feat"));

        let wts = provider.list_worktrees(&repo_dir).unwrap();
        assert_eq!(wts.len(), 2);
        assert_eq!(wts[1].branch.as_deref(), Some("feat"));

        // The worktree of an existing branch can be re-added after removal.
        provider.remove_worktree(&repo_dir, &wt_path, false).unwrap();
        assert_eq!(provider.list_worktrees(&repo_dir).unwrap().len(), 1);
        provider
            .add_worktree(&repo_dir, "feat", &wt_path, None, false)
            .unwrap();
        assert!(wt_path.join("README.md").exists());
    }

    #[test]
    fn test_add_worktree_failure_reports_git_error() {
        let (tmp, repo_dir) = repo();
        let err = CliGitProvider::new()
            .add_worktree(&repo_dir, "nope", &tmp.path().join("x"), None, false)
            .unwrap_err();
        assert!(err.to_string().contains("git worktree add failed"));
    }

    #[test]
    fn test_remove_dirty_worktree_needs_force() {
        let (tmp, repo_dir) = repo();
        let provider = CliGitProvider::new();
        let wt_path = tmp.path().join("dirty");
        provider
            .add_worktree(&repo_dir, "dirty", &wt_path, Some("main"), true)
            .unwrap();
        fs::write(wt_path.join("scratch.txt"), "wip").unwrap();
        assert!(provider.remove_worktree(&repo_dir, &wt_path, false).is_err());
        provider.remove_worktree(&repo_dir, &wt_path, true).unwrap();
        assert!(!wt_path.exists());
    }

    #[test]
    fn test_branch_name_validation() {
        let (_tmp, repo_dir) = repo();
        let provider = CliGitProvider::new();
        assert!(provider.is_valid_branch_name(&repo_dir, "feat/login"));
        assert!(!provider.is_valid_branch_name(&repo_dir, "bad..name"));
        assert!(!provider.is_valid_branch_name(&repo_dir, "with space"));
        assert!(!provider.is_valid_branch_name(&repo_dir, "-leading-dash"));
        assert!(!provider.is_valid_branch_name(&repo_dir, ""));
    }

    struct Recording {
        calls: Mutex<Vec<Vec<String>>>,
        output: CmdOutput,
    }

    impl CommandRunner for Recording {
        fn run(&self, program: &str, args: &[&str], _cwd: Option<&Path>) -> Result<CmdOutput> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().map(ToString::to_string));
            self.calls.lock().unwrap().push(call);
            Ok(self.output.clone())
        }
    }

    #[test]
    fn test_commands_are_built_through_the_runner() {
        let provider = CliGitProvider::with_runner(Recording {
            calls: Mutex::new(Vec::new()),
            output: CmdOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            },
        });
        provider
            .add_worktree(Path::new("/r"), "b", Path::new("/t/b"), Some("origin/main"), true)
            .unwrap();
        provider
            .remove_worktree(Path::new("/r"), Path::new("/t/b"), true)
            .unwrap();
        let calls = provider.runner.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            ["git", "worktree", "add", "-b", "b", "/t/b", "origin/main"]
        );
        assert_eq!(calls[1], ["git", "worktree", "remove", "--force", "/t/b"]);
    }
}
