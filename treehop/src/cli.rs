use anyhow::Context as _;
use serde::Serialize;
use std::{
    fmt::Write as _,
    io,
    path::{Path, PathBuf},
};
use treehop_core::{
    Config, ControlMode, ControlWriter, GitProvider, LockError, NavigationResult, SelectableItem,
    SelectionMode, Shell, TerminalCapabilities, Worktree,
    config::ThemeConfig,
    paths::worktree_dir,
    with_repo_lock,
};
use treehop_tui::{MenuError, MenuOptions, MenuOutcome, Theme};

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone)]
pub struct CliError {
    message: String,
    code: u8,
    /// Where the shell should go even though the command failed.
    navigate: Option<PathBuf>,
}

impl CliError {
    fn new(message: impl Into<String>, code: u8) -> Self {
        Self {
            message: message.into(),
            code,
            navigate: None,
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(message, 1)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(message, 2)
    }

    pub fn nothing_to_select(message: impl Into<String>) -> Self {
        Self::new(message, 3)
    }

    pub fn lock_timeout(message: impl Into<String>) -> Self {
        Self::new(message, 4)
    }

    /// The user backed out. Exits quietly.
    pub fn cancelled() -> Self {
        Self::new(String::new(), 130)
    }

    #[must_use]
    pub fn with_navigation(mut self, target: PathBuf) -> Self {
        self.navigate = Some(target);
        self
    }

    pub fn take_navigation(&mut self) -> Option<PathBuf> {
        self.navigate.take()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> u8 {
        self.code
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(value: anyhow::Error) -> Self {
        Self::system(format!("{value:#}"))
    }
}

impl From<LockError> for CliError {
    fn from(value: LockError) -> Self {
        match value {
            LockError::Timeout { .. } => Self::lock_timeout(value.to_string()),
            LockError::Io { .. } => Self::system(value.to_string()),
        }
    }
}

impl From<MenuError> for CliError {
    fn from(value: MenuError) -> Self {
        match value {
            MenuError::NothingToSelect(_) => Self::nothing_to_select(value.to_string()),
            MenuError::InvalidInput(_) => Self::user(value.to_string()),
            MenuError::Io(_) => Self::system(value.to_string()),
        }
    }
}

pub fn print_error(error: &CliError) {
    if !error.message().is_empty() {
        eprintln!("error: {}", error.message());
    }
}

/// Asks the user to pick among worktrees.
pub trait Chooser {
    fn choose(
        &self,
        items: &[SelectableItem],
        options: &MenuOptions,
    ) -> Result<MenuOutcome, MenuError>;
}

/// Menu on the controlling terminal, or the numbered prompt when there is none.
pub struct TerminalChooser<'a> {
    pub caps: TerminalCapabilities,
    pub theme: &'a ThemeConfig,
}

impl Chooser for TerminalChooser<'_> {
    fn choose(
        &self,
        items: &[SelectableItem],
        options: &MenuOptions,
    ) -> Result<MenuOutcome, MenuError> {
        let theme = Theme::from_config(self.theme, &self.caps);
        treehop_tui::select(items, &self.caps, theme, options)
    }
}

/// Everything a command needs, resolved once in `main`.
pub struct Context<'a> {
    pub config: &'a Config,
    pub git: &'a dyn GitProvider,
    pub chooser: &'a dyn Chooser,
    /// Force the numbered prompt instead of the interactive menu.
    pub numbered: bool,
    pub cwd: PathBuf,
}

impl Context<'_> {
    fn menu_options(&self, prompt: &str, mode: SelectionMode) -> MenuOptions {
        MenuOptions {
            numbered: self.numbered,
            max_attempts: self.config.ui.max_attempts,
            ..MenuOptions::new(prompt, mode)
        }
    }

    fn repository(&self) -> CliResult<Repository> {
        let toplevel = self
            .git
            .toplevel(&self.cwd)
            .map_err(|e| CliError::user(format!("{e:#}")))?;
        let worktrees = self.git.list_worktrees(&toplevel)?;
        let main = worktrees
            .iter()
            .find(|wt| wt.is_main)
            .or_else(|| worktrees.first())
            .map(|wt| wt.path.clone())
            .ok_or_else(|| CliError::system("git reported no worktrees"))?;
        let current = current_worktree(&worktrees, &self.cwd);
        Ok(Repository {
            toplevel,
            main,
            worktrees,
            current,
        })
    }
}

struct Repository {
    toplevel: PathBuf,
    main: PathBuf,
    worktrees: Vec<Worktree>,
    /// Index of the worktree containing the working directory.
    current: Option<usize>,
}

impl Repository {
    fn find(&self, name: &str) -> Option<&Worktree> {
        self.worktrees
            .iter()
            .find(|wt| wt.branch.as_deref() == Some(name))
            .or_else(|| self.worktrees.iter().find(|wt| wt.matches(name)))
    }
}

/// The innermost worktree containing `cwd`, since worktrees may be nested in
/// the main checkout.
fn current_worktree(worktrees: &[Worktree], cwd: &Path) -> Option<usize> {
    worktrees
        .iter()
        .enumerate()
        .filter(|(_, wt)| wt.contains(cwd))
        .max_by_key(|(_, wt)| wt.path.components().count())
        .map(|(index, _)| index)
}

/// What a command leaves for `main` to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Navigate(PathBuf),
    PrintPath(PathBuf),
}

fn navigate_or_print(target: &Path, print_path: bool) -> Outcome {
    let target = dunce::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
    if print_path {
        Outcome::PrintPath(target)
    } else {
        Outcome::Navigate(target)
    }
}

/// Hand the outcome to the shell wrapper, or to the user when there is none.
pub fn deliver(outcome: Outcome) -> CliResult<()> {
    match outcome {
        Outcome::Done => {}
        Outcome::PrintPath(path) => println!("{}", path.display()),
        Outcome::Navigate(target) => {
            let mode = ControlMode::from_env();
            let mut writer = ControlWriter::for_mode(mode, io::stdout());
            let emission = writer
                .emit(&NavigationResult::Navigate { target })
                .map_err(|e| CliError::system(format!("failed to write navigation: {e}")))?;
            log::debug!("navigation delivered as {emission:?} ({mode:?})");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!(
        "{}",
        serde_json::to_string(value).map_err(|e| CliError::system(e.to_string()))?
    );
    Ok(())
}

#[derive(Debug, Serialize)]
#[allow(clippy::struct_excessive_bools)]
struct WorktreeOutput {
    name: String,
    branch: Option<String>,
    path: PathBuf,
    head: Option<String>,
    main: bool,
    current: bool,
    detached: bool,
    locked: bool,
    prunable: bool,
}

fn worktree_rows(repo: &Repository) -> Vec<WorktreeOutput> {
    repo.worktrees
        .iter()
        .enumerate()
        .map(|(index, wt)| WorktreeOutput {
            name: wt.display_name(),
            branch: wt.branch.clone(),
            path: wt.path.clone(),
            head: wt.head.clone(),
            main: wt.is_main,
            current: repo.current == Some(index),
            detached: wt.detached,
            locked: wt.locked,
            prunable: wt.prunable,
        })
        .collect()
}

fn format_worktree_table(rows: &[WorktreeOutput]) -> String {
    let name_header = "worktree";
    let path_header = "path";
    let name_width = rows
        .iter()
        .map(|row| row.name.len())
        .max()
        .unwrap_or(name_header.len())
        .max(name_header.len());

    let mut out = String::new();
    let _ = writeln!(out, "  {name_header:<name_width$}  {path_header}");
    for row in rows {
        let marker = if row.current { '*' } else { ' ' };
        let _ = write!(out, "{marker} {:<name_width$}  {}", row.name, row.path.display());
        if row.locked {
            out.push_str("  [locked]");
        }
        if row.prunable {
            out.push_str("  [prunable]");
        }
        out.push('\n');
    }
    out
}

pub fn cmd_list(ctx: &Context<'_>, json: bool) -> CliResult<Outcome> {
    let repo = ctx.repository()?;
    let rows = worktree_rows(&repo);
    if json {
        print_json(&rows)?;
    } else {
        print!("{}", format_worktree_table(&rows));
    }
    Ok(Outcome::Done)
}

pub fn cmd_go(ctx: &Context<'_>, name: Option<&str>, print_path: bool) -> CliResult<Outcome> {
    let repo = ctx.repository()?;

    let target = if let Some(name) = name {
        repo.find(name)
            .map(|wt| wt.path.clone())
            .ok_or_else(|| CliError::user(format!("no worktree named '{name}'")))?
    } else {
        let items: Vec<SelectableItem> = repo
            .worktrees
            .iter()
            .enumerate()
            .map(|(index, wt)| {
                let hint = if repo.current == Some(index) {
                    "(current)".to_string()
                } else {
                    wt.path.display().to_string()
                };
                SelectableItem::new(index, wt.display_name(), wt.path.to_string_lossy())
                    .with_hint(hint)
            })
            .collect();
        let options = ctx.menu_options("Switch to worktree", SelectionMode::Single);
        match ctx.chooser.choose(&items, &options)? {
            MenuOutcome::Selected(chosen) => {
                let index = chosen
                    .first()
                    .copied()
                    .ok_or_else(|| CliError::system("menu confirmed without a selection"))?;
                repo.worktrees[index].path.clone()
            }
            MenuOutcome::Cancelled => return Err(CliError::cancelled()),
        }
    };

    Ok(navigate_or_print(&target, print_path))
}

#[derive(Debug, Clone)]
pub struct AddArgs {
    pub branch: String,
    pub base: Option<String>,
    pub print_path: bool,
}

pub fn cmd_add(ctx: &Context<'_>, args: &AddArgs) -> CliResult<Outcome> {
    let repo = ctx.repository()?;
    let branch = args.branch.as_str();

    if !ctx.git.is_valid_branch_name(&repo.toplevel, branch) {
        return Err(CliError::user(format!("invalid branch name '{branch}'")));
    }
    if let Some(existing) = repo
        .worktrees
        .iter()
        .find(|wt| wt.branch.as_deref() == Some(branch))
    {
        if args.base.is_some() {
            return Err(CliError::user(format!(
                "branch '{branch}' is already checked out at {}",
                existing.path.display()
            )));
        }
        log::info!(
            "branch {branch} already has a worktree at {}",
            existing.path.display()
        );
        return Ok(navigate_or_print(&existing.path, args.print_path));
    }

    let common_dir = ctx.git.common_dir(&repo.toplevel)?;
    let root = ctx.config.resolved_worktree_dir();
    let holder = format!("add {branch}");

    let path = with_repo_lock(
        &common_dir,
        &holder,
        &ctx.config.lock_options(),
        || -> CliResult<PathBuf> {
            let create_branch = !ctx.git.branch_exists(&repo.toplevel, branch);
            if !create_branch && args.base.is_some() {
                return Err(CliError::user(format!(
                    "branch '{branch}' already exists; --base only applies to new branches"
                )));
            }
            let path = worktree_dir(&repo.main, root.as_deref(), branch)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            ctx.git.add_worktree(
                &repo.toplevel,
                branch,
                &path,
                args.base.as_deref(),
                create_branch,
            )?;
            Ok(path)
        },
    )?;

    Ok(navigate_or_print(&path, args.print_path))
}

pub fn cmd_remove(ctx: &Context<'_>, names: &[String], force: bool) -> CliResult<Outcome> {
    let repo = ctx.repository()?;

    let targets: Vec<&Worktree> = if names.is_empty() {
        let candidates: Vec<&Worktree> = repo.worktrees.iter().filter(|wt| !wt.is_main).collect();
        if candidates.is_empty() {
            return Err(CliError::nothing_to_select("no worktrees to remove"));
        }
        let items: Vec<SelectableItem> = candidates
            .iter()
            .enumerate()
            .map(|(ordinal, wt)| {
                let hint = if wt.locked {
                    format!("{} [locked]", wt.path.display())
                } else {
                    wt.path.display().to_string()
                };
                SelectableItem::new(ordinal, wt.display_name(), wt.path.to_string_lossy())
                    .with_hint(hint)
            })
            .collect();
        let options = ctx.menu_options("Remove worktrees", SelectionMode::Multi);
        match ctx.chooser.choose(&items, &options)? {
            MenuOutcome::Selected(chosen) => chosen.into_iter().map(|i| candidates[i]).collect(),
            MenuOutcome::Cancelled => return Err(CliError::cancelled()),
        }
    } else {
        let mut targets: Vec<&Worktree> = Vec::with_capacity(names.len());
        for name in names {
            let wt = repo
                .find(name)
                .ok_or_else(|| CliError::user(format!("no worktree named '{name}'")))?;
            if wt.is_main {
                return Err(CliError::user("cannot remove the main worktree"));
            }
            if !targets.iter().any(|t| t.path == wt.path) {
                targets.push(wt);
            }
        }
        targets
    };

    let common_dir = ctx.git.common_dir(&repo.toplevel)?;
    let mut removed: Vec<&Worktree> = Vec::with_capacity(targets.len());
    let result = with_repo_lock(
        &common_dir,
        "remove",
        &ctx.config.lock_options(),
        || -> CliResult<()> {
            for wt in &targets {
                ctx.git.remove_worktree(&repo.main, &wt.path, force)?;
                println!("removed: {} {}", wt.display_name(), wt.path.display());
                removed.push(*wt);
            }
            Ok(())
        },
    );

    // The shell may be standing in a directory that is gone, failure or not.
    let left_cwd = removed.iter().any(|wt| wt.contains(&ctx.cwd));
    match result {
        Ok(()) if left_cwd => Ok(Outcome::Navigate(repo.main)),
        Ok(()) => Ok(Outcome::Done),
        Err(error) if left_cwd => Err(error.with_navigation(repo.main)),
        Err(error) => Err(error),
    }
}

pub fn cmd_shell_init(shell: Shell) -> CliResult<Outcome> {
    print!("{}", shell.init_script());
    Ok(Outcome::Done)
}
