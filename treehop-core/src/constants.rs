use std::time::Duration;

pub const APP_NAME: &str = "treehop";

pub const WORKTREE_DIR_NAME: &str = ".treehop_worktrees";
pub const WORKTREE_NAME_SEPARATOR: &str = "--";
pub const WORKTREE_DIR_DEDUP_MAX_ATTEMPTS: usize = 1000;

/// Subdirectory of the git common dir holding treehop's own metadata.
pub const METADATA_DIR_NAME: &str = "treehop";
pub const LOCK_FILE_NAME: &str = "lock";

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOCK_STALE_AFTER: Duration = Duration::from_secs(600);
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);
/// An unparseable lock record younger than this may still be mid-write.
pub const LOCK_CORRUPT_GRACE: Duration = Duration::from_secs(2);

pub const ENV_SHELL_INTEGRATION: &str = "TREEHOP_SHELL_INTEGRATION";
pub const ENV_CONTROL_FD: &str = "TREEHOP_CONTROL_FD";
pub const DEFAULT_CONTROL_FD: i32 = 3;
pub const ENV_NO_COLOR: &str = "NO_COLOR";
pub const ENV_LOG_LEVEL: &str = "TREEHOP_LOG";

pub const ESCAPE_SEQUENCE_TIMEOUT: Duration = Duration::from_millis(50);
pub const DEFAULT_PROMPT_ATTEMPTS: usize = 3;
