pub mod capabilities;
pub mod config;
pub mod constants;
pub mod control;
pub mod git;
pub mod key;
pub mod lock;
pub mod paths;
pub mod process;
pub mod selection;
pub mod shell;

// Re-export commonly used types at crate root
pub use capabilities::{ProbeFlags, TerminalCapabilities};
pub use config::Config;
pub use control::{ControlMode, ControlWriter, NavigationResult};
pub use git::{GitProvider, Worktree};
pub use key::{Input, InputSource, KeyDecoder, KeyEvent};
pub use lock::{LockError, LockOptions, RepoLock, with_repo_lock};
pub use selection::{SelectableItem, SelectionMode, SelectionState, SelectionStatus};
pub use shell::Shell;
