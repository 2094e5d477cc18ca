mod cli;
mod logging;

use clap::{Parser, Subcommand};
use cli::{AddArgs, CliError, Context, TerminalChooser};
use std::{path::PathBuf, process::ExitCode};
use treehop_core::{
    ProbeFlags, Shell, TerminalCapabilities, config,
    git::{CliGitProvider, GitProvider},
};

#[derive(Parser)]
#[command(version, about = "Jump between git worktrees from your shell")]
struct Cli {
    /// Override path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Never draw the interactive menu; use the numbered prompt
    #[arg(long, global = true)]
    no_interactive: bool,

    /// Use the numbered prompt even on a capable terminal
    #[arg(long, global = true)]
    numbered: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List worktrees of the current repository
    List {
        #[arg(long)]
        json: bool,
    },
    /// Change directory to a worktree
    Go {
        /// Branch or directory name; omit to pick from a menu
        name: Option<String>,
        /// Print the path instead of changing directory
        #[arg(long)]
        print_path: bool,
    },
    /// Create a worktree for a branch and change directory to it
    Add {
        branch: String,
        /// Start a new branch from this revision
        #[arg(long)]
        base: Option<String>,
        /// Print the path instead of changing directory
        #[arg(long)]
        print_path: bool,
    },
    /// Remove worktrees
    Remove {
        /// Branch or directory names; omit to pick from a menu
        names: Vec<String>,
        #[arg(long)]
        force: bool,
    },
    /// Print the shell function that enables directory changes
    ShellInit { shell: Shell },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The log file is a debugging aid; running without it is fine.
    let _ = logging::setup_logging(logging::level_from_env());

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            cli::print_error(&CliError::system(format!("{error:#}")));
            return ExitCode::from(2);
        }
    };

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::debug!("exiting with {}: {}", error.code(), error.message());
            cli::print_error(&error);
            ExitCode::from(error.code())
        }
    }
}

fn run(cli: Cli, config: &config::Config) -> cli::CliResult<()> {
    if let Commands::ShellInit { shell } = cli.command {
        return cli::cmd_shell_init(shell).and_then(cli::deliver);
    }

    let caps = TerminalCapabilities::probe(ProbeFlags {
        force_non_interactive: cli.no_interactive,
        disable_color: cli.no_color,
    });
    log::debug!("terminal capabilities: {caps:?}");

    let cwd = std::env::current_dir()
        .map_err(|e| CliError::system(format!("cannot read the current directory: {e}")))?;
    let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);

    let git = CliGitProvider::new();
    let chooser = TerminalChooser {
        caps,
        theme: &config.theme,
    };
    let ctx = Context {
        config,
        git: &git as &dyn GitProvider,
        chooser: &chooser,
        numbered: cli.numbered || config.ui.numbered,
        cwd,
    };

    let result = match cli.command {
        Commands::List { json } => cli::cmd_list(&ctx, json),
        Commands::Go { name, print_path } => cli::cmd_go(&ctx, name.as_deref(), print_path),
        Commands::Add {
            branch,
            base,
            print_path,
        } => cli::cmd_add(
            &ctx,
            &AddArgs {
                branch,
                base,
                print_path,
            },
        ),
        Commands::Remove { names, force } => cli::cmd_remove(&ctx, &names, force),
        Commands::ShellInit { shell } => cli::cmd_shell_init(shell),
    };
    match result {
        Ok(outcome) => cli::deliver(outcome),
        Err(mut error) => {
            let delivered = error
                .take_navigation()
                .map(|target| cli::deliver(cli::Outcome::Navigate(target)));
            if let Some(Err(e)) = delivered {
                log::warn!("could not deliver navigation after failure: {e}");
            }
            Err(error)
        }
    }
}
