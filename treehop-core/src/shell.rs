//! Shell wrappers that turn the control line into a real `cd`.
//!
//! A child process cannot change its parent's working directory, so
//! `treehop shell-init <shell>` prints a function that shadows the binary,
//! hands it a temporary file on fd 3 and acts on the `cd` line it finds there.

use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub const ALL: [Shell; 3] = [Shell::Bash, Shell::Zsh, Shell::Fish];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
        }
    }

    pub fn init_script(self) -> &'static str {
        match self {
            Self::Bash | Self::Zsh => POSIX_WRAPPER,
            Self::Fish => FISH_WRAPPER,
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|shell| shell.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported shell '{s}' (expected bash, zsh or fish)"))
    }
}

const POSIX_WRAPPER: &str = r#"treehop() {
    local __treehop_ctl __treehop_status __treehop_line
    __treehop_ctl="$(mktemp "${TMPDIR:-/tmp}/treehop.XXXXXX")" || return 2
    TREEHOP_SHELL_INTEGRATION=1 command treehop "$@" 3>"$__treehop_ctl"
    __treehop_status=$?
    __treehop_line=""
    IFS= read -r __treehop_line <"$__treehop_ctl"
    command rm -f -- "$__treehop_ctl"
    case "$__treehop_line" in
        "cd "*) builtin cd -- "${__treehop_line#cd }" || return $? ;;
    esac
    return $__treehop_status
}
"#;

const FISH_WRAPPER: &str = r#"function treehop --wraps treehop
    set -l __treehop_tmp /tmp
    set -q TMPDIR; and set __treehop_tmp $TMPDIR
    set -l __treehop_ctl (mktemp "$__treehop_tmp/treehop.XXXXXX"); or return 2
    TREEHOP_SHELL_INTEGRATION=1 command treehop $argv 3>$__treehop_ctl
    set -l __treehop_status $status
    set -l __treehop_line ""
    read -l __treehop_line <$__treehop_ctl
    command rm -f -- $__treehop_ctl
    if string match -q 'cd *' -- "$__treehop_line"
        cd (string sub -s 4 -- "$__treehop_line"); or return $status
    end
    return $__treehop_status
end
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_shells() {
        assert_eq!("bash".parse::<Shell>(), Ok(Shell::Bash));
        assert_eq!("ZSH".parse::<Shell>(), Ok(Shell::Zsh));
        assert_eq!("fish".parse::<Shell>(), Ok(Shell::Fish));
        assert!("tcsh".parse::<Shell>().unwrap_err().contains("unsupported"));
    }

    #[test]
    fn scripts_request_integration_and_redirect_fd_3() {
        for shell in Shell::ALL {
            let script = shell.init_script();
            assert!(script.contains("TREEHOP_SHELL_INTEGRATION=1"), "{shell}");
            assert!(script.contains("command treehop"), "{shell}");
            assert!(script.contains("3>"), "{shell}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn posix_wrapper_changes_directory() {
        use std::process::Command;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("dest dir");
        std::fs::create_dir_all(&target).unwrap();
        let bin = tmp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        // Stand-in binary that behaves like treehop in shell mode.
        let fake = bin.join("treehop");
        std::fs::write(
            &fake,
            format!(
                "#!/bin/sh\n[ \"$TREEHOP_SHELL_INTEGRATION\" = 1 ] || exit 9\nprintf 'cd %s\\n' '{}' >&3\n",
                target.display()
            ),
        )
        .unwrap();
        let mut perms = std::fs::metadata(&fake).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&fake, perms).unwrap();

        let script = format!("{}treehop go x && pwd", Shell::Bash.init_script());
        let path = format!(
            "{}:{}",
            bin.display(),
            std::env::var("PATH").unwrap_or_default()
        );
        let output = Command::new("bash")
            .args(["-c", &script])
            .env("PATH", path)
            .output()
            .unwrap();
        assert!(output.status.success(), "{output:?}");
        let pwd = String::from_utf8(output.stdout).unwrap();
        assert_eq!(
            std::fs::canonicalize(pwd.trim_end()).unwrap(),
            std::fs::canonicalize(&target).unwrap()
        );
    }
}
