use crate::constants::ENV_NO_COLOR;
use std::io::IsTerminal;

/// What the attached terminal can do for this invocation.
///
/// Computed once up front and passed by reference everywhere else; there is
/// no way to change a capability after probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    interactive: bool,
    color: bool,
    utf8: bool,
}

/// Flags parsed upstream by the CLI that narrow what the probe may report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeFlags {
    pub force_non_interactive: bool,
    pub disable_color: bool,
}

/// Raw observations the probe decides from. Split out so the decision is a
/// plain function that tests can drive without a terminal.
#[derive(Debug, Clone, Default)]
pub struct ProbeInputs {
    pub stdin_is_tty: bool,
    pub display_is_tty: bool,
    pub term: Option<String>,
    pub no_color: Option<String>,
    pub locale: Option<String>,
}

impl ProbeInputs {
    pub fn from_process() -> Self {
        Self {
            stdin_is_tty: std::io::stdin().is_terminal(),
            display_is_tty: std::io::stderr().is_terminal(),
            term: std::env::var("TERM").ok(),
            no_color: std::env::var(ENV_NO_COLOR).ok(),
            locale: ["LC_ALL", "LC_CTYPE", "LANG"]
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .find(|value| !value.is_empty()),
        }
    }
}

impl TerminalCapabilities {
    /// Non-interactive, no color, ASCII only.
    pub const CONSERVATIVE: Self = Self {
        interactive: false,
        color: false,
        utf8: false,
    };

    pub fn probe(flags: ProbeFlags) -> Self {
        Self::from_inputs(&ProbeInputs::from_process(), flags)
    }

    pub fn from_inputs(inputs: &ProbeInputs, flags: ProbeFlags) -> Self {
        if flags.force_non_interactive {
            return Self::CONSERVATIVE;
        }

        let dumb = inputs
            .term
            .as_deref()
            .is_some_and(|term| term.eq_ignore_ascii_case("dumb"));
        let interactive = inputs.stdin_is_tty && inputs.display_is_tty && !dumb;
        let no_color = flags.disable_color
            || inputs.no_color.as_deref().is_some_and(|v| !v.is_empty());
        let color = inputs.display_is_tty && !dumb && !no_color;
        let utf8 = inputs.locale.as_deref().is_some_and(locale_is_utf8);

        Self {
            interactive,
            color,
            utf8,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn supports_color(&self) -> bool {
        self.color
    }

    pub fn supports_utf8(&self) -> bool {
        self.utf8
    }
}

fn locale_is_utf8(locale: &str) -> bool {
    let lower = locale.to_ascii_lowercase();
    lower.contains("utf-8") || lower.contains("utf8")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tty_inputs() -> ProbeInputs {
        ProbeInputs {
            stdin_is_tty: true,
            display_is_tty: true,
            term: Some("xterm-256color".to_string()),
            no_color: None,
            locale: Some("en_US.UTF-8".to_string()),
        }
    }

    #[test]
    fn full_terminal_reports_everything() {
        let caps = TerminalCapabilities::from_inputs(&tty_inputs(), ProbeFlags::default());
        assert!(caps.is_interactive());
        assert!(caps.supports_color());
        assert!(caps.supports_utf8());
    }

    #[test]
    fn force_non_interactive_is_fully_conservative() {
        let flags = ProbeFlags {
            force_non_interactive: true,
            ..ProbeFlags::default()
        };
        let caps = TerminalCapabilities::from_inputs(&tty_inputs(), flags);
        assert_eq!(caps, TerminalCapabilities::CONSERVATIVE);
    }

    #[test]
    fn no_color_env_only_disables_color() {
        let inputs = ProbeInputs {
            no_color: Some("1".to_string()),
            ..tty_inputs()
        };
        let caps = TerminalCapabilities::from_inputs(&inputs, ProbeFlags::default());
        assert!(caps.is_interactive());
        assert!(!caps.supports_color());
        assert!(caps.supports_utf8());
    }

    #[test]
    fn empty_no_color_is_ignored() {
        let inputs = ProbeInputs {
            no_color: Some(String::new()),
            ..tty_inputs()
        };
        let caps = TerminalCapabilities::from_inputs(&inputs, ProbeFlags::default());
        assert!(caps.supports_color());
    }

    #[test]
    fn disable_color_flag_only_disables_color() {
        let flags = ProbeFlags {
            disable_color: true,
            ..ProbeFlags::default()
        };
        let caps = TerminalCapabilities::from_inputs(&tty_inputs(), flags);
        assert!(caps.is_interactive());
        assert!(!caps.supports_color());
    }

    #[test]
    fn piped_stdin_is_not_interactive() {
        let inputs = ProbeInputs {
            stdin_is_tty: false,
            ..tty_inputs()
        };
        let caps = TerminalCapabilities::from_inputs(&inputs, ProbeFlags::default());
        assert!(!caps.is_interactive());
        // Display is still a terminal, so the numbered prompt may be colored.
        assert!(caps.supports_color());
    }

    #[test]
    fn dumb_terminal_is_conservative() {
        let inputs = ProbeInputs {
            term: Some("dumb".to_string()),
            ..tty_inputs()
        };
        let caps = TerminalCapabilities::from_inputs(&inputs, ProbeFlags::default());
        assert!(!caps.is_interactive());
        assert!(!caps.supports_color());
    }

    #[test]
    fn missing_inputs_default_to_safest() {
        let caps =
            TerminalCapabilities::from_inputs(&ProbeInputs::default(), ProbeFlags::default());
        assert_eq!(caps, TerminalCapabilities::CONSERVATIVE);
    }

    #[test]
    fn utf8_locale_spellings() {
        assert!(locale_is_utf8("en_GB.UTF-8"));
        assert!(locale_is_utf8("C.utf8"));
        assert!(!locale_is_utf8("C"));
        assert!(!locale_is_utf8("POSIX"));
    }
}
