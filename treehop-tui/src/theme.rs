use crossterm::style::{Color, StyledContent, Stylize};
use treehop_core::{
    TerminalCapabilities,
    config::{NamedColor, ThemeColor, ThemeConfig},
};

/// Markers drawn around menu rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyphs {
    pub pointer: &'static str,
    pub chosen: &'static str,
    pub unchosen: &'static str,
    pub confirmed: &'static str,
}

impl Glyphs {
    pub const UNICODE: Self = Self {
        pointer: "❯",
        chosen: "◉",
        unchosen: "○",
        confirmed: "✓",
    };

    pub const ASCII: Self = Self {
        pointer: ">",
        chosen: "[*]",
        unchosen: "[ ]",
        confirmed: "[OK]",
    };
}

pub struct Theme {
    pub accent: Color,
    pub muted: Color,
    pub success: Color,
    pub error: Color,
    pub glyphs: Glyphs,
    color: bool,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig, caps: &TerminalCapabilities) -> Self {
        Self {
            accent: to_crossterm_color(&config.accent),
            muted: to_crossterm_color(&config.muted),
            success: to_crossterm_color(&config.success),
            error: to_crossterm_color(&config.error),
            glyphs: if caps.supports_utf8() {
                Glyphs::UNICODE
            } else {
                Glyphs::ASCII
            },
            color: caps.supports_color(),
        }
    }

    /// No color and ASCII glyphs.
    pub fn plain() -> Self {
        Self::from_config(&ThemeConfig::default(), &TerminalCapabilities::CONSERVATIVE)
    }

    #[cfg(test)]
    fn uses_color(&self) -> bool {
        self.color
    }

    /// `text` in `color`, or unstyled when color is off.
    pub fn paint<'a>(&self, text: &'a str, color: Color) -> StyledContent<&'a str> {
        if self.color {
            text.with(color)
        } else {
            text.stylize()
        }
    }

    pub fn paint_bold<'a>(&self, text: &'a str, color: Color) -> StyledContent<&'a str> {
        if self.color {
            text.with(color).bold()
        } else {
            text.stylize()
        }
    }
}

fn to_crossterm_color(color: &ThemeColor) -> Color {
    match color {
        ThemeColor::Rgb(r, g, b) => Color::Rgb {
            r: *r,
            g: *g,
            b: *b,
        },
        ThemeColor::Named(named) => match named {
            NamedColor::Black => Color::Black,
            NamedColor::Red => Color::Red,
            NamedColor::Green => Color::Green,
            NamedColor::Yellow => Color::Yellow,
            NamedColor::Blue => Color::Blue,
            NamedColor::Magenta => Color::Magenta,
            NamedColor::Cyan => Color::Cyan,
            NamedColor::White => Color::White,
            NamedColor::Gray => Color::Grey,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehop_core::capabilities::{ProbeFlags, ProbeInputs};

    fn rich_caps() -> TerminalCapabilities {
        TerminalCapabilities::from_inputs(
            &ProbeInputs {
                stdin_is_tty: true,
                display_is_tty: true,
                term: Some("xterm-256color".to_string()),
                no_color: None,
                locale: Some("en_US.UTF-8".to_string()),
            },
            ProbeFlags::default(),
        )
    }

    #[test]
    fn test_theme_defaults() {
        let theme = Theme::from_config(&ThemeConfig::default(), &rich_caps());
        assert_eq!(theme.accent, Color::Cyan);
        assert_eq!(theme.muted, Color::Grey);
        assert_eq!(theme.success, Color::Green);
        assert_eq!(theme.error, Color::Red);
        assert_eq!(theme.glyphs, Glyphs::UNICODE);
        assert!(theme.uses_color());
    }

    #[test]
    fn test_theme_rgb() {
        let config = ThemeConfig {
            accent: ThemeColor::Rgb(1, 2, 3),
            ..ThemeConfig::default()
        };
        let theme = Theme::from_config(&config, &rich_caps());
        assert_eq!(theme.accent, Color::Rgb { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn test_conservative_caps_give_ascii_without_color() {
        let theme = Theme::plain();
        assert_eq!(theme.glyphs, Glyphs::ASCII);
        assert!(!theme.uses_color());
        assert_eq!(theme.paint("main", theme.accent).to_string(), "main");
    }

    #[test]
    fn test_paint_emits_escapes_only_with_color() {
        let theme = Theme::from_config(&ThemeConfig::default(), &rich_caps());
        let painted = theme.paint("main", theme.accent).to_string();
        assert!(painted.contains("\u{1b}["));
        assert!(painted.contains("main"));
    }
}
