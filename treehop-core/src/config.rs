use crate::{
    constants::{
        APP_NAME, DEFAULT_LOCK_STALE_AFTER, DEFAULT_LOCK_TIMEOUT, DEFAULT_PROMPT_ATTEMPTS,
        LOCK_POLL_INTERVAL,
    },
    lock::LockOptions,
    paths::expand_tilde,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

fn config_dir() -> Option<PathBuf> {
    // ~/.config on both Linux and macOS, not ~/Library/Application Support
    #[cfg(unix)]
    {
        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config_home.is_empty()
        {
            return Some(PathBuf::from(xdg_config_home).join(APP_NAME));
        }
        dirs::home_dir().map(|home| home.join(".config").join(APP_NAME))
    }
    #[cfg(not(unix))]
    {
        dirs::config_dir().map(|dir| dir.join(APP_NAME))
    }
}

pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where new worktrees are created. Supports `~`. Defaults to a
    /// `.treehop_worktrees` directory next to the main worktree.
    /// ```toml
    /// worktree_dir = "~/worktrees"
    /// ```
    pub worktree_dir: Option<String>,

    /// Repository lock timing.
    #[serde(default)]
    pub lock: LockConfig,

    /// Menu behaviour.
    #[serde(default)]
    pub ui: UiConfig,

    /// Color theme configuration.
    #[serde(default)]
    pub theme: ThemeConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Seconds to wait for another treehop process before giving up (default: 30).
    #[serde(default = "LockConfig::default_timeout_secs")]
    pub timeout_secs: f64,
    /// Seconds after which a lock is considered abandoned even if its owner
    /// still appears to be alive (default: 600).
    #[serde(default = "LockConfig::default_stale_after_secs")]
    pub stale_after_secs: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            stale_after_secs: Self::default_stale_after_secs(),
        }
    }
}

impl LockConfig {
    fn default_timeout_secs() -> f64 {
        DEFAULT_LOCK_TIMEOUT.as_secs_f64()
    }
    fn default_stale_after_secs() -> f64 {
        DEFAULT_LOCK_STALE_AFTER.as_secs_f64()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UiConfig {
    /// Always use the numbered prompt, even on a capable terminal.
    #[serde(default)]
    pub numbered: bool,
    /// How many times the numbered prompt asks again after invalid input (default: 3).
    #[serde(default = "UiConfig::default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            numbered: false,
            max_attempts: Self::default_max_attempts(),
        }
    }
}

impl UiConfig {
    fn default_max_attempts() -> usize {
        DEFAULT_PROMPT_ATTEMPTS
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ThemeConfig {
    /// Pointer and highlighted row (default: "cyan").
    #[serde(
        default = "ThemeConfig::default_accent",
        deserialize_with = "deserialize_color"
    )]
    pub accent: ThemeColor,
    /// Hints and unselected marks (default: "gray").
    #[serde(
        default = "ThemeConfig::default_muted",
        deserialize_with = "deserialize_color"
    )]
    pub muted: ThemeColor,
    /// Confirmation summary (default: "green").
    #[serde(
        default = "ThemeConfig::default_success",
        deserialize_with = "deserialize_color"
    )]
    pub success: ThemeColor,
    /// Prompt errors (default: "red").
    #[serde(
        default = "ThemeConfig::default_error",
        deserialize_with = "deserialize_color"
    )]
    pub error: ThemeColor,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            accent: Self::default_accent(),
            muted: Self::default_muted(),
            success: Self::default_success(),
            error: Self::default_error(),
        }
    }
}

impl ThemeConfig {
    fn default_accent() -> ThemeColor {
        ThemeColor::Named(NamedColor::Cyan)
    }
    fn default_muted() -> ThemeColor {
        ThemeColor::Named(NamedColor::Gray)
    }
    fn default_success() -> ThemeColor {
        ThemeColor::Named(NamedColor::Green)
    }
    fn default_error() -> ThemeColor {
        ThemeColor::Named(NamedColor::Red)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeColor {
    Named(NamedColor),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
}

impl NamedColor {
    /// Accepted names, alphabetical.
    pub const fn all() -> &'static [(&'static str, NamedColor)] {
        &[
            ("black", NamedColor::Black),
            ("blue", NamedColor::Blue),
            ("cyan", NamedColor::Cyan),
            ("gray", NamedColor::Gray),
            ("green", NamedColor::Green),
            ("magenta", NamedColor::Magenta),
            ("red", NamedColor::Red),
            ("white", NamedColor::White),
            ("yellow", NamedColor::Yellow),
        ]
    }
}

impl ThemeColor {
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(hex) = s.strip_prefix('#')
            && hex.len() == 6
            && hex.is_ascii()
        {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Self::Rgb(r, g, b));
        }
        let lower = s.to_lowercase();
        let lookup = match lower.as_str() {
            "grey" => "gray",
            other => other,
        };
        NamedColor::all()
            .iter()
            .find(|(name, _)| *name == lookup)
            .map(|(_, color)| Self::Named(*color))
    }
}

fn deserialize_color<'de, D>(deserializer: D) -> Result<ThemeColor, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ThemeColor::parse(&s).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid color '{s}': expected a named color (black, red, green, yellow, blue, magenta, cyan, white, gray/grey) or hex (#rrggbb)"
        ))
    })
}

impl Config {
    /// Configured worktree root with `~` expanded. `None` means "next to the
    /// main worktree".
    pub fn resolved_worktree_dir(&self) -> Option<PathBuf> {
        self.worktree_dir.as_deref().and_then(expand_tilde)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            timeout: seconds(self.lock.timeout_secs, DEFAULT_LOCK_TIMEOUT),
            stale_after: seconds(self.lock.stale_after_secs, DEFAULT_LOCK_STALE_AFTER),
            poll_interval: LOCK_POLL_INTERVAL,
        }
    }
}

fn seconds(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| {
        log::warn!("ignoring invalid duration {value}s, using {fallback:?}");
        fallback
    })
}

pub fn load_config_from_str(s: &str) -> Result<Config> {
    let config: Config = toml::from_str(s)?;
    Ok(config)
}

/// Load the config file. An explicit path must exist; the default location
/// is optional and yields defaults when absent.
pub fn load_config(config_override: Option<&Path>) -> Result<Config> {
    let config_file = match config_override {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            path.to_path_buf()
        }
        None => match config_file() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };
    let contents = fs::read_to_string(&config_file)
        .with_context(|| format!("failed to read {}", config_file.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("invalid config file {}", config_file.display()))
}
