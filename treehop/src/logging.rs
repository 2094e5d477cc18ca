use std::path::PathBuf;
use treehop_core::constants::{APP_NAME, ENV_LOG_LEVEL};

const LOG_FILE_NAME: &str = "treehop.log";

pub const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Warn;

pub fn cache_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Ok(xdg_cache_home) = std::env::var("XDG_CACHE_HOME")
            && !xdg_cache_home.is_empty()
        {
            return Some(PathBuf::from(xdg_cache_home).join(APP_NAME));
        }
        dirs::home_dir().map(|home| home.join(".cache").join(APP_NAME))
    }
    #[cfg(not(unix))]
    {
        Some(dirs::cache_dir().map_or_else(|| std::env::temp_dir().join(APP_NAME), |c| c.join(APP_NAME)))
    }
}

pub fn default_log_file() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join(LOG_FILE_NAME))
}

/// Level from `TREEHOP_LOG`, falling back to warnings only.
pub fn level_from_env() -> log::LevelFilter {
    parse_level(std::env::var(ENV_LOG_LEVEL).ok().as_deref())
}

fn parse_level(value: Option<&str>) -> log::LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_LOG_LEVEL)
}

pub fn setup_logging(level: log::LevelFilter) -> anyhow::Result<()> {
    let Some(log_file) = default_log_file() else {
        anyhow::bail!("no cache directory for the log file");
    };
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    simple_log::file(log_file.to_string_lossy().into_owned(), level, 10, 10)
        .map_err(|e| anyhow::anyhow!(e))?;
    log::info!("treehop logging initialised (level={level})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_respects_xdg_override() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom-cache");

        unsafe { std::env::set_var("XDG_CACHE_HOME", &custom) };
        let result = cache_dir();
        let log_file = default_log_file();
        unsafe { std::env::remove_var("XDG_CACHE_HOME") };

        assert_eq!(result, Some(custom.join(APP_NAME)));
        assert_eq!(log_file, Some(custom.join(APP_NAME).join(LOG_FILE_NAME)));
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level(None), log::LevelFilter::Warn);
        assert_eq!(parse_level(Some("debug")), log::LevelFilter::Debug);
        assert_eq!(parse_level(Some(" TRACE ")), log::LevelFilter::Trace);
        assert_eq!(parse_level(Some("loud")), log::LevelFilter::Warn);
    }
}
