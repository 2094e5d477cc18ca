//! Reporting a navigation target back to the invoking shell.
//!
//! A cooperating shell wrapper sets `TREEHOP_SHELL_INTEGRATION` and points a
//! reserved descriptor (fd 3 unless `TREEHOP_CONTROL_FD` says otherwise) at
//! something it reads after we exit. We write exactly one `cd <path>` line
//! there and nothing else. Without the wrapper there is nobody to read a
//! machine line, so a human-readable instruction goes to stdout instead.

use crate::constants::{DEFAULT_CONTROL_FD, ENV_CONTROL_FD, ENV_SHELL_INTEGRATION};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Outcome of a selection session, as far as the parent shell cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationResult {
    Navigate { target: PathBuf },
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control descriptor {fd} is not open")]
    DescriptorClosed { fd: i32 },
    #[error("control channel is not supported on this platform")]
    Unsupported,
    #[error("cannot send {} over the control channel: {reason}", .path.display())]
    Unrepresentable { path: PathBuf, reason: &'static str },
    #[error("writing to the control channel failed: {0}")]
    Write(#[source] io::Error),
}

/// Whether the parent shell asked for the machine-readable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Shell { fd: i32 },
    Display,
}

impl ControlMode {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(ENV_SHELL_INTEGRATION).ok().as_deref(),
            std::env::var(ENV_CONTROL_FD).ok().as_deref(),
        )
    }

    pub fn from_vars(integration: Option<&str>, fd: Option<&str>) -> Self {
        if !integration.is_some_and(is_truthy) {
            return Self::Display;
        }
        let fd = fd
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .filter(|fd| *fd > 2)
            .unwrap_or(DEFAULT_CONTROL_FD);
        Self::Shell { fd }
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
}

/// How a result ended up being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    ControlLine,
    DisplayLine,
    /// The control channel was requested but unusable.
    DisplayFallback,
    Nothing,
}

/// The exact bytes written to the control channel for `target`.
pub fn control_line(target: &Path) -> Result<String, ControlError> {
    let unrepresentable = |reason| ControlError::Unrepresentable {
        path: target.to_path_buf(),
        reason,
    };
    if !target.is_absolute() {
        return Err(unrepresentable("path is not absolute"));
    }
    let Some(text) = target.to_str() else {
        return Err(unrepresentable("path is not valid UTF-8"));
    };
    if text.contains(['\n', '\r']) {
        return Err(unrepresentable("path contains a line break"));
    }
    Ok(format!("cd {text}\n"))
}

pub fn display_line(target: &Path) -> String {
    format!("Navigate to: {}\n", target.display())
}

/// Writes a [`NavigationResult`] to either the control sink or the display.
///
/// `channel` is `Some` only when shell integration was requested; `display`
/// is the normal output stream.
pub struct ControlWriter<C, D> {
    channel: Option<Result<C, ControlError>>,
    display: D,
    degraded: bool,
}

impl<C: Write, D: Write> ControlWriter<C, D> {
    pub fn new(channel: Option<Result<C, ControlError>>, display: D) -> Self {
        Self {
            channel,
            display,
            degraded: false,
        }
    }

    pub fn emit(&mut self, result: &NavigationResult) -> io::Result<Emission> {
        let NavigationResult::Navigate { target } = result else {
            return Ok(Emission::Nothing);
        };

        let failure = match self.channel.take() {
            None => {
                self.print(target)?;
                return Ok(if self.degraded {
                    Emission::DisplayFallback
                } else {
                    Emission::DisplayLine
                });
            }
            Some(Err(e)) => e,
            Some(Ok(mut sink)) => match write_control(&mut sink, target) {
                Ok(()) => {
                    self.channel = Some(Ok(sink));
                    return Ok(Emission::ControlLine);
                }
                Err(e) => e,
            },
        };

        log::warn!("control channel unavailable, printing instead: {failure}");
        self.degraded = true;
        self.print(target)?;
        Ok(Emission::DisplayFallback)
    }

    fn print(&mut self, target: &Path) -> io::Result<()> {
        self.display.write_all(display_line(target).as_bytes())?;
        self.display.flush()
    }
}

fn write_control<C: Write>(sink: &mut C, target: &Path) -> Result<(), ControlError> {
    let line = control_line(target)?;
    sink.write_all(line.as_bytes()).map_err(ControlError::Write)?;
    sink.flush().map_err(ControlError::Write)
}

impl<D: Write> ControlWriter<std::fs::File, D> {
    /// Build a writer for this process: the reserved descriptor when shell
    /// integration is on, otherwise the display only.
    pub fn for_mode(mode: ControlMode, display: D) -> Self {
        let channel = match mode {
            ControlMode::Display => None,
            ControlMode::Shell { fd } => Some(open_descriptor(fd)),
        };
        Self::new(channel, display)
    }
}

#[cfg(unix)]
fn open_descriptor(fd: i32) -> Result<std::fs::File, ControlError> {
    use std::os::fd::FromRawFd;

    // SAFETY: F_GETFD only queries descriptor flags.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(ControlError::DescriptorClosed { fd });
    }
    // SAFETY: the descriptor is open and was handed to us by the parent shell
    // for our exclusive use; nothing else in this process owns it.
    Ok(unsafe { std::fs::File::from_raw_fd(fd) })
}

#[cfg(not(unix))]
fn open_descriptor(_fd: i32) -> Result<std::fs::File, ControlError> {
    Err(ControlError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn navigate(path: &str) -> NavigationResult {
        NavigationResult::Navigate {
            target: PathBuf::from(path),
        }
    }

    #[test]
    fn shell_mode_writes_exactly_one_cd_line() {
        let mut control = Vec::new();
        let mut display = Vec::new();
        let emission = ControlWriter::new(Some(Ok(&mut control)), &mut display)
            .emit(&navigate("/repo/trees/feature-a"))
            .unwrap();
        assert_eq!(emission, Emission::ControlLine);
        assert_eq!(control, b"cd /repo/trees/feature-a\n");
        assert!(display.is_empty());
    }

    #[test]
    fn display_mode_prints_instruction_and_never_touches_channel() {
        let mut display = Vec::new();
        let emission = ControlWriter::<Vec<u8>, _>::new(None, &mut display)
            .emit(&navigate("/repo/trees/feature-a"))
            .unwrap();
        assert_eq!(emission, Emission::DisplayLine);
        assert_eq!(
            String::from_utf8(display).unwrap(),
            "Navigate to: /repo/trees/feature-a\n"
        );
    }

    #[test]
    fn cancellation_writes_nothing_anywhere() {
        let mut control = Vec::new();
        let mut display = Vec::new();
        let emission = ControlWriter::new(Some(Ok(&mut control)), &mut display)
            .emit(&NavigationResult::Cancelled)
            .unwrap();
        assert_eq!(emission, Emission::Nothing);
        assert!(control.is_empty());
        assert!(display.is_empty());
    }

    #[test]
    fn failing_channel_degrades_to_display() {
        let mut display = Vec::new();
        let emission = ControlWriter::new(Some(Ok(BrokenPipe)), &mut display)
            .emit(&navigate("/repo/trees/x"))
            .unwrap();
        assert_eq!(emission, Emission::DisplayFallback);
        assert_eq!(
            String::from_utf8(display).unwrap(),
            "Navigate to: /repo/trees/x\n"
        );
    }

    #[test]
    fn closed_descriptor_degrades_to_display() {
        let mut display = Vec::new();
        let emission = ControlWriter::<Vec<u8>, _>::new(
            Some(Err(ControlError::DescriptorClosed { fd: 3 })),
            &mut display,
        )
        .emit(&navigate("/repo"))
        .unwrap();
        assert_eq!(emission, Emission::DisplayFallback);
        assert_eq!(String::from_utf8(display).unwrap(), "Navigate to: /repo\n");
    }

    #[test]
    fn unrepresentable_paths_degrade_to_display() {
        let mut control = Vec::new();
        let mut display = Vec::new();
        let emission = ControlWriter::new(Some(Ok(&mut control)), &mut display)
            .emit(&navigate("relative/path"))
            .unwrap();
        assert_eq!(emission, Emission::DisplayFallback);
        assert!(control.is_empty());

        assert!(control_line(Path::new("/a\nb")).is_err());
    }

    #[test]
    fn control_line_keeps_spaces_verbatim() {
        assert_eq!(
            control_line(Path::new("/home/me/my trees/x")).unwrap(),
            "cd /home/me/my trees/x\n"
        );
    }

    #[test]
    fn mode_from_vars() {
        assert_eq!(ControlMode::from_vars(None, None), ControlMode::Display);
        assert_eq!(ControlMode::from_vars(Some("0"), None), ControlMode::Display);
        assert_eq!(ControlMode::from_vars(Some(""), Some("5")), ControlMode::Display);
        assert_eq!(
            ControlMode::from_vars(Some("1"), None),
            ControlMode::Shell { fd: 3 }
        );
        assert_eq!(
            ControlMode::from_vars(Some("yes"), Some("7")),
            ControlMode::Shell { fd: 7 }
        );
        // The standard streams are never a control channel.
        assert_eq!(
            ControlMode::from_vars(Some("1"), Some("1")),
            ControlMode::Shell { fd: 3 }
        );
        assert_eq!(
            ControlMode::from_vars(Some("1"), Some("junk")),
            ControlMode::Shell { fd: 3 }
        );
    }

    #[cfg(unix)]
    #[test]
    fn closed_descriptor_is_detected() {
        // Far above anything a test harness opens.
        assert!(matches!(
            open_descriptor(987),
            Err(ControlError::DescriptorClosed { fd: 987 })
        ));
    }
}
