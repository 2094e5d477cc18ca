use crossterm::{cursor, terminal, QueueableCommand};
use std::{
    io::{self, Write},
    time::Duration,
};
use treehop_core::{Input, InputSource};

const DEFAULT_COLUMNS: u16 = 80;

/// Current terminal width, or 80 columns when it cannot be queried.
pub fn terminal_width() -> u16 {
    terminal::size()
        .ok()
        .map(|(cols, _)| cols)
        .filter(|cols| *cols > 0)
        .unwrap_or(DEFAULT_COLUMNS)
}

/// Raw mode lifetime guard so terminal state is restored on any return path,
/// including unwinding.
pub struct RawModeGuard;

impl RawModeGuard {
    /// Enable raw mode and hide the cursor on the display stream.
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self;
        let mut stderr = io::stderr();
        stderr.queue(cursor::Hide)?;
        stderr.flush()?;
        Ok(guard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stderr = io::stderr();
        let _ = stderr.queue(cursor::Show).and_then(|s| s.flush());
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("failed to restore terminal mode: {e}");
        }
    }
}

/// How long a single blocking wait lasts before the signal flags are checked
/// again.
#[cfg(unix)]
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Reads stdin byte by byte, interleaving signal notifications.
#[cfg(unix)]
pub struct StdinSource {
    fd: libc::c_int,
}

#[cfg(unix)]
impl StdinSource {
    pub fn new() -> Self {
        Self {
            fd: libc::STDIN_FILENO,
        }
    }

    /// Wait up to `slice` for the descriptor to become readable.
    fn wait_readable(&self, slice: Duration) -> io::Result<bool> {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = libc::c_int::try_from(slice.as_millis()).unwrap_or(libc::c_int::MAX);
        // SAFETY: one valid pollfd for the duration of the call.
        let ready = unsafe { libc::poll(&raw mut pollfd, 1, millis) };
        match ready {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
            0 => Ok(false),
            // POLLHUP and POLLERR also count: the read below reports them.
            _ => Ok(true),
        }
    }

    fn read_byte(&self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        loop {
            // SAFETY: reading at most one byte into a live local.
            let n = unsafe { libc::read(self.fd, (&raw mut byte).cast(), 1) };
            match n {
                1 => return Ok(Some(byte)),
                0 => return Ok(None),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl InputSource for StdinSource {
    fn next_input(&mut self, timeout: Option<Duration>) -> io::Result<Input> {
        let deadline = timeout.map(|t| std::time::Instant::now() + t);
        loop {
            if crate::signal::take_resize() {
                return Ok(Input::Resize);
            }
            if crate::signal::take_termination() {
                return Ok(Input::Interrupted);
            }

            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                    if remaining.is_zero() {
                        return Ok(Input::TimedOut);
                    }
                    remaining.min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };

            if self.wait_readable(slice)? {
                return Ok(match self.read_byte()? {
                    Some(byte) => Input::Byte(byte),
                    None => Input::Eof,
                });
            }
        }
    }
}

/// Translates crossterm key events back into the byte protocol the decoder
/// understands.
#[cfg(not(unix))]
pub struct StdinSource {
    pending: std::collections::VecDeque<u8>,
}

#[cfg(not(unix))]
impl StdinSource {
    pub fn new() -> Self {
        Self {
            pending: std::collections::VecDeque::new(),
        }
    }
}

#[cfg(not(unix))]
impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(unix))]
impl InputSource for StdinSource {
    fn next_input(&mut self, timeout: Option<Duration>) -> io::Result<Input> {
        use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(Input::Byte(byte));
            }
            if let Some(timeout) = timeout
                && !event::poll(timeout)?
            {
                return Ok(Input::TimedOut);
            }
            match event::read()? {
                Event::Resize(..) => return Ok(Input::Resize),
                Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                    KeyCode::Up => self.pending.extend(b"\x1b[A"),
                    KeyCode::Down => self.pending.extend(b"\x1b[B"),
                    KeyCode::Enter => self.pending.push_back(b'\r'),
                    KeyCode::Esc => self.pending.push_back(0x1b),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.pending.push_back(0x03);
                    }
                    KeyCode::Char(c) => {
                        if let Ok(byte) = u8::try_from(c)
                            && byte.is_ascii()
                        {
                            self.pending.push_back(byte);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0; 2];
        // SAFETY: pipe fills both descriptors on success.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: freshly created descriptors owned by nobody else.
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn reads_bytes_then_eof() {
        let _signals = crate::signal::TEST_LOCK.lock().unwrap();
        let (read, write) = pipe();
        let mut writer = std::fs::File::from(write);
        writer.write_all(b"j\r").unwrap();
        drop(writer);

        let mut source = StdinSource {
            fd: read.as_raw_fd(),
        };
        assert_eq!(source.next_input(None).unwrap(), Input::Byte(b'j'));
        assert_eq!(source.next_input(None).unwrap(), Input::Byte(b'\r'));
        assert_eq!(source.next_input(None).unwrap(), Input::Eof);
    }

    #[test]
    fn times_out_without_input() {
        let _signals = crate::signal::TEST_LOCK.lock().unwrap();
        let (read, _write) = pipe();
        let mut source = StdinSource {
            fd: read.as_raw_fd(),
        };
        let started = std::time::Instant::now();
        assert_eq!(
            source
                .next_input(Some(Duration::from_millis(30)))
                .unwrap(),
            Input::TimedOut
        );
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pending_resize_comes_before_buffered_bytes() {
        let _signals = crate::signal::TEST_LOCK.lock().unwrap();
        crate::signal::take_resize();
        let (read, write) = pipe();
        let mut writer = std::fs::File::from(write);
        writer.write_all(b"k").unwrap();

        let mut source = StdinSource {
            fd: read.as_raw_fd(),
        };
        crate::signal::notify_resize();
        assert_eq!(source.next_input(None).unwrap(), Input::Resize);
        assert_eq!(source.next_input(None).unwrap(), Input::Byte(b'k'));
        assert_eq!(
            source
                .next_input(Some(Duration::from_millis(10)))
                .unwrap(),
            Input::TimedOut
        );
    }

    #[test]
    fn width_has_a_fallback() {
        assert!(terminal_width() > 0);
    }
}
