use crate::constants::ESCAPE_SEQUENCE_TIMEOUT;
use std::{io, time::Duration};

const ESC: u8 = 0x1b;
const CTRL_C: u8 = 0x03;

/// Logical key events the selection state machine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Up,
    Down,
    Toggle,
    Confirm,
    Cancel,
    Resize,
    Char(u8),
    Unknown,
}

/// One unit of raw input from a platform-specific source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Byte(u8),
    /// A resize notification was pending.
    Resize,
    /// A termination signal arrived; the menu must unwind.
    Interrupted,
    /// No byte arrived before the timeout.
    TimedOut,
    Eof,
}

/// Raw byte stream from the terminal in raw mode.
///
/// Implementations must report a pending resize before any buffered byte.
pub trait InputSource {
    /// Block until a byte, a signal notification or end of input, or until
    /// `timeout` elapses. `None` waits forever.
    fn next_input(&mut self, timeout: Option<Duration>) -> io::Result<Input>;
}

/// Turns raw bytes into [`KeyEvent`]s, resolving escape sequences atomically.
pub struct KeyDecoder<S> {
    source: S,
    escape_timeout: Duration,
}

impl<S: InputSource> KeyDecoder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            escape_timeout: ESCAPE_SEQUENCE_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Block until one complete key event can be produced.
    pub fn next_event(&mut self) -> io::Result<KeyEvent> {
        match self.source.next_input(None)? {
            Input::Byte(ESC) => self.decode_escape(),
            Input::Byte(byte) => Ok(decode_byte(byte)),
            Input::Resize => Ok(KeyEvent::Resize),
            Input::Interrupted | Input::Eof => Ok(KeyEvent::Cancel),
            // Only reachable with a misbehaving source; treat as no input.
            Input::TimedOut => Ok(KeyEvent::Unknown),
        }
    }

    fn decode_escape(&mut self) -> io::Result<KeyEvent> {
        let introducer = match self.source.next_input(Some(self.escape_timeout))? {
            Input::Byte(byte) => byte,
            Input::TimedOut | Input::Eof => {
                log::debug!("lone escape, treating as cancel");
                return Ok(KeyEvent::Cancel);
            }
            Input::Resize => return Ok(KeyEvent::Resize),
            Input::Interrupted => return Ok(KeyEvent::Cancel),
        };

        match introducer {
            b'[' => self.decode_csi(),
            b'O' => self.decode_ss3(),
            // Alt+key or a second escape: nothing we bind.
            _ => Ok(KeyEvent::Unknown),
        }
    }

    /// `ESC [ <params> <final>`; parameter bytes are consumed and ignored.
    fn decode_csi(&mut self) -> io::Result<KeyEvent> {
        loop {
            let byte = match self.source.next_input(Some(self.escape_timeout))? {
                Input::Byte(byte) => byte,
                Input::TimedOut | Input::Eof => {
                    log::debug!("truncated CSI sequence, treating as cancel");
                    return Ok(KeyEvent::Cancel);
                }
                Input::Resize => return Ok(KeyEvent::Resize),
                Input::Interrupted => return Ok(KeyEvent::Cancel),
            };
            match byte {
                // Parameter and intermediate bytes.
                0x20..=0x3f => {}
                b'A' => return Ok(KeyEvent::Up),
                b'B' => return Ok(KeyEvent::Down),
                _ => return Ok(KeyEvent::Unknown),
            }
        }
    }

    /// `ESC O <final>`, sent for arrows in application cursor mode.
    fn decode_ss3(&mut self) -> io::Result<KeyEvent> {
        match self.source.next_input(Some(self.escape_timeout))? {
            Input::Byte(b'A') => Ok(KeyEvent::Up),
            Input::Byte(b'B') => Ok(KeyEvent::Down),
            Input::Byte(_) => Ok(KeyEvent::Unknown),
            Input::TimedOut | Input::Eof => {
                log::debug!("truncated SS3 sequence, treating as cancel");
                Ok(KeyEvent::Cancel)
            }
            Input::Resize => Ok(KeyEvent::Resize),
            Input::Interrupted => Ok(KeyEvent::Cancel),
        }
    }
}

fn decode_byte(byte: u8) -> KeyEvent {
    match byte {
        b' ' => KeyEvent::Toggle,
        b'\r' | b'\n' => KeyEvent::Confirm,
        b'q' | CTRL_C => KeyEvent::Cancel,
        b'k' => KeyEvent::Up,
        b'j' => KeyEvent::Down,
        0x21..=0x7e => KeyEvent::Char(byte),
        _ => KeyEvent::Unknown,
    }
}

/// Scripted input for driving the decoder in tests.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    inputs: std::collections::VecDeque<Input>,
}

impl ScriptedInput {
    pub fn new(inputs: impl IntoIterator<Item = Input>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(bytes.iter().copied().map(Input::Byte))
    }
}

impl InputSource for ScriptedInput {
    fn next_input(&mut self, timeout: Option<Duration>) -> io::Result<Input> {
        match self.inputs.pop_front() {
            Some(input) => Ok(input),
            None if timeout.is_some() => Ok(Input::TimedOut),
            None => Ok(Input::Eof),
        }
    }
}
