use crate::{
    fallback::prompt_numbered,
    render::MenuRenderer,
    signal::SignalBridge,
    terminal::{RawModeGuard, StdinSource},
    theme::Theme,
};
use std::io::{self, Write};
use treehop_core::{
    InputSource, KeyDecoder, SelectableItem, SelectionMode, SelectionState, SelectionStatus,
    TerminalCapabilities,
    constants::DEFAULT_PROMPT_ATTEMPTS,
    selection::{Redraw, SelectionError, SelectionInputError},
};

#[derive(Debug, Clone)]
pub struct MenuOptions {
    pub prompt: String,
    pub mode: SelectionMode,
    /// Skip the interactive menu even on a capable terminal.
    pub numbered: bool,
    /// Answers the numbered prompt accepts before giving up.
    pub max_attempts: usize,
}

impl MenuOptions {
    pub fn new(prompt: impl Into<String>, mode: SelectionMode) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            numbered: false,
            max_attempts: DEFAULT_PROMPT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Chosen ordinals, ascending.
    Selected(Vec<usize>),
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error(transparent)]
    NothingToSelect(#[from] SelectionError),
    #[error("invalid selection: {0}")]
    InvalidInput(#[from] SelectionInputError),
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}

/// Ask the user to pick from `items`, interactively when the terminal allows
/// and through the numbered prompt otherwise. All chrome goes to stderr.
pub fn select(
    items: &[SelectableItem],
    caps: &TerminalCapabilities,
    theme: Theme,
    options: &MenuOptions,
) -> Result<MenuOutcome, MenuError> {
    if items.is_empty() {
        return Err(SelectionError::NothingToSelect.into());
    }

    if !caps.is_interactive() || options.numbered {
        log::debug!(
            "using numbered prompt (interactive: {}, numbered: {})",
            caps.is_interactive(),
            options.numbered
        );
        return numbered(items, &theme, options);
    }

    let _signals = SignalBridge::install()?;
    let _raw = match RawModeGuard::acquire() {
        Ok(guard) => guard,
        Err(e) => {
            log::debug!("cannot enter raw mode ({e}), using numbered prompt");
            return numbered(items, &theme, options);
        }
    };

    let mut decoder = KeyDecoder::new(StdinSource::new());
    let mut renderer = MenuRenderer::new(
        io::BufWriter::new(io::stderr()),
        theme,
        options.prompt.clone(),
    );
    run_interactive(&mut decoder, &mut renderer, items, options.mode)
}

fn numbered(
    items: &[SelectableItem],
    theme: &Theme,
    options: &MenuOptions,
) -> Result<MenuOutcome, MenuError> {
    prompt_numbered(&mut io::stdin().lock(), &mut io::stderr(), items, theme, options)
}

/// Drive the state machine from `decoder` until it reaches a terminal state.
pub fn run_interactive<S: InputSource, W: Write>(
    decoder: &mut KeyDecoder<S>,
    renderer: &mut MenuRenderer<W>,
    items: &[SelectableItem],
    mode: SelectionMode,
) -> Result<MenuOutcome, MenuError> {
    let mut state = SelectionState::new(items.len(), mode)?;
    renderer.render(&state, items, Redraw::Full)?;

    loop {
        let event = match decoder.next_event() {
            Ok(event) => event,
            Err(e) => {
                let _ = renderer.clear();
                return Err(e.into());
            }
        };
        let redraw = state.apply(event);
        match state.status() {
            SelectionStatus::Active => renderer.render(&state, items, redraw)?,
            SelectionStatus::Confirmed => {
                let chosen = state.chosen();
                let summary = chosen
                    .iter()
                    .map(|&ordinal| items[ordinal].label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                renderer.finish(&summary)?;
                return Ok(MenuOutcome::Selected(chosen));
            }
            SelectionStatus::Cancelled => {
                renderer.clear()?;
                return Ok(MenuOutcome::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehop_core::{Input, key::ScriptedInput, selection::items_from_labels};

    fn width() -> u16 {
        80
    }

    fn drive(inputs: Vec<Input>, mode: SelectionMode) -> (MenuOutcome, String) {
        let items = items_from_labels(["main", "feature-a", "feature-b"]);
        let mut decoder = KeyDecoder::new(ScriptedInput::new(inputs));
        let mut renderer =
            MenuRenderer::new(Vec::new(), Theme::plain(), "Switch to").with_width_probe(width);
        let outcome = run_interactive(&mut decoder, &mut renderer, &items, mode).unwrap();
        let out = renderer_output(renderer);
        (outcome, out)
    }

    fn renderer_output(renderer: MenuRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn bytes(bytes: &[u8]) -> Vec<Input> {
        bytes.iter().copied().map(Input::Byte).collect()
    }

    #[test]
    fn down_down_confirm_selects_the_third_item() {
        let (outcome, out) = drive(bytes(b"\x1b[B\x1b[B\r"), SelectionMode::Single);
        assert_eq!(outcome, MenuOutcome::Selected(vec![2]));
        assert!(out.ends_with("[OK] feature-b\r\n"));
    }

    #[test]
    fn escape_cancels_and_erases() {
        let (outcome, out) = drive(bytes(b"\x1b"), SelectionMode::Single);
        assert_eq!(outcome, MenuOutcome::Cancelled);
        assert!(out.ends_with("\u{1b}[J"));
    }

    #[test]
    fn end_of_input_cancels() {
        let (outcome, _) = drive(Vec::new(), SelectionMode::Single);
        assert_eq!(outcome, MenuOutcome::Cancelled);
    }

    #[test]
    fn termination_signal_cancels() {
        let (outcome, _) = drive(vec![Input::Byte(b'j'), Input::Interrupted], SelectionMode::Single);
        assert_eq!(outcome, MenuOutcome::Cancelled);
    }

    #[test]
    fn multi_select_toggles() {
        let (outcome, out) = drive(bytes(b" jj \r"), SelectionMode::Multi);
        assert_eq!(outcome, MenuOutcome::Selected(vec![0, 2]));
        assert!(out.ends_with("[OK] main, feature-b\r\n"));
    }

    #[test]
    fn multi_confirm_without_toggles_takes_the_cursor() {
        let (outcome, _) = drive(bytes(b"k\r"), SelectionMode::Multi);
        assert_eq!(outcome, MenuOutcome::Selected(vec![2]));
    }

    #[test]
    fn resize_repaints_and_keeps_the_cursor() {
        let mut inputs = bytes(b"j");
        inputs.push(Input::Resize);
        inputs.extend(bytes(b"\r"));
        let (outcome, out) = drive(inputs, SelectionMode::Single);
        assert_eq!(outcome, MenuOutcome::Selected(vec![1]));
        // The frame is drawn twice in full: once at start, once after the resize.
        assert_eq!(out.matches("feature-b").count(), 2);
    }

    #[test]
    fn digits_jump_then_confirm() {
        let (outcome, _) = drive(bytes(b"3\r"), SelectionMode::Single);
        assert_eq!(outcome, MenuOutcome::Selected(vec![2]));
    }

    #[test]
    fn empty_items_never_start() {
        let result = select(
            &[],
            &TerminalCapabilities::CONSERVATIVE,
            Theme::plain(),
            &MenuOptions::new("Pick", SelectionMode::Single),
        );
        assert!(matches!(result, Err(MenuError::NothingToSelect(_))));
    }
}
