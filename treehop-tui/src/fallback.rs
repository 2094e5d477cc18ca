use crate::{
    menu::{MenuError, MenuOptions, MenuOutcome},
    theme::Theme,
};
use crossterm::{QueueableCommand, style::Print};
use std::io::{BufRead, Write};
use treehop_core::{
    SelectableItem, SelectionMode,
    selection::{SelectionError, parse_numbered_selection},
};

/// Line-oriented selection for when no interactive terminal is available.
///
/// Prints the numbered list once, then asks for an answer up to
/// `max_attempts` times. An empty answer, `q` or end of input cancels.
pub fn prompt_numbered<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    items: &[SelectableItem],
    theme: &Theme,
    options: &MenuOptions,
) -> Result<MenuOutcome, MenuError> {
    if items.is_empty() {
        return Err(SelectionError::NothingToSelect.into());
    }

    out.queue(Print(theme.paint_bold(&options.prompt, theme.accent)))?
        .queue(Print("\n"))?;
    let digits = items.len().to_string().len();
    for (index, item) in items.iter().enumerate() {
        out.queue(Print(format!("  {:>digits$}) {}", index + 1, item.label)))?;
        if let Some(hint) = &item.hint {
            out.queue(Print(theme.paint(&format!("  {hint}"), theme.muted)))?;
        }
        out.queue(Print("\n"))?;
    }

    let question = match options.mode {
        SelectionMode::Single => "Enter a number (empty or q to cancel): ",
        SelectionMode::Multi => "Enter numbers separated by spaces or commas (empty or q to cancel): ",
    };
    let attempts = options.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        out.queue(Print(question))?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            out.queue(Print("\n"))?;
            out.flush()?;
            return Ok(MenuOutcome::Cancelled);
        }
        let answer = line.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
            return Ok(MenuOutcome::Cancelled);
        }

        match parse_numbered_selection(answer, items.len(), options.mode) {
            Ok(ordinals) => return Ok(MenuOutcome::Selected(ordinals)),
            Err(e) if attempt >= attempts => return Err(MenuError::InvalidInput(e)),
            Err(e) => {
                log::debug!("invalid numbered selection {answer:?}: {e}");
                out.queue(Print(theme.paint(&format!("invalid selection: {e}"), theme.error)))?
                    .queue(Print("\n"))?;
            }
        }
    }
}
