//! Minimal-diff menu drawing on the display stream.
//!
//! The menu occupies one physical row per logical row: a header followed by
//! one row per item. Rows are truncated to the terminal width so nothing
//! wraps, which lets partial updates address rows by counting lines up from
//! the bottom of the frame. The cursor always rests on the last row between
//! renders.

use crate::{terminal::terminal_width, theme::Theme};
use crossterm::{
    QueueableCommand,
    cursor::{MoveDown, MoveToColumn, MoveUp},
    style::{Color, Print},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use treehop_core::{
    SelectableItem, SelectionMode, SelectionState,
    selection::Redraw,
};
use unicode_width::UnicodeWidthChar;

struct Segment {
    text: String,
    color: Option<Color>,
    bold: bool,
}

impl Segment {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            bold: false,
        }
    }

    fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
            bold: false,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// A row ready to print, with the number of columns it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    rendered: String,
    width: usize,
}

pub struct MenuRenderer<W: Write> {
    out: W,
    theme: Theme,
    prompt: String,
    /// Rows currently on screen, top to bottom.
    frame: Vec<Row>,
    width: u16,
    width_probe: fn() -> u16,
}

impl<W: Write> MenuRenderer<W> {
    pub fn new(out: W, theme: Theme, prompt: impl Into<String>) -> Self {
        Self {
            out,
            theme,
            prompt: prompt.into(),
            frame: Vec::new(),
            width: terminal_width(),
            width_probe: terminal_width,
        }
    }

    /// Replace how the terminal width is discovered on a full redraw.
    pub fn with_width_probe(mut self, probe: fn() -> u16) -> Self {
        self.width_probe = probe;
        self.width = probe();
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(
        &mut self,
        state: &SelectionState,
        items: &[SelectableItem],
        redraw: Redraw,
    ) -> io::Result<()> {
        if redraw == Redraw::Full {
            self.width = (self.width_probe)();
        }
        let rows = self.build_rows(state, items);

        if self.frame.is_empty() {
            self.draw_all(rows)?;
        } else {
            match redraw {
                Redraw::Nothing => return Ok(()),
                Redraw::Changed if rows.len() == self.frame.len() => self.draw_changed(rows)?,
                Redraw::Changed | Redraw::Full => {
                    self.erase()?;
                    self.draw_all(rows)?;
                }
            }
        }
        self.out.flush()
    }

    /// Erase the menu without leaving anything behind.
    pub fn clear(&mut self) -> io::Result<()> {
        self.erase()?;
        self.out.flush()
    }

    /// Erase the menu and leave a one-line confirmation in its place.
    pub fn finish(&mut self, summary: &str) -> io::Result<()> {
        self.erase()?;
        let glyph = self.theme.glyphs.confirmed;
        self.out
            .queue(Print(self.theme.paint(glyph, self.theme.success)))?
            .queue(Print(" "))?
            .queue(Print(summary))?
            .queue(Print("\r\n"))?;
        self.out.flush()
    }

    fn draw_all(&mut self, rows: Vec<Row>) -> io::Result<()> {
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                self.out.queue(Print("\r\n"))?;
            }
            self.out.queue(Print(&row.rendered))?;
        }
        self.frame = rows;
        Ok(())
    }

    fn draw_changed(&mut self, rows: Vec<Row>) -> io::Result<()> {
        let last = self.frame.len().saturating_sub(1);
        for (i, row) in rows.into_iter().enumerate() {
            if self.frame[i] == row {
                continue;
            }
            let up = to_u16(last - i);
            if up > 0 {
                self.out.queue(MoveUp(up))?;
            }
            self.out
                .queue(MoveToColumn(0))?
                .queue(Clear(ClearType::CurrentLine))?
                .queue(Print(&row.rendered))?;
            if up > 0 {
                self.out.queue(MoveDown(up))?;
            }
            self.frame[i] = row;
        }
        Ok(())
    }

    /// Move to the top of the frame and clear everything below. Rows drawn at
    /// an older, wider width may have been reflowed onto several lines.
    fn erase(&mut self) -> io::Result<()> {
        let Some((last, above)) = self.frame.split_last() else {
            return Ok(());
        };
        let width = usize::from(self.width.max(1));
        let physical = |cols: usize| cols.div_ceil(width).max(1);
        let up = above.iter().map(|row| physical(row.width)).sum::<usize>()
            + physical(last.width)
            - 1;
        if up > 0 {
            self.out.queue(MoveUp(to_u16(up)))?;
        }
        self.out
            .queue(MoveToColumn(0))?
            .queue(Clear(ClearType::FromCursorDown))?;
        self.frame.clear();
        Ok(())
    }

    fn build_rows(&self, state: &SelectionState, items: &[SelectableItem]) -> Vec<Row> {
        let max = usize::from(self.width.saturating_sub(1)).max(1);
        let mut rows = Vec::with_capacity(items.len() + 1);
        rows.push(self.fit(&self.header(state.mode()), max));
        for item in items {
            rows.push(self.fit(&self.item_segments(state, item), max));
        }
        rows
    }

    fn header(&self, mode: SelectionMode) -> Vec<Segment> {
        let theme = &self.theme;
        let moves = if theme.glyphs == crate::theme::Glyphs::UNICODE {
            "↑/↓"
        } else {
            "up/down"
        };
        let help = match mode {
            SelectionMode::Single => format!("  {moves} move, enter select, q cancel"),
            SelectionMode::Multi => {
                format!("  {moves} move, space toggle, enter confirm, q cancel")
            }
        };
        vec![
            Segment::colored(self.prompt.clone(), theme.accent).bold(),
            Segment::colored(help, theme.muted),
        ]
    }

    fn item_segments(&self, state: &SelectionState, item: &SelectableItem) -> Vec<Segment> {
        let theme = &self.theme;
        let glyphs = &theme.glyphs;
        let active = state.cursor() == item.ordinal;

        let mut segments = Vec::with_capacity(5);
        if active {
            segments.push(Segment::colored(glyphs.pointer, theme.accent));
        } else {
            segments.push(Segment::plain(" ".repeat(text_width(glyphs.pointer))));
        }
        segments.push(Segment::plain(" "));
        if state.mode() == SelectionMode::Multi {
            if state.is_chosen(item.ordinal) {
                segments.push(Segment::colored(format!("{} ", glyphs.chosen), theme.success));
            } else {
                segments.push(Segment::colored(format!("{} ", glyphs.unchosen), theme.muted));
            }
        }
        let label = if active {
            Segment::colored(item.label.clone(), theme.accent).bold()
        } else {
            Segment::plain(item.label.clone())
        };
        segments.push(label);
        if let Some(hint) = &item.hint {
            segments.push(Segment::colored(format!("  {hint}"), theme.muted));
        }
        segments
    }

    /// Render `segments`, dropping whatever does not fit in `max` columns.
    fn fit(&self, segments: &[Segment], max: usize) -> Row {
        let mut rendered = String::new();
        let mut width = 0;
        for segment in segments {
            let mut text = String::new();
            for ch in segment.text.chars() {
                // Control characters would move the cursor; never print them.
                let ch = if ch.is_control() { ' ' } else { ch };
                let w = ch.width().unwrap_or(0);
                if width + w > max {
                    break;
                }
                width += w;
                text.push(ch);
            }
            if !text.is_empty() {
                let styled = match (segment.color, segment.bold) {
                    (Some(color), true) => self.theme.paint_bold(&text, color).to_string(),
                    (Some(color), false) => self.theme.paint(&text, color).to_string(),
                    (None, _) => text.clone(),
                };
                rendered.push_str(&styled);
            }
            if width >= max {
                break;
            }
        }
        Row { rendered, width }
    }
}

fn text_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}
