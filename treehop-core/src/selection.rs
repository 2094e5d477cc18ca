use crate::key::KeyEvent;
use std::collections::BTreeSet;

/// One entry in a menu. Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableItem {
    pub label: String,
    /// Opaque to the menu; callers use it to map a choice back to their data.
    pub identifier: String,
    pub ordinal: usize,
    /// Secondary text rendered after the label.
    pub hint: Option<String>,
}

impl SelectableItem {
    pub fn new(ordinal: usize, label: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.into(),
            ordinal,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Build items whose identifier equals their label.
pub fn items_from_labels<I, S>(labels: I) -> Vec<SelectableItem>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels
        .into_iter()
        .enumerate()
        .map(|(ordinal, label)| {
            let label = label.into();
            SelectableItem::new(ordinal, label.clone(), label)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStatus {
    Active,
    Confirmed,
    Cancelled,
}

/// How much of the menu needs repainting after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    Nothing,
    /// Rewrite only the rows that changed.
    Changed,
    /// Geometry may have changed; repaint everything.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("nothing to select")]
    NothingToSelect,
}

#[derive(Debug, Clone)]
pub struct SelectionState {
    cursor: usize,
    item_count: usize,
    mode: SelectionMode,
    chosen: BTreeSet<usize>,
    status: SelectionStatus,
}

impl SelectionState {
    pub fn new(item_count: usize, mode: SelectionMode) -> Result<Self, SelectionError> {
        if item_count == 0 {
            return Err(SelectionError::NothingToSelect);
        }
        Ok(Self {
            cursor: 0,
            item_count,
            mode,
            chosen: BTreeSet::new(),
            status: SelectionStatus::Active,
        })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn status(&self) -> SelectionStatus {
        self.status
    }

    pub fn is_chosen(&self, ordinal: usize) -> bool {
        self.chosen.contains(&ordinal)
    }

    /// Chosen ordinals in ascending order.
    pub fn chosen(&self) -> Vec<usize> {
        self.chosen.iter().copied().collect()
    }

    /// Apply one key event. Events after confirmation or cancellation are ignored.
    pub fn apply(&mut self, event: KeyEvent) -> Redraw {
        if self.status != SelectionStatus::Active {
            return Redraw::Nothing;
        }

        match event {
            KeyEvent::Up => {
                self.cursor = if self.cursor == 0 {
                    self.item_count - 1
                } else {
                    self.cursor - 1
                };
                Redraw::Changed
            }
            KeyEvent::Down => {
                self.cursor = (self.cursor + 1) % self.item_count;
                Redraw::Changed
            }
            KeyEvent::Toggle => match self.mode {
                SelectionMode::Single => Redraw::Nothing,
                SelectionMode::Multi => {
                    if !self.chosen.remove(&self.cursor) {
                        self.chosen.insert(self.cursor);
                    }
                    Redraw::Changed
                }
            },
            KeyEvent::Confirm => {
                match self.mode {
                    SelectionMode::Single => {
                        self.chosen.clear();
                        self.chosen.insert(self.cursor);
                    }
                    SelectionMode::Multi => {
                        if self.chosen.is_empty() {
                            self.chosen.insert(self.cursor);
                        }
                    }
                }
                self.status = SelectionStatus::Confirmed;
                Redraw::Changed
            }
            KeyEvent::Cancel => {
                self.chosen.clear();
                self.status = SelectionStatus::Cancelled;
                Redraw::Changed
            }
            KeyEvent::Resize => Redraw::Full,
            KeyEvent::Char(digit @ b'1'..=b'9') => {
                let target = usize::from(digit - b'1');
                if target < self.item_count && target != self.cursor {
                    self.cursor = target;
                    Redraw::Changed
                } else {
                    Redraw::Nothing
                }
            }
            KeyEvent::Char(_) | KeyEvent::Unknown => Redraw::Nothing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SelectionInputError {
    message: String,
}

impl SelectionInputError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Parse a numbered-prompt answer into 0-based ordinals.
///
/// Accepts one 1-based index, or in multi mode a comma and/or whitespace
/// separated list. The result is sorted and deduplicated.
pub fn parse_numbered_selection(
    input: &str,
    item_count: usize,
    mode: SelectionMode,
) -> Result<Vec<usize>, SelectionInputError> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(SelectionInputError::new("no selection entered"));
    }
    if mode == SelectionMode::Single && tokens.len() > 1 {
        return Err(SelectionInputError::new(format!(
            "expected a single number between 1 and {item_count}"
        )));
    }

    let mut ordinals = BTreeSet::new();
    for token in tokens {
        let Ok(index) = token.parse::<usize>() else {
            return Err(SelectionInputError::new(format!(
                "'{token}' is not a number"
            )));
        };
        if index == 0 || index > item_count {
            return Err(SelectionInputError::new(format!(
                "{index} is out of range (1-{item_count})"
            )));
        }
        ordinals.insert(index - 1);
    }

    Ok(ordinals.into_iter().collect())
}
