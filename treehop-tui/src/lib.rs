pub mod fallback;
pub mod menu;
pub mod render;
pub mod signal;
pub mod terminal;
pub mod theme;

pub use menu::{MenuError, MenuOptions, MenuOutcome, select};
pub use theme::Theme;
