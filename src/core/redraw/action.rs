//! Decoded screen commands and emitted UI actions
//!
//! A `ScreenCommand` is the transient result of decoding one redraw batch;
//! it lives only for the duration of a single notification pass. A
//! `UiAction` is the normalized output unit handed to subscribers, one per
//! successfully decoded command, in decode order.

use super::highlight::{Color, Highlight};

/// A primitive decoded from one redraw batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCommand {
    CursorGoto { row: u16, col: u16 },
    Put(String),
    SetScrollRegion { top: u16, bottom: u16, left: u16, right: u16 },
    Scroll(i64),
    SetHighlight(Highlight),
    Resize { rows: u16, cols: u16 },
    EolClear,
    Clear,
    UpdateForeground(Option<Color>),
    UpdateBackground(Option<Color>),
    ModeChange(String),
}

/// One ordered UI update, published to subscribers.
///
/// `Put` carries the highlight snapshot that was active when the batch was
/// decoded, so a consumer never has to reconstruct attribute state.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    CursorGoto { row: u16, col: u16 },
    Put { text: String, highlight: Highlight },
    SetScrollRegion { top: u16, bottom: u16, left: u16, right: u16 },
    Scroll { count: i64 },
    SetHighlight(Highlight),
    Resize { rows: u16, cols: u16 },
    EolClear,
    Clear,
    SetForeground(Option<Color>),
    SetBackground(Option<Color>),
    ModeChange(String),
}
