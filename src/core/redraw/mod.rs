//! Redraw pipeline: decoded commands, highlight state and the decoder.

mod action;
mod decoder;
mod highlight;

pub use action::{ScreenCommand, UiAction};
pub use decoder::{RedrawDecoder, PLUGIN_METHOD, REDRAW_METHOD};
pub use highlight::{Color, Highlight, HighlightFlags, HighlightTracker};
