//! Highlight attribute state
//!
//! Tracks the text attributes that apply to subsequently written cells.
//! `highlight_set` replaces the whole set atomically; cell writes read a
//! snapshot of it, so interleaving decode and emission stays consistent.

use bitflags::bitflags;

bitflags! {
    /// Boolean text attributes carried by a highlight set.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct HighlightFlags: u8 {
        const BOLD      = 0b0000_0001;
        const ITALIC    = 0b0000_0010;
        const REVERSE   = 0b0000_0100;
        const UNDERLINE = 0b0000_1000;
        const UNDERCURL = 0b0001_0000;
        const STANDOUT  = 0b0010_0000;
    }
}

/// A 24-bit color as delivered by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decode a packed `0xRRGGBB` integer.
    pub fn from_u32(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }
}

/// The active attribute set. `None` colors mean "use the default".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Highlight {
    pub flags: HighlightFlags,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
}

#[allow(dead_code)]
impl Highlight {
    pub fn bold(&self) -> bool {
        self.flags.contains(HighlightFlags::BOLD)
    }

    pub fn italic(&self) -> bool {
        self.flags.contains(HighlightFlags::ITALIC)
    }

    pub fn reverse(&self) -> bool {
        self.flags.contains(HighlightFlags::REVERSE)
    }

    pub fn underline(&self) -> bool {
        self.flags.contains(HighlightFlags::UNDERLINE)
    }

    pub fn undercurl(&self) -> bool {
        self.flags.contains(HighlightFlags::UNDERCURL)
    }

    pub fn standout(&self) -> bool {
        self.flags.contains(HighlightFlags::STANDOUT)
    }
}

/// Owner of the single mutable highlight instance per session.
#[derive(Debug, Default)]
pub struct HighlightTracker {
    current: Highlight,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every field of the active set at once.
    pub fn apply(&mut self, highlight: Highlight) {
        self.current = highlight;
    }

    /// Snapshot of the active set, for attaching to cell-write actions.
    pub fn current(&self) -> Highlight {
        self.current.clone()
    }
}
