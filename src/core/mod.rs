//! Core adapter components.
//!
//! This module contains the protocol adapter and event-translation core:
//!
//! - **process**: embedded editor subprocess with piped stdio
//! - **rpc**: msgpack-RPC frame codec
//! - **session**: RPC session lifecycle, calls and inbound event stream
//! - **redraw**: redraw decoding, highlight state and UI actions
//! - **adapter**: the facade tying the pieces together
//!
//! # Architecture
//!
//! ```text
//! UiAdapter
//! ├── Session
//! │   ├── EditorProcess (nvim --embed, stdio pipes)
//! │   └── reader thread (rpc frames → events, responses → callers)
//! ├── RedrawDecoder
//! │   └── HighlightTracker
//! ├── GeometryNegotiator
//! └── ActionEmitter
//! ```

pub mod adapter;
pub mod process;
pub mod redraw;
pub mod rpc;
pub mod session;
