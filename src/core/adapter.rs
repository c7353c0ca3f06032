//! Adapter facade
//!
//! Wires one RPC session, one decoder, one emitter and one geometry
//! negotiator into the adapter's public surface, and drives the single
//! event stream: each inbound notification is processed to completion
//! before the next one is accepted, which is what keeps highlight and
//! cursor interpretation consistent.

use std::path::PathBuf;
use std::time::Duration;

use rmpv::Value;
use tracing::{info, warn};

use super::redraw::RedrawDecoder;
use super::session::{Result, Session, SessionEvent, SessionState};
use crate::config::Config;
use crate::emitter::{ActionEmitter, Subscription};
use crate::font::{self, CellMetrics, FontError};
use crate::geometry::{GeometryNegotiator, GridSize};
use crate::plugin::PluginHost;

/// Grid used for the initial UI attach, before any viewport is known.
const DEFAULT_GRID: GridSize = GridSize { rows: 40, cols: 80 };

/// One attached editor UI session, from spawn to disconnect.
pub struct UiAdapter {
    session: Session,
    decoder: RedrawDecoder,
    emitter: ActionEmitter,
    geometry: GeometryNegotiator,
    plugins: Box<dyn PluginHost>,
    fonts: fontdb::Database,
}

impl UiAdapter {
    /// Spawn the editor, attach the UI and return a ready adapter.
    ///
    /// Spawn and attach failures are fatal: there is no degraded mode
    /// without an attached backend.
    pub fn start(
        config: &Config,
        files: Vec<PathBuf>,
        plugins: Box<dyn PluginHost>,
    ) -> Result<Self> {
        let mut session = Session::start(&config.editor, &files)?;
        let attach_grid = config.fixed_grid().unwrap_or(DEFAULT_GRID);
        session.attach(attach_grid.cols, attach_grid.rows)?;
        info!(
            rows = attach_grid.rows,
            cols = attach_grid.cols,
            "editor attached"
        );

        let mut fonts = fontdb::Database::new();
        fonts.load_system_fonts();

        Ok(Self {
            session,
            decoder: RedrawDecoder::new(),
            emitter: ActionEmitter::new(),
            geometry: GeometryNegotiator::new(config.fixed_grid()),
            plugins,
            fonts,
        })
    }

    /// Measure the font and renegotiate the grid from the last-known
    /// viewport. The previous metrics stay in effect on failure.
    pub fn set_font(&mut self, family: &str, size: f32) -> std::result::Result<CellMetrics, FontError> {
        let metrics = font::measure(&self.fonts, family, size)?;
        self.geometry.apply_font(metrics, &mut self.session);
        Ok(metrics)
    }

    /// Apply a new pixel viewport and renegotiate the grid.
    pub fn set_viewport(&mut self, width_px: u32, height_px: u32) {
        self.geometry
            .apply_viewport(width_px, height_px, &mut self.session);
    }

    /// Register an observer for the ordered action stream.
    pub fn subscribe_actions<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&super::redraw::UiAction) + 'static,
    {
        self.emitter.subscribe_actions(observer)
    }

    /// Register an observer for the mode-change signal.
    pub fn subscribe_modes<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&str) + 'static,
    {
        self.emitter.subscribe_modes(observer)
    }

    #[allow(dead_code)]
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.emitter.unsubscribe(subscription);
    }

    /// Feed keys through to the editor.
    #[allow(dead_code)]
    pub fn input(&self, keys: &str) -> Result<Value> {
        self.session.input(keys)
    }

    /// Execute an ex command.
    pub fn command(&self, command: &str) -> Result<Value> {
        self.session.command(command)
    }

    /// Passthrough RPC call.
    #[allow(dead_code)]
    pub fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.session.call(method, params)
    }

    /// Drain every queued event without blocking. Returns `false` once
    /// the session has disconnected.
    pub fn pump(&mut self) -> bool {
        while let Some(event) = self.session.try_event() {
            if !self.handle_event(event) {
                return false;
            }
        }
        self.session.state() != SessionState::Disconnected
    }

    /// Wait up to `timeout` for an event, then drain the queue.
    pub fn pump_wait(&mut self, timeout: Duration) -> bool {
        match self.session.wait_event(timeout) {
            Some(event) => {
                if !self.handle_event(event) {
                    return false;
                }
                self.pump()
            }
            None => self.session.state() != SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The grid most recently negotiated with the backend.
    pub fn grid(&self) -> Option<GridSize> {
        self.geometry.grid().or_else(|| self.session.grid())
    }

    /// Ask the editor to quit and tear the session down.
    pub fn shutdown(&mut self) {
        self.decoder.shutdown();
        self.session.shutdown();
    }

    /// Process one event to completion. Returns `false` on disconnect.
    fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Notification { method, params } => {
                self.decoder.handle_notification(
                    &method,
                    &params,
                    &mut self.emitter,
                    self.plugins.as_mut(),
                );
                true
            }
            SessionEvent::Request { msgid, method, .. } => {
                // No request surface is exposed to the backend; answer
                // with an error so the editor is not left waiting.
                warn!(method = %method, "rejecting editor-initiated request");
                let error = Value::from(format!("method `{method}` is not supported"));
                if let Err(err) = self.session.respond(msgid, error, Value::Nil) {
                    warn!("failed to answer editor request: {err}");
                }
                true
            }
            SessionEvent::Disconnected => {
                info!("editor disconnected");
                self.decoder.shutdown();
                self.session.mark_disconnected();
                false
            }
        }
    }
}
