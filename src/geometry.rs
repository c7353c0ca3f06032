//! Grid geometry negotiation
//!
//! Converts the host's pixel viewport and the measured font cell into the
//! backend's row/column grid, and renegotiates the grid over RPC whenever
//! it actually changes. A fixed-grid override from configuration bypasses
//! the pixel-derived computation entirely.

use tracing::{debug, warn};

use crate::core::session::SessionError;
use crate::font::CellMetrics;

/// The backend's rows × columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub rows: u16,
    pub cols: u16,
}

/// Receiver of resize requests; implemented by the RPC session.
pub trait ResizeTarget {
    fn request_resize(&mut self, cols: u16, rows: u16) -> Result<(), SessionError>;
}

/// Derives and renegotiates the grid size.
pub struct GeometryNegotiator {
    metrics: Option<CellMetrics>,
    viewport: Option<(u32, u32)>,
    negotiated: Option<GridSize>,
    fixed: Option<GridSize>,
}

impl GeometryNegotiator {
    /// `fixed` forces a grid size; viewport and font changes will never
    /// override it.
    pub fn new(fixed: Option<GridSize>) -> Self {
        Self {
            metrics: None,
            viewport: None,
            negotiated: None,
            fixed,
        }
    }

    /// Record freshly measured cell metrics and renegotiate from the
    /// last-known viewport.
    pub fn apply_font(&mut self, metrics: CellMetrics, target: &mut dyn ResizeTarget) {
        self.metrics = Some(metrics);
        self.renegotiate(target);
    }

    /// Record a new pixel viewport and renegotiate. Deferred until cell
    /// metrics exist: without a font there is no grid to derive.
    pub fn apply_viewport(&mut self, width_px: u32, height_px: u32, target: &mut dyn ResizeTarget) {
        self.viewport = Some((width_px, height_px));
        self.renegotiate(target);
    }

    /// The grid most recently requested from the backend.
    pub fn grid(&self) -> Option<GridSize> {
        self.negotiated.or(self.fixed)
    }

    /// Issue a resize request if the derived grid differs from the last
    /// one requested. Latest wins: recomputing replaces any stale goal,
    /// and an unchanged grid is never re-sent.
    fn renegotiate(&mut self, target: &mut dyn ResizeTarget) {
        let Some(grid) = self.derive() else { return };
        if self.negotiated == Some(grid) {
            return;
        }

        match target.request_resize(grid.cols, grid.rows) {
            Ok(()) => {
                debug!(rows = grid.rows, cols = grid.cols, "negotiated grid size");
                self.negotiated = Some(grid);
            }
            // The previous grid stays in effect; no automatic retry.
            Err(err) => warn!("resize request failed: {err}"),
        }
    }

    fn derive(&self) -> Option<GridSize> {
        if let Some(fixed) = self.fixed {
            return Some(fixed);
        }
        let metrics = self.metrics?;
        let (width_px, height_px) = self.viewport?;

        let cols = (width_px as f32 / metrics.width).floor() as u16;
        let rows = (height_px as f32 / metrics.height).floor() as u16;
        if cols == 0 || rows == 0 {
            return None;
        }
        Some(GridSize { rows, cols })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTarget {
        requests: Vec<(u16, u16)>,
        fail: bool,
    }

    impl RecordingTarget {
        fn new() -> Self {
            Self {
                requests: Vec::new(),
                fail: false,
            }
        }
    }

    impl ResizeTarget for RecordingTarget {
        fn request_resize(&mut self, cols: u16, rows: u16) -> Result<(), SessionError> {
            if self.fail {
                return Err(SessionError::Disconnected);
            }
            self.requests.push((cols, rows));
            Ok(())
        }
    }

    fn metrics(width: f32, height: f32) -> CellMetrics {
        CellMetrics { width, height }
    }

    #[test]
    fn viewport_with_ten_pixel_cells_yields_80_by_40() {
        let mut negotiator = GeometryNegotiator::new(None);
        let mut target = RecordingTarget::new();

        negotiator.apply_font(metrics(10.0, 10.0), &mut target);
        negotiator.apply_viewport(805, 403, &mut target);

        assert_eq!(target.requests, vec![(80, 40)]);
        assert_eq!(
            negotiator.grid(),
            Some(GridSize { rows: 40, cols: 80 })
        );
    }

    #[test]
    fn unchanged_grid_is_not_renegotiated() {
        let mut negotiator = GeometryNegotiator::new(None);
        let mut target = RecordingTarget::new();

        negotiator.apply_font(metrics(10.0, 10.0), &mut target);
        negotiator.apply_viewport(805, 403, &mut target);
        // Maps to the same 80x40 grid by floor division.
        negotiator.apply_viewport(809, 407, &mut target);

        assert_eq!(target.requests.len(), 1);
    }

    #[test]
    fn viewport_before_font_is_deferred() {
        let mut negotiator = GeometryNegotiator::new(None);
        let mut target = RecordingTarget::new();

        negotiator.apply_viewport(805, 403, &mut target);
        assert!(target.requests.is_empty());

        negotiator.apply_font(metrics(10.0, 10.0), &mut target);
        assert_eq!(target.requests, vec![(80, 40)]);
    }

    #[test]
    fn fixed_override_ignores_viewport_and_font() {
        let mut negotiator = GeometryNegotiator::new(Some(GridSize { rows: 24, cols: 100 }));
        let mut target = RecordingTarget::new();

        negotiator.apply_font(metrics(10.0, 10.0), &mut target);
        negotiator.apply_viewport(805, 403, &mut target);
        negotiator.apply_viewport(1920, 1080, &mut target);

        assert_eq!(target.requests, vec![(100, 24)]);
        assert_eq!(
            negotiator.grid(),
            Some(GridSize { rows: 24, cols: 100 })
        );
    }

    #[test]
    fn failed_resize_keeps_previous_grid() {
        let mut negotiator = GeometryNegotiator::new(None);
        let mut target = RecordingTarget::new();

        negotiator.apply_font(metrics(10.0, 10.0), &mut target);
        negotiator.apply_viewport(800, 400, &mut target);

        target.fail = true;
        negotiator.apply_viewport(1600, 400, &mut target);

        // The old grid is still the negotiated one, and the failed goal
        // will be retried only when geometry changes again.
        assert_eq!(
            negotiator.grid(),
            Some(GridSize { rows: 40, cols: 80 })
        );

        target.fail = false;
        negotiator.apply_viewport(1600, 400, &mut target);
        assert_eq!(target.requests.last(), Some(&(160, 40)));
    }
}
