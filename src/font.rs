//! Font cell measurement
//!
//! Resolves a font family against an explicitly supplied font database
//! and measures the pixel size of one monospace character cell: advance
//! width of a reference digit, line height from the scaled ascent,
//! descent and leading. Stateless; the caller owns the database.

use fontdb::{Database, Family, Query};
use swash::FontRef;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("no installed font matches family `{0}`")]
    FamilyNotFound(String),

    #[error("failed to load face data for family `{0}`")]
    Face(String),

    #[error("font for family `{0}` has no measurable reference glyph")]
    NoGlyph(String),
}

pub type Result<T> = std::result::Result<T, FontError>;

/// Pixel dimensions of one character cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f32,
    pub height: f32,
}

/// Measure the cell for `family` at `size_px` pixels per em.
///
/// Falls back to the database's monospace face when the named family is
/// not installed; fails only when neither resolves.
pub fn measure(db: &Database, family: &str, size_px: f32) -> Result<CellMetrics> {
    let query = Query {
        families: &[Family::Name(family), Family::Monospace],
        ..Query::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| FontError::FamilyNotFound(family.to_string()))?;

    db.with_face_data(id, |data, index| measure_face(data, index, size_px))
        .ok_or_else(|| FontError::Face(family.to_string()))?
        .ok_or_else(|| FontError::NoGlyph(family.to_string()))
}

fn measure_face(data: &[u8], index: u32, size_px: f32) -> Option<CellMetrics> {
    let font = FontRef::from_index(data, index as usize)?;

    let metrics = font.metrics(&[]).scale(size_px);
    let glyph = font.charmap().map('0');
    if glyph == 0 {
        return None;
    }
    let advance = font.glyph_metrics(&[]).scale(size_px).advance_width(glyph);
    if advance <= 0.0 {
        return None;
    }

    Some(CellMetrics {
        width: advance,
        height: metrics.ascent + metrics.descent + metrics.leading,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_family_in_empty_database_fails() {
        let db = Database::new();
        let err = measure(&db, "Definitely Not A Font", 14.0).err();
        assert!(matches!(err, Some(FontError::FamilyNotFound(_))));
    }
}
