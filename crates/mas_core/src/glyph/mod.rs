//! Glyph weights, brightness mapping and rasterization.
//!
//! Shared by the text-art converters. A [`WeightTable`] says how dark each
//! glyph renders; a [`GlyphMapper`] picks glyphs for pixel brightness; a
//! [`GlyphRasterizer`] draws them back into pixels.

mod mapper;
mod raster;
mod weights;

pub use mapper::GlyphMapper;
pub use raster::{FontRasterizer, GlyphRasterizer};
pub use weights::{WeightTable, WeightTableError, LEVELS};

#[cfg(test)]
pub(crate) use raster::test_support;

/// Glyph grid `(columns, rows)` for an image of `width`x`height`.
///
/// Rows are chosen so the rendered text keeps the image's aspect ratio
/// given the cell proportions. Always at least one row and column.
pub fn grid_size(width: u32, height: u32, columns: u32, cell: (u32, u32)) -> (u32, u32) {
    let columns = columns.max(1);
    if width == 0 || height == 0 {
        return (columns, 1);
    }
    let (cell_w, cell_h) = (cell.0.max(1) as f64, cell.1.max(1) as f64);
    let rows = (columns as f64 * height as f64 * cell_w / (width as f64 * cell_h)).floor() as u32;
    (columns, rows.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_preserves_aspect_for_cell_shape() {
        // 10x22 cells: a square image needs fewer rows than columns.
        assert_eq!(grid_size(1000, 1000, 100, (10, 22)), (100, 45));
        assert_eq!(grid_size(200, 100, 50, (10, 10)), (50, 25));
    }

    #[test]
    fn grid_has_at_least_one_row() {
        assert_eq!(grid_size(5000, 10, 50, (10, 22)), (50, 1));
        assert_eq!(grid_size(0, 0, 0, (10, 22)), (1, 1));
    }
}
