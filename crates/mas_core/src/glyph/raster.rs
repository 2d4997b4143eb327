//! Glyph rasterization into fixed-size cells.

use std::fs;
use std::path::Path;

use fontdue::{Font, FontSettings};
use image::{GrayImage, Luma};

use crate::jobs::ConversionError;

/// Renders a glyph as an ink-coverage cell (0 = empty, 255 = full ink).
pub trait GlyphRasterizer: Send + Sync {
    /// Cell `(width, height)` in pixels.
    fn cell_size(&self) -> (u32, u32);

    fn rasterize(&self, code: u32) -> Result<GrayImage, ConversionError>;
}

/// fontdue-backed rasterizer that centres each glyph on a common baseline.
pub struct FontRasterizer {
    font: Font,
    px: f32,
    cell: (u32, u32),
}

impl std::fmt::Debug for FontRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRasterizer")
            .field("px", &self.px)
            .field("cell", &self.cell)
            .finish()
    }
}

impl FontRasterizer {
    pub fn from_file(path: &Path, px: f32, cell: (u32, u32)) -> Result<Self, ConversionError> {
        let bytes = fs::read(path).map_err(|e| ConversionError::io("read font", e))?;
        Self::from_bytes(&bytes, px, cell)
    }

    pub fn from_bytes(bytes: &[u8], px: f32, cell: (u32, u32)) -> Result<Self, ConversionError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| ConversionError::Font(e.to_string()))?;
        Ok(Self { font, px, cell })
    }
}

impl GlyphRasterizer for FontRasterizer {
    fn cell_size(&self) -> (u32, u32) {
        self.cell
    }

    fn rasterize(&self, code: u32) -> Result<GrayImage, ConversionError> {
        let ch = char::from_u32(code)
            .ok_or_else(|| ConversionError::Font(format!("invalid code point {}", code)))?;
        let (cell_w, cell_h) = self.cell;
        let mut cell = GrayImage::new(cell_w, cell_h);

        let (metrics, bitmap) = self.font.rasterize(ch, self.px);
        if metrics.width == 0 || metrics.height == 0 {
            return Ok(cell);
        }

        let (ascent, descent) = self
            .font
            .horizontal_line_metrics(self.px)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((self.px * 0.8, -self.px * 0.2));
        let line_height = ascent - descent;
        let baseline = (cell_h as f32 - line_height) / 2.0 + ascent;

        let left = ((cell_w as f32 - metrics.width as f32) / 2.0).round() as i64;
        let top = (baseline - (metrics.ymin as f32 + metrics.height as f32)).round() as i64;

        for row in 0..metrics.height {
            let y = top + row as i64;
            if y < 0 || y >= cell_h as i64 {
                continue;
            }
            for col in 0..metrics.width {
                let x = left + col as i64;
                if x < 0 || x >= cell_w as i64 {
                    continue;
                }
                let coverage = bitmap[row * metrics.width + col];
                cell.put_pixel(x as u32, y as u32, Luma([coverage]));
            }
        }

        Ok(cell)
    }
}
