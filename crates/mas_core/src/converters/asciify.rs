//! Image → text art.

use std::fs;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

use super::{open_rgb, GlyphArtOptions};
use crate::files::{FileType, OutputType};
use crate::glyph::{grid_size, GlyphMapper};
use crate::jobs::{Conversion, ConversionContext, ConversionError, ConversionResult, RenderMode};
use crate::slots::PreviewArtifact;

/// Render a grayscale grid as text, one glyph per pixel.
pub fn render_text(grid: &GrayImage, mapper: &mut GlyphMapper, mode: RenderMode) -> String {
    let (w, h) = grid.dimensions();
    let mut text = String::with_capacity(((w + 1) * h) as usize);
    for y in 0..h {
        for x in 0..w {
            text.push(mapper.char_for_pixel(grid.get_pixel(x, y)[0], mode));
        }
        text.push('\n');
    }
    text
}

/// Image → UTF-8 text file.
#[derive(Debug)]
pub struct Asciify {
    options: GlyphArtOptions,
    /// Character cell of the rendered text.
    cell: (u32, u32),
}

impl Asciify {
    pub fn new(options: GlyphArtOptions, cell: (u32, u32)) -> Self {
        Self { options, cell }
    }
}

impl Conversion for Asciify {
    fn name(&self) -> &str {
        "Asciify"
    }

    fn input_types(&self) -> &[FileType] {
        &[FileType::Png, FileType::Jpg]
    }

    fn output_type(&self) -> OutputType {
        OutputType::Fixed(FileType::Txt)
    }

    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()> {
        let input = ctx
            .input_path()
            .ok_or_else(|| ConversionError::other("no input image"))?;
        ctx.set_preview(PreviewArtifact::File(input.to_path_buf()));
        ctx.report_progress(0.0);

        ctx.report_status("preparing weights...");
        let mut mapper = self.options.mapper()?;
        ctx.report_progress(10.0);

        ctx.report_status("asciifying image...");
        let image = open_rgb(input)?;
        let (cols, rows) = grid_size(
            image.width(),
            image.height(),
            self.options.resolution.columns(),
            self.cell,
        );
        let resized = imageops::resize(&image, cols, rows, FilterType::Lanczos3);
        let grid = DynamicImage::ImageRgb8(resized).to_luma8();
        let text = render_text(&grid, &mut mapper, self.options.mode);
        ctx.report_progress(90.0);

        ctx.set_preview(PreviewArtifact::Text(text.as_str().into()));

        ctx.report_status("saving...");
        fs::write(ctx.output_path(), &text).map_err(|e| ConversionError::io("write text", e))?;
        ctx.report_progress(100.0);
        ctx.report_status("asciified image.");
        Ok(())
    }
}
