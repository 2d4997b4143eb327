//! Image / animated GIF → image drawn out of glyphs.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, DynamicImage, Frame, GrayImage, Rgba, RgbImage, RgbaImage};

use super::{open_rgb, GlyphArtOptions};
use crate::files::{FileType, OutputType};
use crate::glyph::{grid_size, FontRasterizer, GlyphMapper, GlyphRasterizer, WeightTable, LEVELS};
use crate::jobs::{Conversion, ConversionContext, ConversionError, ConversionResult, RenderMode};
use crate::slots::PreviewArtifact;

/// Pre-rendered cell image for every glyph in a weight table.
#[derive(Debug)]
pub struct GlyphAtlas {
    cell: (u32, u32),
    cells: HashMap<u32, RgbaImage>,
}

impl GlyphAtlas {
    /// Render each candidate glyph once, ink over background per `mode`.
    pub fn build(
        table: &WeightTable,
        rasterizer: &dyn GlyphRasterizer,
        mode: RenderMode,
    ) -> ConversionResult<Self> {
        let (background, ink) = colors(mode);
        let mut cells = HashMap::new();
        for level in 0..LEVELS {
            for &code in table.candidates(level as u8) {
                if cells.contains_key(&code) {
                    continue;
                }
                let coverage = rasterizer.rasterize(code)?;
                cells.insert(code, tint(&coverage, background, ink));
            }
        }
        Ok(Self {
            cell: rasterizer.cell_size(),
            cells,
        })
    }

    pub fn cell_size(&self) -> (u32, u32) {
        self.cell
    }

    pub fn get(&self, code: u32) -> Option<&RgbaImage> {
        self.cells.get(&code)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// `(background, ink)` for a render mode.
fn colors(mode: RenderMode) -> (Rgba<u8>, Rgba<u8>) {
    match mode {
        RenderMode::WhiteOnBlack => (Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255])),
        RenderMode::BlackOnWhite => (Rgba([255, 255, 255, 255]), Rgba([0, 0, 0, 255])),
    }
}

fn tint(coverage: &GrayImage, background: Rgba<u8>, ink: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_fn(coverage.width(), coverage.height(), |x, y| {
        let a = coverage.get_pixel(x, y)[0] as u32;
        let mix = |bg: u8, fg: u8| ((bg as u32 * (255 - a) + fg as u32 * a) / 255) as u8;
        Rgba([
            mix(background[0], ink[0]),
            mix(background[1], ink[1]),
            mix(background[2], ink[2]),
            255,
        ])
    })
}

/// Draw `grid` as glyph cells. `on_row(done, total)` fires after each row.
pub fn render_art(
    grid: &GrayImage,
    mapper: &mut GlyphMapper,
    atlas: &GlyphAtlas,
    mode: RenderMode,
    mut on_row: impl FnMut(&RgbaImage, u32, u32),
) -> RgbaImage {
    let (cell_w, cell_h) = atlas.cell_size();
    let (w, h) = grid.dimensions();
    let (background, _) = colors(mode);
    let mut canvas = RgbaImage::from_pixel(w * cell_w, h * cell_h, background);

    for y in 0..h {
        for x in 0..w {
            let code = mapper.glyph_for_pixel(grid.get_pixel(x, y)[0], mode);
            if let Some(cell) = atlas.get(code) {
                imageops::overlay(
                    &mut canvas,
                    cell,
                    (x * cell_w) as i64,
                    (y * cell_h) as i64,
                );
            }
        }
        on_row(&canvas, y + 1, h);
    }
    canvas
}

/// Where the glyph shapes come from.
#[derive(Clone)]
pub enum GlyphSource {
    Rasterizer(Arc<dyn GlyphRasterizer>),
    /// Loaded when the job runs.
    Font {
        path: PathBuf,
        px: f32,
        cell: (u32, u32),
    },
}

impl std::fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphSource::Rasterizer(r) => write!(f, "Rasterizer(cell {:?})", r.cell_size()),
            GlyphSource::Font { path, px, cell } => f
                .debug_struct("Font")
                .field("path", path)
                .field("px", px)
                .field("cell", cell)
                .finish(),
        }
    }
}

impl GlyphSource {
    fn load(&self) -> ConversionResult<Arc<dyn GlyphRasterizer>> {
        match self {
            GlyphSource::Rasterizer(r) => Ok(Arc::clone(r)),
            GlyphSource::Font { path, px, cell } => {
                Ok(Arc::new(FontRasterizer::from_file(path, *px, *cell)?))
            }
        }
    }
}

/// Glyph-art conversion of a PNG or an animated GIF.
#[derive(Debug)]
pub struct Ascheatfy {
    options: GlyphArtOptions,
    glyphs: GlyphSource,
}

impl Ascheatfy {
    pub fn new(options: GlyphArtOptions, glyphs: GlyphSource) -> Self {
        Self { options, glyphs }
    }

    fn frame_grid(&self, image: &RgbImage, cell: (u32, u32)) -> GrayImage {
        let (cols, rows) = grid_size(
            image.width(),
            image.height(),
            self.options.resolution.columns(),
            cell,
        );
        let resized = imageops::resize(image, cols, rows, FilterType::Lanczos3);
        DynamicImage::ImageRgb8(resized).to_luma8()
    }

    fn convert_image(
        &self,
        ctx: &ConversionContext,
        input: &Path,
        mapper: &mut GlyphMapper,
        atlas: &GlyphAtlas,
    ) -> ConversionResult<()> {
        ctx.set_preview(PreviewArtifact::File(input.to_path_buf()));
        let image = open_rgb(input)?;

        ctx.report_status("ascheatfying...");
        let grid = self.frame_grid(&image, atlas.cell_size());
        let result = render_art(&grid, mapper, atlas, self.options.mode, |canvas, done, total| {
            if done == total || done % 8 == 0 {
                ctx.set_preview(PreviewArtifact::Image(Arc::new(canvas.clone())));
            }
            ctx.report_progress(90.0 * done as f32 / total as f32);
        });
        ctx.report_progress(90.0);

        ctx.report_status("saving image");
        result
            .save(ctx.output_path())
            .map_err(|e| ConversionError::image("save image", e))
    }

    fn convert_gif(
        &self,
        ctx: &ConversionContext,
        input: &Path,
        mapper: &mut GlyphMapper,
        atlas: &GlyphAtlas,
    ) -> ConversionResult<()> {
        ctx.report_status("processing gif...");
        let file = File::open(input).map_err(|e| ConversionError::io("open gif", e))?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .map_err(|e| ConversionError::image("decode gif", e))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| ConversionError::image("decode gif frames", e))?;
        if frames.is_empty() {
            return Err(ConversionError::Unsupported("gif has no frames".to_string()));
        }
        let count = frames.len();
        ctx.logger().debug(&format!("{} frames", count));
        ctx.report_progress(10.0);

        ctx.report_status("ascheatfying...");
        let mut rendered = Vec::with_capacity(count);
        for (index, frame) in frames.into_iter().enumerate() {
            let delay = frame.delay();
            let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
            let grid = self.frame_grid(&rgb, atlas.cell_size());
            let art = render_art(&grid, mapper, atlas, self.options.mode, |_, _, _| {});
            ctx.set_preview(PreviewArtifact::Image(Arc::new(art.clone())));
            ctx.report_progress(10.0 + index as f32 * 80.0 / count as f32);
            rendered.push(Frame::from_parts(art, 0, 0, delay));
        }

        ctx.report_status("saving gif...");
        let out = File::create(ctx.output_path()).map_err(|e| ConversionError::io("create gif", e))?;
        let mut encoder = GifEncoder::new(BufWriter::new(out));
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ConversionError::image("encode gif", e))?;
        encoder
            .encode_frames(rendered)
            .map_err(|e| ConversionError::image("encode gif", e))
    }
}

impl Conversion for Ascheatfy {
    fn name(&self) -> &str {
        "Ascheatfy"
    }

    fn input_types(&self) -> &[FileType] {
        &[FileType::Png, FileType::Gif]
    }

    fn output_type(&self) -> OutputType {
        OutputType::MatchInput
    }

    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()> {
        let input = ctx
            .input_path()
            .ok_or_else(|| ConversionError::other("no input image"))?
            .to_path_buf();

        let mut mapper = self.options.mapper()?;
        let rasterizer = self.glyphs.load()?;
        let atlas = GlyphAtlas::build(mapper.table(), rasterizer.as_ref(), self.options.mode)?;
        ctx.logger()
            .debug(&format!("rendered {} glyph cells", atlas.len()));

        ctx.report_progress(0.0);
        ctx.report_status("loading...");

        let is_gif = input
            .extension()
            .and_then(|e| FileType::from_extension(&e.to_string_lossy()))
            == Some(FileType::Gif);
        if is_gif {
            self.convert_gif(ctx, &input, &mut mapper, &atlas)?;
        } else {
            self.convert_image(ctx, &input, &mut mapper, &atlas)?;
        }

        ctx.report_progress(100.0);
        ctx.report_status("ascheatfied.");
        Ok(())
    }
}
