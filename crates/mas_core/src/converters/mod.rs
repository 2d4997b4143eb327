//! The job kinds.

mod ascheatfy;
mod asciify;
mod gan_image;
mod gan_video;
mod model;
mod sonify;

pub use ascheatfy::{render_art, Ascheatfy, GlyphAtlas, GlyphSource};
pub use asciify::{render_text, Asciify};
pub use gan_image::GenerativeImage;
pub use gan_video::{parse_duration, GenerativeVideo, LatentStream};
pub use model::{
    gaussian_latent, latent_from_image, GenerativeModel, ModelLoader, ModelSpec, ProceduralModel,
    ProceduralModelLoader,
};
pub use sonify::{Note, Sonify};

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::glyph::{GlyphMapper, WeightTable};
use crate::jobs::{ConversionError, ConversionResult, RenderMode, Resolution};

/// Parameters shared by the text-art converters.
#[derive(Debug, Clone)]
pub struct GlyphArtOptions {
    pub resolution: Resolution,
    /// One glyph per brightness level instead of a random pick per pixel.
    pub static_palette: bool,
    pub mode: RenderMode,
    pub weights: PathBuf,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl GlyphArtOptions {
    pub fn new(weights: impl Into<PathBuf>) -> Self {
        Self {
            resolution: Resolution::default(),
            static_palette: false,
            mode: RenderMode::default(),
            weights: weights.into(),
            seed: None,
        }
    }

    /// Load the weight table and build a mapper for it.
    pub fn mapper(&self) -> ConversionResult<GlyphMapper> {
        let table = WeightTable::load(&self.weights)?;
        let mapper = match self.seed {
            Some(seed) => GlyphMapper::seeded(table, seed),
            None => GlyphMapper::new(table),
        };
        Ok(if self.static_palette {
            mapper.with_static_palette()
        } else {
            mapper
        })
    }
}

/// Open an image as 8-bit RGB.
pub(crate) fn open_rgb(path: &Path) -> ConversionResult<RgbImage> {
    Ok(image::open(path)
        .map_err(|e| ConversionError::image("open input", e))?
        .to_rgb8())
}
