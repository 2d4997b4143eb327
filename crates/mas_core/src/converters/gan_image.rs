//! Generative model → single image.

use std::sync::Arc;

use image::DynamicImage;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::model::{gaussian_latent, latent_from_image, ModelLoader};
use crate::files::{FileType, OutputType};
use crate::jobs::{Conversion, ConversionContext, ConversionError, ConversionResult, Dataset};
use crate::slots::PreviewArtifact;

/// Generate one picture, seeded from an optional input image.
pub struct GenerativeImage {
    dataset: Dataset,
    loader: Arc<dyn ModelLoader>,
    seed: Option<u64>,
}

impl std::fmt::Debug for GenerativeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeImage")
            .field("dataset", &self.dataset)
            .field("seed", &self.seed)
            .finish()
    }
}

impl GenerativeImage {
    pub fn new(dataset: Dataset, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            dataset,
            loader,
            seed: None,
        }
    }

    /// Fix the noise seed used when there is no input image.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Conversion for GenerativeImage {
    fn name(&self) -> &str {
        "GAN"
    }

    fn input_types(&self) -> &[FileType] {
        &[FileType::Png]
    }

    fn input_required(&self) -> bool {
        false
    }

    fn output_type(&self) -> OutputType {
        OutputType::Fixed(FileType::Png)
    }

    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()> {
        ctx.report_status("loading model...");
        let mut model = self.loader.load(self.dataset)?;
        ctx.report_progress(20.0);

        let latent = match ctx.input_path() {
            Some(path) => {
                ctx.report_status("preprocessing input...");
                latent_from_image(path, model.input_shape())?
            }
            None => {
                ctx.report_status("generating input...");
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                gaussian_latent(&mut rng, model.latent_len())
            }
        };
        ctx.report_progress(30.0);

        ctx.report_status("generating image...");
        let image = model.generate(&latent)?;
        ctx.report_progress(90.0);
        ctx.set_preview(PreviewArtifact::Image(Arc::new(
            DynamicImage::ImageRgb8(image.clone()).to_rgba8(),
        )));

        ctx.report_status("saving image...");
        image
            .save(ctx.output_path())
            .map_err(|e| ConversionError::image("save image", e))?;
        ctx.report_progress(100.0);
        ctx.report_status("done.");
        Ok(())
    }
}
