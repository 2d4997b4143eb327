//! Generative model boundary.
//!
//! Inference is an external collaborator: converters only see
//! [`GenerativeModel`] and [`ModelLoader`]. [`ProceduralModelLoader`] is the
//! built-in implementation, a small fixed-weight pattern network whose
//! weights are derived from the dataset (or read from a JSON spec in the
//! models folder).

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::jobs::{ConversionError, ConversionResult, Dataset};

/// A loaded image generator.
pub trait GenerativeModel: Send {
    /// Latent grid `(width, height)`; latents have `width * height` values.
    fn input_shape(&self) -> (u32, u32);

    fn output_size(&self) -> (u32, u32);

    fn generate(&mut self, latent: &[f32]) -> ConversionResult<RgbImage>;

    fn latent_len(&self) -> usize {
        let (w, h) = self.input_shape();
        (w * h) as usize
    }
}

/// Loads the model trained on a dataset.
pub trait ModelLoader: Send + Sync {
    fn load(&self, dataset: Dataset) -> ConversionResult<Box<dyn GenerativeModel>>;
}

/// Latent of standard-normal samples (Box-Muller).
pub fn gaussian_latent<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(len + 1);
    while out.len() < len {
        let u1: f32 = rng.random_range(f32::EPSILON..1.0);
        let u2: f32 = rng.random();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = std::f32::consts::TAU * u2;
        out.push(radius * angle.cos());
        out.push(radius * angle.sin());
    }
    out.truncate(len);
    out
}

/// Latent from an image: luma resized to the input grid, scaled by 1/256.
pub fn latent_from_image(path: &Path, shape: (u32, u32)) -> ConversionResult<Vec<f32>> {
    let image = image::open(path)
        .map_err(|e| ConversionError::image("open input", e))?
        .to_luma8();
    let grid = imageops::resize(&image, shape.0.max(1), shape.1.max(1), FilterType::Lanczos3);
    Ok(grid.as_raw().iter().map(|&v| v as f32 / 256.0).collect())
}

/// Parameters of a procedural model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub seed: u64,
    #[serde(default = "default_hidden")]
    pub hidden: usize,
    #[serde(default = "default_latent_shape")]
    pub latent_shape: (u32, u32),
    #[serde(default = "default_output_size")]
    pub output_size: (u32, u32),
}

fn default_hidden() -> usize {
    16
}

fn default_latent_shape() -> (u32, u32) {
    (8, 4)
}

fn default_output_size() -> (u32, u32) {
    (128, 128)
}

impl ModelSpec {
    /// Default spec for a dataset.
    pub fn for_dataset(dataset: Dataset) -> Self {
        let seed = Dataset::ALL
            .iter()
            .position(|d| *d == dataset)
            .unwrap_or(0) as u64;
        Self {
            seed: 0x6d61_7300 + seed,
            hidden: default_hidden(),
            latent_shape: default_latent_shape(),
            output_size: default_output_size(),
        }
    }
}

/// Coordinate network: each pixel's colour is a function of its position
/// and the latent.
#[derive(Debug)]
pub struct ProceduralModel {
    spec: ModelSpec,
    /// hidden x 3 weights on (x, y, r).
    coord_weights: Vec<[f32; 3]>,
    /// hidden x latent_len projection of the latent.
    latent_weights: Vec<Vec<f32>>,
    /// 3 x hidden output weights.
    out_weights: [Vec<f32>; 3],
}

impl ProceduralModel {
    pub fn new(spec: ModelSpec) -> Self {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let latent_len = (spec.latent_shape.0 * spec.latent_shape.1) as usize;
        let hidden = spec.hidden.max(1);

        let coord_weights = (0..hidden)
            .map(|_| {
                [
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-3.0..3.0),
                    rng.random_range(-3.0..3.0),
                ]
            })
            .collect();
        let latent_weights = (0..hidden)
            .map(|_| {
                (0..latent_len)
                    .map(|_| rng.random_range(-1.0..1.0) / (latent_len.max(1) as f32).sqrt())
                    .collect()
            })
            .collect();
        let out_weights = std::array::from_fn(|_| {
            (0..hidden)
                .map(|_| rng.random_range(-2.0..2.0))
                .collect::<Vec<f32>>()
        });

        Self {
            spec,
            coord_weights,
            latent_weights,
            out_weights,
        }
    }
}

impl GenerativeModel for ProceduralModel {
    fn input_shape(&self) -> (u32, u32) {
        self.spec.latent_shape
    }

    fn output_size(&self) -> (u32, u32) {
        self.spec.output_size
    }

    fn generate(&mut self, latent: &[f32]) -> ConversionResult<RgbImage> {
        if latent.len() != self.latent_len() {
            return Err(ConversionError::model(format!(
                "latent has {} values, model expects {}",
                latent.len(),
                self.latent_len()
            )));
        }

        let bias: Vec<f32> = self
            .latent_weights
            .iter()
            .map(|row| row.iter().zip(latent).map(|(w, z)| w * z).sum())
            .collect();

        let (w, h) = self.spec.output_size;
        let mut hidden = vec![0f32; bias.len()];
        Ok(RgbImage::from_fn(w, h, |px, py| {
            let x = px as f32 / w.max(2) as f32 * 2.0 - 1.0;
            let y = py as f32 / h.max(2) as f32 * 2.0 - 1.0;
            let r = (x * x + y * y).sqrt();
            for (i, (cw, b)) in self.coord_weights.iter().zip(&bias).enumerate() {
                hidden[i] = (cw[0] * x + cw[1] * y + cw[2] * r + b * 4.0).tanh();
            }
            let channel = |weights: &[f32]| {
                let sum: f32 = weights.iter().zip(&hidden).map(|(w, h)| w * h).sum();
                (255.0 / (1.0 + (-sum).exp())) as u8
            };
            Rgb([
                channel(&self.out_weights[0]),
                channel(&self.out_weights[1]),
                channel(&self.out_weights[2]),
            ])
        }))
    }
}

/// Loads procedural models, preferring `<models_dir>/<dataset>.json`.
#[derive(Debug, Clone, Default)]
pub struct ProceduralModelLoader {
    models_dir: Option<PathBuf>,
}

impl ProceduralModelLoader {
    pub fn new(models_dir: Option<PathBuf>) -> Self {
        Self { models_dir }
    }

    fn spec_for(&self, dataset: Dataset) -> ConversionResult<ModelSpec> {
        let Some(dir) = &self.models_dir else {
            return Ok(ModelSpec::for_dataset(dataset));
        };
        let path = dir.join(format!("{}.json", dataset.model_stem()));
        if !path.is_file() {
            return Ok(ModelSpec::for_dataset(dataset));
        }
        let content = fs::read_to_string(&path).map_err(|e| ConversionError::io("read model", e))?;
        serde_json::from_str(&content)
            .map_err(|e| ConversionError::model(format!("{}: {}", path.display(), e)))
    }
}

impl ModelLoader for ProceduralModelLoader {
    fn load(&self, dataset: Dataset) -> ConversionResult<Box<dyn GenerativeModel>> {
        let spec = self.spec_for(dataset)?;
        tracing::debug!(%dataset, seed = spec.seed, "loading procedural model");
        Ok(Box::new(ProceduralModel::new(spec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn gaussian_latent_has_requested_length_and_spread() {
        let mut rng = StdRng::seed_from_u64(3);
        let latent = gaussian_latent(&mut rng, 4001);
        assert_eq!(latent.len(), 4001);

        let mean = latent.iter().sum::<f32>() / latent.len() as f32;
        let var = latent.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / latent.len() as f32;
        assert!(mean.abs() < 0.1);
        assert!((var - 1.0).abs() < 0.15);
    }

    #[test]
    fn same_latent_same_image() {
        let loader = ProceduralModelLoader::default();
        let mut model = loader.load(Dataset::Flowers).unwrap();
        let latent = vec![0.25; model.latent_len()];

        let a = model.generate(&latent).unwrap();
        let b = model.generate(&latent).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), model.output_size());
    }

    #[test]
    fn wrong_latent_length_is_a_model_error() {
        let mut model = ProceduralModel::new(ModelSpec::for_dataset(Dataset::Cats));
        let err = model.generate(&[0.0; 3]).unwrap_err();
        assert!(matches!(err, ConversionError::Model(_)));
    }

    #[test]
    fn spec_file_in_models_dir_overrides_default() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("abstract_art_1.json"),
            r#"{"seed": 9, "output_size": [16, 8]}"#,
        )
        .unwrap();

        let loader = ProceduralModelLoader::new(Some(dir.path().to_path_buf()));
        let model = loader.load(Dataset::AbstractArt1).unwrap();
        assert_eq!(model.output_size(), (16, 8));
        assert_eq!(model.input_shape(), (8, 4));

        let other = loader.load(Dataset::Cats).unwrap();
        assert_eq!(other.output_size(), (128, 128));
    }

    #[test]
    fn image_latent_is_scaled_luma() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("white.png");
        RgbImage::from_pixel(20, 10, Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let latent = latent_from_image(&path, (8, 4)).unwrap();
        assert_eq!(latent.len(), 32);
        assert!(latent.iter().all(|&v| (v - 255.0 / 256.0).abs() < 0.01));
    }
}
