//! Generative model → animation.
//!
//! Frames are generated from a stream of latents. The stream is refilled in
//! batches of `fps / speed` latents whenever it runs low, following the
//! chosen transition.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::model::{gaussian_latent, GenerativeModel, ModelLoader};
use crate::files::{FileType, OutputType};
use crate::jobs::{
    Conversion, ConversionContext, ConversionError, ConversionResult, Dataset, JobError,
    JobResult, Speed, Transition,
};
use crate::slots::PreviewArtifact;

/// Parse a duration in minutes, bounded by `max_minutes`.
pub fn parse_duration(text: &str, max_minutes: f64) -> JobResult<f64> {
    let minutes: f64 = text
        .trim()
        .parse()
        .ok()
        .filter(|m: &f64| m.is_finite())
        .ok_or_else(|| JobError::invalid_parameter("duration", "duration must be numerical"))?;
    if minutes <= 0.0 {
        return Err(JobError::invalid_parameter(
            "duration",
            "duration cannot be 0",
        ));
    }
    if minutes > max_minutes {
        return Err(JobError::invalid_parameter(
            "duration",
            format!("duration must be under {} minutes", max_minutes),
        ));
    }
    Ok(minutes)
}

/// Endless supply of latents for consecutive frames.
#[derive(Debug)]
pub struct LatentStream<R = StdRng> {
    transition: Transition,
    batch: usize,
    delta: f32,
    current: Vec<f32>,
    queue: VecDeque<Vec<f32>>,
    rng: R,
}

impl<R: Rng> LatentStream<R> {
    pub fn new(transition: Transition, speed: Speed, fps: u32, len: usize, mut rng: R) -> Self {
        let current = gaussian_latent(&mut rng, len);
        Self {
            transition,
            batch: (fps / speed.factor()).max(1) as usize,
            delta: speed.factor() as f32 * 0.01,
            current,
            queue: VecDeque::new(),
            rng,
        }
    }

    /// Frames generated per refill.
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    /// Whether the next call to `next_latent` will refill.
    pub fn needs_refill(&self) -> bool {
        self.queue.len() <= 2
    }

    pub fn next_latent(&mut self) -> Vec<f32> {
        if self.needs_refill() {
            self.refill();
        }
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.current.clone())
    }

    fn refill(&mut self) {
        match self.transition {
            Transition::Random => {
                for _ in 0..self.batch {
                    for v in self.current.iter_mut() {
                        if self.rng.random_bool(0.5) {
                            *v += self.delta;
                        } else {
                            *v -= self.delta;
                        }
                    }
                    self.queue.push_back(self.current.clone());
                }
            }
            Transition::Sequences => {
                let target = gaussian_latent(&mut self.rng, self.current.len());
                for step in 1..=self.batch {
                    let t = step as f32 / self.batch as f32;
                    let frame = self
                        .current
                        .iter()
                        .zip(&target)
                        .map(|(a, b)| a + (b - a) * t)
                        .collect();
                    self.queue.push_back(frame);
                }
                self.current = target;
            }
            Transition::Constant => {
                for _ in 0..self.batch {
                    self.queue.push_back(self.current.clone());
                }
            }
        }
    }
}

/// Animated GIF of a drifting latent.
pub struct GenerativeVideo {
    dataset: Dataset,
    speed: Speed,
    transition: Transition,
    duration_text: String,
    minutes: f64,
    fps: u32,
    max_minutes: f64,
    loader: Arc<dyn ModelLoader>,
    seed: Option<u64>,
}

impl std::fmt::Debug for GenerativeVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeVideo")
            .field("dataset", &self.dataset)
            .field("speed", &self.speed)
            .field("transition", &self.transition)
            .field("duration", &self.duration_text)
            .field("fps", &self.fps)
            .finish()
    }
}

impl GenerativeVideo {
    /// `duration` is the user's text, in minutes; checked during validation.
    pub fn new(
        dataset: Dataset,
        speed: Speed,
        transition: Transition,
        duration: impl Into<String>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            dataset,
            speed,
            transition,
            duration_text: duration.into(),
            minutes: 0.0,
            fps: 30,
            max_minutes: 5.0,
            loader,
            seed: None,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_max_minutes(mut self, max: f64) -> Self {
        self.max_minutes = max;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Generate every frame into an animated GIF at `path`.
    fn encode(
        &self,
        ctx: &ConversionContext,
        model: &mut dyn GenerativeModel,
        stream: &mut LatentStream,
        path: &Path,
    ) -> ConversionResult<()> {
        let file = File::create(path).map_err(|e| ConversionError::io("create gif", e))?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ConversionError::image("encode gif", e))?;
        let delay = Delay::from_numer_denom_ms(1000, self.fps);

        let goal = self.frame_goal();
        ctx.logger()
            .info(&format!("{} frames at {} fps", goal, self.fps));
        for index in 0..goal {
            let refilling = stream.needs_refill();
            if refilling {
                ctx.report_status("generating input...");
            }
            let latent = stream.next_latent();
            if refilling {
                ctx.report_status("generating frames...");
            }

            let frame = DynamicImage::ImageRgb8(model.generate(&latent)?).to_rgba8();
            if index % 5 == 0 {
                ctx.report_progress(10.0 + 85.0 * index as f32 / goal as f32);
                ctx.set_preview(PreviewArtifact::Image(Arc::new(frame.clone())));
            }
            encoder
                .encode_frame(Frame::from_parts(frame, 0, 0, delay))
                .map_err(|e| ConversionError::image("encode gif", e))?;
        }
        Ok(())
    }

    /// Total frames for the validated duration.
    pub fn frame_goal(&self) -> u64 {
        ((self.minutes * 60.0 * self.fps as f64).round() as u64).max(1)
    }
}

impl Conversion for GenerativeVideo {
    fn name(&self) -> &str {
        "GANVideo"
    }

    fn input_types(&self) -> &[FileType] {
        &[]
    }

    fn output_type(&self) -> OutputType {
        OutputType::Fixed(FileType::Gif)
    }

    fn validate(&mut self) -> JobResult<()> {
        self.minutes = parse_duration(&self.duration_text, self.max_minutes)?;
        Ok(())
    }

    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()> {
        ctx.report_status("loading model...");
        let mut model = self.loader.load(self.dataset)?;
        ctx.report_progress(10.0);

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut stream = LatentStream::new(
            self.transition,
            self.speed,
            self.fps,
            model.latent_len(),
            rng,
        );

        fs::create_dir_all(ctx.work_dir()).map_err(|e| ConversionError::io("create work dir", e))?;
        let scratch = ctx
            .work_dir()
            .join(format!("ganvideo_{}_{}.gif", std::process::id(), ctx.slot()));

        let result = self
            .encode(ctx, model.as_mut(), &mut stream, &scratch)
            .and_then(|()| {
                ctx.report_status("saving video...");
                fs::copy(&scratch, ctx.output_path())
                    .map(|_| ())
                    .map_err(|e| ConversionError::io("copy gif", e))
            });
        if let Err(e) = fs::remove_file(&scratch) {
            tracing::debug!("could not remove {}: {}", scratch.display(), e);
        }
        result?;

        ctx.report_progress(100.0);
        ctx.report_status("done.");
        Ok(())
    }
}
