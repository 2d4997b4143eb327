//! Image → music.
//!
//! Each RGB channel of a thumbnail becomes a melody: a pixel value picks a
//! piano key and a note length. The three melodies are played together and
//! written as a WAV file.

use std::f32::consts::TAU;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use super::open_rgb;
use crate::files::{FileType, OutputType};
use crate::jobs::{Conversion, ConversionContext, ConversionError, ConversionResult};
use crate::slots::PreviewArtifact;

/// Thumbnails are shrunk to at most this many pixels.
pub const MAX_PIXELS: u32 = 625;
pub const SAMPLE_RATE: u32 = 44_100;
pub const BPM: f32 = 120.0;
pub const PIANO_KEYS: u8 = 88;

/// Frequency of the lowest piano key (A0).
const A0_HZ: f32 = 27.5;

/// One melody event. `value` is a note value: 4 is a quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Note {
    Rest { value: u8 },
    Key { key: u8, value: u8 },
}

impl Note {
    /// Note for one channel value.
    pub fn from_channel(v: u8) -> Self {
        let value = ((v as f32 / PIANO_KEYS as f32 + 1.0) * 2.0).floor() as u8;
        Note::Key {
            key: v % PIANO_KEYS,
            value,
        }
    }

    pub fn value(&self) -> u8 {
        match *self {
            Note::Rest { value } | Note::Key { value, .. } => value,
        }
    }

    /// Pitch in Hz; `None` for rests.
    pub fn frequency(&self) -> Option<f32> {
        match *self {
            Note::Rest { .. } => None,
            Note::Key { key, .. } => Some(A0_HZ * 2f32.powf(key as f32 / 12.0)),
        }
    }

    /// Length in seconds: value `n` lasts `4/n` beats.
    pub fn duration_secs(&self) -> f32 {
        let beats = 4.0 / self.value().max(1) as f32;
        beats * 60.0 / BPM
    }
}

/// Shrink so the pixel count does not exceed [`MAX_PIXELS`].
pub fn shrink(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let area = w as f64 * h as f64;
    if area <= MAX_PIXELS as f64 {
        return image.clone();
    }
    let div = (area / MAX_PIXELS as f64).sqrt();
    let nw = ((w as f64 / div) as u32).max(1);
    let nh = ((h as f64 / div) as u32).max(1);
    imageops::resize(image, nw, nh, FilterType::Lanczos3)
}

/// One melody per channel (red, green, blue).
///
/// Every melody opens with a quarter rest and each pixel row ends with one.
pub fn melodies(image: &RgbImage) -> [Vec<Note>; 3] {
    let rest = Note::Rest { value: 4 };
    let mut out: [Vec<Note>; 3] = Default::default();
    for melody in out.iter_mut() {
        melody.push(rest);
    }

    for row in image.rows() {
        for pixel in row {
            for (channel, melody) in out.iter_mut().enumerate() {
                melody.push(Note::from_channel(pixel[channel]));
            }
        }
        for melody in out.iter_mut() {
            melody.push(rest);
        }
    }
    out
}

/// Add a melody into `mix`, growing it as needed.
pub fn synthesize_into(mix: &mut Vec<f32>, melody: &[Note]) {
    let rate = SAMPLE_RATE as f32;
    let mut cursor = 0usize;

    for note in melody {
        let len = (note.duration_secs() * rate).round() as usize;
        if mix.len() < cursor + len {
            mix.resize(cursor + len, 0.0);
        }

        if let Some(freq) = note.frequency() {
            let attack = (0.005 * rate) as usize;
            let release = (0.01 * rate) as usize;
            for i in 0..len {
                let t = i as f32 / rate;
                let decay = (-3.0 * t / note.duration_secs()).exp();
                let edge = if i < attack {
                    i as f32 / attack as f32
                } else if i + release > len {
                    (len - i) as f32 / release as f32
                } else {
                    1.0
                };
                let phase = TAU * freq * t;
                let tone = phase.sin() + 0.5 * (2.0 * phase).sin() + 0.25 * (3.0 * phase).sin();
                mix[cursor + i] += tone * decay * edge;
            }
        }

        cursor += len;
    }
}

/// Scale to the full 16-bit range.
pub fn normalize(mix: &[f32]) -> Vec<i16> {
    let peak = mix.iter().fold(0f32, |m, s| m.max(s.abs()));
    if peak == 0.0 {
        return vec![0; mix.len()];
    }
    let scale = i16::MAX as f32 * 0.95 / peak;
    mix.iter().map(|s| (s * scale).round() as i16).collect()
}

fn write_wav(path: &Path, samples: &[i16]) -> ConversionResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| ConversionError::audio("create wav", e))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| ConversionError::audio("write wav", e))?;
    }
    writer
        .finalize()
        .map_err(|e| ConversionError::audio("finalize wav", e))
}

/// Image → WAV conversion.
#[derive(Debug, Default)]
pub struct Sonify;

impl Sonify {
    pub fn new() -> Self {
        Self
    }
}

impl Conversion for Sonify {
    fn name(&self) -> &str {
        "Sonify"
    }

    fn input_types(&self) -> &[FileType] {
        &[FileType::Png, FileType::Jpg]
    }

    fn output_type(&self) -> OutputType {
        OutputType::Fixed(FileType::Wav)
    }

    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()> {
        let input = ctx
            .input_path()
            .ok_or_else(|| ConversionError::other("no input image"))?;
        ctx.set_preview(PreviewArtifact::File(input.to_path_buf()));

        ctx.report_status("preparing image");
        let image = shrink(&open_rgb(input)?);
        ctx.report_progress(10.0);

        ctx.report_status("converting to notes");
        let melodies = melodies(&image);
        ctx.logger().debug(&format!(
            "{}x{} thumbnail, {} notes per channel",
            image.width(),
            image.height(),
            melodies[0].len()
        ));
        ctx.report_progress(25.0);

        ctx.report_status("building sounds");
        let mut mix = Vec::new();
        for (i, melody) in melodies.iter().enumerate() {
            synthesize_into(&mut mix, melody);
            ctx.report_progress(25.0 + (i as f32 + 1.0) * 20.0);
        }

        let name = ctx
            .output_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ctx.report_status(&format!("exporting {}", name));
        write_wav(ctx.output_path(), &normalize(&mix))?;
        ctx.report_progress(100.0);

        ctx.report_status("converted image to music");
        Ok(())
    }
}
