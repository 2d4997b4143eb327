//! Slot record and snapshot types.

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use serde::Serialize;
use thiserror::Error;

/// Small integer identifying a visible job slot.
pub type SlotId = usize;

/// Latest preview a job wants shown next to its progress bar.
#[derive(Debug, Clone)]
pub enum PreviewArtifact {
    /// An in-memory image (rendered frame, generated picture).
    Image(Arc<RgbaImage>),
    /// An image on disk (typically the job's input).
    File(PathBuf),
    /// Text output.
    Text(Arc<str>),
}

impl PreviewArtifact {
    /// Short name of the artifact kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PreviewArtifact::Image(_) => "image",
            PreviewArtifact::File(_) => "file",
            PreviewArtifact::Text(_) => "text",
        }
    }
}

/// Whether the slot's job is still running or showing its final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPhase {
    Active,
    Draining,
}

/// Point-in-time copy of one slot, for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub label: String,
    /// Percent complete, 0-100.
    pub progress: f32,
    pub status_text: String,
    pub phase: SlotPhase,
    /// Set once the job has finished.
    pub succeeded: Option<bool>,
    #[serde(skip)]
    pub preview: Option<PreviewArtifact>,
}

/// Errors from slot updates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Slot {0} is not allocated")]
    UnknownSlot(SlotId),
}
