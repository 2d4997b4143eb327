//! The conversion capability implemented by every job kind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::{ConversionResult, JobResult};
use crate::files::{FileType, OutputType};
use crate::logging::JobLogger;
use crate::slots::{JobSlotRegistry, PreviewArtifact, SlotId};

/// A job kind: what it reads, what it writes and how it converts.
///
/// The job framework resolves and locks files, allocates a slot and then
/// calls [`run`](Conversion::run) with a [`ConversionContext`].
pub trait Conversion: Send {
    /// Kind name, used for output file names and slot labels.
    fn name(&self) -> &str;

    /// Accepted input types. Empty means the kind takes no input.
    fn input_types(&self) -> &[FileType];

    /// Whether an input is required when `input_types` is non-empty.
    fn input_required(&self) -> bool {
        true
    }

    fn output_type(&self) -> OutputType;

    /// Job-specific argument checks, run after file resolution.
    fn validate(&mut self) -> JobResult<()> {
        Ok(())
    }

    /// Produce the artifact at `ctx.output_path()`.
    fn run(&mut self, ctx: &ConversionContext) -> ConversionResult<()>;
}

/// What a running conversion sees: resolved paths and its slot.
///
/// Slot updates are best-effort. A slot that has gone away is logged at
/// trace level and otherwise ignored.
pub struct ConversionContext {
    input: Option<PathBuf>,
    input_stem: Option<String>,
    output: PathBuf,
    work_dir: PathBuf,
    slot: SlotId,
    slots: Arc<JobSlotRegistry>,
    logger: Arc<JobLogger>,
}

impl ConversionContext {
    pub fn new(
        input: Option<PathBuf>,
        output: PathBuf,
        work_dir: PathBuf,
        slot: SlotId,
        slots: Arc<JobSlotRegistry>,
        logger: Arc<JobLogger>,
    ) -> Self {
        let input_stem = input
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned());
        Self {
            input,
            input_stem,
            output,
            work_dir,
            slot,
            slots,
            logger,
        }
    }

    /// Resolved input path, if the kind declares one.
    pub fn input_path(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    pub fn input_stem(&self) -> Option<&str> {
        self.input_stem.as_deref()
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Scratch folder for intermediates. Not locked.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn logger(&self) -> &JobLogger {
        &self.logger
    }

    pub fn report_progress(&self, percent: f32) {
        if let Err(e) = self.slots.update_progress(self.slot, percent) {
            tracing::trace!("progress update dropped: {}", e);
            return;
        }
        self.logger.progress(percent.clamp(0.0, 100.0) as u32);
    }

    /// Replace the slot's status line (e.g. "generating image...").
    pub fn report_status(&self, text: &str) {
        if let Err(e) = self.slots.update_status_text(self.slot, text) {
            tracing::trace!("status update dropped: {}", e);
        }
        self.logger.info(text);
    }

    pub fn set_preview(&self, artifact: PreviewArtifact) {
        if let Err(e) = self.slots.set_preview_artifact(self.slot, artifact) {
            tracing::trace!("preview update dropped: {}", e);
        }
    }
}
