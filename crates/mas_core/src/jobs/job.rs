//! Job lifecycle.
//!
//! ```text
//! Created → Validating → ResourcesLocked → Running → Cleanup → Draining → Done
//!               │               │
//!               └───────────────┴──→ Rejected
//! ```
//!
//! [`Job::execute`] walks the whole machine. The individual steps are public
//! so callers (and tests) can interleave two jobs deterministically.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::Serialize;

use super::conversion::{Conversion, ConversionContext};
use super::errors::{ConversionError, JobError, JobResult};
use super::services::JobServices;
use crate::files::{FileRole, ManagedFile, OutputType};
use crate::logging::JobLogger;
use crate::slots::SlotId;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Created,
    Validating,
    ResourcesLocked,
    Running,
    Cleanup,
    Draining,
    Done,
    Rejected,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Created => "Created",
            JobPhase::Validating => "Validating",
            JobPhase::ResourcesLocked => "ResourcesLocked",
            JobPhase::Running => "Running",
            JobPhase::Cleanup => "Cleanup",
            JobPhase::Draining => "Draining",
            JobPhase::Done => "Done",
            JobPhase::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Artifact written.
    Completed { output: PathBuf },
    /// Conversion failed after resources were locked.
    Failed(JobError),
    /// Validation or locking failed; nothing ran.
    Rejected(JobError),
}

/// Result of [`Job::execute`].
#[derive(Debug)]
pub struct JobReport {
    pub kind: String,
    pub outcome: JobOutcome,
    pub phases: Vec<JobPhase>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed { .. })
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.outcome {
            JobOutcome::Completed { .. } => None,
            JobOutcome::Failed(e) | JobOutcome::Rejected(e) => Some(e),
        }
    }

    /// Serializable view for machine-readable output.
    pub fn summary(&self) -> JobSummary {
        let (status, output, message) = match &self.outcome {
            JobOutcome::Completed { output } => ("completed", Some(output.clone()), None),
            JobOutcome::Failed(e) => ("failed", None, Some(e.user_message())),
            JobOutcome::Rejected(e) => ("rejected", None, Some(e.user_message())),
        };
        JobSummary {
            kind: self.kind.clone(),
            status,
            output,
            message,
            phases: self.phases.clone(),
        }
    }
}

/// Flat summary of a [`JobReport`].
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub kind: String,
    pub status: &'static str,
    pub output: Option<PathBuf>,
    pub message: Option<String>,
    pub phases: Vec<JobPhase>,
}

/// One submitted conversion with its files.
pub struct Job {
    input: Option<ManagedFile>,
    output: ManagedFile,
    conversion: Box<dyn Conversion>,
    services: Arc<JobServices>,
    logger: Arc<JobLogger>,
    phase: Arc<Mutex<JobPhase>>,
    history: Vec<JobPhase>,
    slot: Option<SlotId>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.conversion.name())
            .field("input", &self.input)
            .field("output", &self.output)
            .field("phase", &*self.phase.lock())
            .field("slot", &self.slot)
            .finish()
    }
}

impl Job {
    /// A job writing into `output_dir`.
    pub fn new(
        conversion: Box<dyn Conversion>,
        output_dir: impl Into<PathBuf>,
        services: Arc<JobServices>,
    ) -> Self {
        let logger = services.job_logger(conversion.name());
        Self {
            input: None,
            output: ManagedFile::new(output_dir),
            conversion,
            services,
            logger,
            phase: Arc::new(Mutex::new(JobPhase::Created)),
            history: vec![JobPhase::Created],
            slot: None,
        }
    }

    /// Set the input file.
    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(ManagedFile::new(path));
        self
    }

    pub fn kind(&self) -> &str {
        self.conversion.name()
    }

    pub fn phase(&self) -> JobPhase {
        *self.phase.lock()
    }

    /// Every phase entered so far, in order.
    pub fn phases(&self) -> &[JobPhase] {
        &self.history
    }

    pub fn input(&self) -> Option<&ManagedFile> {
        self.input.as_ref()
    }

    pub fn output(&self) -> &ManagedFile {
        &self.output
    }

    /// Slot allocated by [`run`](Self::run), until [`finish`](Self::finish).
    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    /// Resolve files and check job-specific arguments.
    pub fn validate(&mut self) -> JobResult<()> {
        self.enter(JobPhase::Validating);

        let accepted = self.conversion.input_types().to_vec();
        match (&mut self.input, accepted.is_empty()) {
            (Some(input), false) => input.resolve_as_input(&accepted)?,
            (None, false) if self.conversion.input_required() => {
                return Err(JobError::invalid_parameter(
                    "input",
                    "an input file is required.",
                ));
            }
            (Some(_), true) => {
                return Err(JobError::invalid_parameter(
                    "input",
                    format!("{} does not take an input file.", self.conversion.name()),
                ));
            }
            _ => {}
        }
        if let Some(input) = &self.input {
            self.logger.validation(&format!(
                "input resolved to {}",
                input.full_path().unwrap_or_default().display()
            ));
        }

        let extension = match self.conversion.output_type() {
            OutputType::Fixed(file_type) => file_type.extension().to_string(),
            OutputType::MatchInput => self
                .input
                .as_ref()
                .and_then(|i| i.extension())
                .map(str::to_ascii_lowercase)
                .ok_or_else(|| {
                    JobError::invalid_file_state("output matches input but no input is resolved")
                })?,
        };
        let base_hint = match self.input.as_ref().and_then(|i| i.stem()) {
            Some(stem) => format!("{}_{}", stem, self.conversion.name()),
            None => self.conversion.name().to_string(),
        };
        self.output
            .resolve_as_output(&base_hint, &extension, &self.services.resources)?;
        self.logger.validation(&format!(
            "output resolved to {}",
            self.output.full_path().unwrap_or_default().display()
        ));

        self.conversion.validate()
    }

    /// Claim input then output. A failed claim rolls back the earlier one.
    pub fn lock_resources(&mut self) -> JobResult<()> {
        let resources = Arc::clone(&self.services.resources);

        if let Some(input) = self.input.as_mut() {
            input.acquire_lock(&resources)?;
        }
        if let Err(e) = self.output.acquire_lock(&resources) {
            if let Some(input) = self.input.as_mut() {
                if let Err(release_err) = input.release_lock(&resources) {
                    tracing::error!("rollback of input claim failed: {}", release_err);
                }
            }
            return Err(e);
        }

        self.enter(JobPhase::ResourcesLocked);
        Ok(())
    }

    /// Allocate a slot and run the conversion.
    ///
    /// A panic inside the conversion is caught here and reported as a
    /// conversion failure.
    pub fn run(&mut self) -> JobResult<PathBuf> {
        self.enter(JobPhase::Running);

        let output_path = self
            .output
            .full_path()
            .ok_or_else(|| JobError::invalid_file_state("run before output was resolved"))?;
        let target = match self.input.as_ref().and_then(|i| i.stem()) {
            Some(stem) => stem.to_string(),
            None => output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let slot = self
            .services
            .slots
            .allocate(format!("{}: {}", self.conversion.name(), target));
        self.slot = Some(slot);
        let _ = self.services.slots.update_progress(slot, 0.0);

        let ctx = ConversionContext::new(
            self.input.as_ref().and_then(ManagedFile::full_path),
            output_path.clone(),
            self.services.work_dir.clone(),
            slot,
            Arc::clone(&self.services.slots),
            Arc::clone(&self.logger),
        );

        let conversion = &mut self.conversion;
        let result = panic::catch_unwind(AssertUnwindSafe(|| conversion.run(&ctx)))
            .unwrap_or_else(|payload| Err(ConversionError::Panicked(panic_message(&*payload))));

        match result {
            Ok(()) => {
                self.logger.success(&format!("wrote {}", output_path.display()));
                Ok(output_path)
            }
            Err(e) => {
                self.logger.error(&e.to_string());
                Err(JobError::ConversionFailure(e))
            }
        }
    }

    /// Release every claim this job holds.
    pub fn cleanup(&mut self) {
        self.enter(JobPhase::Cleanup);
        let resources = Arc::clone(&self.services.resources);
        for (role, file) in [
            (FileRole::Input, self.input.as_mut()),
            (FileRole::Output, Some(&mut self.output)),
        ] {
            let Some(file) = file else { continue };
            if !file.is_locked() {
                continue;
            }
            if let Err(e) = file.release_lock(&resources) {
                tracing::error!("failed to release {} claim: {}", role, e);
            }
        }
    }

    /// Show the final state for the grace period.
    pub fn drain(&mut self, succeeded: bool) {
        self.enter(JobPhase::Draining);
        if let Some(slot) = self.slot {
            let _ = self.services.slots.mark_draining(slot, succeeded);
        }
        self.services.clock.sleep(self.services.drain_grace);
    }

    /// Free the slot.
    pub fn finish(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.services.slots.release(slot);
        }
        self.enter(JobPhase::Done);
        self.logger.close();
    }

    /// Run the whole lifecycle on the current thread.
    pub fn execute(mut self) -> JobReport {
        if let Err(e) = self.prepare() {
            return self.reject(e);
        }

        let result = self.run();
        self.cleanup();

        let outcome = match result {
            Ok(output) => {
                let name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.services
                    .status
                    .publish(format!("{}: saved {}", self.conversion.name(), name), false);
                JobOutcome::Completed { output }
            }
            Err(e) => {
                self.logger.show_tail(self.conversion.name());
                self.services.status.publish(e.user_message(), true);
                JobOutcome::Failed(e)
            }
        };

        self.drain(matches!(outcome, JobOutcome::Completed { .. }));
        self.finish();

        JobReport {
            kind: self.conversion.name().to_string(),
            outcome,
            phases: self.history,
        }
    }

    /// Run the lifecycle on a detached worker thread.
    pub fn spawn(self) -> std::io::Result<JobHandle> {
        let kind = self.kind().to_string();
        let phase = Arc::clone(&self.phase);
        let thread = thread::Builder::new()
            .name(format!("job-{}", kind.to_ascii_lowercase()))
            .spawn(move || self.execute())?;
        Ok(JobHandle {
            kind,
            phase,
            thread,
        })
    }

    fn prepare(&mut self) -> JobResult<()> {
        self.validate()?;
        self.lock_resources()
    }

    fn reject(mut self, error: JobError) -> JobReport {
        // Locking rolls itself back; this only covers an early return.
        self.cleanup_silently();
        self.enter(JobPhase::Rejected);
        self.logger.error(&error.to_string());
        self.services.status.publish(error.user_message(), true);
        self.logger.close();
        JobReport {
            kind: self.conversion.name().to_string(),
            outcome: JobOutcome::Rejected(error),
            phases: self.history,
        }
    }

    fn cleanup_silently(&mut self) {
        let resources = Arc::clone(&self.services.resources);
        if let Some(input) = self.input.as_mut().filter(|f| f.is_locked()) {
            let _ = input.release_lock(&resources);
        }
        if self.output.is_locked() {
            let _ = self.output.release_lock(&resources);
        }
    }

    fn enter(&mut self, phase: JobPhase) {
        tracing::debug!(job = self.conversion.name(), %phase, "phase");
        self.logger.phase(&phase.to_string());
        *self.phase.lock() = phase;
        self.history.push(phase);
    }
}

/// Handle to a job running on its own thread.
#[derive(Debug)]
pub struct JobHandle {
    kind: String,
    phase: Arc<Mutex<JobPhase>>,
    thread: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Current phase of the running job.
    pub fn phase(&self) -> JobPhase {
        *self.phase.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the job to reach Done or Rejected.
    pub fn join(self) -> JobReport {
        match self.thread.join() {
            Ok(report) => report,
            Err(payload) => JobReport {
                kind: self.kind,
                outcome: JobOutcome::Failed(JobError::ConversionFailure(
                    ConversionError::Panicked(panic_message(&*payload)),
                )),
                phases: Vec::new(),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
