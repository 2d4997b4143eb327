//! Shared registries handed to every job.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::files::ResourceLock;
use crate::logging::{JobLogger, JobLoggerBuilder, LogConfig};
use crate::slots::JobSlotRegistry;
use crate::status::StatusChannel;
use crate::time_source::{RealTimeSource, SharedTimeSource};

/// Handles to the process-wide registries plus lifecycle timing.
///
/// Built once at startup and shared by `Arc`; tests build their own.
#[derive(Debug)]
pub struct JobServices {
    pub resources: Arc<ResourceLock>,
    pub slots: Arc<JobSlotRegistry>,
    pub status: Arc<StatusChannel>,
    pub clock: SharedTimeSource,
    /// How long a finished job's slot stays visible.
    pub drain_grace: Duration,
    pub work_dir: PathBuf,
    /// Per-job log files go here; `None` disables them.
    pub logs_dir: Option<PathBuf>,
    pub log_config: LogConfig,
}

impl JobServices {
    pub fn builder() -> JobServicesBuilder {
        JobServicesBuilder::default()
    }

    /// Services configured from settings, on the wall clock.
    pub fn from_settings(settings: &Settings) -> Self {
        let logs_dir = settings
            .logging
            .job_log_files
            .then(|| settings.logs_folder());
        Self::builder()
            .drain_grace(settings.jobs.drain_grace())
            .status_clear(settings.jobs.status_clear())
            .work_dir(settings.working_folder())
            .logs_dir(logs_dir)
            .log_config(settings.logging.to_log_config())
            .build()
    }

    /// Per-job logger. Falls back to a file-less logger if the log file
    /// cannot be created.
    ///
    /// Log names are `<kind>_<timestamp>_<seq>`; the sequence number keeps
    /// jobs created in the same millisecond apart.
    pub fn job_logger(&self, job_name: &str) -> Arc<JobLogger> {
        let detached = || JobLogger::detached(job_name, self.log_config.clone(), None);
        let logger = match &self.logs_dir {
            Some(dir) => {
                let file_name = format!(
                    "{}_{}_{}",
                    job_name,
                    chrono::Local::now().format("%Y%m%d_%H%M%S%3f"),
                    LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed)
                );
                JobLoggerBuilder::new(file_name)
                    .log_dir(dir)
                    .config(self.log_config.clone())
                    .build()
                    .unwrap_or_else(|e| {
                        tracing::warn!("Cannot create job log in {}: {}", dir.display(), e);
                        detached()
                    })
            }
            None => detached(),
        };
        Arc::new(logger)
    }
}

static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Builder for [`JobServices`].
pub struct JobServicesBuilder {
    clock: SharedTimeSource,
    drain_grace: Duration,
    status_clear: Duration,
    work_dir: PathBuf,
    logs_dir: Option<PathBuf>,
    log_config: LogConfig,
}

impl Default for JobServicesBuilder {
    fn default() -> Self {
        Self {
            clock: RealTimeSource::shared(),
            drain_grace: Duration::from_secs(5),
            status_clear: Duration::from_secs(5),
            work_dir: std::env::temp_dir(),
            logs_dir: None,
            log_config: LogConfig::default(),
        }
    }
}

impl JobServicesBuilder {
    pub fn clock(mut self, clock: SharedTimeSource) -> Self {
        self.clock = clock;
        self
    }

    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn status_clear(mut self, after: Duration) -> Self {
        self.status_clear = after;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn logs_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.logs_dir = dir;
        self
    }

    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    pub fn build(self) -> JobServices {
        JobServices {
            resources: Arc::new(ResourceLock::new()),
            slots: Arc::new(JobSlotRegistry::new()),
            status: Arc::new(StatusChannel::new(self.clock.clone(), self.status_clear)),
            clock: self.clock,
            drain_grace: self.drain_grace,
            work_dir: self.work_dir,
            logs_dir: self.logs_dir,
            log_config: self.log_config,
        }
    }
}
