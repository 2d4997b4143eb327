//! Per-job logger with file and callback output.
//!
//! Each job gets its own logger that:
//! - Writes to a dedicated log file (when a log directory is configured)
//! - Forwards lines to an optional callback
//! - Mirrors everything into `tracing` with the job name attached
//! - Keeps a tail buffer that is replayed when the job fails

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

/// Per-job logger.
pub struct JobLogger {
    job_name: String,
    log_path: Option<PathBuf>,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Mutex<Option<LogCallback>>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<Option<u32>>,
}

impl std::fmt::Debug for JobLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLogger")
            .field("job_name", &self.job_name)
            .field("log_path", &self.log_path)
            .finish()
    }
}

impl JobLogger {
    /// Create a logger writing `<log_dir>/<job_name>.log`.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let file = File::create(&log_path)?;

        Ok(Self::build(
            job_name,
            Some(log_path),
            Some(BufWriter::new(file)),
            config,
            callback,
        ))
    }

    /// Create a logger with no file output.
    pub fn detached(
        job_name: impl Into<String>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> Self {
        Self::build(job_name.into(), None, None, config, callback)
    }

    fn build(
        job_name: String,
        log_path: Option<PathBuf>,
        writer: Option<BufWriter<File>>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> Self {
        let tail_capacity = config.error_tail;
        Self {
            job_name,
            log_path,
            file_writer: Mutex::new(writer),
            callback: Mutex::new(callback),
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(tail_capacity)),
            last_progress: Mutex::new(None),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Log file path, if this logger writes one.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(job = %self.job_name, "{}", message),
            LogLevel::Debug => tracing::debug!(job = %self.job_name, "{}", message),
            LogLevel::Info => tracing::info!(job = %self.job_name, "{}", message),
            LogLevel::Warn => tracing::warn!(job = %self.job_name, "{}", message),
            LogLevel::Error => tracing::error!(job = %self.job_name, "{}", message),
        }

        self.push_tail(message);

        if level < self.config.level {
            return;
        }
        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log a lifecycle phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    pub fn validation(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Validation.format(message));
    }

    /// Log a progress update.
    ///
    /// In compact mode only step boundaries and 100% are logged. Returns
    /// whether the update was logged.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let step = self.config.progress_step.max(1);
            let mut last = self.last_progress.lock();
            let current_step = percent / step;
            let logged = match *last {
                None => true,
                Some(prev) => current_step > prev / step || (percent >= 100 && prev < 100),
            };
            if !logged {
                return false;
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Replay the tail buffer (after a failure).
    pub fn show_tail(&self, header: &str) {
        let lines: Vec<String> = self.tail_buffer.lock().iter().cloned().collect();
        if lines.is_empty() {
            return;
        }
        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in &lines {
            self.output(&self.format_message(line));
        }
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and stop writing to the file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn push_tail(&self, line: &str) {
        if self.config.error_tail == 0 {
            return;
        }
        let mut buffer = self.tail_buffer.lock();
        if buffer.len() >= self.config.error_tail {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
        if let Some(ref callback) = *self.callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            _ => c,
        })
        .collect()
}

/// Builder for [`JobLogger`].
pub struct JobLoggerBuilder {
    job_name: String,
    log_dir: Option<PathBuf>,
    config: LogConfig,
    callback: Option<LogCallback>,
}

impl JobLoggerBuilder {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            log_dir: None,
            config: LogConfig::default(),
            callback: None,
        }
    }

    /// Write a log file into `dir`.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    pub fn callback(mut self, callback: LogCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Build the logger. Without a log directory no file is created.
    pub fn build(self) -> std::io::Result<JobLogger> {
        match self.log_dir {
            Some(dir) => JobLogger::new(self.job_name, dir, self.config, self.callback),
            None => Ok(JobLogger::detached(
                self.job_name,
                self.config,
                self.callback,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger =
            JobLogger::new("sonify cat", dir.path(), LogConfig::default(), None).unwrap();

        let path = logger.log_path().unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with("sonify_cat.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), None).unwrap();

        logger.phase("Running");
        logger.info("reading image");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("=== Running ==="));
        assert!(content.contains("reading image"));
    }

    #[test]
    fn detached_logger_calls_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: LogCallback = Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let logger = JobLogger::detached("job", LogConfig::default(), Some(callback));
        logger.info("one");
        logger.debug("filtered by level");
        logger.warn("two");

        assert!(logger.log_path().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn compact_mode_filters_progress() {
        let config = LogConfig {
            compact: true,
            progress_step: 20,
            ..LogConfig::default()
        };
        let logger = JobLogger::detached("job", config, None);

        assert!(logger.progress(0));
        assert!(!logger.progress(10));
        assert!(!logger.progress(15));
        assert!(logger.progress(20));
        assert!(!logger.progress(25));
        assert!(logger.progress(45));
        assert!(logger.progress(100));
        assert!(!logger.progress(100));
    }

    #[test]
    fn tail_keeps_recent_lines_including_filtered_ones() {
        let config = LogConfig {
            error_tail: 3,
            ..LogConfig::default()
        };
        let logger = JobLogger::detached("job", config, None);
        for i in 0..5 {
            logger.debug(&format!("line {}", i));
        }

        assert_eq!(logger.get_tail(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn builder_without_dir_is_detached() {
        let logger = JobLoggerBuilder::new("job").compact(false).build().unwrap();
        assert!(logger.log_path().is_none());
        assert!(logger.progress(1));
        assert!(logger.progress(2));
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("Asciify: cat"), "Asciify__cat");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
