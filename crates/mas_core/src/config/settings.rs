//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Job lifecycle timing.
    #[serde(default)]
    pub jobs: JobSettings,

    /// Glyph rendering for the text-art converters.
    #[serde(default)]
    pub glyph: GlyphSettings,

    /// Generated-video limits.
    #[serde(default)]
    pub video: VideoSettings,
}

/// Folders and resource files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Scratch space for intermediate files.
    #[serde(default = "default_working_folder")]
    pub working_folder: String,

    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Generative model files, one per dataset.
    #[serde(default = "default_models_folder")]
    pub models_folder: String,

    /// Weight table used by Asciify.
    #[serde(default = "default_asciify_weights")]
    pub asciify_weights: String,

    /// Weight table used by Ascheatfy.
    #[serde(default = "default_ascheatfy_weights")]
    pub ascheatfy_weights: String,

    /// Font Ascheatfy draws glyphs with.
    #[serde(default = "default_glyph_font")]
    pub glyph_font: String,
}

fn default_working_folder() -> String {
    ".work".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_models_folder() -> String {
    "res/models".to_string()
}

fn default_asciify_weights() -> String {
    "res/asciify/weights.txt".to_string()
}

fn default_ascheatfy_weights() -> String {
    "res/ascheatfy/weights.txt".to_string()
}

fn default_glyph_font() -> String {
    "res/fonts/DejaVuSansMono-Bold.ttf".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            working_folder: default_working_folder(),
            logs_folder: default_logs_folder(),
            models_folder: default_models_folder(),
            asciify_weights: default_asciify_weights(),
            ascheatfy_weights: default_ascheatfy_weights(),
            glyph_font: default_glyph_font(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,

    /// Only log progress at step intervals.
    #[serde(default = "default_true")]
    pub compact: bool,

    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Lines replayed when a job fails.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Write a per-job log file.
    #[serde(default = "default_true")]
    pub job_log_files: bool,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            job_log_files: true,
        }
    }
}

impl LoggingSettings {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail as usize,
            ..LogConfig::default()
        }
    }
}

/// Job lifecycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Seconds a finished job's slot stays visible.
    #[serde(default = "default_five")]
    pub drain_grace_secs: u64,

    /// Seconds before a status message clears itself.
    #[serde(default = "default_five")]
    pub status_clear_secs: u64,
}

fn default_five() -> u64 {
    5
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            drain_grace_secs: 5,
            status_clear_secs: 5,
        }
    }
}

impl JobSettings {
    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }

    pub fn status_clear(&self) -> Duration {
        Duration::from_secs(self.status_clear_secs)
    }
}

/// Glyph geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlyphSettings {
    #[serde(default = "default_font_px")]
    pub font_px: f32,

    /// Character cell of rendered text, used to keep Asciify's aspect ratio.
    #[serde(default = "default_text_cell_width")]
    pub text_cell_width: u32,
    #[serde(default = "default_text_cell_height")]
    pub text_cell_height: u32,

    /// Cell each Ascheatfy glyph is drawn into.
    #[serde(default = "default_art_cell_width")]
    pub art_cell_width: u32,
    #[serde(default = "default_art_cell_height")]
    pub art_cell_height: u32,
}

fn default_font_px() -> f32 {
    18.0
}

fn default_text_cell_width() -> u32 {
    10
}

fn default_text_cell_height() -> u32 {
    22
}

fn default_art_cell_width() -> u32 {
    11
}

fn default_art_cell_height() -> u32 {
    18
}

impl Default for GlyphSettings {
    fn default() -> Self {
        Self {
            font_px: default_font_px(),
            text_cell_width: default_text_cell_width(),
            text_cell_height: default_text_cell_height(),
            art_cell_width: default_art_cell_width(),
            art_cell_height: default_art_cell_height(),
        }
    }
}

impl GlyphSettings {
    pub fn text_cell(&self) -> (u32, u32) {
        (self.text_cell_width, self.text_cell_height)
    }

    pub fn art_cell(&self) -> (u32, u32) {
        (self.art_cell_width, self.art_cell_height)
    }
}

/// Generated-video settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: f64,
}

fn default_fps() -> u32 {
    30
}

fn default_max_duration() -> f64 {
    5.0
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            max_duration_minutes: default_max_duration(),
        }
    }
}

impl Settings {
    pub fn working_folder(&self) -> PathBuf {
        PathBuf::from(&self.paths.working_folder)
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.paths.logs_folder)
    }

    pub fn models_folder(&self) -> PathBuf {
        PathBuf::from(&self.paths.models_folder)
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Jobs,
    Glyph,
    Video,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Jobs,
        ConfigSection::Glyph,
        ConfigSection::Video,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Jobs => "jobs",
            ConfigSection::Glyph => "glyph",
            ConfigSection::Video => "video",
        }
    }

    /// Comment written above the section.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Folders and resource files",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Jobs => "Job lifecycle timing (seconds)",
            ConfigSection::Glyph => "Glyph rendering for text-art conversions",
            ConfigSection::Video => "Generated video limits",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let toml = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[jobs]"));
        assert!(toml.contains("drain_grace_secs = 5"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[jobs]\ndrain_grace_secs = 2\n[logging]\nlevel = \"debug\"\n";
        let parsed: Settings = toml::from_str(minimal).unwrap();

        assert_eq!(parsed.jobs.drain_grace(), Duration::from_secs(2));
        assert_eq!(parsed.jobs.status_clear(), Duration::from_secs(5));
        assert_eq!(parsed.logging.level, LogLevel::Debug);
        assert!(parsed.logging.compact);
        assert_eq!(parsed.glyph.text_cell(), (10, 22));
        assert_eq!(parsed.video.fps, 30);
    }

    #[test]
    fn logging_settings_map_to_log_config() {
        let settings = LoggingSettings {
            error_tail: 7,
            compact: false,
            ..LoggingSettings::default()
        };
        let config = settings.to_log_config();
        assert_eq!(config.error_tail, 7);
        assert!(!config.compact);
    }
}
