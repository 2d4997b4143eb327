//! Configuration management.
//!
//! TOML settings with logical sections, atomic writes and section-level
//! updates.
//!
//! ```no_run
//! use mas_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().jobs.drain_grace_secs = 3;
//! config.update_section(ConfigSection::Jobs).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, GlyphSettings, JobSettings, LoggingSettings, PathSettings, Settings,
    VideoSettings,
};
