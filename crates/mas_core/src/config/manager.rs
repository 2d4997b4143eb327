//! Config manager for loading, saving, and atomic updates.
//!
//! - Atomic writes (temp file, then rename)
//! - Section-level updates that leave other tables untouched
//! - Missing keys filled with defaults and unknown tables dropped on load

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file and the in-memory [`Settings`].
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Does not touch the disk; call [`load`](Self::load) or
    /// [`load_or_create`](Self::load_or_create) next.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until `save()` or `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file. Errors if it does not exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }
        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load config, writing defaults when the file is missing.
    ///
    /// A file with missing keys or unknown tables is rewritten cleaned up.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = parse_and_clean(&content)?;
            self.settings = settings;
            if was_modified {
                tracing::debug!(path = %self.config_path.display(), "rewriting cleaned config");
                self.save()?;
            }
        } else {
            tracing::info!(path = %self.config_path.display(), "creating default config");
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Create the working and logs folders if missing.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        for dir in [self.settings.working_folder(), self.settings.logs_folder()] {
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Rewrite one section from memory, re-reading the rest from disk.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_doc: DocumentMut = self.section_toml(section)?.parse()?;
        doc[section.table_name()] = Item::Table(section_doc.as_table().clone());

        self.atomic_write(&doc.to_string())?;
        Ok(())
    }

    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        let toml = match section {
            ConfigSection::Paths => toml::to_string_pretty(&s.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&s.logging)?,
            ConfigSection::Jobs => toml::to_string_pretty(&s.jobs)?,
            ConfigSection::Glyph => toml::to_string_pretty(&s.glyph)?,
            ConfigSection::Video => toml::to_string_pretty(&s.video)?,
        };
        Ok(toml)
    }

    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut output = String::new();
        output.push_str("# Multimedia Art Station configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n",
        );

        for section in ConfigSection::ALL {
            output.push('\n');
            output.push_str(&format!("# {}\n", section.description()));
            output.push_str(&format!("[{}]\n", section.table_name()));
            for line in self.section_toml(section)?.lines() {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.config_path)?;
        Ok(())
    }
}

/// Parse settings and report whether the file needs rewriting.
fn parse_and_clean(content: &str) -> ConfigResult<(Settings, bool)> {
    let doc: DocumentMut = content.parse()?;
    let settings: Settings = toml::from_str(content)?;

    let known: Vec<&str> = ConfigSection::ALL.iter().map(|s| s.table_name()).collect();
    let has_unknown = doc.iter().any(|(key, _)| !known.contains(&key));

    let full = toml::Value::try_from(&settings)?;
    let missing_keys = ConfigSection::ALL.iter().any(|section| {
        let expected = full
            .get(section.table_name())
            .and_then(|v| v.as_table())
            .map(|t| t.len())
            .unwrap_or(0);
        let present = doc
            .get(section.table_name())
            .and_then(|item| item.as_table())
            .map(|t| t.len())
            .unwrap_or(0);
        present < expected
    });

    Ok((settings, has_unknown || missing_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[logging]"));
        assert!(content.contains("[video]"));
        assert!(content.contains("# Job lifecycle timing"));

        // Generated content loads back unchanged.
        let mut again = ConfigManager::new(&config_path);
        again.load().unwrap();
        assert_eq!(again.settings().jobs.drain_grace_secs, 5);
    }

    #[test]
    fn load_or_create_preserves_existing_and_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[jobs]\nstatus_clear_secs = 9\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().jobs.status_clear_secs, 9);
        assert_eq!(manager.settings().jobs.drain_grace_secs, 5);
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("drain_grace_secs = 5"));
        assert!(content.contains("status_clear_secs = 9"));
    }

    #[test]
    fn unknown_sections_are_dropped() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[analysis]\nchunk_count = 10\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(!content.contains("[analysis]"));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();
        manager.settings_mut().logging.compact = false;
        manager.settings_mut().video.fps = 12;
        manager.update_section(ConfigSection::Logging).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("compact = false"));
        assert!(content.contains("fps = 30"));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(!config_path.with_extension("toml.tmp").exists());
    }
}
