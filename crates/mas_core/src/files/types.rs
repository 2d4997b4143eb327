//! File role and type enums.

use serde::{Deserialize, Serialize};

/// Media file types understood by the converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Png,
    Jpg,
    Gif,
    Mp4,
    Wav,
    Txt,
}

impl FileType {
    /// Canonical extension (no leading dot).
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Png => "png",
            FileType::Jpg => "jpg",
            FileType::Gif => "gif",
            FileType::Mp4 => "mp4",
            FileType::Wav => "wav",
            FileType::Txt => "txt",
        }
    }

    /// Map a file extension to a type, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(FileType::Png),
            "jpg" | "jpeg" => Some(FileType::Jpg),
            "gif" => Some(FileType::Gif),
            "mp4" => Some(FileType::Mp4),
            "wav" => Some(FileType::Wav),
            "txt" => Some(FileType::Txt),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// What extension an output file receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    /// Always this type.
    Fixed(FileType),
    /// Copy the resolved input's extension.
    MatchInput,
}

/// Whether a managed file is read or written by its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Input,
    Output,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRole::Input => write!(f, "input"),
            FileRole::Output => write!(f, "output"),
        }
    }
}
