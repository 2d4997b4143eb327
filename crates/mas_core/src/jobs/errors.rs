//! Error types for jobs and conversion routines.
//!
//! Validation-category errors end a job before anything is locked and are
//! shown to the user as one short status message. Conversion errors happen
//! while resources are held and always pass through cleanup first.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::files::FileRole;
use crate::glyph::WeightTableError;

/// Top-level job error.
#[derive(Error, Debug)]
pub enum JobError {
    /// Declared input path does not exist or is not a file.
    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// Input exists but its extension is not accepted by the job kind.
    #[error("Input file {} has type '{extension}', expected one of: {allowed}", path.display())]
    IncorrectFileType {
        path: PathBuf,
        extension: String,
        allowed: String,
    },

    /// Declared output directory does not exist.
    #[error("Output directory not found: {}", path.display())]
    OutputDirectoryNotFound { path: PathBuf },

    /// Another job already holds the resolved path.
    #[error("{role} file is in use by another job: {}", path.display())]
    ResourceInUse { role: FileRole, path: PathBuf },

    /// Job-specific argument validation failed.
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// The conversion routine failed while running.
    #[error("Conversion failed: {0}")]
    ConversionFailure(#[from] ConversionError),

    /// A managed file was used out of order (locked before resolving, locked twice).
    #[error("Managed file misuse: {0}")]
    InvalidFileState(String),
}

impl JobError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a file state error.
    pub fn invalid_file_state(message: impl Into<String>) -> Self {
        Self::InvalidFileState(message.into())
    }

    /// Short text for the status bar.
    pub fn user_message(&self) -> String {
        match self {
            JobError::InputNotFound { .. } => "the specified input file does not exist.".to_string(),
            JobError::IncorrectFileType { allowed, .. } => {
                format!("incorrect file type, expected {}.", allowed)
            }
            JobError::OutputDirectoryNotFound { .. } => {
                "destination folder does not exist.".to_string()
            }
            JobError::ResourceInUse { role, .. } => {
                format!("this {} file is currently in use.", role)
            }
            JobError::InvalidParameter { message, .. } => message.clone(),
            JobError::ConversionFailure(e) => format!("conversion failed: {}", e),
            JobError::InvalidFileState(message) => format!("internal error: {}", message),
        }
    }

    /// Whether this error was raised before the job started running.
    pub fn is_validation(&self) -> bool {
        !matches!(self, JobError::ConversionFailure(_))
    }
}

/// Error raised from inside a conversion routine.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Image decode/encode error.
    #[error("Image error in {operation}: {source}")]
    Image {
        operation: String,
        #[source]
        source: image::ImageError,
    },

    /// WAV writer error.
    #[error("Audio error in {operation}: {source}")]
    Audio {
        operation: String,
        #[source]
        source: hound::Error,
    },

    /// Font could not be loaded or a glyph could not be rendered.
    #[error("Font error: {0}")]
    Font(String),

    /// Generative model failed to load or run.
    #[error("Model error: {0}")]
    Model(String),

    /// Weight file problem.
    #[error(transparent)]
    Weights(#[from] WeightTableError),

    /// Input content the routine cannot handle.
    #[error("Unsupported input: {0}")]
    Unsupported(String),

    /// The routine panicked; the panic was caught at the job boundary.
    #[error("Conversion panicked: {0}")]
    Panicked(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl ConversionError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create an image error with context.
    pub fn image(operation: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            operation: operation.into(),
            source,
        }
    }

    /// Create an audio error with context.
    pub fn audio(operation: impl Into<String>, source: hound::Error) -> Self {
        Self::Audio {
            operation: operation.into(),
            source,
        }
    }

    /// Create a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Result type for conversion routines.
pub type ConversionResult<T> = Result<T, ConversionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_have_status_text() {
        let err = JobError::InputNotFound {
            path: PathBuf::from("/missing.png"),
        };
        assert_eq!(err.user_message(), "the specified input file does not exist.");
        assert!(err.is_validation());

        let err = JobError::ResourceInUse {
            role: FileRole::Output,
            path: PathBuf::from("/out/a.png"),
        };
        assert_eq!(err.user_message(), "this output file is currently in use.");
    }

    #[test]
    fn conversion_error_chains_into_job_error() {
        let inner = ConversionError::io(
            "writing output",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let err: JobError = inner.into();

        assert!(!err.is_validation());
        let msg = err.to_string();
        assert!(msg.contains("writing output"));
        assert!(msg.contains("denied"));
    }
}
