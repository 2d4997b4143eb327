//! MAS Core - backend for Multimedia Art Station
//!
//! Converts media into generative art: images into music (Sonify), images
//! into text or glyph pictures (Asciify, Ascheatfy) and model output into
//! images or animations. Jobs run concurrently on worker threads; this
//! crate holds the job lifecycle and the shared registries, with no UI
//! dependencies.

pub mod config;
pub mod converters;
pub mod files;
pub mod glyph;
pub mod jobs;
pub mod logging;
pub mod slots;
pub mod status;
pub mod time_source;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
