//! Brightness-level → candidate glyph table.
//!
//! File format, one line per populated level:
//!
//! ```text
//! 0: 32
//! 17: 46 96
//! 255: 9608
//! ```
//!
//! Glyphs are Unicode code points. Levels missing from the file have no
//! candidates and are resolved by the mapper's nearest-level search.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;

use super::raster::GlyphRasterizer;
use crate::jobs::ConversionError;

/// Number of brightness levels.
pub const LEVELS: usize = 256;

/// Errors reading or building a weight table.
#[derive(Error, Debug)]
pub enum WeightTableError {
    #[error("Failed to read weight file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Weight file line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Weight table has no populated levels")]
    Empty,
}

/// Immutable mapping from level (0-255) to glyph code points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    levels: Vec<Vec<u32>>,
}

impl WeightTable {
    /// Build from `(level, glyphs)` pairs. Repeated levels are merged.
    pub fn from_levels<I>(entries: I) -> Result<Self, WeightTableError>
    where
        I: IntoIterator<Item = (u8, Vec<u32>)>,
    {
        let mut levels = vec![Vec::new(); LEVELS];
        for (level, glyphs) in entries {
            levels[level as usize].extend(glyphs);
        }
        let table = Self { levels };
        if table.populated_levels() == 0 {
            return Err(WeightTableError::Empty);
        }
        Ok(table)
    }

    /// Parse weight-file content.
    pub fn parse(content: &str) -> Result<Self, WeightTableError> {
        let mut entries = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let (level_part, glyph_part) =
                line.split_once(':').ok_or_else(|| WeightTableError::Parse {
                    line: line_no,
                    message: "expected 'level: glyph glyph ...'".to_string(),
                })?;

            let level: u8 = level_part
                .trim()
                .parse()
                .map_err(|_| WeightTableError::Parse {
                    line: line_no,
                    message: format!("level '{}' is not in 0-255", level_part.trim()),
                })?;

            let mut glyphs = Vec::new();
            for token in glyph_part.split_whitespace() {
                let code: u32 = token.parse().map_err(|_| WeightTableError::Parse {
                    line: line_no,
                    message: format!("glyph code '{}' is not an integer", token),
                })?;
                if char::from_u32(code).is_none() {
                    return Err(WeightTableError::Parse {
                        line: line_no,
                        message: format!("glyph code {} is not a valid character", code),
                    });
                }
                glyphs.push(code);
            }
            if glyphs.is_empty() {
                return Err(WeightTableError::Parse {
                    line: line_no,
                    message: format!("level {} lists no glyphs", level),
                });
            }

            entries.push((level, glyphs));
        }

        Self::from_levels(entries)
    }

    /// Read and parse a weight file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WeightTableError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| WeightTableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            populated = table.populated_levels(),
            glyphs = table.glyph_count(),
            "loaded weight table"
        );
        Ok(table)
    }

    /// Measure glyph darkness with a rasterizer and bucket glyphs by level.
    ///
    /// Mean ink coverage is scaled linearly so the lightest glyph lands on
    /// level 0 and the densest on 255.
    pub fn measure(
        rasterizer: &dyn GlyphRasterizer,
        codes: &[u32],
    ) -> Result<Self, ConversionError> {
        let mut coverage = Vec::with_capacity(codes.len());
        for &code in codes {
            let cell = rasterizer.rasterize(code)?;
            let pixels = cell.as_raw();
            let mean = if pixels.is_empty() {
                0.0
            } else {
                pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64
            };
            coverage.push((code, mean));
        }

        let min = coverage
            .iter()
            .map(|&(_, c)| c)
            .fold(f64::INFINITY, f64::min);
        let max = coverage
            .iter()
            .map(|&(_, c)| c)
            .fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        let entries = coverage.into_iter().map(|(code, c)| {
            let level = if range > 0.0 {
                (((c - min) / range) * 255.0).round() as u8
            } else {
                0
            };
            (level, vec![code])
        });

        Ok(Self::from_levels(entries)?)
    }

    /// Candidates at `level` (empty if unpopulated).
    pub fn candidates(&self, level: u8) -> &[u32] {
        &self.levels[level as usize]
    }

    pub fn is_populated(&self, level: u8) -> bool {
        !self.levels[level as usize].is_empty()
    }

    /// Number of levels with at least one glyph.
    pub fn populated_levels(&self) -> usize {
        self.levels.iter().filter(|g| !g.is_empty()).count()
    }

    /// Total number of glyphs across levels.
    pub fn glyph_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Reduce every populated level to one randomly picked glyph.
    ///
    /// Keeps pixels of equal brightness rendering as the same glyph.
    pub fn into_static_palette<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        for glyphs in self.levels.iter_mut() {
            if glyphs.len() > 1 {
                let pick = glyphs[rng.random_range(0..glyphs.len())];
                *glyphs = vec![pick];
            }
        }
        self
    }

    /// Write in weight-file format.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (level, glyphs) in self.levels.iter().enumerate() {
            if glyphs.is_empty() {
                continue;
            }
            let codes: Vec<String> = glyphs.iter().map(u32::to_string).collect();
            writeln!(writer, "{}: {}", level, codes.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parses_weight_file() {
        let table = WeightTable::parse("0: 32\n\n128: 43 61\n255: 64\n").unwrap();

        assert_eq!(table.candidates(0), &[32]);
        assert_eq!(table.candidates(128), &[43, 61]);
        assert!(table.candidates(1).is_empty());
        assert_eq!(table.populated_levels(), 3);
        assert_eq!(table.glyph_count(), 4);
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = WeightTable::parse("0: 32\n300: 40\n").unwrap_err();
        assert!(matches!(err, WeightTableError::Parse { line: 2, .. }));

        let err = WeightTable::parse("12 32").unwrap_err();
        assert!(matches!(err, WeightTableError::Parse { line: 1, .. }));

        let err = WeightTable::parse("12: x").unwrap_err();
        assert!(matches!(err, WeightTableError::Parse { line: 1, .. }));

        let err = WeightTable::parse("12: 55296").unwrap_err();
        assert!(matches!(err, WeightTableError::Parse { .. }));

        let err = WeightTable::parse("12:").unwrap_err();
        assert!(matches!(err, WeightTableError::Parse { .. }));
    }

    #[test]
    fn empty_table_is_an_error() {
        assert!(matches!(
            WeightTable::parse("\n\n"),
            Err(WeightTableError::Empty)
        ));
    }

    #[test]
    fn static_palette_keeps_one_candidate_per_level() {
        let table = WeightTable::parse("10: 1 2 3 4\n20: 5\n").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let reduced = table.clone().into_static_palette(&mut rng);

        assert_eq!(reduced.candidates(10).len(), 1);
        assert!(table.candidates(10).contains(&reduced.candidates(10)[0]));
        assert_eq!(reduced.candidates(20), &[5]);
    }

    #[test]
    fn written_table_parses_back() {
        let table = WeightTable::parse("3: 46\n200: 35 64\n").unwrap();
        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "3: 46\n200: 35 64\n");
    }
}
