//! Brightness → glyph selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::weights::WeightTable;
use crate::jobs::RenderMode;

/// Maps brightness levels to glyphs using a weight table.
///
/// Unpopulated levels resolve to the nearest populated level. When a lighter
/// and a darker level are equally near, a fair coin picks between them.
#[derive(Debug)]
pub struct GlyphMapper<R = StdRng> {
    table: WeightTable,
    rng: R,
}

impl GlyphMapper<StdRng> {
    /// Mapper with an OS-seeded generator.
    pub fn new(table: WeightTable) -> Self {
        Self::with_rng(table, StdRng::from_os_rng())
    }

    /// Mapper whose choices are reproducible for `seed`.
    pub fn seeded(table: WeightTable, seed: u64) -> Self {
        Self::with_rng(table, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> GlyphMapper<R> {
    pub fn with_rng(table: WeightTable, rng: R) -> Self {
        Self { table, rng }
    }

    /// Collapse each level to a single glyph so repeated brightness renders
    /// identically (used for image output).
    pub fn with_static_palette(mut self) -> Self {
        self.table = self.table.into_static_palette(&mut self.rng);
        self
    }

    pub fn table(&self) -> &WeightTable {
        &self.table
    }

    /// Distance to the nearest populated level at or above `level`.
    pub fn find_lighter(&self, level: u8) -> Option<u8> {
        (level..=u8::MAX)
            .find(|&l| self.table.is_populated(l))
            .map(|l| l - level)
    }

    /// Distance to the nearest populated level at or below `level`.
    pub fn find_darker(&self, level: u8) -> Option<u8> {
        (0..=level)
            .rev()
            .find(|&l| self.table.is_populated(l))
            .map(|l| level - l)
    }

    /// Nearest populated level to `level`.
    pub fn true_level(&mut self, level: u8) -> u8 {
        match (self.find_lighter(level), self.find_darker(level)) {
            (Some(up), Some(down)) if up < down => level + up,
            (Some(up), Some(down)) if down < up => level - down,
            (Some(up), Some(_)) => {
                if self.rng.random_bool(0.5) {
                    level + up
                } else {
                    level - up
                }
            }
            (Some(up), None) => level + up,
            (None, Some(down)) => level - down,
            // A WeightTable always has a populated level.
            (None, None) => level,
        }
    }

    /// Glyph code point for a brightness level.
    pub fn glyph_for(&mut self, brightness: u8) -> u32 {
        let level = self.true_level(brightness);
        let candidates = self.table.candidates(level);
        match candidates.len() {
            0 => u32::from(' '),
            1 => candidates[0],
            n => candidates[self.rng.random_range(0..n)],
        }
    }

    /// Glyph for a grayscale pixel, applying the render mode.
    ///
    /// Table levels measure ink density, so black-on-white output inverts
    /// the pixel first: a dark pixel wants a dense glyph.
    pub fn glyph_for_pixel(&mut self, luma: u8, mode: RenderMode) -> u32 {
        let brightness = match mode {
            RenderMode::BlackOnWhite => u8::MAX - luma,
            RenderMode::WhiteOnBlack => luma,
        };
        self.glyph_for(brightness)
    }

    /// Same as [`glyph_for_pixel`](Self::glyph_for_pixel) but as a `char`.
    pub fn char_for_pixel(&mut self, luma: u8, mode: RenderMode) -> char {
        char::from_u32(self.glyph_for_pixel(luma, mode)).unwrap_or(' ')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(content: &str) -> GlyphMapper {
        GlyphMapper::seeded(WeightTable::parse(content).unwrap(), 42)
    }

    #[test]
    fn exact_level_is_used() {
        let mut m = mapper("0: 32\n100: 43\n255: 64\n");
        assert_eq!(m.find_lighter(100), Some(0));
        assert_eq!(m.find_darker(100), Some(0));
        assert_eq!(m.glyph_for(100), 43);
    }

    #[test]
    fn nearest_level_wins() {
        let mut m = mapper("10: 1\n20: 2\n");
        assert_eq!(m.true_level(13), 10);
        assert_eq!(m.true_level(17), 20);
        assert_eq!(m.glyph_for(12), 1);
        assert_eq!(m.glyph_for(19), 2);
    }

    #[test]
    fn only_one_direction_available() {
        let mut m = mapper("50: 7\n");
        assert_eq!(m.find_lighter(200), None);
        assert_eq!(m.find_darker(200), Some(150));
        assert_eq!(m.true_level(200), 50);
        assert_eq!(m.find_darker(0), None);
        assert_eq!(m.true_level(0), 50);
    }

    #[test]
    fn ties_pick_one_of_the_two_neighbours() {
        let mut m = mapper("10: 1\n20: 2\n");
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let level = m.true_level(15);
            assert!(level == 10 || level == 20);
            seen.insert(level);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn same_seed_same_choices() {
        let table = WeightTable::parse("0: 1 2 3 4 5\n255: 6 7 8\n").unwrap();
        let mut a = GlyphMapper::seeded(table.clone(), 9);
        let mut b = GlyphMapper::seeded(table, 9);
        let run_a: Vec<u32> = (0..=255u8).map(|l| a.glyph_for(l)).collect();
        let run_b: Vec<u32> = (0..=255u8).map(|l| b.glyph_for(l)).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn render_mode_inverts_for_black_on_white() {
        let mut m = mapper("0: 32\n255: 35\n");
        // White pixel on white paper needs no ink.
        assert_eq!(m.char_for_pixel(255, RenderMode::BlackOnWhite), ' ');
        assert_eq!(m.char_for_pixel(0, RenderMode::BlackOnWhite), '#');
        assert_eq!(m.char_for_pixel(255, RenderMode::WhiteOnBlack), '#');
    }

    #[test]
    fn static_palette_is_stable_per_level() {
        let mut m = mapper("128: 1 2 3 4 5 6\n").with_static_palette();
        let first = m.glyph_for(128);
        for _ in 0..20 {
            assert_eq!(m.glyph_for(128), first);
        }
    }
}
