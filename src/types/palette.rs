//! Colors and the indexed-color palette

use serde::{Deserialize, Serialize};

/// An 8-bit-per-channel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == Self::BLACK
    }
}

/// The 256-entry color table used by indexed ILDA formats (0 and 1).
///
/// A fresh palette is opaque white everywhere. Format 2 sections overwrite
/// entries in place, and every indexed frame decoded afterwards sees the
/// result. The decoder owns one palette per decode call and threads it
/// through all sections in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [Rgb; Palette::SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        Self { entries: [Rgb::WHITE; Palette::SIZE] }
    }
}

impl Palette {
    /// Number of entries in an ILDA palette.
    pub const SIZE: usize = 256;

    /// Look up the color for an index. Every `u8` is a valid index.
    pub fn get(&self, index: u8) -> Rgb {
        self.entries[index as usize]
    }

    /// Replace the entry at `index`.
    ///
    /// Returns `false` and leaves the palette untouched when `index` is past
    /// the end of the table; ILDA files may declare more palette records than
    /// fit.
    pub fn set(&mut self, index: usize, color: Rgb) -> bool {
        match self.entries.get_mut(index) {
            Some(slot) => {
                *slot = color;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[Rgb; Palette::SIZE] {
        &self.entries
    }
}
