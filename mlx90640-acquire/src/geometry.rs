// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use crate::mlx90640::{NUM_PIXELS, WIDTH};
use crate::register::AccessPattern;

/// Which subpage each pixel is measured in, indexed in row-major order.
///
/// The tables are built at compile time and shared through `'static` references.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelParityTable([u8; NUM_PIXELS]);

impl PixelParityTable {
    /// The chess board pattern, parity is `(row + column) & 1`.
    pub const CHESS: PixelParityTable = PixelParityTable::build(AccessPattern::Chess);

    /// The row interleaved ("TV") pattern, parity is `row & 1`.
    pub const INTERLEAVE: PixelParityTable = PixelParityTable::build(AccessPattern::Interleave);

    const fn build(pattern: AccessPattern) -> Self {
        let mut table = [0u8; NUM_PIXELS];
        let mut index = 0;
        while index < NUM_PIXELS {
            let row = index / WIDTH;
            let column = index % WIDTH;
            table[index] = match pattern {
                AccessPattern::Chess => ((row + column) & 1) as u8,
                AccessPattern::Interleave => (row & 1) as u8,
            };
            index += 1;
        }
        Self(table)
    }

    /// The shared table for an access pattern.
    pub fn for_pattern(pattern: AccessPattern) -> &'static PixelParityTable {
        match pattern {
            AccessPattern::Chess => &CHESS_TABLE,
            AccessPattern::Interleave => &INTERLEAVE_TABLE,
        }
    }

    /// The subpage index (0 or 1) the pixel at `index` is measured in.
    ///
    /// # Panics
    /// If `index` is not less than [`NUM_PIXELS`].
    pub fn parity(&self, index: usize) -> u8 {
        self.0[index]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for PixelParityTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = if self == &CHESS_TABLE {
            "Chess"
        } else if self == &INTERLEAVE_TABLE {
            "Interleave"
        } else {
            "Custom"
        };
        f.debug_tuple("PixelParityTable").field(&name).finish()
    }
}

static CHESS_TABLE: PixelParityTable = PixelParityTable::CHESS;

static INTERLEAVE_TABLE: PixelParityTable = PixelParityTable::INTERLEAVE;
