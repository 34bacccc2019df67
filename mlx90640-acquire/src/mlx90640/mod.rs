// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! MLX90640 constants: image geometry and the memory map used during acquisition.
mod address;

pub use address::{EepromAddress, RamAddress, RegisterAddress};

/// The height of the image captured by sensor in pixels.
pub const HEIGHT: usize = 24;

/// The width of the image captured by the sensor in pixels.
pub const WIDTH: usize = 32;

/// The total number of pixels an MLX90640 has.
pub const NUM_PIXELS: usize = HEIGHT * WIDTH;

/// The number of non-pixel words following the pixels in RAM.
///
/// These hold the ambient temperature sensor outputs, the compensation pixels, gain and supply
/// voltage (about half of them are reserved).
pub const AUX_WORDS: usize = 64;

/// The size of the RAM window read for each subpage, in 16-bit words.
pub const RAM_WORDS: usize = NUM_PIXELS + AUX_WORDS;

/// The number of words appended to a raw subpage after the RAM window.
///
/// The first is the subpage index from the latched status register, the second is a snapshot of
/// the control register.
pub const METADATA_WORDS: usize = 2;

/// The total size of a captured subpage, in 16-bit words.
pub const RAW_SUBPAGE_WORDS: usize = RAM_WORDS + METADATA_WORDS;

/// The size of the EEPROM, in 16-bit words.
pub const EEPROM_WORDS: usize = EepromAddress::End as usize - EepromAddress::Base as usize + 1;
