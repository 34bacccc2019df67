// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Subpage buffers and chess pattern frame assembly.
//!
//! A frame is built from two captures: subpage 0 then subpage 1. Each capture is converted to
//! temperatures on its own (with its own ambient temperature), and then the two converted arrays
//! are merged by taking each pixel from the subpage that actually measured it.

use arrayvec::ArrayVec;

use crate::error::LibraryError;
use crate::geometry::PixelParityTable;
use crate::mlx90640::{RamAddress, HEIGHT, NUM_PIXELS, RAM_WORDS, RAW_SUBPAGE_WORDS, WIDTH};
use crate::register::{AccessPattern, ControlRegister, StatusRegister, Subpage};

/// The RAM window of one subpage, plus the metadata needed to convert it.
///
/// The words are laid out as the 768 pixel words, the 64 auxiliary words, the captured subpage
/// index, and a snapshot of the control register.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSubpage {
    words: ArrayVec<u16, RAW_SUBPAGE_WORDS>,
    subpage: Subpage,
    status: StatusRegister,
    status_cleared: bool,
}

impl RawSubpage {
    /// Build a raw subpage from a RAM dump and the registers latched alongside it.
    pub fn new(
        ram: &[u16; RAM_WORDS],
        subpage: Subpage,
        control: ControlRegister,
        status: StatusRegister,
    ) -> Self {
        let mut words: ArrayVec<u16, RAW_SUBPAGE_WORDS> = ram.iter().copied().collect();
        words.push(subpage.as_word());
        words.push(control.into());
        Self {
            words,
            subpage,
            status,
            status_cleared: true,
        }
    }

    pub(crate) fn mark_status_uncleared(&mut self) {
        self.status_cleared = false;
    }

    /// The subpage this data was captured for.
    pub fn subpage(&self) -> Subpage {
        self.subpage
    }

    /// The raw pixel words, in row-major order.
    pub fn pixels(&self) -> &[u16] {
        &self.words[..NUM_PIXELS]
    }

    /// The non-pixel RAM words (ambient sensor, compensation pixels, gain, supply voltage).
    pub fn auxiliary(&self) -> &[u16] {
        &self.words[NUM_PIXELS..RAM_WORDS]
    }

    /// The complete RAM window.
    pub fn ram(&self) -> &[u16] {
        &self.words[..RAM_WORDS]
    }

    /// Look up a word in the RAM window by its address.
    pub fn aux_word(&self, address: RamAddress) -> u16 {
        self.words[address.offset()]
    }

    /// The control register as it was when this subpage was captured.
    pub fn control_register(&self) -> ControlRegister {
        ControlRegister::from(self.words[RAM_WORDS + 1])
    }

    /// The status register as it was latched at the start of the capture.
    pub fn status_at_entry(&self) -> StatusRegister {
        self.status
    }

    /// Whether the new data and overrun flags were successfully cleared after the capture.
    pub fn status_cleared(&self) -> bool {
        self.status_cleared
    }

    /// All of the words, metadata included.
    pub fn as_words(&self) -> &[u16] {
        &self.words
    }
}

/// One subpage, converted to temperatures.
///
/// Only the pixels belonging to `subpage` are meaningful.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertedSubframe {
    pub subpage: Subpage,

    /// The ambient temperature calculated from this subpage alone.
    pub ambient: f32,

    pub temperatures: [f32; NUM_PIXELS],
}

impl ConvertedSubframe {
    pub fn new(subpage: Subpage, ambient: f32) -> Self {
        Self {
            subpage,
            ambient,
            temperatures: [0f32; NUM_PIXELS],
        }
    }
}

/// A full thermal image, in degrees Celsius.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedFrame {
    /// Pixel temperatures in row-major order.
    pub temperatures: [f32; NUM_PIXELS],

    /// The ambient temperature combined from both subpages.
    pub ambient: f32,
}

impl MergedFrame {
    pub fn width(&self) -> usize {
        WIDTH
    }

    pub fn height(&self) -> usize {
        HEIGHT
    }

    /// The temperature at a pixel, or `None` if the coordinates are outside the image.
    pub fn pixel(&self, row: usize, column: usize) -> Option<f32> {
        if row < HEIGHT && column < WIDTH {
            Some(self.temperatures[row * WIDTH + column])
        } else {
            None
        }
    }
}

/// Fill `destination` by taking each pixel from the array whose subpage matches the parity of
/// that pixel.
///
/// # Panics
/// If `subpage_a` and `subpage_b` are the same, or any of the slices are shorter than the
/// parity table.
pub fn merge_pixels(
    a: &[f32],
    b: &[f32],
    subpage_a: Subpage,
    subpage_b: Subpage,
    parity: &PixelParityTable,
    destination: &mut [f32],
) {
    assert_ne!(
        subpage_a, subpage_b,
        "a frame can only be merged from two different subpages"
    );
    let parity_a = subpage_a.as_word() as u8;
    destination
        .iter_mut()
        .zip(parity.as_slice())
        .enumerate()
        .for_each(|(index, (pixel, pixel_parity))| {
            *pixel = if *pixel_parity == parity_a {
                a[index]
            } else {
                b[index]
            };
        });
}

/// Combine the ambient temperatures of two subpages.
///
/// If both are finite the mean is used. If only one is finite, that one is used. If neither is,
/// there is no usable ambient temperature for the frame.
pub fn combine_ambient(ambient_a: f32, ambient_b: f32) -> Result<f32, LibraryError> {
    match (ambient_a.is_finite(), ambient_b.is_finite()) {
        (true, true) => Ok((ambient_a + ambient_b) / 2.0),
        (true, false) => Ok(ambient_a),
        (false, true) => Ok(ambient_b),
        (false, false) => Err(LibraryError::BadAmbientTemperature),
    }
}

/// Merges converted subframes into full frames using a parity table.
#[derive(Clone, Copy, Debug)]
pub struct FrameAssembler {
    table: &'static PixelParityTable,
}

impl FrameAssembler {
    pub fn new(table: &'static PixelParityTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'static PixelParityTable {
        self.table
    }

    /// Merge two subframes from opposite subpages, in either order.
    ///
    /// # Panics
    /// If both subframes are for the same subpage.
    pub fn merge(
        &self,
        first: &ConvertedSubframe,
        second: &ConvertedSubframe,
    ) -> Result<MergedFrame, LibraryError> {
        let ambient = combine_ambient(first.ambient, second.ambient)?;
        let mut frame = MergedFrame {
            temperatures: [0f32; NUM_PIXELS],
            ambient,
        };
        merge_pixels(
            &first.temperatures,
            &second.temperatures,
            first.subpage,
            second.subpage,
            self.table,
            &mut frame.temperatures,
        );
        Ok(frame)
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(PixelParityTable::for_pattern(AccessPattern::Chess))
    }
}
