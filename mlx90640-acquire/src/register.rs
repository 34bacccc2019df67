// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use core::convert::TryFrom;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::LibraryError;
use crate::mlx90640::RegisterAddress;
use crate::transport::Address;
use crate::util::is_bit_set;

/// Trait for common register functionality.
pub trait Register: Into<u16> + From<u16> {
    /// A bit mask of which bits can be modified by the controller.
    fn write_mask() -> u16;

    /// The address of this register in the camera's memory map.
    fn address() -> Address;
}

/// Identify which subpage to access.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Subpage {
    Zero = 0,
    One = 1,
}

impl Subpage {
    /// The subpage that follows this one in the chess pattern.
    pub fn other(self) -> Self {
        match self {
            Subpage::Zero => Subpage::One,
            Subpage::One => Subpage::Zero,
        }
    }

    /// The subpage as it's stored in the metadata words of a raw subpage.
    pub fn as_word(self) -> u16 {
        let index: usize = self.into();
        index as u16
    }
}

/// The decoded form of a status register snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusReading {
    /// Whether the camera has signalled new data.
    pub ready: bool,

    /// The subpage the new data is for. Only present when `ready` is set.
    pub subpage: Option<Subpage>,

    /// The camera measured a new subpage before the previous one was acknowledged.
    pub overrun: bool,
}

/// A snapshot of the status register (0x8000).
///
/// A snapshot is always taken in a single bus transaction; the fields are never combined from
/// separate reads.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct StatusRegister {
    /// The raw subpage bits (the three least significant bits). Read-only.
    ///
    /// Only 0 and 1 are valid, the datasheet marks the rest as reserved.
    pub(crate) last_updated_subpage: u8,

    /// Set when there is new data available in RAM.
    ///
    /// This flag is set by the camera, and can only be cleared by the controller.
    pub(crate) new_data: bool,

    /// Set when a measurement landed before the previous one was cleared.
    pub(crate) overrun: bool,

    /// Every other bit, kept as-is.
    pub(crate) reserved: u16,
}

impl StatusRegister {
    pub const SUBPAGE_MASK: u16 = 0x0007;

    pub const NEW_DATA_MASK: u16 = 0x0008;

    pub const OVERRUN_MASK: u16 = 0x0010;

    /// The value written to acknowledge a subpage. Both flags are write-to-clear.
    pub const CLEAR_MASK: u16 = Self::NEW_DATA_MASK | Self::OVERRUN_MASK;

    const KNOWN_MASK: u16 = Self::SUBPAGE_MASK | Self::CLEAR_MASK;

    /// Whether there is new data available.
    pub fn new_data(&self) -> bool {
        self.new_data
    }

    /// Whether the overrun flag is set.
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    /// The raw subpage field, without any validation.
    pub fn raw_subpage(&self) -> u8 {
        self.last_updated_subpage
    }

    /// The subpage which was last updated by the camera.
    pub fn last_updated_subpage(&self) -> Result<Subpage, LibraryError> {
        Subpage::try_from(self.last_updated_subpage as usize)
            .map_err(|_| LibraryError::InvalidSubpage(self.last_updated_subpage))
    }

    /// Interpret the snapshot.
    ///
    /// The subpage field is only checked when new data has been signalled. A ready status with a
    /// subpage other than 0 or 1 is an error, which is distinct from "not ready".
    pub fn decode(&self) -> Result<StatusReading, LibraryError> {
        let subpage = if self.new_data {
            Some(self.last_updated_subpage()?)
        } else {
            None
        };
        Ok(StatusReading {
            ready: self.new_data,
            subpage,
            overrun: self.overrun,
        })
    }
}

impl Register for StatusRegister {
    fn write_mask() -> u16 {
        Self::CLEAR_MASK
    }

    fn address() -> Address {
        RegisterAddress::Status.into()
    }
}

impl From<u16> for StatusRegister {
    fn from(raw: u16) -> Self {
        Self {
            last_updated_subpage: (raw & Self::SUBPAGE_MASK) as u8,
            new_data: is_bit_set(raw, 3),
            overrun: is_bit_set(raw, 4),
            reserved: raw & !Self::KNOWN_MASK,
        }
    }
}

impl From<StatusRegister> for u16 {
    fn from(status: StatusRegister) -> Self {
        let mut register = status.reserved;
        register |= status.last_updated_subpage as u16 & StatusRegister::SUBPAGE_MASK;
        register |= (status.new_data as u16) << 3;
        register |= (status.overrun as u16) << 4;
        register
    }
}

/// Represents the possible states of the control register (0x800D).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
// skip formatting in here as rustfmt will remove the extra blank lines around the "extra" bit
// comments.
#[rustfmt::skip]
pub struct ControlRegister {
    // The fields in this struct are laid out in least to most significant bits they occupy in the
    // control register.

    /// Whether or not to use subpages.
    ///
    /// If subpages are disabled, only one page will be updated. The default is enabled
    pub(crate) use_subpages: bool,

    /// Whether to keep measuring the same subpage instead of alternating.
    ///
    /// This value only has an effect when `use_subpages` is enabled. The default is disabled.
    pub(crate) subpage_repeat: bool,

    /// The frame rate the camera should run at.
    ///
    /// See the note on `FrameRate` for I²C bus clock rate requirements. The default is
    /// [2Hz][FrameRate::Two].
    pub(crate) frame_rate: FrameRate,

    // `frame_rate` takes up three bits

    /// The resolution to run the internal ADC at.
    ///
    /// The default is [18 bits][Resolution::Eighteen].
    pub(crate) resolution: Resolution,

    // `resolution` takes up two bits.

    /// Which access pattern to use.
    ///
    /// The default for the MLX90640 is the [chess pattern][AccessPattern::Chess].
    pub(crate) access_pattern: AccessPattern,

    /// Every other bit (data hold, step mode, the selected subpage and the reserved bits),
    /// preserved so that writes don't disturb them.
    pub(crate) reserved: u16,
}

impl ControlRegister {
    const FRAME_RATE_MASK: u16 = 0x0380;

    const RESOLUTION_MASK: u16 = 0x0C00;

    const KNOWN_MASK: u16 =
        0x0001 | 0x0008 | Self::FRAME_RATE_MASK | Self::RESOLUTION_MASK | 0x1000;

    pub fn use_subpages(&self) -> bool {
        self.use_subpages
    }

    pub fn set_use_subpages(&mut self, use_subpages: bool) {
        self.use_subpages = use_subpages;
    }

    pub fn subpage_repeat(&self) -> bool {
        self.subpage_repeat
    }

    pub fn set_subpage_repeat(&mut self, subpage_repeat: bool) {
        self.subpage_repeat = subpage_repeat;
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: FrameRate) {
        self.frame_rate = frame_rate;
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    pub fn access_pattern(&self) -> AccessPattern {
        self.access_pattern
    }

    pub fn set_access_pattern(&mut self, access_pattern: AccessPattern) {
        self.access_pattern = access_pattern;
    }

    /// Whether the camera alternates subpages in the chess pattern, which is what frame assembly
    /// expects.
    pub fn is_chess_readout(&self) -> bool {
        self.use_subpages && !self.subpage_repeat && self.access_pattern == AccessPattern::Chess
    }
}

impl Default for ControlRegister {
    /// The default settings (as documented in the datasheet) for the MLX90640.
    fn default() -> Self {
        Self {
            use_subpages: true,
            subpage_repeat: false,
            frame_rate: FrameRate::default(),
            resolution: Resolution::default(),
            access_pattern: AccessPattern::Chess,
            reserved: 0,
        }
    }
}

impl Register for ControlRegister {
    fn write_mask() -> u16 {
        // *Technically* it's 0x1FFD, but the second bit is documented to always be 0
        0x1FFF
    }

    fn address() -> Address {
        RegisterAddress::Control.into()
    }
}

impl From<u16> for ControlRegister {
    fn from(raw: u16) -> Self {
        let use_subpages = is_bit_set(raw, 0);
        let subpage_repeat = is_bit_set(raw, 3);
        // The masked value is always in 0..=7, and every one of those is a frame rate.
        let frame_rate = FrameRate::from_code(((raw & Self::FRAME_RATE_MASK) >> 7) as u8);
        let resolution = Resolution::from_code(((raw & Self::RESOLUTION_MASK) >> 10) as u8);
        let access_pattern = if is_bit_set(raw, 12) {
            AccessPattern::Chess
        } else {
            AccessPattern::Interleave
        };
        Self {
            use_subpages,
            subpage_repeat,
            frame_rate,
            resolution,
            access_pattern,
            reserved: raw & !Self::KNOWN_MASK,
        }
    }
}

impl From<ControlRegister> for u16 {
    fn from(register: ControlRegister) -> Self {
        let mut raw = register.reserved & !ControlRegister::KNOWN_MASK;
        raw |= register.use_subpages as u16;
        raw |= (register.subpage_repeat as u16) << 3;
        raw |= (register.frame_rate.as_raw() as u16) << 7;
        raw |= (register.resolution.as_raw() as u16) << 10;
        if register.access_pattern == AccessPattern::Chess {
            raw |= 1u16 << 12;
        }
        raw
    }
}

/// The possible refresh rates supported by the camera. Before using the higher refresh rates,
/// ensure your I²C bus is fast enough. A quick rundown of the the maximum frame rate some common
/// I²C bus speeds can support:
///
/// * 100kHz: [4Hz][FrameRate::Four]
/// * 400kHz: [16Hz][FrameRate::Sixteen]
/// * 1MHz: [64Hz][FrameRate::SixtyFour] (barely, [32Hz][FrameRate::ThirtyTwo] is safer)
///
/// The rate is for full frames; each subpage is measured in half of the frame period.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum FrameRate {
    /// 0.5 Hz, one frame every two seconds.
    Half,

    /// 1Hz.
    One,

    /// 2Hz, which is also the default for the MLX90640.
    Two,

    // 4Hz.
    Four,

    // 8Hz.
    Eight,

    // 16 Hz.
    Sixteen,

    // 32Hz.
    ThirtyTwo,

    // 64Hz.
    SixtyFour,
}

impl FrameRate {
    /// Attempt to create a `FrameRate` from a refresh rate code.
    pub fn from_raw(raw_value: u8) -> Result<Self, LibraryError> {
        if raw_value > 7 {
            Err(LibraryError::InvalidRefreshCode(raw_value))
        } else {
            Ok(Self::from_code(raw_value))
        }
    }

    /// Map the low three bits of `code` to a frame rate.
    fn from_code(code: u8) -> Self {
        match code & 0x7 {
            0 => Self::Half,
            1 => Self::One,
            2 => Self::Two,
            3 => Self::Four,
            4 => Self::Eight,
            5 => Self::Sixteen,
            6 => Self::ThirtyTwo,
            _ => Self::SixtyFour,
        }
    }

    /// Map a frame rate variant into the refresh rate code used by the camera.
    pub fn as_raw(&self) -> u8 {
        match self {
            Self::Half => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 3,
            Self::Eight => 4,
            Self::Sixteen => 5,
            Self::ThirtyTwo => 6,
            Self::SixtyFour => 7,
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::Two
    }
}

impl TryFrom<f32> for FrameRate {
    type Error = LibraryError;

    /// Attempt to create a `FrameRate` from a number.
    ///
    /// This will only work if the source number *exactly* matches one of the values named as a
    /// variant.
    /// ```
    /// # use core::convert::TryFrom;
    /// # use mlx90640_acquire::FrameRate;
    /// assert_eq!(FrameRate::try_from(0.5), Ok(FrameRate::Half));
    /// let almost_half = 0.50001;
    /// assert!(FrameRate::try_from(almost_half).is_err());
    /// ```
    #[allow(clippy::float_cmp)]
    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if value == 0.5 {
            Ok(Self::Half)
        } else if value == 1.0 {
            Ok(Self::One)
        } else if value == 2.0 {
            Ok(Self::Two)
        } else if value == 4.0 {
            Ok(Self::Four)
        } else if value == 8.0 {
            Ok(Self::Eight)
        } else if value == 16.0 {
            Ok(Self::Sixteen)
        } else if value == 32.0 {
            Ok(Self::ThirtyTwo)
        } else if value == 64.0 {
            Ok(Self::SixtyFour)
        } else {
            Err(LibraryError::InvalidData(
                "The given number does not match a valid frame rate",
            ))
        }
    }
}

impl From<FrameRate> for f32 {
    fn from(frame_rate: FrameRate) -> Self {
        match frame_rate {
            FrameRate::Half => 0.5,
            FrameRate::One => 1f32,
            FrameRate::Two => 2f32,
            FrameRate::Four => 4f32,
            FrameRate::Eight => 8f32,
            FrameRate::Sixteen => 16f32,
            FrameRate::ThirtyTwo => 32f32,
            FrameRate::SixtyFour => 64f32,
        }
    }
}

/// The resolution of the internal [ADC][adc].
///
/// The calibration step needs this to correct pixel values, which is why the control register is
/// captured alongside every subpage.
///
/// [adc]: https://en.wikipedia.org/wiki/Analog-to-digital_converter
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Resolution {
    /// 16-bit.
    Sixteen,

    /// 17-bit.
    Seventeen,

    /// 18-bit, which is also the default for the MLX90640.
    Eighteen,

    /// 19-bit.
    Nineteen,
}

impl Resolution {
    fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => Self::Sixteen,
            1 => Self::Seventeen,
            2 => Self::Eighteen,
            _ => Self::Nineteen,
        }
    }

    /// Map a resolution variant into the representation used by the camera.
    pub fn as_raw(&self) -> u8 {
        match self {
            Self::Sixteen => 0,
            Self::Seventeen => 1,
            Self::Eighteen => 2,
            Self::Nineteen => 3,
        }
    }
}

impl From<Resolution> for u8 {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Sixteen => 16,
            Resolution::Seventeen => 17,
            Resolution::Eighteen => 18,
            Resolution::Nineteen => 19,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Eighteen
    }
}

/// The pixel access pattern used by a camera.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AccessPattern {
    /// Pixels alternate between subpages, resulting in a chess or checker board pattern.
    ///
    /// This is the default (and strongly recommended value) for the MLX90640.
    Chess = 1,

    /// Each row of pixels is in the same subpage, with the rows alternating between subpages.
    Interleave = 0,
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! assert_register_field {
        ($register:ty, $value:literal, $field:ident, $expected:expr) => {
            // backdoor type annotation for the macro
            let value: u16 = $value;
            let packed: $register = From::from(value);
            assert_eq!(packed.$field, $expected);
            let unpacked: u16 = packed.into();
            assert_eq!(unpacked, value);
        };
    }

    #[test]
    fn status_register_ready_subpages() {
        for subpage in [Subpage::Zero, Subpage::One] {
            let raw = 0x0008 | subpage.as_word();
            let reading = StatusRegister::from(raw).decode().unwrap();
            assert!(reading.ready);
            assert_eq!(reading.subpage, Some(subpage));
            assert!(!reading.overrun);
        }
    }

    #[test]
    fn status_register_invalid_subpages() {
        for bits in 2u16..8 {
            let status = StatusRegister::from(0x0008 | bits);
            assert_eq!(
                status.decode(),
                Err(LibraryError::InvalidSubpage(bits as u8)),
                "subpage bits {} should be rejected",
                bits
            );
        }
    }

    #[test]
    fn status_register_not_ready_ignores_subpage() {
        let reading = StatusRegister::from(0x0006).decode().unwrap();
        assert!(!reading.ready);
        assert_eq!(reading.subpage, None);
    }

    #[test]
    fn status_register_overrun() {
        let reading = StatusRegister::from(0x0019).decode().unwrap();
        assert!(reading.ready);
        assert!(reading.overrun);
        assert_eq!(reading.subpage, Some(Subpage::One));
    }

    #[test]
    fn status_register_fields() {
        assert_register_field!(StatusRegister, 0x0001, last_updated_subpage, 1);
        assert_register_field!(StatusRegister, 0x0005, last_updated_subpage, 5);
        assert_register_field!(StatusRegister, 0x0008, new_data, true);
        assert_register_field!(StatusRegister, 0x0000, new_data, false);
        assert_register_field!(StatusRegister, 0x0010, overrun, true);
        assert_register_field!(StatusRegister, 0x0020, reserved, 0x0020);
    }

    #[test]
    fn status_register_clear_mask() {
        assert_eq!(StatusRegister::CLEAR_MASK, 0x0018);
        assert_eq!(StatusRegister::write_mask(), 0x0018);
    }

    #[test]
    fn control_register_use_subpages() {
        assert_register_field!(ControlRegister, 0x0001, use_subpages, true);
        assert_register_field!(ControlRegister, 0x0000, use_subpages, false);
    }

    #[test]
    fn control_register_subpage_repeat() {
        assert_register_field!(ControlRegister, 0x0008, subpage_repeat, true);
        assert_register_field!(ControlRegister, 0x0000, subpage_repeat, false);
    }

    #[test]
    fn control_register_frame_rate() {
        assert_register_field!(ControlRegister, 0x0000, frame_rate, FrameRate::Half);
        assert_register_field!(ControlRegister, 0x0080, frame_rate, FrameRate::One);
        assert_register_field!(ControlRegister, 0x0100, frame_rate, FrameRate::Two);
        assert_register_field!(ControlRegister, 0x0180, frame_rate, FrameRate::Four);
        assert_register_field!(ControlRegister, 0x0200, frame_rate, FrameRate::Eight);
        assert_register_field!(ControlRegister, 0x0280, frame_rate, FrameRate::Sixteen);
        assert_register_field!(ControlRegister, 0x0300, frame_rate, FrameRate::ThirtyTwo);
        assert_register_field!(ControlRegister, 0x0380, frame_rate, FrameRate::SixtyFour);
    }

    #[test]
    fn control_register_resolution() {
        assert_register_field!(ControlRegister, 0x0000, resolution, Resolution::Sixteen);
        assert_register_field!(ControlRegister, 0x0400, resolution, Resolution::Seventeen);
        assert_register_field!(ControlRegister, 0x0800, resolution, Resolution::Eighteen);
        assert_register_field!(ControlRegister, 0x0C00, resolution, Resolution::Nineteen);
    }

    #[test]
    fn control_register_access_mode() {
        assert_register_field!(
            ControlRegister,
            0x0000,
            access_pattern,
            AccessPattern::Interleave
        );
        assert_register_field!(
            ControlRegister,
            0x1000,
            access_pattern,
            AccessPattern::Chess
        );
    }

    #[test]
    fn control_register_preserves_other_bits() {
        // Data hold, step mode, selected subpage and the reserved top bits.
        let raw: u16 = 0xE076;
        let mut register = ControlRegister::from(raw);
        register.set_frame_rate(FrameRate::SixtyFour);
        let written: u16 = register.into();
        assert_eq!(written & !0x0380, raw & !0x0380);
        assert_eq!(written & 0x0380, 0x0380);
    }

    #[test]
    fn control_register_default() {
        let raw: u16 = ControlRegister::default().into();
        assert_eq!(raw, 0x1901);
        assert!(ControlRegister::default().is_chess_readout());
        assert!(!ControlRegister::from(0x0901).is_chess_readout());
        assert!(!ControlRegister::from(0x1909).is_chess_readout());
    }

    #[test]
    fn frame_rate_from_raw() {
        assert_eq!(FrameRate::from_raw(0).unwrap(), FrameRate::Half);
        assert_eq!(FrameRate::from_raw(1).unwrap(), FrameRate::One);
        assert_eq!(FrameRate::from_raw(2).unwrap(), FrameRate::Two);
        assert_eq!(FrameRate::from_raw(3).unwrap(), FrameRate::Four);
        assert_eq!(FrameRate::from_raw(4).unwrap(), FrameRate::Eight);
        assert_eq!(FrameRate::from_raw(5).unwrap(), FrameRate::Sixteen);
        assert_eq!(FrameRate::from_raw(6).unwrap(), FrameRate::ThirtyTwo);
        assert_eq!(FrameRate::from_raw(7).unwrap(), FrameRate::SixtyFour);
        assert_eq!(
            FrameRate::from_raw(8),
            Err(LibraryError::InvalidRefreshCode(8))
        );
    }

    #[test]
    fn frame_rate_as_raw() {
        for code in 0..8 {
            assert_eq!(FrameRate::from_raw(code).unwrap().as_raw(), code);
        }
    }

    #[test]
    fn frame_rate_from_f32() {
        assert_eq!(FrameRate::try_from(0.5f32).unwrap(), FrameRate::Half);
        assert_eq!(FrameRate::try_from(1f32).unwrap(), FrameRate::One);
        assert_eq!(FrameRate::try_from(2f32).unwrap(), FrameRate::Two);
        assert_eq!(FrameRate::try_from(4f32).unwrap(), FrameRate::Four);
        assert_eq!(FrameRate::try_from(8f32).unwrap(), FrameRate::Eight);
        assert_eq!(FrameRate::try_from(16f32).unwrap(), FrameRate::Sixteen);
        assert_eq!(FrameRate::try_from(32f32).unwrap(), FrameRate::ThirtyTwo);
        assert_eq!(FrameRate::try_from(64f32).unwrap(), FrameRate::SixtyFour);
        // Don't try to add more zeros into the next test; too many more and it gets truncated.
        assert!(FrameRate::try_from(0.5000001f32).is_err());
    }

    #[test]
    fn frame_rate_to_f32() {
        assert_eq!(f32::from(FrameRate::Half), 0.5);
        assert_eq!(f32::from(FrameRate::Two), 2f32);
        assert_eq!(f32::from(FrameRate::SixtyFour), 64f32);
    }

    #[test]
    fn default_frame_rate() {
        assert_eq!(FrameRate::default(), FrameRate::Two)
    }

    #[test]
    fn resolution_to_u8() {
        assert_eq!(u8::from(Resolution::Sixteen), 16);
        assert_eq!(u8::from(Resolution::Seventeen), 17);
        assert_eq!(u8::from(Resolution::Eighteen), 18);
        assert_eq!(u8::from(Resolution::Nineteen), 19);
        assert_eq!(Resolution::default(), Resolution::Eighteen);
    }

    #[test]
    fn subpage_other() {
        assert_eq!(Subpage::Zero.other(), Subpage::One);
        assert_eq!(Subpage::One.other(), Subpage::Zero);
        assert_eq!(Subpage::One.as_word(), 1);
    }
}
