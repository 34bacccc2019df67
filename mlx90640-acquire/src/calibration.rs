// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use crate::error::LibraryError;
use crate::frame::RawSubpage;

/// The radiometric half of the camera: turning raw subpages into temperatures.
///
/// Implementations are pure functions of their inputs. They never touch the bus; everything they
/// need is either in the EEPROM dump handed to [`extract_parameters`][Self::extract_parameters]
/// or in the [`RawSubpage`] (including the metadata words with the captured subpage and control
/// register).
pub trait Calibration {
    /// The calibration parameters extracted from the EEPROM.
    type Params;

    /// Extract the calibration parameters from a full EEPROM dump.
    fn extract_parameters(&self, eeprom: &[u16]) -> Result<Self::Params, LibraryError>;

    /// The ambient temperature of the camera while the subpage was measured, in degrees Celsius.
    ///
    /// A non-finite result means the value is unusable, the caller deals with it.
    fn ambient_temperature(&self, raw: &RawSubpage, params: &Self::Params) -> f32;

    /// Convert the pixels in `raw` to temperatures in degrees Celsius.
    ///
    /// `destination` is the size of the full image. Only the pixels belonging to the subpage in
    /// `raw` need to be written, the rest are discarded during frame assembly.
    fn convert_to_temperature(
        &self,
        raw: &RawSubpage,
        params: &Self::Params,
        emissivity: f32,
        reflected_temperature: f32,
        destination: &mut [f32],
    );
}

impl<C> Calibration for &C
where
    C: Calibration + ?Sized,
{
    type Params = C::Params;

    fn extract_parameters(&self, eeprom: &[u16]) -> Result<Self::Params, LibraryError> {
        (**self).extract_parameters(eeprom)
    }

    fn ambient_temperature(&self, raw: &RawSubpage, params: &Self::Params) -> f32 {
        (**self).ambient_temperature(raw, params)
    }

    fn convert_to_temperature(
        &self,
        raw: &RawSubpage,
        params: &Self::Params,
        emissivity: f32,
        reflected_temperature: f32,
        destination: &mut [f32],
    ) {
        (**self).convert_to_temperature(raw, params, emissivity, reflected_temperature, destination)
    }
}
