// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

use embedded_hal::blocking::{delay::DelayUs, i2c};
use tracing::{debug, info};

use crate::calibration::Calibration;
use crate::config::Config;
use crate::error::{Error, LibraryError};
use crate::frame::{combine_ambient, ConvertedSubframe, FrameAssembler, MergedFrame, RawSubpage};
use crate::geometry::PixelParityTable;
use crate::mlx90640::{HEIGHT, WIDTH};
use crate::register::Subpage;
use crate::sync::{SyncState, Synchronizer};
use crate::timing::RetryBudget;
use crate::transport::{I2cBus, RegisterBus};

/// A thermal camera producing complete, calibrated frames.
///
/// This ties the [`Synchronizer`] (which deals with the camera) to a [`Calibration`] (which deals
/// with the numbers). Call [`initialize`][ThermalCamera::initialize] once, then
/// [`acquire_frame`][ThermalCamera::acquire_frame] as often as needed. Each frame is made from
/// subpage 0 followed by subpage 1, merged in the chess pattern.
pub struct ThermalCamera<B, C, D>
where
    C: Calibration,
{
    sync: Synchronizer<B, D>,

    calibration: C,

    /// Extracted from the EEPROM by `initialize`.
    params: Option<C::Params>,

    emissivity: f32,

    ambient_temperature: Option<f32>,
}

impl<B, C, D> ThermalCamera<B, C, D>
where
    B: RegisterBus,
    C: Calibration,
    D: DelayUs<u32>,
{
    /// Create a camera on an existing [`RegisterBus`].
    ///
    /// Nothing is sent to the camera until [`initialize`][ThermalCamera::initialize] is called.
    pub fn new(bus: B, calibration: C, delay: D, config: Config) -> Result<Self, LibraryError> {
        let emissivity = config.emissivity;
        let sync = Synchronizer::new(bus, delay, config)?;
        Ok(Self {
            sync,
            calibration,
            params: None,
            emissivity,
            ambient_temperature: None,
        })
    }

    /// Load the calibration data and put the camera in the configured mode.
    ///
    /// The EEPROM is read in a single transaction. If the configuration asks for it, the camera
    /// is switched to alternating subpages in the chess pattern, and the refresh rate is set.
    pub fn initialize(&mut self) -> Result<(), Error<B::Error>> {
        let eeprom = self.sync.dump_eeprom()?;
        let params = self.calibration.extract_parameters(&eeprom)?;
        let config = *self.sync.config();
        if config.enforce_chess_pattern {
            self.sync.prepare_chess_readout()?;
        }
        if let Some(refresh_rate) = config.refresh_rate {
            self.sync.set_frame_rate(refresh_rate)?;
        }
        self.params = Some(params);
        info!(
            refresh_rate = ?config.refresh_rate,
            chess = config.enforce_chess_pattern,
            "camera initialized"
        );
        Ok(())
    }

    /// Whether [`initialize`][ThermalCamera::initialize] has completed.
    pub fn is_initialized(&self) -> bool {
        self.params.is_some()
    }

    /// Wait for and capture both subpages, then convert and merge them into a frame.
    ///
    /// The refresh rate is read once at the start to size the retry budget for both subpages.
    pub fn acquire_frame(&mut self) -> Result<MergedFrame, Error<B::Error>> {
        let params = self.params.as_ref().ok_or(LibraryError::NotInitialized)?;
        let budget = self.sync.frame_budget()?;
        self.sync.discard_stale(Subpage::Zero)?;
        let first = capture(&mut self.sync, Subpage::Zero, &budget)?;
        let second = capture(&mut self.sync, Subpage::One, &budget)?;
        self.sync.transition(SyncState::BothCaptured);

        let ambient_first = self.calibration.ambient_temperature(&first, params);
        let ambient_second = self.calibration.ambient_temperature(&second, params);
        let ambient = combine_ambient(ambient_first, ambient_second)?;
        let reflected = self.sync.config().reflected_temperature.unwrap_or(ambient);
        debug!(ambient, reflected, "converting subpages");

        let mut converted_first = ConvertedSubframe::new(first.subpage(), ambient_first);
        self.calibration.convert_to_temperature(
            &first,
            params,
            self.emissivity,
            reflected,
            &mut converted_first.temperatures,
        );
        let mut converted_second = ConvertedSubframe::new(second.subpage(), ambient_second);
        self.calibration.convert_to_temperature(
            &second,
            params,
            self.emissivity,
            reflected,
            &mut converted_second.temperatures,
        );

        // The control register snapshot says how the pixels were actually measured.
        let table = PixelParityTable::for_pattern(first.control_register().access_pattern());
        let frame = FrameAssembler::new(table).merge(&converted_first, &converted_second)?;
        self.ambient_temperature = Some(frame.ambient);
        self.sync.transition(SyncState::Merged);
        Ok(frame)
    }

    /// Get the ambient temperature of the most recent frame.
    ///
    /// Returns `None` until a frame has been acquired.
    pub fn ambient_temperature(&self) -> Option<f32> {
        self.ambient_temperature
    }

    /// Get the emissivity value that is being used for calculations currently.
    pub fn effective_emissivity(&self) -> f32 {
        self.emissivity
    }

    /// Override the emissivity value used in temperature calculations.
    ///
    /// The value must be in (0, 1].
    pub fn override_emissivity(&mut self, new_value: f32) -> Result<(), LibraryError> {
        if new_value > 0.0 && new_value <= 1.0 {
            self.emissivity = new_value;
            Ok(())
        } else {
            Err(LibraryError::InvalidConfig("emissivity must be in (0, 1]"))
        }
    }

    /// Go back to the emissivity from the configuration.
    pub fn use_default_emissivity(&mut self) {
        self.emissivity = self.sync.config().emissivity;
    }

    /// The height of the thermal image, in pixels.
    pub fn height(&self) -> usize {
        HEIGHT
    }

    /// The width of the thermal image, in pixels.
    pub fn width(&self) -> usize {
        WIDTH
    }

    pub fn synchronizer(&self) -> &Synchronizer<B, D> {
        &self.sync
    }

    /// Direct access to the synchronizer, for changing camera settings.
    pub fn synchronizer_mut(&mut self) -> &mut Synchronizer<B, D> {
        &mut self.sync
    }

    /// Consume the camera, returning the bus, the delay and the calibration.
    pub fn release(self) -> (B, D, C) {
        let (bus, delay) = self.sync.release();
        (bus, delay, self.calibration)
    }
}

impl<I2C, C, D, E> ThermalCamera<I2cBus<I2C>, C, D>
where
    I2C: i2c::WriteRead<Error = E> + i2c::Write<Error = E>,
    C: Calibration,
    D: DelayUs<u32>,
{
    /// Create a camera for the MLX90640 at the given I²C address.
    ///
    /// MLX90640s can be configured to use any I²C address (except 0x00), but the default address
    /// is 0x33.
    pub fn new_i2c(
        i2c: I2C,
        address: u8,
        calibration: C,
        delay: D,
        config: Config,
    ) -> Result<Self, LibraryError> {
        Self::new(I2cBus::new(i2c, address), calibration, delay, config)
    }
}

fn capture<B, D>(
    sync: &mut Synchronizer<B, D>,
    subpage: Subpage,
    budget: &RetryBudget,
) -> Result<RawSubpage, Error<B::Error>>
where
    B: RegisterBus,
    D: DelayUs<u32>,
{
    let ready = sync.await_subpage(subpage, budget)?;
    debug!(?subpage, polls = ready.polls, "subpage ready");
    sync.capture_subpage(subpage)
}
