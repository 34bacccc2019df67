// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Refresh rate handling and the retry budgets derived from it.

use embedded_hal::blocking::delay::DelayUs;
use paste::paste;
use tracing::debug;

use crate::error::{Error, LibraryError};
use crate::register::{AccessPattern, ControlRegister, FrameRate, Resolution};
use crate::sync::Synchronizer;
use crate::transport::{self, RegisterBus};

/// A refresh rate code, and the timing that follows from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefreshInfo {
    /// The raw code from bits 7-9 of the control register.
    pub code: u8,

    pub frame_rate: FrameRate,

    /// Full frames per second.
    pub full_frame_hz: f32,

    /// Time between subpages, in seconds. Each frame is two subpages.
    pub subpage_period_s: f32,
}

impl RefreshInfo {
    /// Look up the timing for a refresh rate code.
    ///
    /// Codes above 7 are rejected rather than mapped to a default.
    pub fn from_code(code: u8) -> Result<Self, LibraryError> {
        FrameRate::from_raw(code).map(Self::from)
    }
}

impl From<FrameRate> for RefreshInfo {
    fn from(frame_rate: FrameRate) -> Self {
        let full_frame_hz = f32::from(frame_rate);
        Self {
            code: frame_rate.as_raw(),
            frame_rate,
            full_frame_hz,
            subpage_period_s: 1.0 / (full_frame_hz * 2.0),
        }
    }
}

/// How long to keep polling for a subpage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryBudget {
    /// The maximum number of status reads. Always at least 1.
    pub max_retries: u32,

    /// The delay between status reads, in microseconds.
    pub poll_interval_us: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32, poll_interval_us: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            poll_interval_us,
        }
    }

    /// Enough polls to cover one subpage period, stretched by `margin_factor`.
    pub fn for_refresh(
        info: &RefreshInfo,
        poll_interval_us: u32,
        margin_factor: f32,
    ) -> Result<Self, LibraryError> {
        if poll_interval_us == 0 {
            return Err(LibraryError::InvalidConfig(
                "poll interval must be greater than zero",
            ));
        }
        // Written this way so NaN is rejected as well.
        if !(margin_factor >= 1.0) || !margin_factor.is_finite() {
            return Err(LibraryError::InvalidConfig(
                "margin factor must be a finite value of at least 1.0",
            ));
        }
        let window_us = info.subpage_period_s * margin_factor * 1_000_000f32;
        let retries = num_traits::Float::ceil(window_us / poll_interval_us as f32);
        Ok(Self::new(retries as u32, poll_interval_us))
    }

    /// The longest a full frame (two subpages) can spend polling, in microseconds.
    pub fn worst_case_frame_us(&self) -> u64 {
        2 * self.max_retries as u64 * self.poll_interval_us as u64
    }
}

/// DRY macro for the set_* methods in `Synchronizer` that modify a control register field.
///
/// The register is only written if the value actually changes.
macro_rules! set_register_field {
    { $field:ident, $typ:ty, $doc:literal } => {
    paste! {
        #[doc = $doc]
        pub fn [< set_ $field >](&mut self, new_value: $typ) -> Result<(), Error<B::Error>> {
            let mut current = self.control_register()?;
            if current.$field() != new_value {
                current.[< set_ $field >](new_value);
                self.set_control_register(current)
            } else {
                Ok(())
            }
        }
    }};
}

/// Getters for control register fields, read fresh from the camera.
macro_rules! get_register_field {
    { $field:ident, $typ:ty, $doc:literal } => {
        #[doc = $doc]
        pub fn $field(&mut self) -> Result<$typ, Error<B::Error>> {
            Ok(self.control_register()?.$field())
        }
    };
}

impl<B, D> Synchronizer<B, D>
where
    B: RegisterBus,
    D: DelayUs<u32>,
{
    /// Read the control register.
    pub fn control_register(&mut self) -> Result<ControlRegister, Error<B::Error>> {
        match transport::read_register::<ControlRegister, _>(&mut self.bus) {
            Ok(control) => Ok(control),
            Err(bus_error) => Err(self.bus_error(bus_error)),
        }
    }

    /// Write the control register.
    pub fn set_control_register(
        &mut self,
        register: ControlRegister,
    ) -> Result<(), Error<B::Error>> {
        debug!(value = u16::from(register), "writing control register");
        match transport::write_register(&mut self.bus, register) {
            Ok(()) => Ok(()),
            Err(bus_error) => Err(self.bus_error(bus_error)),
        }
    }

    /// Read the refresh rate the camera is currently running at.
    pub fn read_refresh_rate(&mut self) -> Result<RefreshInfo, Error<B::Error>> {
        let control = self.control_register()?;
        Ok(RefreshInfo::from(control.frame_rate()))
    }

    /// Set the refresh rate by its raw code (0 through 7).
    ///
    /// Only bits 7-9 of the control register are changed, and nothing is written if the camera is
    /// already using that code.
    pub fn configure_refresh_rate(&mut self, code: u8) -> Result<(), Error<B::Error>> {
        let frame_rate = FrameRate::from_raw(code)?;
        self.set_frame_rate(frame_rate)
    }

    /// The retry budget for the refresh rate the camera is currently using.
    pub fn frame_budget(&mut self) -> Result<RetryBudget, Error<B::Error>> {
        let info = self.read_refresh_rate()?;
        let budget = RetryBudget::for_refresh(
            &info,
            self.config.poll_interval_us,
            self.config.margin_factor,
        )?;
        debug!(
            hz = info.full_frame_hz,
            max_retries = budget.max_retries,
            "derived retry budget"
        );
        Ok(budget)
    }

    get_register_field! { frame_rate, FrameRate, "Read the frame rate from the camera." }

    set_register_field! { frame_rate, FrameRate, "Set camera's frame rate." }

    get_register_field! {
        use_subpages,
        bool,
        "Check if the camera is measuring subpages alternately."
    }

    set_register_field! { use_subpages, bool, "Enable (or disable) the use of subpages." }

    get_register_field! {
        subpage_repeat,
        bool,
        "Check if the camera is measuring only one subpage repeatedly."
    }

    set_register_field! {
        subpage_repeat,
        bool,
        "Enable (or disable) subpage repeat mode."
    }

    get_register_field! {
        resolution,
        Resolution,
        "Get the current resolution of the ADC in the camera."
    }

    set_register_field! {
        resolution,
        Resolution,
        "Set ADC resolution within the camera."
    }

    get_register_field! {
        access_pattern,
        AccessPattern,
        "Get the access pattern used by the camera when updating subpages."
    }

    set_register_field! {
        access_pattern,
        AccessPattern,
        "Set the access pattern used by the camera."
    }

    /// Put the camera in the mode frame assembly expects: alternating subpages in the chess
    /// pattern.
    ///
    /// This is done in one read-modify-write, and skipped entirely if the camera is already set
    /// up that way.
    pub fn prepare_chess_readout(&mut self) -> Result<(), Error<B::Error>> {
        let mut control = self.control_register()?;
        if control.is_chess_readout() {
            return Ok(());
        }
        control.set_use_subpages(true);
        control.set_subpage_repeat(false);
        control.set_access_pattern(AccessPattern::Chess);
        self.set_control_register(control)
    }
}

#[cfg(test)]
mod test {
    use float_cmp::assert_approx_eq;

    use crate::test::*;
    use crate::{
        AccessPattern, Config, Error, FrameRate, LibraryError, RefreshInfo, RetryBudget, SyncState,
    };

    #[test]
    fn refresh_table() {
        let expected = [0.5f32, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
        for (code, hz) in expected.iter().enumerate() {
            let info = RefreshInfo::from_code(code as u8).unwrap();
            assert_eq!(info.code, code as u8);
            assert_approx_eq!(f32, info.full_frame_hz, *hz);
            assert_approx_eq!(f32, info.subpage_period_s, 1.0 / (*hz * 2.0));
        }
    }

    #[test]
    fn refresh_code_two() {
        let info = RefreshInfo::from_code(2).unwrap();
        assert_eq!(info.frame_rate, FrameRate::Two);
        assert_approx_eq!(f32, info.full_frame_hz, 2.0);
        assert_approx_eq!(f32, info.subpage_period_s, 0.25);
    }

    #[test]
    fn refresh_code_out_of_range() {
        assert_eq!(
            RefreshInfo::from_code(8),
            Err(LibraryError::InvalidRefreshCode(8))
        );
    }

    #[test]
    fn budget_default_two_hz() {
        let info = RefreshInfo::from_code(2).unwrap();
        let budget = RetryBudget::for_refresh(&info, 5000, 1.25).unwrap();
        assert_eq!(budget.max_retries, 63);
        assert_eq!(budget.poll_interval_us, 5000);
        assert_eq!(budget.worst_case_frame_us(), 630_000);
    }

    #[test]
    fn budget_fast_refresh() {
        let info = RefreshInfo::from_code(7).unwrap();
        let budget = RetryBudget::for_refresh(&info, 5000, 1.25).unwrap();
        assert_eq!(budget.max_retries, 2);
    }

    #[test]
    fn budget_minimum_one() {
        let info = RefreshInfo::from_code(7).unwrap();
        let budget = RetryBudget::for_refresh(&info, 1_000_000, 1.0).unwrap();
        assert_eq!(budget.max_retries, 1);
        assert_eq!(RetryBudget::new(0, 10).max_retries, 1);
    }

    #[test]
    fn budget_rejects_bad_inputs() {
        let info = RefreshInfo::from_code(2).unwrap();
        assert!(RetryBudget::for_refresh(&info, 0, 1.25).is_err());
        assert!(RetryBudget::for_refresh(&info, 5000, 0.5).is_err());
        assert!(RetryBudget::for_refresh(&info, 5000, f32::NAN).is_err());
        assert_eq!(
            RetryBudget::for_refresh(&info, 5000, f32::INFINITY),
            Err(LibraryError::InvalidConfig(
                "margin factor must be a finite value of at least 1.0",
            ))
        );
    }

    #[test]
    fn read_refresh_rate() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_control_register(0x1B01);
        let info = sync.read_refresh_rate().unwrap();
        assert_eq!(info.code, 6);
        assert_eq!(info.frame_rate, FrameRate::ThirtyTwo);
    }

    #[test]
    fn configure_refresh_rate_preserves_other_bits() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_control_register(0x1905);
        sync.configure_refresh_rate(4).unwrap();
        assert_eq!(sensor.control_register(), 0x1A05);
    }

    #[test]
    fn configure_refresh_rate_skips_matching_code() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_control_register(0x1901);
        sync.configure_refresh_rate(2).unwrap();
        assert!(sensor
            .operations()
            .iter()
            .all(|op| matches!(op, I2cOperation::Read { .. })));
    }

    #[test]
    fn configure_refresh_rate_rejects_bad_code() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        let result = sync.configure_refresh_rate(9);
        assert_eq!(
            result,
            Err(Error::Library(LibraryError::InvalidRefreshCode(9)))
        );
        assert!(sensor.operations().is_empty());
    }

    #[test]
    fn frame_budget_from_camera() {
        let (sensor, mut sync, _) = simulated_synchronizer(
            Config::default()
                .with_poll_interval_us(1000)
                .with_margin_factor(1.0),
        );
        sensor.set_control_register(0x1981);
        let budget = sync.frame_budget().unwrap();
        // 4 Hz -> 125 ms per subpage.
        assert_eq!(budget.max_retries, 125);
        assert_eq!(budget.poll_interval_us, 1000);
    }

    #[test]
    fn prepare_chess_readout() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_control_register(0x0908);
        sync.prepare_chess_readout().unwrap();
        assert_eq!(sensor.control_register(), 0x1901);
        assert_eq!(sync.access_pattern().unwrap(), AccessPattern::Chess);
        sensor.clear_operations();
        sync.prepare_chess_readout().unwrap();
        assert_eq!(sensor.operations().len(), 1);
    }

    #[test]
    fn control_bus_error_state() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.fail_control_reads(1);
        assert!(sync.read_refresh_rate().unwrap_err().is_bus_error());
        assert_eq!(sync.state(), SyncState::BusError);
    }
}
