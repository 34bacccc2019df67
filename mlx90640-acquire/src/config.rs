// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Acquisition policy.
//!
//! Everything that tunes how the engine waits for and treats subpages lives in [`Config`], so
//! there is a single place to look for timing and tolerance decisions.

use crate::error::LibraryError;
use crate::register::FrameRate;

/// What to do when the camera reports that it overwrote a subpage before it was read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OverrunPolicy {
    /// Log the overrun and carry on.
    Advisory,

    /// Fail a capture once this many consecutive captures have latched the overrun flag.
    EscalateAfter(u32),
}

impl Default for OverrunPolicy {
    fn default() -> Self {
        Self::Advisory
    }
}

impl OverrunPolicy {
    /// Whether `consecutive` overrun captures in a row should be treated as a failure.
    pub fn escalates(&self, consecutive: u32) -> bool {
        match self {
            Self::Advisory => false,
            Self::EscalateAfter(limit) => consecutive >= *limit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Delay between status polls, in microseconds.
    pub poll_interval_us: u32,

    /// How much longer than one subpage period to keep polling before giving up.
    ///
    /// Must be at least 1.0.
    pub margin_factor: f32,

    /// A refresh rate to apply during initialization. `None` leaves the camera's rate alone.
    pub refresh_rate: Option<FrameRate>,

    /// Emissivity passed to temperature conversion, in (0, 1].
    pub emissivity: f32,

    /// Reflected temperature for conversion. `None` uses the frame's combined ambient
    /// temperature.
    pub reflected_temperature: Option<f32>,

    pub overrun_policy: OverrunPolicy,

    /// Put the camera in subpage mode with the chess pattern during initialization.
    pub enforce_chess_pattern: bool,
}

impl Config {
    pub const DEFAULT_POLL_INTERVAL_US: u32 = 5000;

    pub const DEFAULT_MARGIN_FACTOR: f32 = 1.25;

    pub const DEFAULT_EMISSIVITY: f32 = 0.95;

    pub fn with_poll_interval_us(mut self, poll_interval_us: u32) -> Self {
        self.poll_interval_us = poll_interval_us;
        self
    }

    pub fn with_margin_factor(mut self, margin_factor: f32) -> Self {
        self.margin_factor = margin_factor;
        self
    }

    pub fn with_refresh_rate(mut self, refresh_rate: FrameRate) -> Self {
        self.refresh_rate = Some(refresh_rate);
        self
    }

    pub fn with_emissivity(mut self, emissivity: f32) -> Self {
        self.emissivity = emissivity;
        self
    }

    pub fn with_reflected_temperature(mut self, reflected_temperature: f32) -> Self {
        self.reflected_temperature = Some(reflected_temperature);
        self
    }

    pub fn with_overrun_policy(mut self, overrun_policy: OverrunPolicy) -> Self {
        self.overrun_policy = overrun_policy;
        self
    }

    pub fn with_enforce_chess_pattern(mut self, enforce_chess_pattern: bool) -> Self {
        self.enforce_chess_pattern = enforce_chess_pattern;
        self
    }

    /// Check that the values can produce a usable retry budget and conversion.
    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.poll_interval_us == 0 {
            return Err(LibraryError::InvalidConfig(
                "poll interval must be greater than zero",
            ));
        }
        // Written this way so NaN is rejected as well.
        if !(self.margin_factor >= 1.0) || !self.margin_factor.is_finite() {
            return Err(LibraryError::InvalidConfig(
                "margin factor must be a finite value of at least 1.0",
            ));
        }
        if !(self.emissivity > 0.0 && self.emissivity <= 1.0) {
            return Err(LibraryError::InvalidConfig("emissivity must be in (0, 1]"));
        }
        if let Some(reflected) = self.reflected_temperature {
            if !reflected.is_finite() {
                return Err(LibraryError::InvalidConfig(
                    "reflected temperature must be finite",
                ));
            }
        }
        if self.overrun_policy == OverrunPolicy::EscalateAfter(0) {
            return Err(LibraryError::InvalidConfig(
                "overrun escalation needs at least one capture",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_us: Self::DEFAULT_POLL_INTERVAL_US,
            margin_factor: Self::DEFAULT_MARGIN_FACTOR,
            refresh_rate: None,
            emissivity: Self::DEFAULT_EMISSIVITY,
            reflected_temperature: None,
            overrun_policy: OverrunPolicy::default(),
            enforce_chess_pattern: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval_us, 5000);
        assert_eq!(config.margin_factor, 1.25);
        assert_eq!(config.refresh_rate, None);
        assert_eq!(config.emissivity, 0.95);
        assert_eq!(config.reflected_temperature, None);
        assert_eq!(config.overrun_policy, OverrunPolicy::Advisory);
        assert!(config.enforce_chess_pattern);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn builders() {
        let config = Config::default()
            .with_poll_interval_us(1000)
            .with_margin_factor(2.0)
            .with_refresh_rate(FrameRate::Eight)
            .with_emissivity(1.0)
            .with_reflected_temperature(18.5)
            .with_overrun_policy(OverrunPolicy::EscalateAfter(3))
            .with_enforce_chess_pattern(false);
        assert_eq!(config.poll_interval_us, 1000);
        assert_eq!(config.margin_factor, 2.0);
        assert_eq!(config.refresh_rate, Some(FrameRate::Eight));
        assert_eq!(config.reflected_temperature, Some(18.5));
        assert!(!config.enforce_chess_pattern);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let config = Config::default().with_poll_interval_us(0);
        assert!(matches!(
            config.validate(),
            Err(LibraryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_small_margin() {
        for margin in [0.99, -1.0, f32::NAN, f32::INFINITY] {
            let config = Config::default().with_margin_factor(margin);
            assert!(
                config.validate().is_err(),
                "margin {} should be rejected",
                margin
            );
        }
        assert!(Config::default().with_margin_factor(1.0).validate().is_ok());
    }

    #[test]
    fn rejects_bad_emissivity() {
        for emissivity in [0.0, -0.5, 1.01, f32::NAN] {
            let config = Config::default().with_emissivity(emissivity);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn rejects_non_finite_reflected_temperature() {
        let config = Config::default().with_reflected_temperature(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrun_policy_escalation() {
        assert!(!OverrunPolicy::Advisory.escalates(1000));
        let policy = OverrunPolicy::EscalateAfter(2);
        assert!(!policy.escalates(1));
        assert!(policy.escalates(2));
        assert!(policy.escalates(3));
        assert!(Config::default()
            .with_overrun_policy(OverrunPolicy::EscalateAfter(0))
            .validate()
            .is_err());
    }
}
