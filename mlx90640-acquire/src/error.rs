// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use crate::register::Subpage;

/// Errors that don't involve the bus transport.
#[derive(Clone, Debug, PartialEq)]
pub enum LibraryError {
    /// When a value from the camera is malformed in some way.
    InvalidData(&'static str),

    /// The status register signalled new data, but the subpage bits were neither 0 nor 1.
    ///
    /// This points to a sensor or bus fault, and retrying the same poll will not fix it.
    InvalidSubpage(u8),

    /// A different subpage than the one being waited on became ready.
    SubpageMismatch { expected: Subpage, actual: Subpage },

    /// The latched status no longer described the expected subpage, so RAM was not read.
    StaleStatus { expected: Subpage, status: u16 },

    /// No new data was signalled within the retry budget.
    TimedOut { expected: Subpage, polls: u32 },

    /// The overrun flag persisted past what the overrun policy allows.
    Overrun { consecutive: u32 },

    /// A refresh rate code outside of 0 through 7.
    InvalidRefreshCode(u8),

    /// A configuration value that cannot produce a usable retry budget.
    InvalidConfig(&'static str),

    /// Neither subpage produced a finite ambient temperature.
    BadAmbientTemperature,

    /// The calibration collaborator rejected its input.
    Calibration(&'static str),

    /// Frames were requested before the calibration data was loaded.
    NotInitialized,
}

impl LibraryError {
    /// Whether retrying the whole frame acquisition is a reasonable response to this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LibraryError::TimedOut { .. }
                | LibraryError::StaleStatus { .. }
                | LibraryError::SubpageMismatch { .. }
                | LibraryError::BadAmbientTemperature
        )
    }
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::InvalidData(msg) => write!(f, "{}", msg),
            LibraryError::InvalidSubpage(bits) => {
                write!(f, "status register reported invalid subpage {:#05b}", bits)
            }
            LibraryError::SubpageMismatch { expected, actual } => write!(
                f,
                "waiting for subpage {:?}, but subpage {:?} became ready",
                expected, actual
            ),
            LibraryError::StaleStatus { expected, status } => write!(
                f,
                "status {:#06x} no longer describes subpage {:?}",
                status, expected
            ),
            LibraryError::TimedOut { expected, polls } => write!(
                f,
                "subpage {:?} was not ready after {} polls",
                expected, polls
            ),
            LibraryError::Overrun { consecutive } => {
                write!(f, "overrun flag set {} times in a row", consecutive)
            }
            LibraryError::InvalidRefreshCode(code) => {
                write!(f, "refresh rate code {} is not in 0..=7", code)
            }
            LibraryError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            LibraryError::BadAmbientTemperature => {
                write!(f, "no finite ambient temperature from either subpage")
            }
            LibraryError::Calibration(msg) => write!(f, "calibration failed: {}", msg),
            LibraryError::NotInitialized => write!(f, "camera has not been initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LibraryError {}

#[derive(Clone, Debug, PartialEq)]
pub enum Error<E> {
    /// Errors originating from the bus implementation.
    Bus(E),

    /// A burst read returned fewer words than requested.
    ///
    /// This is treated the same as any other bus failure.
    ShortRead { expected: usize, actual: usize },

    /// Errors originating from within this library.
    Library(LibraryError),
}

impl<E> Error<E> {
    /// Whether this error came from the transport rather than the acquisition logic.
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Error::Bus(_) | Error::ShortRead { .. })
    }

    /// Access the library error, if this is one.
    pub fn library_error(&self) -> Option<&LibraryError> {
        match self {
            Error::Library(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> fmt::Display for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(bus_error) => write!(f, "Bus Error: {:?}", bus_error),
            Error::ShortRead { expected, actual } => write!(
                f,
                "Bus Error: burst read returned {} of {} words",
                actual, expected
            ),
            Error::Library(err) => write!(f, "Library Error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bus(bus_error) => Some(bus_error),
            Error::ShortRead { .. } => None,
            Error::Library(lib_err) => Some(lib_err),
        }
    }
}

impl<E> From<LibraryError> for Error<E> {
    fn from(lib_err: LibraryError) -> Self {
        Self::Library(lib_err)
    }
}
