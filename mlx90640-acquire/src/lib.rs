// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Frame acquisition for the MLX90640 thermal camera over I²C.
//!
//! The MLX90640 does not hand out whole images. It measures half of its pixels at a time (a
//! [subpage][Subpage]), flags the new data in its status register, and carries on measuring the
//! other half whether or not anyone read the first. Getting a consistent image means watching
//! for each subpage, reading it before the camera moves on, acknowledging it, and then stitching
//! the two halves back together. This crate does that part, and leaves the radiometric
//! calculations to a [`Calibration`] implementation.
//!
//! This library uses the [`embedded-hal`][embedded-hal] I²C and delay traits, so it should work
//! on any platform with an `embedded-hal` implementation. It is also `no_std` compatible, as
//! long as either the `std` or `libm` feature is enabled.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//!
//! # High-Level API
//! [`ThermalCamera`] handles the whole cycle: loading calibration data, putting the camera into
//! chess pattern mode, waiting for both subpages and merging them into a [`MergedFrame`].
//!
//! # Low-Level API
//! [`Synchronizer`] exposes the individual steps, for when the timing of each subpage matters
//! more than the temperatures:
//! ```no_run
//! use linux_embedded_hal::{Delay, I2cdev};
//! use mlx90640_acquire::{Config, I2cBus, Subpage, Synchronizer};
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! // Default address for these cameras is 0x33
//! let bus = I2cBus::new(i2c_bus, 0x33);
//! let mut sync = Synchronizer::new(bus, Delay, Config::default())?;
//! let budget = sync.frame_budget()?;
//! for subpage in [Subpage::Zero, Subpage::One] {
//!     let ready = sync.await_subpage(subpage, &budget)?;
//!     let raw = sync.capture_subpage(ready.subpage)?;
//!     println!("{:?}: {} words", raw.subpage(), raw.as_words().len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Subpages and Access Patterns
//! Each measurement updates one subpage, covering half of the pixels. The [access
//! pattern][AccessPattern] decides which half. With the default chess pattern, a pixel belongs
//! to subpage `(row + column) % 2`:
//! ```text
//! 0 1 0 1 0 1 ...
//! 1 0 1 0 1 0 ...
//! 0 1 0 1 0 1 ...
//! ```
//! The interleaved (or "TV") pattern instead alternates whole rows:
//! ```text
//! 0 0 0 0 0 0 ...
//! 1 1 1 1 1 1 ...
//! 0 0 0 0 0 0 ...
//! ```
//! The calibration data for the MLX90640 is tuned for the chess pattern, so
//! [`ThermalCamera::initialize`] switches to it unless told not to.

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod calibration;
mod capture;
pub mod config;
#[doc(hidden)]
pub mod driver;
#[doc(hidden)]
pub mod error;
pub mod frame;
pub mod geometry;
pub mod mlx90640;
pub mod register;
pub mod sync;
#[cfg(test)]
mod test;
pub mod timing;
pub mod transport;
mod util;

pub use calibration::Calibration;
pub use config::{Config, OverrunPolicy};
#[doc(inline)]
pub use driver::ThermalCamera;
#[doc(inline)]
pub use error::{Error, LibraryError};
pub use frame::{ConvertedSubframe, FrameAssembler, MergedFrame, RawSubpage};
pub use geometry::PixelParityTable;
pub use mlx90640::{EepromAddress, RamAddress, RegisterAddress};
pub use register::*;
pub use sync::{SubpageReady, SyncState, Synchronizer};
pub use timing::{RefreshInfo, RetryBudget};
pub use transport::{Address, I2cBus, RegisterBus};
