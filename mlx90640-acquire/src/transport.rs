// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register-oriented access to the camera.
//!
//! The acquisition engine only needs three primitives from the bus: reading one 16-bit register,
//! writing one 16-bit register, and reading a run of consecutive words in a single transaction.
//! [`RegisterBus`] captures exactly that, and [`I2cBus`] provides it on top of the
//! [`embedded-hal`][embedded_hal] blocking I²C traits. All words are big-endian on the wire.

use core::fmt;

use embedded_hal::blocking::i2c;

use crate::mlx90640::RAM_WORDS;
use crate::register::Register;
use crate::util::{words_from_be_bytes, WORD_SIZE};

/// A 16-bit address in the camera's memory map.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Address(u16);

impl Address {
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    /// The address as it is sent over the wire.
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#06x})", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw_address: u16) -> Self {
        Self(raw_address)
    }
}

impl From<Address> for u16 {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// The bus operations the acquisition engine is built on.
///
/// Implementations are expected to be exclusive handles: the engine assumes nothing else talks to
/// the camera between its transactions.
pub trait RegisterBus {
    type Error;

    /// Read a single 16-bit register in one transaction.
    fn read_register(&mut self, register: Address) -> Result<u16, Self::Error>;

    /// Write a single 16-bit register in one transaction.
    fn write_register(&mut self, register: Address, value: u16) -> Result<(), Self::Error>;

    /// Read consecutive words starting at `start` into `destination`, in one transaction.
    ///
    /// Returns the number of words actually read, which may be less than `destination.len()`.
    fn burst_read(&mut self, start: Address, destination: &mut [u16])
        -> Result<usize, Self::Error>;
}

impl<B> RegisterBus for &mut B
where
    B: RegisterBus + ?Sized,
{
    type Error = B::Error;

    fn read_register(&mut self, register: Address) -> Result<u16, Self::Error> {
        (**self).read_register(register)
    }

    fn write_register(&mut self, register: Address, value: u16) -> Result<(), Self::Error> {
        (**self).write_register(register, value)
    }

    fn burst_read(
        &mut self,
        start: Address,
        destination: &mut [u16],
    ) -> Result<usize, Self::Error> {
        (**self).burst_read(start, destination)
    }
}

/// The largest burst [`I2cBus`] will perform in one transaction, in bytes.
///
/// The RAM window and the EEPROM are the same size, so this covers both.
const BURST_CAPACITY: usize = RAM_WORDS * WORD_SIZE;

/// A [`RegisterBus`] for a camera at a given address on an I²C bus.
pub struct I2cBus<I2C> {
    /// The I²C bus this camera is accessible on.
    bus: I2C,

    /// The I²C address this camera is accessible at.
    address: u8,

    /// Buffer for receiving burst reads before they're split into words.
    scratch: [u8; BURST_CAPACITY],
}

impl<I2C> I2cBus<I2C> {
    /// Wrap an I²C bus for the camera at `address`.
    ///
    /// MLX90640s can be configured to use any I²C address (except 0x00), but the default address
    /// is 0x33.
    pub fn new(bus: I2C, address: u8) -> Self {
        Self {
            bus,
            address,
            scratch: [0u8; BURST_CAPACITY],
        }
    }

    /// The I²C address of the camera.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the I²C bus back.
    pub fn release(self) -> I2C {
        self.bus
    }
}

impl<I2C> fmt::Debug for I2cBus<I2C> {
    // Skipping the scratch buffer (it's just noise) and the bus (it might not implement Debug).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cBus")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl<I2C, E> RegisterBus for I2cBus<I2C>
where
    I2C: i2c::WriteRead<Error = E> + i2c::Write<Error = E>,
{
    type Error = E;

    fn read_register(&mut self, register: Address) -> Result<u16, Self::Error> {
        let mut register_bytes = [0u8; 2];
        self.bus
            .write_read(self.address, &register.as_bytes(), &mut register_bytes)?;
        Ok(u16::from_be_bytes(register_bytes))
    }

    fn write_register(&mut self, register: Address, value: u16) -> Result<(), Self::Error> {
        let address_bytes = register.as_bytes();
        let value_bytes = value.to_be_bytes();
        let combined: [u8; 4] = [
            address_bytes[0],
            address_bytes[1],
            value_bytes[0],
            value_bytes[1],
        ];
        self.bus.write(self.address, &combined)
    }

    fn burst_read(
        &mut self,
        start: Address,
        destination: &mut [u16],
    ) -> Result<usize, Self::Error> {
        let byte_count = (destination.len() * WORD_SIZE).min(BURST_CAPACITY);
        if byte_count == 0 {
            // A zero-length read makes the camera reject the next operation.
            return Ok(0);
        }
        let buffer = &mut self.scratch[..byte_count];
        self.bus
            .write_read(self.address, &start.as_bytes(), buffer)?;
        Ok(words_from_be_bytes(buffer, destination))
    }
}

/// Read a register and decode it.
pub(crate) fn read_register<R, B>(bus: &mut B) -> Result<R, B::Error>
where
    R: Register,
    B: RegisterBus,
{
    let raw = bus.read_register(R::address())?;
    Ok(R::from(raw))
}

/// Encode a register and write it.
pub(crate) fn write_register<R, B>(bus: &mut B, register: R) -> Result<(), B::Error>
where
    R: Register,
    B: RegisterBus,
{
    bus.write_register(R::address(), register.into())
}
