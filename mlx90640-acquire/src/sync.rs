// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Waiting for subpages.
//!
//! The camera measures the two subpages alternately, and signals each one through the new data
//! flag in the status register. [`Synchronizer`] owns the bus for the whole acquisition, polls
//! that flag under a bounded [retry budget][RetryBudget], and tracks where in the acquisition it
//! is with a [`SyncState`].

use embedded_hal::blocking::delay::DelayUs;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, LibraryError};
use crate::mlx90640::{EepromAddress, EEPROM_WORDS};
use crate::register::{Register, StatusRegister, Subpage};
use crate::timing::RetryBudget;
use crate::transport::{self, RegisterBus};

/// Where the synchronizer is in acquiring a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncState {
    /// Nothing has been requested yet.
    Idle,

    /// Polling the status register for this subpage.
    WaitingForSubpage(Subpage),

    /// The camera signalled this subpage, and it has not been replaced since.
    Ready(Subpage),

    /// Both subpages of a frame have been captured.
    BothCaptured,

    /// The captured subpages were converted and merged into a frame.
    Merged,

    /// The retry budget ran out without the expected subpage becoming ready.
    TimedOut,

    /// The last bus transaction failed.
    BusError,

    /// The status register held a subpage value other than 0 or 1.
    InvalidStatus,

    /// The camera is on a different subpage than expected.
    Desynchronized,
}

/// The result of a successful wait for a subpage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SubpageReady {
    pub subpage: Subpage,

    /// The status snapshot that signalled the subpage.
    pub status: StatusRegister,

    /// How many times the status register was read, including the successful read.
    pub polls: u32,
}

/// The subpage acquisition engine.
///
/// Every operation takes `&mut self`, and the bus is owned (or exclusively borrowed) for as long
/// as the synchronizer exists, so nothing else can touch the camera in the middle of an
/// acquisition.
#[derive(Debug)]
pub struct Synchronizer<B, D> {
    pub(crate) bus: B,

    delay: D,

    pub(crate) config: Config,

    state: SyncState,

    /// A subpage that was captured, but whose status clear failed. The camera will keep reporting
    /// it as ready until the clear goes through.
    pub(crate) stale_ready: Option<Subpage>,

    /// How many captures in a row latched the overrun flag.
    pub(crate) overrun_streak: u32,
}

impl<B, D> Synchronizer<B, D>
where
    B: RegisterBus,
    D: DelayUs<u32>,
{
    /// Create a synchronizer, checking the configuration first.
    pub fn new(bus: B, delay: D, config: Config) -> Result<Self, LibraryError> {
        config.validate()?;
        Ok(Self {
            bus,
            delay,
            config,
            state: SyncState::Idle,
            stale_ready: None,
            overrun_streak: 0,
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn transition(&mut self, next: SyncState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "synchronizer state change");
        }
        self.state = next;
    }

    /// Record a bus failure and wrap it.
    pub(crate) fn bus_error(&mut self, bus_error: B::Error) -> Error<B::Error> {
        self.transition(SyncState::BusError);
        Error::Bus(bus_error)
    }

    /// Record a library failure with the state it leaves the synchronizer in.
    pub(crate) fn library_error(
        &mut self,
        next: SyncState,
        lib_error: LibraryError,
    ) -> Error<B::Error> {
        self.transition(next);
        Error::Library(lib_error)
    }

    /// Read the status register in a single transaction.
    pub(crate) fn read_status(&mut self) -> Result<StatusRegister, Error<B::Error>> {
        match transport::read_register::<StatusRegister, _>(&mut self.bus) {
            Ok(status) => Ok(status),
            Err(bus_error) => Err(self.bus_error(bus_error)),
        }
    }

    /// Acknowledge the current subpage by clearing the new data and overrun flags.
    pub(crate) fn clear_status(&mut self) -> Result<(), B::Error> {
        self.bus
            .write_register(StatusRegister::address(), StatusRegister::CLEAR_MASK)
    }

    /// Poll the status register until `expected` is signalled.
    ///
    /// The status register is read at most `budget.max_retries` times, with a delay of
    /// `budget.poll_interval_us` between reads (but not before the first or after the last).
    ///
    /// If the other subpage becomes ready instead, this fails immediately with
    /// [`LibraryError::SubpageMismatch`]. The one exception is a subpage that was already captured
    /// but could not be acknowledged; the clear is retried and polling continues.
    pub fn await_subpage(
        &mut self,
        expected: Subpage,
        budget: &RetryBudget,
    ) -> Result<SubpageReady, Error<B::Error>> {
        self.transition(SyncState::WaitingForSubpage(expected));
        let mut overrun_polls = 0u32;
        for poll in 1..=budget.max_retries {
            if poll > 1 {
                self.delay.delay_us(budget.poll_interval_us);
            }
            let status = self.read_status()?;
            let reading = match status.decode() {
                Ok(reading) => reading,
                Err(lib_error) => {
                    warn!(
                        status = u16::from(status),
                        "invalid subpage in status register"
                    );
                    return Err(self.library_error(SyncState::InvalidStatus, lib_error));
                }
            };
            if reading.overrun {
                overrun_polls += 1;
            }
            match reading.subpage {
                None => {
                    trace!(poll, ?expected, "subpage not ready");
                }
                Some(actual) if self.stale_ready == Some(actual) => {
                    debug!(
                        ?actual,
                        "retrying status clear for already captured subpage"
                    );
                    if let Err(bus_error) = self.clear_status() {
                        return Err(self.bus_error(bus_error));
                    }
                    self.stale_ready = None;
                }
                Some(actual) if actual == expected => {
                    if reading.overrun {
                        warn!(?actual, "camera reported an overrun");
                    }
                    trace!(poll, ?actual, "subpage ready");
                    self.transition(SyncState::Ready(actual));
                    return Ok(SubpageReady {
                        subpage: actual,
                        status,
                        polls: poll,
                    });
                }
                Some(actual) => {
                    warn!(?expected, ?actual, "camera is on the wrong subpage");
                    return Err(self.library_error(
                        SyncState::Desynchronized,
                        LibraryError::SubpageMismatch { expected, actual },
                    ));
                }
            }
        }
        let lib_error = if overrun_polls > 0 && overrun_polls == budget.max_retries {
            warn!(
                polls = overrun_polls,
                "overrun flag never cleared while waiting"
            );
            LibraryError::Overrun {
                consecutive: overrun_polls,
            }
        } else {
            debug!(
                ?expected,
                polls = budget.max_retries,
                "timed out waiting for subpage"
            );
            LibraryError::TimedOut {
                expected,
                polls: budget.max_retries,
            }
        };
        Err(self.library_error(SyncState::TimedOut, lib_error))
    }

    /// Acknowledge a subpage left over from before a frame started, if it isn't `next`.
    ///
    /// Without this, a camera sitting on the wrong subpage would fail every wait with a mismatch.
    /// Returns the subpage that was dropped, if any.
    pub fn discard_stale(&mut self, next: Subpage) -> Result<Option<Subpage>, Error<B::Error>> {
        let status = self.read_status()?;
        let reading = match status.decode() {
            Ok(reading) => reading,
            Err(lib_error) => return Err(self.library_error(SyncState::InvalidStatus, lib_error)),
        };
        match reading.subpage {
            Some(pending) if pending != next => {
                debug!(
                    ?pending,
                    ?next,
                    "dropping subpage left over from an earlier frame"
                );
                if let Err(bus_error) = self.clear_status() {
                    return Err(self.bus_error(bus_error));
                }
                self.stale_ready = None;
                Ok(Some(pending))
            }
            _ => Ok(None),
        }
    }

    /// Read the entire EEPROM in one transaction.
    pub fn dump_eeprom(&mut self) -> Result<[u16; EEPROM_WORDS], Error<B::Error>> {
        let mut eeprom = [0u16; EEPROM_WORDS];
        let count = match self.bus.burst_read(EepromAddress::Base.into(), &mut eeprom) {
            Ok(count) => count,
            Err(bus_error) => return Err(self.bus_error(bus_error)),
        };
        if count < EEPROM_WORDS {
            self.transition(SyncState::BusError);
            return Err(Error::ShortRead {
                expected: EEPROM_WORDS,
                actual: count,
            });
        }
        debug!(words = count, "read EEPROM");
        Ok(eeprom)
    }

    /// Consume the synchronizer and give back the bus and delay.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}
