// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use embedded_hal::blocking::delay::DelayUs;
use tracing::{debug, warn};

use crate::error::{Error, LibraryError};
use crate::frame::RawSubpage;
use crate::mlx90640::{RamAddress, RAM_WORDS};
use crate::register::{ControlRegister, Subpage};
use crate::sync::{SyncState, Synchronizer};
use crate::transport::RegisterBus;

impl<B, D> Synchronizer<B, D>
where
    B: RegisterBus,
    D: DelayUs<u32>,
{
    /// Read the RAM window for a subpage the camera has signalled as ready.
    ///
    /// The status register is read once at the start and everything is checked against that
    /// snapshot. If it does not (or no longer) describe `expected` as ready, RAM is left alone.
    /// Once RAM has been read, the new data and overrun flags are always cleared, even if reading
    /// the control register afterwards failed. A failed clear is logged and recorded in the
    /// returned subpage, but does not fail the capture.
    pub fn capture_subpage(&mut self, expected: Subpage) -> Result<RawSubpage, Error<B::Error>> {
        let status = self.read_status()?;
        let reading = match status.decode() {
            Ok(reading) => reading,
            Err(lib_error) => return Err(self.library_error(SyncState::InvalidStatus, lib_error)),
        };
        if reading.subpage != Some(expected) {
            debug!(
                ?expected,
                status = u16::from(status),
                "latched status does not match, skipping RAM read"
            );
            return Err(self.library_error(
                SyncState::Desynchronized,
                LibraryError::StaleStatus {
                    expected,
                    status: status.into(),
                },
            ));
        }

        let mut ram = [0u16; RAM_WORDS];
        let read_result = self.read_ram(&mut ram);
        let clear_result = self.clear_status();

        let control = match read_result {
            Ok(control) => control,
            Err(err) => {
                match clear_result {
                    Ok(()) => self.stale_ready = None,
                    Err(_bus_error) => {
                        warn!(?expected, "failed to clear status after a failed capture");
                        self.stale_ready = Some(expected);
                    }
                }
                self.transition(SyncState::BusError);
                return Err(err);
            }
        };
        let mut raw = RawSubpage::new(&ram, expected, control, status);
        match clear_result {
            Ok(()) => self.stale_ready = None,
            Err(_bus_error) => {
                warn!(
                    ?expected,
                    "failed to clear status, the next poll will retry"
                );
                raw.mark_status_uncleared();
                self.stale_ready = Some(expected);
            }
        }
        debug!(
            ?expected,
            cleared = raw.status_cleared(),
            "captured subpage"
        );

        if reading.overrun {
            self.overrun_streak += 1;
            warn!(
                ?expected,
                consecutive = self.overrun_streak,
                "camera overwrote data before it was read"
            );
            if self.config.overrun_policy.escalates(self.overrun_streak) {
                let consecutive = self.overrun_streak;
                return Err(self.library_error(
                    SyncState::Desynchronized,
                    LibraryError::Overrun { consecutive },
                ));
            }
        } else {
            self.overrun_streak = 0;
        }
        Ok(raw)
    }

    /// Burst read the RAM window, then snapshot the control register.
    fn read_ram(&mut self, ram: &mut [u16; RAM_WORDS]) -> Result<ControlRegister, Error<B::Error>> {
        let count = self
            .bus
            .burst_read(RamAddress::Base.into(), &mut ram[..])
            .map_err(Error::Bus)?;
        if count < RAM_WORDS {
            return Err(Error::ShortRead {
                expected: RAM_WORDS,
                actual: count,
            });
        }
        crate::transport::read_register::<ControlRegister, _>(&mut self.bus).map_err(Error::Bus)
    }
}

#[cfg(test)]
mod test {
    use crate::mlx90640::{RamAddress, RAM_WORDS};
    use crate::register::{Register, StatusRegister};
    use crate::test::*;
    use crate::{Config, Error, LibraryError, OverrunPolicy, RetryBudget, Subpage, SyncState};

    fn ram_filled(value: u16) -> [u16; RAM_WORDS] {
        [value; RAM_WORDS]
    }

    #[test]
    fn capture_reads_ram_and_clears() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_subpage_ram(Subpage::Zero, &ram_filled(0x0102));
        sensor.set_control_register(0x1901);
        sensor.set_status(0x0008);
        let raw = sync.capture_subpage(Subpage::Zero).unwrap();
        assert_eq!(raw.subpage(), Subpage::Zero);
        assert!(raw.ram().iter().all(|w| *w == 0x0102));
        assert_eq!(raw.as_words()[RAM_WORDS], 0);
        assert_eq!(raw.as_words()[RAM_WORDS + 1], 0x1901);
        assert!(raw.status_cleared());
        assert_eq!(sensor.status(), 0x0000);
        let ops = sensor.operations();
        assert_eq!(
            ops,
            vec![
                I2cOperation::Read {
                    address: StatusRegister::address(),
                    length: 2
                },
                I2cOperation::Read {
                    address: RamAddress::Base.into(),
                    length: RAM_WORDS * 2
                },
                I2cOperation::Read {
                    address: crate::mlx90640::RegisterAddress::Control.into(),
                    length: 2
                },
                I2cOperation::Write {
                    address: StatusRegister::address(),
                    length: 2
                },
            ]
        );
    }

    #[test]
    fn capture_stale_status_reads_nothing() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_status(0x0009);
        let result = sync.capture_subpage(Subpage::Zero);
        assert_eq!(
            result,
            Err(Error::Library(LibraryError::StaleStatus {
                expected: Subpage::Zero,
                status: 0x0009
            }))
        );
        assert_eq!(sensor.operations().len(), 1);
        assert_eq!(sync.state(), SyncState::Desynchronized);
    }

    #[test]
    fn capture_not_ready_is_stale() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        let result = sync.capture_subpage(Subpage::One);
        assert!(matches!(
            result,
            Err(Error::Library(LibraryError::StaleStatus { .. }))
        ));
        assert_eq!(sensor.operations().len(), 1);
    }

    #[test]
    fn capture_invalid_status() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_status(0x000E);
        let result = sync.capture_subpage(Subpage::Zero);
        assert_eq!(result, Err(Error::Library(LibraryError::InvalidSubpage(6))));
        assert_eq!(sensor.operations().len(), 1);
        assert_eq!(sync.state(), SyncState::InvalidStatus);
    }

    #[test]
    fn short_read_still_clears() {
        let sensor = SimulatedSensor::new(0x33);
        sensor.set_status(0x0008);
        let bus = TruncatingBus::new(crate::I2cBus::new(sensor.clone(), 0x33), 100);
        let mut sync =
            crate::Synchronizer::new(bus, RecordingDelay::default(), Config::default()).unwrap();
        let result = sync.capture_subpage(Subpage::Zero);
        assert_eq!(
            result,
            Err(Error::ShortRead {
                expected: RAM_WORDS,
                actual: 100
            })
        );
        assert_eq!(sensor.status(), 0x0000);
        assert_eq!(sync.state(), SyncState::BusError);
    }

    #[test]
    fn ram_read_failure_still_clears() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_status(0x0009);
        sensor.fail_ram_reads(1);
        let result = sync.capture_subpage(Subpage::One);
        assert_eq!(result, Err(Error::Bus(MockError::Injected)));
        // Only the new data and overrun bits are write-to-clear, the subpage bits stay.
        assert_eq!(sensor.status(), 0x0001);
    }

    #[test]
    fn clear_failure_is_tolerated() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        sensor.set_subpage_ram(Subpage::Zero, &ram_filled(7));
        sensor.set_status(0x0008);
        sensor.fail_status_writes(1);
        let raw = sync.capture_subpage(Subpage::Zero).unwrap();
        assert!(!raw.status_cleared());
        // The camera still says subpage 0 is ready.
        assert_eq!(sensor.status(), 0x0008);

        // Waiting for the next subpage retries the clear, then keeps polling.
        sensor.push_status(&[0x0009]);
        sensor.clear_operations();
        let ready = sync
            .await_subpage(Subpage::One, &RetryBudget::new(5, 1000))
            .unwrap();
        assert_eq!(ready.subpage, Subpage::One);
        assert_eq!(ready.polls, 2);
        let writes = sensor
            .operations()
            .iter()
            .filter(|op| matches!(op, I2cOperation::Write { .. }))
            .count();
        assert_eq!(writes, 1);
    }

    #[test]
    fn overrun_advisory() {
        let (sensor, mut sync, _) = simulated_synchronizer(Config::default());
        for _ in 0..3 {
            sensor.set_status(0x0018);
            assert!(sync.capture_subpage(Subpage::Zero).is_ok());
        }
    }

    #[test]
    fn overrun_escalates() {
        let config = Config::default().with_overrun_policy(OverrunPolicy::EscalateAfter(2));
        let (sensor, mut sync, _) = simulated_synchronizer(config);
        sensor.set_status(0x0018);
        assert!(sync.capture_subpage(Subpage::Zero).is_ok());
        sensor.set_status(0x0019);
        assert_eq!(
            sync.capture_subpage(Subpage::One),
            Err(Error::Library(LibraryError::Overrun { consecutive: 2 }))
        );
        // The flags were still cleared.
        assert_eq!(sensor.status() & StatusRegister::CLEAR_MASK, 0);
        assert_eq!(sync.state(), SyncState::Desynchronized);
    }

    #[test]
    fn overrun_streak_resets() {
        let config = Config::default().with_overrun_policy(OverrunPolicy::EscalateAfter(2));
        let (sensor, mut sync, _) = simulated_synchronizer(config);
        sensor.set_status(0x0018);
        assert!(sync.capture_subpage(Subpage::Zero).is_ok());
        sensor.set_status(0x0009);
        assert!(sync.capture_subpage(Subpage::One).is_ok());
        sensor.set_status(0x0018);
        assert!(sync.capture_subpage(Subpage::Zero).is_ok());
    }
}
