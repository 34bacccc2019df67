
pub(crate) use calibration_stub::StubCalibration;
pub(crate) use delay::RecordingDelay;
pub(crate) use sensor_mock::{I2cOperation, MockError, SimulatedSensor};

use crate::{Address, Config, I2cBus, RegisterBus, Synchronizer};

/// The I²C address used by the simulated camera.
pub(crate) const SENSOR_ADDRESS: u8 = 0x33;

/// A synchronizer talking to a fresh simulated camera.
///
/// The returned sensor and delay share state with the ones inside the synchronizer.
pub(crate) fn simulated_synchronizer(
    config: Config,
) -> (
    SimulatedSensor,
    Synchronizer<I2cBus<SimulatedSensor>, RecordingDelay>,
    RecordingDelay,
) {
    let sensor = SimulatedSensor::new(SENSOR_ADDRESS);
    let delay = RecordingDelay::default();
    let bus = I2cBus::new(sensor.clone(), SENSOR_ADDRESS);
    let sync = Synchronizer::new(bus, delay.clone(), config).unwrap();
    (sensor, sync, delay)
}

/// A bus that never returns more than `limit` words from a burst read.
pub(crate) struct TruncatingBus<B> {
    inner: B,
    limit: usize,
}

impl<B> TruncatingBus<B> {
    pub(crate) fn new(inner: B, limit: usize) -> Self {
        Self { inner, limit }
    }
}

impl<B: RegisterBus> RegisterBus for TruncatingBus<B> {
    type Error = B::Error;

    fn read_register(&mut self, register: Address) -> Result<u16, Self::Error> {
        self.inner.read_register(register)
    }

    fn write_register(&mut self, register: Address, value: u16) -> Result<(), Self::Error> {
        self.inner.write_register(register, value)
    }

    fn burst_read(
        &mut self,
        start: Address,
        destination: &mut [u16],
    ) -> Result<usize, Self::Error> {
        let limit = destination.len().min(self.limit);
        self.inner.burst_read(start, &mut destination[..limit])
    }
}
