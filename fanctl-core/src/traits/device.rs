//! Driver lifecycle shared by every device

/// Lifecycle state of a driver
///
/// ```text
/// Uninitialized ──new()──> Stopped ──start()──> Ready
///                             ▲                   │
///                             └──────stop()───────┤
///                                                 │
///                          start() id mismatch ──> NotFound
/// ```
///
/// `NotFound` holds until the next `start()`; data operations are refused
/// in every state except `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    #[default]
    Uninitialized,
    Stopped,
    Ready,
    NotFound,
}

impl DriverState {
    pub fn is_ready(self) -> bool {
        self == DriverState::Ready
    }
}

/// Errors from sensor and multiplexer drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError<E> {
    /// The bus transaction failed (NACK, timeout); carries the bus error
    Bus(E),
    /// Identity register did not match the expected part
    NotFound,
    /// Operation attempted outside the Ready state
    NotReady,
    /// Argument out of range for this part
    InvalidArgument,
    /// Device never signalled completion
    Timeout,
}

impl<E> From<E> for DeviceError<E> {
    fn from(err: E) -> Self {
        DeviceError::Bus(err)
    }
}

/// Common driver lifecycle
///
/// `start()` probes the hardware and moves to `Ready` or `NotFound`.
/// Calling `start()` while `Ready` does nothing; calling `stop()` in any
/// state is allowed and leaves the driver `Stopped`.
pub trait Device {
    /// Error type returned by this driver's operations
    type Error;

    /// Probe and bring up the device
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Shut the driver down
    fn stop(&mut self);

    /// Current lifecycle state
    fn state(&self) -> DriverState;

    /// Whether data operations are currently allowed
    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(DriverState::default(), DriverState::Uninitialized);
        assert!(!DriverState::default().is_ready());
    }

    #[test]
    fn test_bus_error_conversion() {
        let err: DeviceError<u8> = 7u8.into();
        assert_eq!(err, DeviceError::Bus(7));
    }
}
