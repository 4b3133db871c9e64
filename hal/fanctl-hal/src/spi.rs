//! SPI bus abstractions
//!
//! Provides traits for SPI master operations that can be implemented
//! by chip-specific HALs, plus [`SpiNorBus`] which frames NOR commands
//! over a plain single-line SPI master.

use crate::gpio::OutputPin;
use crate::nor::{Command, Lines, NorBus};

/// SPI bus master
///
/// Provides basic SPI transfer operations for communicating with
/// peripheral devices.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// Both buffers must be the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data (writes zeros)
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// SPI configuration
#[derive(Debug, Clone, Copy)]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: Mode,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000, // 1 MHz
            mode: Mode::Mode0,
        }
    }
}

/// SPI mode (combined polarity and phase)
///
/// Serial NOR parts accept mode 0 or mode 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

/// Errors from [`SpiNorBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiNorError<E> {
    /// The SPI master reported an error
    Spi(E),
    /// Command needs dual/quad lines or a dummy count that is not whole bytes
    Unsupported,
}

/// Maximum header: opcode + 3 address bytes + 4 dummy bytes
const MAX_HEADER: usize = 8;

/// NOR command framing over a single-line SPI master
pub struct SpiNorBus<S, CS> {
    spi: S,
    cs: CS,
}

impl<S: SpiBus, CS: OutputPin> SpiNorBus<S, CS> {
    /// Create a new bus; chip select is driven inactive (high)
    pub fn new(spi: S, mut cs: CS) -> Self {
        cs.set_high();
        Self { spi, cs }
    }

    /// Release the SPI master and chip select
    pub fn into_inner(self) -> (S, CS) {
        (self.spi, self.cs)
    }

    fn header(cmd: &Command, out: &mut [u8; MAX_HEADER]) -> Result<usize, SpiNorError<S::Error>> {
        if cmd.data_lines != Lines::Single || cmd.dummy_cycles % 8 != 0 || cmd.dummy_cycles > 32 {
            return Err(SpiNorError::Unsupported);
        }

        out[0] = cmd.opcode;
        let mut len = 1;
        if let Some(addr) = cmd.address {
            out[1] = (addr >> 16) as u8;
            out[2] = (addr >> 8) as u8;
            out[3] = addr as u8;
            len = 4;
        }
        let dummy = (cmd.dummy_cycles / 8) as usize;
        out[len..len + dummy].fill(0);
        Ok(len + dummy)
    }

    /// Run `data_phase` with chip select asserted after sending the header
    fn framed<F>(&mut self, cmd: &Command, data_phase: F) -> Result<(), SpiNorError<S::Error>>
    where
        F: FnOnce(&mut S) -> Result<(), S::Error>,
    {
        let mut header = [0u8; MAX_HEADER];
        let len = Self::header(cmd, &mut header)?;

        self.cs.set_low();
        let result = self
            .spi
            .write(&header[..len])
            .and_then(|()| data_phase(&mut self.spi));
        self.cs.set_high();

        result.map_err(SpiNorError::Spi)
    }
}

impl<S: SpiBus, CS: OutputPin> NorBus for SpiNorBus<S, CS> {
    type Error = SpiNorError<S::Error>;

    fn command(&mut self, cmd: &Command) -> Result<(), Self::Error> {
        self.framed(cmd, |_| Ok(()))
    }

    fn command_receive(&mut self, cmd: &Command, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.framed(cmd, |spi| spi.read(buf))
    }

    fn command_send(&mut self, cmd: &Command, data: &[u8]) -> Result<(), Self::Error> {
        self.framed(cmd, |spi| spi.write(data))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    /// Records every byte written and every chip-select edge
    #[derive(Default)]
    struct MockSpi {
        written: Vec<u8>,
        read_fill: u8,
    }

    impl SpiBus for MockSpi {
        type Error = ();

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), ()> {
            self.written.extend_from_slice(write);
            read.fill(self.read_fill);
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<(), ()> {
            self.written.extend_from_slice(data);
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<(), ()> {
            buf.fill(self.read_fill);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockCs {
        high: bool,
        edges: usize,
    }

    impl OutputPin for MockCs {
        fn set_high(&mut self) {
            self.high = true;
            self.edges += 1;
        }

        fn set_low(&mut self) {
            self.high = false;
            self.edges += 1;
        }
    }

    #[test]
    fn test_cs_idles_high() {
        let bus = SpiNorBus::new(MockSpi::default(), MockCs::default());
        let (_, cs) = bus.into_inner();
        assert!(cs.high);
    }

    #[test]
    fn test_opcode_only_frame() {
        let mut bus = SpiNorBus::new(MockSpi::default(), MockCs::default());
        bus.command(&Command::new(0x06)).unwrap();

        let (spi, cs) = bus.into_inner();
        assert_eq!(spi.written, [0x06]);
        assert!(cs.high);
        // idle high, low, high
        assert_eq!(cs.edges, 3);
    }

    #[test]
    fn test_address_and_dummy_frame() {
        let mut bus = SpiNorBus::new(MockSpi { read_fill: 0xA5, ..Default::default() }, MockCs::default());
        let mut buf = [0u8; 4];
        let cmd = Command::new(0x0B).with_address(0x01_2345).with_dummy(8);
        bus.command_receive(&cmd, &mut buf).unwrap();

        assert_eq!(buf, [0xA5; 4]);
        let (spi, _) = bus.into_inner();
        assert_eq!(spi.written, [0x0B, 0x01, 0x23, 0x45, 0x00]);
    }

    #[test]
    fn test_address_truncated_to_24_bits() {
        let cmd = Command::new(0x02).with_address(0xAB12_3456);
        assert_eq!(cmd.address, Some(0x12_3456));
    }

    #[test]
    fn test_send_appends_data() {
        let mut bus = SpiNorBus::new(MockSpi::default(), MockCs::default());
        let cmd = Command::new(0x02).with_address(0x100);
        bus.command_send(&cmd, &[1, 2, 3]).unwrap();

        let (spi, _) = bus.into_inner();
        assert_eq!(spi.written, [0x02, 0x00, 0x01, 0x00, 1, 2, 3]);
    }

    #[test]
    fn test_quad_rejected() {
        let mut bus = SpiNorBus::new(MockSpi::default(), MockCs::default());
        let mut buf = [0u8; 1];
        let cmd = Command::new(0x6B).with_address(0).with_dummy(4).with_lines(Lines::Quad);
        assert_eq!(bus.command_receive(&cmd, &mut buf), Err(SpiNorError::Unsupported));

        let (spi, cs) = bus.into_inner();
        assert!(spi.written.is_empty());
        assert!(cs.high);
    }
}
