//! Command bus for serial NOR flash
//!
//! Serial NOR parts speak in framed commands: an opcode, an optional
//! 24-bit address, some dummy clocks, then a data phase on one, two or
//! four lines. A [`NorBus`] carries one such command per call; the flash
//! driver never sees chip selects or byte shuffling.

/// Number of data lines used during the data phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lines {
    #[default]
    Single,
    Dual,
    Quad,
}

/// A single framed NOR command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub opcode: u8,
    /// 24-bit address, sent big-endian after the opcode
    pub address: Option<u32>,
    /// Dummy clock cycles between address and data
    pub dummy_cycles: u8,
    /// Line width of the data phase
    pub data_lines: Lines,
}

impl Command {
    /// Opcode-only command (write-enable, reset, status reads)
    pub const fn new(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            dummy_cycles: 0,
            data_lines: Lines::Single,
        }
    }

    /// Attach a 24-bit address
    pub const fn with_address(mut self, address: u32) -> Self {
        self.address = Some(address & 0x00FF_FFFF);
        self
    }

    pub const fn with_dummy(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    pub const fn with_lines(mut self, lines: Lines) -> Self {
        self.data_lines = lines;
        self
    }
}

/// Bus carrying framed NOR commands
///
/// A multi-command sequence (write-enable followed by program or erase)
/// must be bracketed by [`NorBus::acquire`] and [`NorBus::release`] so no
/// other peripheral on a shared bus can interleave.
pub trait NorBus {
    /// Error type for bus transactions
    type Error;

    /// Take exclusive use of the bus
    fn acquire(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Give the bus back
    fn release(&mut self) {}

    /// Issue a command with no data phase
    fn command(&mut self, cmd: &Command) -> Result<(), Self::Error>;

    /// Issue a command and clock in `buf.len()` bytes
    fn command_receive(&mut self, cmd: &Command, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Issue a command followed by `data`
    fn command_send(&mut self, cmd: &Command, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T: NorBus + ?Sized> NorBus for &mut T {
    type Error = T::Error;

    fn acquire(&mut self) -> Result<(), Self::Error> {
        (**self).acquire()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn command(&mut self, cmd: &Command) -> Result<(), Self::Error> {
        (**self).command(cmd)
    }

    fn command_receive(&mut self, cmd: &Command, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).command_receive(cmd, buf)
    }

    fn command_send(&mut self, cmd: &Command, data: &[u8]) -> Result<(), Self::Error> {
        (**self).command_send(cmd, data)
    }
}
