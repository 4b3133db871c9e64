//! Winbond W25Q serial NOR flash driver
//!
//! Works over any [`NorBus`], so the same driver runs on a plain SPI master
//! (through `SpiNorBus`) or on a dual/quad capable controller.
//!
//! # Identification
//!
//! `start()` reads the three JEDEC id bytes, optionally resets the part,
//! and checks manufacturer and memory type against the whitelists in
//! [`W25qConfig`]. The third byte is log2 of the capacity; geometry is only
//! computed once both whitelist checks pass.
//!
//! # Erase
//!
//! Erases always use the 4 KiB sector command. `start_erase_sector` returns
//! as soon as the command is accepted; progress comes from `query_erase`.

use embedded_hal_async::delay::DelayNs;
use fanctl_core::traits::flash::page_chunks;
use fanctl_core::traits::{
    Device, DeviceIdentity, DriverState, EraseStatus, FlashDevice, FlashError, FlashGeometry,
};
use fanctl_hal::nor::{Command, Lines, NorBus};

use super::command::*;

/// Bytes compared per read during erase verification
const VERIFY_WINDOW: usize = 32;

/// W25Q driver configuration
#[derive(Debug, Clone)]
pub struct W25qConfig {
    /// Accepted manufacturer ids
    pub manufacturers: &'static [u8],
    /// Accepted memory type ids
    pub memory_types: &'static [u8],
    /// Line width used for reads
    pub read_lines: Lines,
    /// Dummy cycles for fast reads (halved for quad output)
    pub read_dummy_cycles: u8,
    /// Issue reset-enable + reset at start
    pub reset_on_start: bool,
    /// Delay between status polls while a page program runs
    pub program_poll_us: u32,
    /// Status polls before a page program is declared stuck
    pub program_poll_limit: u32,
    /// Poll interval recommended while an erase runs
    pub erase_retry_ms: u32,
}

impl Default for W25qConfig {
    fn default() -> Self {
        Self {
            manufacturers: &[MANUFACTURER_WINBOND],
            memory_types: &[MEMORY_TYPE_SPI, MEMORY_TYPE_QPI],
            read_lines: Lines::Single,
            read_dummy_cycles: 8,
            reset_on_start: true,
            program_poll_us: 50,
            // 3 ms max page program time, with margin
            program_poll_limit: 200,
            erase_retry_ms: 1,
        }
    }
}

/// W25Q flash driver
pub struct W25q<B, D> {
    bus: B,
    delay: D,
    config: W25qConfig,
    state: DriverState,
    identity: Option<DeviceIdentity>,
    geometry: Option<FlashGeometry>,
}

impl<B: NorBus, D: DelayNs> W25q<B, D> {
    /// Create a stopped driver; call `start()` to probe the part
    pub fn new(bus: B, delay: D, config: W25qConfig) -> Self {
        Self {
            bus,
            delay,
            config,
            state: DriverState::Stopped,
            identity: None,
            geometry: None,
        }
    }

    pub fn config(&self) -> &W25qConfig {
        &self.config
    }

    /// Replace the configuration; takes effect at the next `start()`
    pub fn set_config(&mut self, config: W25qConfig) {
        self.config = config;
    }

    /// Release the bus and delay
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Derive geometry from identity, `None` if the part is not accepted
    fn geometry_for(&self, id: &DeviceIdentity) -> Option<FlashGeometry> {
        if !self.config.manufacturers.contains(&id.manufacturer)
            || !self.config.memory_types.contains(&id.memory_type)
        {
            return None;
        }
        if id.capacity < SECTOR_SHIFT || id.capacity > MAX_CAPACITY_CODE {
            return None;
        }

        let total_size = 1u32 << id.capacity;
        Some(FlashGeometry {
            page_size: PAGE_SIZE,
            sector_size: SECTOR_SIZE,
            sector_count: total_size / SECTOR_SIZE,
            total_size,
            erased_byte: 0xFF,
        })
    }

    fn ready_geometry(&self) -> Result<FlashGeometry, FlashError<B::Error>> {
        match (self.state, self.geometry) {
            (DriverState::Ready, Some(geo)) => Ok(geo),
            _ => Err(FlashError::NotReady),
        }
    }

    fn read_status(&mut self, opcode: u8) -> Result<u8, FlashError<B::Error>> {
        let mut status = [0u8; 1];
        self.bus.command_receive(&Command::new(opcode), &mut status)?;
        Ok(status[0])
    }

    /// Run a write-enabled sequence with the bus held
    fn write_sequence<F>(&mut self, op: F) -> Result<(), FlashError<B::Error>>
    where
        F: FnOnce(&mut B) -> Result<(), B::Error>,
    {
        self.bus.acquire()?;
        let result = self
            .bus
            .command(&Command::new(WRITE_ENABLE))
            .and_then(|()| op(&mut self.bus));
        self.bus.release();
        Ok(result?)
    }

    /// Poll status 1 until a page program finishes
    async fn wait_program(&mut self) -> Result<(), FlashError<B::Error>> {
        for _ in 0..self.config.program_poll_limit {
            if self.read_status(READ_STATUS_1)? & SR1_BUSY == 0 {
                return Ok(());
            }
            self.delay.delay_us(self.config.program_poll_us).await;
        }
        log_warn!("w25q: page program still busy after poll limit");
        Err(FlashError::Timeout)
    }

    fn read_command(&self, offset: u32) -> Command {
        let dummy = self.config.read_dummy_cycles;
        let (opcode, dummy) = match self.config.read_lines {
            Lines::Single => (FAST_READ, dummy),
            Lines::Dual => (FAST_READ_DUAL_OUT, dummy),
            Lines::Quad => (FAST_READ_QUAD_OUT, dummy / 2),
        };
        Command::new(opcode)
            .with_address(offset)
            .with_dummy(dummy)
            .with_lines(self.config.read_lines)
    }
}

impl<B: NorBus, D: DelayNs> Device for W25q<B, D> {
    type Error = FlashError<B::Error>;

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.state == DriverState::Ready {
            return Ok(());
        }

        let mut id = [0u8; 3];
        self.bus.command_receive(&Command::new(READ_ID), &mut id)?;

        if self.config.reset_on_start {
            self.bus.acquire()?;
            let reset = self
                .bus
                .command(&Command::new(ENABLE_RESET))
                .and_then(|()| self.bus.command(&Command::new(RESET_DEVICE)));
            self.bus.release();
            reset?;
        }

        let identity = DeviceIdentity {
            manufacturer: id[0],
            memory_type: id[1],
            capacity: id[2],
        };
        self.identity = Some(identity);

        match self.geometry_for(&identity) {
            Some(geo) => {
                log_info!(
                    "w25q: found {=u8:#x}/{=u8:#x}, {=u32} sectors",
                    identity.manufacturer,
                    identity.memory_type,
                    geo.sector_count
                );
                self.geometry = Some(geo);
                self.state = DriverState::Ready;
                Ok(())
            }
            None => {
                log_warn!(
                    "w25q: unsupported part {=u8:#x}/{=u8:#x}/{=u8:#x}",
                    identity.manufacturer,
                    identity.memory_type,
                    identity.capacity
                );
                self.geometry = None;
                self.state = DriverState::NotFound;
                Err(FlashError::NotFound)
            }
        }
    }

    fn stop(&mut self) {
        self.state = DriverState::Stopped;
        self.geometry = None;
    }

    fn state(&self) -> DriverState {
        self.state
    }
}

impl<B: NorBus, D: DelayNs> FlashDevice for W25q<B, D> {
    fn identity(&self) -> Option<DeviceIdentity> {
        self.identity
    }

    fn geometry(&self) -> Option<FlashGeometry> {
        match self.state {
            DriverState::Ready => self.geometry,
            _ => None,
        }
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let geo = self.ready_geometry()?;
        if !geo.contains(offset, buf.len()) {
            return Err(FlashError::OutOfBounds);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let cmd = self.read_command(offset);
        self.bus.command_receive(&cmd, buf)?;
        Ok(())
    }

    async fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error> {
        let geo = self.ready_geometry()?;
        if !geo.contains(offset, data.len()) {
            return Err(FlashError::OutOfBounds);
        }

        for chunk in page_chunks(offset, data.len(), geo.page_size) {
            let bytes = &data[chunk.start..chunk.start + chunk.len];
            let cmd = Command::new(PAGE_PROGRAM).with_address(chunk.address);
            self.write_sequence(|bus| bus.command_send(&cmd, bytes))?;
            self.wait_program().await?;
        }
        Ok(())
    }

    fn start_erase_sector(&mut self, sector: u32) -> Result<(), Self::Error> {
        let geo = self.ready_geometry()?;
        if sector >= geo.sector_count {
            return Err(FlashError::OutOfBounds);
        }

        let cmd = Command::new(SECTOR_ERASE).with_address(geo.sector_offset(sector));
        self.write_sequence(|bus| bus.command(&cmd))
    }

    fn start_erase_all(&mut self) -> Result<(), Self::Error> {
        self.ready_geometry()?;
        self.write_sequence(|bus| bus.command(&Command::new(CHIP_ERASE)))
    }

    fn query_erase(&mut self) -> Result<EraseStatus, Self::Error> {
        self.ready_geometry()?;
        let sr1 = self.read_status(READ_STATUS_1)?;
        let sr2 = self.read_status(READ_STATUS_2)?;

        if sr1 & SR1_BUSY != 0 || sr2 & SR2_SUS != 0 {
            Ok(EraseStatus::Busy {
                retry_ms: self.config.erase_retry_ms,
            })
        } else {
            Ok(EraseStatus::Done)
        }
    }

    fn verify_erase(&mut self, sector: u32) -> Result<(), Self::Error> {
        let geo = self.ready_geometry()?;
        if sector >= geo.sector_count {
            return Err(FlashError::OutOfBounds);
        }

        let base = geo.sector_offset(sector);
        let mut window = [0u8; VERIFY_WINDOW];
        for pos in (0..geo.sector_size).step_by(VERIFY_WINDOW) {
            FlashDevice::read(self, base + pos, &mut window)?;
            if let Some(i) = window.iter().position(|&b| b != geo.erased_byte) {
                log_warn!("w25q: sector {=u32} not erased at {=u32:#x}", sector, base + pos + i as u32);
                return Err(FlashError::Verify);
            }
        }
        Ok(())
    }
}
