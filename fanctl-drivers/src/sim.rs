//! Simulated W25Q chip for host tests
//!
//! Models the parts of a real W25Q the storage stack depends on: the
//! write-enable latch, page-program wrap limits, bit-clearing programs,
//! 4 KiB sector and chip erase, and a busy flag that stays set for a
//! configurable number of status reads. Faults can be injected to exercise
//! error paths.

use std::vec;
use std::vec::Vec;

use fanctl_hal::nor::{Command, NorBus};

use crate::flash::command::*;

/// Errors reported by the simulated bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// Injected failure
    Fault,
    /// Program or erase without a preceding write enable
    WriteDisabled,
    /// Page program would wrap inside its page
    PageOverrun,
    /// Address beyond the simulated array
    OutOfRange,
    /// Opcode the simulation does not model
    Unsupported(u8),
}

/// Simulated W25Q flash on a [`NorBus`]
pub struct SimNorFlash {
    mem: Vec<u8>,
    id: [u8; 3],
    write_enabled: bool,
    reset_armed: bool,
    resets: u32,
    busy_polls: u32,
    program_busy_polls: u32,
    erase_busy_polls: u32,
    stuck_busy: bool,
    programs_seen: usize,
    fail_program_at: Option<usize>,
    acquired: bool,
    unbracketed: u32,
    program_log: Vec<(u32, usize)>,
    erase_log: Vec<u32>,
}

impl SimNorFlash {
    /// Erased Winbond part of `1 << capacity_code` bytes
    pub fn new(capacity_code: u8) -> Self {
        Self::with_id([MANUFACTURER_WINBOND, MEMORY_TYPE_SPI, capacity_code])
    }

    /// Erased part reporting `id`; the array size follows `id[2]`, capped at 1 MiB
    pub fn with_id(id: [u8; 3]) -> Self {
        let size = 1usize << id[2].min(20);
        Self {
            mem: vec![0xFF; size],
            id,
            write_enabled: false,
            reset_armed: false,
            resets: 0,
            busy_polls: 0,
            program_busy_polls: 1,
            erase_busy_polls: 2,
            stuck_busy: false,
            programs_seen: 0,
            fail_program_at: None,
            acquired: false,
            unbracketed: 0,
            program_log: Vec::new(),
            erase_log: Vec::new(),
        }
    }

    /// Status reads that report busy after each erase
    pub fn set_erase_busy_polls(&mut self, polls: u32) {
        self.erase_busy_polls = polls;
    }

    /// Status reads that report busy after each page program
    pub fn set_program_busy_polls(&mut self, polls: u32) {
        self.program_busy_polls = polls;
    }

    /// Report busy forever
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Fail the `n`th page program (zero based) counted from now
    pub fn fail_program_at(&mut self, n: usize) {
        self.fail_program_at = Some(self.programs_seen + n);
    }

    /// Overwrite a byte behind the driver's back
    pub fn poke(&mut self, addr: usize, value: u8) {
        self.mem[addr] = value;
    }

    pub fn memory(&self) -> &[u8] {
        &self.mem
    }

    /// `(address, length)` of every page program accepted
    pub fn program_log(&self) -> &[(u32, usize)] {
        &self.program_log
    }

    /// Address of every sector erase accepted
    pub fn erase_log(&self) -> &[u32] {
        &self.erase_log
    }

    pub fn clear_logs(&mut self) {
        self.program_log.clear();
        self.erase_log.clear();
    }

    /// Completed reset-enable + reset sequences
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Program or erase commands issued without the bus acquired
    pub fn unbracketed(&self) -> u32 {
        self.unbracketed
    }

    fn status1(&mut self) -> u8 {
        let busy = if self.stuck_busy {
            true
        } else if self.busy_polls > 0 {
            self.busy_polls -= 1;
            true
        } else {
            false
        };

        let mut sr = 0;
        if busy {
            sr |= SR1_BUSY;
        }
        if self.write_enabled {
            sr |= SR1_WEL;
        }
        sr
    }

    fn address(&self, cmd: &Command, len: usize) -> Result<usize, SimError> {
        let addr = cmd.address.ok_or(SimError::Unsupported(cmd.opcode))? as usize;
        if addr + len > self.mem.len() {
            return Err(SimError::OutOfRange);
        }
        Ok(addr)
    }

    fn begin_write(&mut self) -> Result<(), SimError> {
        if !self.acquired {
            self.unbracketed += 1;
        }
        if !self.write_enabled {
            return Err(SimError::WriteDisabled);
        }
        self.write_enabled = false;
        Ok(())
    }
}

impl NorBus for SimNorFlash {
    type Error = SimError;

    fn acquire(&mut self) -> Result<(), SimError> {
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn command(&mut self, cmd: &Command) -> Result<(), SimError> {
        match cmd.opcode {
            WRITE_ENABLE => {
                self.write_enabled = true;
            }
            ENABLE_RESET => {
                self.reset_armed = true;
                return Ok(());
            }
            RESET_DEVICE => {
                if self.reset_armed {
                    self.write_enabled = false;
                    self.busy_polls = 0;
                    self.resets += 1;
                }
            }
            SECTOR_ERASE => {
                let addr = self.address(cmd, 1)? & !(SECTOR_SIZE as usize - 1);
                self.begin_write()?;
                self.mem[addr..addr + SECTOR_SIZE as usize].fill(0xFF);
                self.erase_log.push(addr as u32);
                self.busy_polls = self.erase_busy_polls;
            }
            CHIP_ERASE => {
                self.begin_write()?;
                self.mem.fill(0xFF);
                self.busy_polls = self.erase_busy_polls;
            }
            op => return Err(SimError::Unsupported(op)),
        }
        self.reset_armed = false;
        Ok(())
    }

    fn command_receive(&mut self, cmd: &Command, buf: &mut [u8]) -> Result<(), SimError> {
        self.reset_armed = false;
        match cmd.opcode {
            READ_ID => {
                for (out, id) in buf.iter_mut().zip(self.id.iter().cycle()) {
                    *out = *id;
                }
            }
            READ_STATUS_1 => buf.fill(self.status1()),
            READ_STATUS_2 => buf.fill(0),
            READ_DATA | FAST_READ | FAST_READ_DUAL_OUT | FAST_READ_QUAD_OUT => {
                let addr = self.address(cmd, buf.len())?;
                buf.copy_from_slice(&self.mem[addr..addr + buf.len()]);
            }
            op => return Err(SimError::Unsupported(op)),
        }
        Ok(())
    }

    fn command_send(&mut self, cmd: &Command, data: &[u8]) -> Result<(), SimError> {
        self.reset_armed = false;
        if cmd.opcode != PAGE_PROGRAM {
            return Err(SimError::Unsupported(cmd.opcode));
        }

        let addr = self.address(cmd, data.len())?;
        if addr % PAGE_SIZE as usize + data.len() > PAGE_SIZE as usize {
            return Err(SimError::PageOverrun);
        }
        self.begin_write()?;

        let index = self.programs_seen;
        self.programs_seen += 1;
        if self.fail_program_at == Some(index) {
            return Err(SimError::Fault);
        }

        for (cell, byte) in self.mem[addr..addr + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.program_log.push((addr as u32, data.len()));
        self.busy_polls = self.program_busy_polls;
        Ok(())
    }
}

/// Delay that returns immediately and keeps count of the time requested
#[derive(Debug, Default, Clone, Copy)]
pub struct SimDelay {
    pub elapsed_ns: u64,
}

impl SimDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}
