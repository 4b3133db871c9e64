//! W25Q command opcodes and status bits

/// Write enable
pub const WRITE_ENABLE: u8 = 0x06;
/// JEDEC identification (manufacturer, memory type, capacity)
pub const READ_ID: u8 = 0x9F;
/// Read data, no dummy cycles
pub const READ_DATA: u8 = 0x03;
/// Fast read, single line
pub const FAST_READ: u8 = 0x0B;
/// Fast read, dual output
pub const FAST_READ_DUAL_OUT: u8 = 0x3B;
/// Fast read, quad output
pub const FAST_READ_QUAD_OUT: u8 = 0x6B;
/// Page program (up to one page)
pub const PAGE_PROGRAM: u8 = 0x02;
/// Sector erase (4 KiB)
pub const SECTOR_ERASE: u8 = 0x20;
pub const CHIP_ERASE: u8 = 0xC7;
pub const READ_STATUS_1: u8 = 0x05;
pub const READ_STATUS_2: u8 = 0x35;
pub const ENABLE_RESET: u8 = 0x66;
pub const RESET_DEVICE: u8 = 0x99;

/// Status register 1: erase or program in progress
pub const SR1_BUSY: u8 = 0x01;
/// Status register 1: write enable latch
pub const SR1_WEL: u8 = 0x02;
/// Status register 2: erase/program suspended
pub const SR2_SUS: u8 = 0x80;

/// Winbond manufacturer id
pub const MANUFACTURER_WINBOND: u8 = 0xEF;
/// W25Q memory type, SPI mode
pub const MEMORY_TYPE_SPI: u8 = 0x40;
/// W25Q memory type, QPI/DTR parts
pub const MEMORY_TYPE_QPI: u8 = 0x70;

pub const PAGE_SIZE: u32 = 256;
pub const SECTOR_SIZE: u32 = 4096;
/// log2 of [`SECTOR_SIZE`]
pub const SECTOR_SHIFT: u8 = 12;
/// Largest capacity code reachable with 24-bit addresses
pub const MAX_CAPACITY_CODE: u8 = 24;
