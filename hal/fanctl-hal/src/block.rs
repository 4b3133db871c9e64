//! Block storage abstractions
//!
//! The contract a filesystem expects from the storage underneath it:
//! read, program, erase and sync addressed by block number, parameterized
//! by a fixed [`BlockGeometry`].

use embedded_storage_async::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Geometry of a block device, fixed at mount time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockGeometry {
    /// Minimum read granularity in bytes
    pub read_size: u32,
    /// Minimum program granularity in bytes
    pub prog_size: u32,
    /// Erase unit in bytes
    pub block_size: u32,
    /// Number of erase units
    pub block_count: u32,
    /// Size of the per-file cache the filesystem may keep
    pub cache_size: u32,
    /// Size of the allocator lookahead buffer
    pub lookahead_size: u32,
    /// Erase cycles before a block is relocated
    pub block_cycles: u32,
}

impl BlockGeometry {
    /// Total capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.block_size * self.block_count
    }
}

/// The only error a block device reports
///
/// Block contracts distinguish success from failure and nothing else;
/// the detail stays in the driver's log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IoError;

impl NorFlashError for IoError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("block device I/O error")
    }
}

/// Block device
///
/// Operations complete before they return: an erase that the hardware
/// performs asynchronously is waited out inside [`BlockDevice::erase`].
pub trait BlockDevice {
    /// Device geometry
    fn geometry(&self) -> BlockGeometry;

    /// Read `buf.len()` bytes starting at `offset` within `block`
    fn read(
        &mut self,
        block: u32,
        offset: u32,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), IoError>>;

    /// Program `data` starting at `offset` within `block`
    ///
    /// The target range must have been erased.
    fn program(
        &mut self,
        block: u32,
        offset: u32,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), IoError>>;

    /// Erase `block`, returning once the erase has completed
    fn erase(&mut self, block: u32) -> impl core::future::Future<Output = Result<(), IoError>>;

    /// Flush any write cache
    fn sync(&mut self) -> impl core::future::Future<Output = Result<(), IoError>>;
}
