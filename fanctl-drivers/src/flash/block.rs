//! Block device adapter over a flash driver
//!
//! Presents a [`FlashDevice`] as the block contract a filesystem expects,
//! one block per erase sector. Driver errors are logged and collapsed into
//! [`IoError`]. Erase is made blocking by polling `query_erase` with the
//! driver's recommended backoff, up to `erase_timeout_ms`.
//!
//! The same adapter implements the `embedded-storage-async` NOR traits so
//! `sequential-storage` can sit directly on top of it.

use embedded_hal_async::delay::DelayNs;
use embedded_storage_async::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, ReadNorFlash,
};
use fanctl_core::traits::{EraseStatus, FlashDevice, FlashGeometry};
use fanctl_hal::block::{BlockDevice, BlockGeometry, IoError};

use super::command::SECTOR_SIZE;

/// Erase cycles before the filesystem should move a block
const BLOCK_CYCLES: u32 = 500;

/// Block adapter configuration
#[derive(Debug, Clone, Copy)]
pub struct BlockConfig {
    /// Give up on an erase that is still busy after this long
    pub erase_timeout_ms: u32,
    /// Read back every erased block before reporting success
    pub verify_after_erase: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            // W25Q sector erase is 400 ms worst case
            erase_timeout_ms: 2_000,
            verify_after_erase: false,
        }
    }
}

/// Block device backed by a NOR flash driver
pub struct NorBlockDevice<F, D> {
    flash: F,
    delay: D,
    geometry: FlashGeometry,
    config: BlockConfig,
}

impl<F: FlashDevice, D: DelayNs> NorBlockDevice<F, D> {
    /// Wrap a started flash driver
    ///
    /// Fails if the driver is not `Ready` or its sectors are not 4 KiB.
    pub fn new(flash: F, delay: D, config: BlockConfig) -> Result<Self, IoError> {
        let Some(geometry) = flash.geometry() else {
            log_error!("block: flash not ready");
            return Err(IoError);
        };
        if geometry.sector_size != SECTOR_SIZE {
            log_error!("block: unsupported sector size {=u32}", geometry.sector_size);
            return Err(IoError);
        }

        Ok(Self {
            flash,
            delay,
            geometry,
            config,
        })
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Hand back the driver and delay
    pub fn release(self) -> (F, D) {
        (self.flash, self.delay)
    }

    fn address(&self, block: u32, offset: u32, len: usize) -> Result<u32, IoError> {
        if block >= self.geometry.sector_count
            || offset as u64 + len as u64 > self.geometry.sector_size as u64
        {
            log_warn!("block: access outside block {=u32}", block);
            return Err(IoError);
        }
        Ok(self.geometry.sector_offset(block) + offset)
    }

    /// Wait out an erase the driver has started
    async fn wait_erase(&mut self) -> Result<(), IoError> {
        let mut waited_ms = 0u32;
        loop {
            match self.flash.query_erase() {
                Ok(EraseStatus::Done) => return Ok(()),
                Ok(EraseStatus::Busy { retry_ms }) => {
                    if waited_ms >= self.config.erase_timeout_ms {
                        log_error!("block: erase still busy after {=u32} ms", waited_ms);
                        return Err(IoError);
                    }
                    let step = retry_ms.max(1);
                    self.delay.delay_ms(step).await;
                    waited_ms = waited_ms.saturating_add(step);
                }
                Err(_) => {
                    log_warn!("block: erase status poll failed");
                    return Err(IoError);
                }
            }
        }
    }

    async fn erase_block(&mut self, block: u32) -> Result<(), IoError> {
        if block >= self.geometry.sector_count {
            return Err(IoError);
        }

        self.flash.start_erase_sector(block).map_err(|_| {
            log_warn!("block: erase of {=u32} rejected", block);
            IoError
        })?;
        self.wait_erase().await?;

        if self.config.verify_after_erase {
            self.flash.verify_erase(block).map_err(|_| {
                log_warn!("block: {=u32} failed erase verify", block);
                IoError
            })?;
        }
        Ok(())
    }

    async fn program_at(&mut self, address: u32, data: &[u8]) -> Result<(), IoError> {
        self.flash.program(address, data).await.map_err(|_| {
            log_warn!("block: program at {=u32:#x} failed", address);
            IoError
        })
    }

    fn read_at(&mut self, address: u32, buf: &mut [u8]) -> Result<(), IoError> {
        self.flash.read(address, buf).map_err(|_| {
            log_warn!("block: read at {=u32:#x} failed", address);
            IoError
        })
    }
}

impl<F: FlashDevice, D: DelayNs> BlockDevice for NorBlockDevice<F, D> {
    fn geometry(&self) -> BlockGeometry {
        BlockGeometry {
            read_size: self.geometry.page_size,
            prog_size: self.geometry.page_size,
            block_size: self.geometry.sector_size,
            block_count: self.geometry.sector_count,
            cache_size: self.geometry.page_size,
            lookahead_size: self.geometry.page_size,
            block_cycles: BLOCK_CYCLES,
        }
    }

    async fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> Result<(), IoError> {
        let address = self.address(block, offset, buf.len())?;
        self.read_at(address, buf)
    }

    async fn program(&mut self, block: u32, offset: u32, data: &[u8]) -> Result<(), IoError> {
        let address = self.address(block, offset, data.len())?;
        self.program_at(address, data).await
    }

    async fn erase(&mut self, block: u32) -> Result<(), IoError> {
        self.erase_block(block).await
    }

    async fn sync(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

impl<F, D> ErrorType for NorBlockDevice<F, D> {
    type Error = IoError;
}

impl<F: FlashDevice, D: DelayNs> ReadNorFlash for NorBlockDevice<F, D> {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), IoError> {
        self.read_at(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.geometry.total_size as usize
    }
}

impl<F: FlashDevice, D: DelayNs> NorFlash for NorBlockDevice<F, D> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), IoError> {
        if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 || from > to {
            log_warn!("block: unaligned erase {=u32:#x}..{=u32:#x}", from, to);
            return Err(IoError);
        }
        for block in from / SECTOR_SIZE..to / SECTOR_SIZE {
            self.erase_block(block).await?;
        }
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), IoError> {
        self.program_at(offset, bytes).await
    }
}

// NOR bits only ever go from 1 to 0 on program, so rewriting a word is safe
impl<F: FlashDevice, D: DelayNs> MultiwriteNorFlash for NorBlockDevice<F, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::{W25q, W25qConfig};
    use crate::sim::{SimDelay, SimNorFlash};
    use embassy_futures::block_on;
    use fanctl_core::traits::Device;

    type SimBlock<'a> = NorBlockDevice<W25q<&'a mut SimNorFlash, SimDelay>, SimDelay>;

    fn block_device(sim: &mut SimNorFlash, config: BlockConfig) -> SimBlock<'_> {
        let mut flash = W25q::new(sim, SimDelay::default(), W25qConfig::default());
        flash.start().unwrap();
        NorBlockDevice::new(flash, SimDelay::default(), config).unwrap()
    }

    #[test]
    fn test_requires_ready_flash() {
        let mut sim = SimNorFlash::new(16);
        let flash = W25q::new(&mut sim, SimDelay::default(), W25qConfig::default());
        assert!(NorBlockDevice::new(flash, SimDelay::default(), BlockConfig::default()).is_err());
    }

    #[test]
    fn test_geometry_from_flash() {
        let mut sim = SimNorFlash::new(16);
        let dev = block_device(&mut sim, BlockConfig::default());
        let geo = BlockDevice::geometry(&dev);

        assert_eq!(geo.read_size, 256);
        assert_eq!(geo.prog_size, 256);
        assert_eq!(geo.block_size, 4096);
        assert_eq!(geo.block_count, 16);
        assert_eq!(geo.cache_size, 256);
        assert_eq!(geo.lookahead_size, 256);
        assert_eq!(geo.capacity(), 65536);
        assert_eq!(ReadNorFlash::capacity(&dev), 65536);
    }

    #[test]
    fn test_block_addressing() {
        let mut sim = SimNorFlash::new(16);
        let mut dev = block_device(&mut sim, BlockConfig::default());

        block_on(BlockDevice::program(&mut dev, 3, 10, b"abc")).unwrap();
        let mut buf = [0u8; 3];
        block_on(ReadNorFlash::read(&mut dev, 3 * 4096 + 10, &mut buf)).unwrap();
        assert_eq!(&buf, b"abc");

        let mut buf = [0u8; 3];
        block_on(BlockDevice::read(&mut dev, 3, 10, &mut buf)).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn test_access_outside_block_rejected() {
        let mut sim = SimNorFlash::new(16);
        let mut dev = block_device(&mut sim, BlockConfig::default());
        let mut buf = [0u8; 8];

        assert_eq!(block_on(BlockDevice::read(&mut dev, 0, 4092, &mut buf)), Err(IoError));
        assert_eq!(block_on(BlockDevice::read(&mut dev, 16, 0, &mut buf)), Err(IoError));
        assert_eq!(block_on(BlockDevice::erase(&mut dev, 16)), Err(IoError));
    }

    #[test]
    fn test_erase_waits_for_completion() {
        let mut sim = SimNorFlash::new(16);
        sim.set_erase_busy_polls(5);
        let mut dev = block_device(&mut sim, BlockConfig::default());

        block_on(BlockDevice::program(&mut dev, 1, 0, &[0u8; 32])).unwrap();
        block_on(BlockDevice::erase(&mut dev, 1)).unwrap();

        let (_, delay) = dev.release();
        assert_eq!(delay.elapsed_ms(), 5);
        assert!(sim.memory()[4096..8192].iter().all(|&b| b == 0xFF));
        assert_eq!(sim.erase_log(), &[4096]);
    }

    #[test]
    fn test_erase_times_out_on_stuck_device() {
        let mut sim = SimNorFlash::new(16);
        sim.set_stuck_busy(true);
        let mut dev = block_device(
            &mut sim,
            BlockConfig {
                erase_timeout_ms: 50,
                verify_after_erase: false,
            },
        );

        assert_eq!(block_on(BlockDevice::erase(&mut dev, 0)), Err(IoError));
        let (_, delay) = dev.release();
        assert_eq!(delay.elapsed_ms(), 50);
    }

    #[test]
    fn test_sync_is_noop() {
        let mut sim = SimNorFlash::new(16);
        let mut dev = block_device(&mut sim, BlockConfig::default());
        assert_eq!(block_on(dev.sync()), Ok(()));
        drop(dev);
        assert!(sim.program_log().is_empty());
        assert!(sim.erase_log().is_empty());
    }

    #[test]
    fn test_driver_errors_collapse_to_io() {
        let mut sim = SimNorFlash::new(16);
        sim.fail_program_at(0);
        let mut dev = block_device(&mut sim, BlockConfig::default());
        assert_eq!(block_on(NorFlash::write(&mut dev, 0, &[1, 2])), Err(IoError));
    }

    #[test]
    fn test_nor_erase_range() {
        let mut sim = SimNorFlash::new(16);
        let mut dev = block_device(
            &mut sim,
            BlockConfig {
                verify_after_erase: true,
                ..BlockConfig::default()
            },
        );

        block_on(NorFlash::erase(&mut dev, 4096, 3 * 4096)).unwrap();
        assert_eq!(block_on(NorFlash::erase(&mut dev, 100, 4096)), Err(IoError));
        drop(dev);
        assert_eq!(sim.erase_log(), &[4096, 8192]);
    }
}
