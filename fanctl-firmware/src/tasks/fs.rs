//! Filesystem task
//!
//! Owns the flash driver, the block adapter and the mounted volume, and
//! serves [`FS_MAILBOX`] until reset.

use defmt::*;
use embassy_rp::peripherals::SPI0;
use embassy_time::Delay;
use fanctl_drivers::flash::{NorBlockDevice, W25q};
use fanctl_fs::FsActor;
use fanctl_hal::SpiNorBus;
use fanctl_hal_rp2040::{Rp2040Output, Rp2040Spi};

use crate::board;
use crate::channels::{FS_MAILBOX, FS_READY};

pub type FlashBus = SpiNorBus<Rp2040Spi<'static, SPI0>, Rp2040Output<'static>>;
pub type FlashDriver = W25q<FlashBus, Delay>;
pub type FlashBlocks = NorBlockDevice<FlashDriver, Delay>;

#[embassy_executor::task]
pub async fn fs_task(blocks: FlashBlocks) {
    let mut actor = match FsActor::start(blocks, board::FS_RANGE).await {
        Ok(actor) => actor,
        Err(e) => {
            error!("Filesystem unusable: {} ({})", e, e.code());
            FS_READY.signal(false);
            return;
        }
    };

    info!(
        "Filesystem ready at {=u32:#x}..{=u32:#x}",
        board::FS_RANGE.start,
        board::FS_RANGE.end
    );
    FS_READY.signal(true);
    actor.run(&FS_MAILBOX).await;
}
