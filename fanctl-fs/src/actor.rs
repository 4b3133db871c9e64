//! Filesystem actor
//!
//! Sole owner of the mounted volume. Requests are taken from the mailbox
//! one at a time and answered before the next is looked at.

use core::ops::Range;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_storage_async::nor_flash::MultiwriteNorFlash;
use fanctl_core::fs::{FsError, FsRequest, FsResponse, FsResult};

use crate::mailbox::Mailbox;
use crate::volume::Volume;

pub struct FsActor<F> {
    volume: Volume<F>,
    served: u32,
}

impl<F: MultiwriteNorFlash> FsActor<F> {
    /// Mount `range` of `flash`, formatting it if the mount fails
    ///
    /// An error here means even a freshly formatted volume could not be
    /// mounted; the filesystem is unusable.
    pub async fn start(flash: F, range: Range<u32>) -> Result<Self, FsError> {
        let mut volume = Volume::new(flash, range);

        if let Err(e) = volume.mount().await {
            log_warn!("fs: mount failed ({}), formatting", e);
            volume.format().await?;
            volume.mount().await?;
        }

        log_info!("fs: mounted");
        Ok(Self { volume, served: 0 })
    }

    /// Requests answered so far
    pub fn served(&self) -> u32 {
        self.served
    }

    /// Run one request against the volume
    pub async fn process(&mut self, request: FsRequest) -> FsResult {
        let result = match request {
            FsRequest::Read { name, max_len } => {
                self.volume.read(&name, max_len).await.map(FsResponse::Read)
            }
            FsRequest::Write { name, data } => {
                self.volume.write(&name, &data).await.map(FsResponse::Written)
            }
            FsRequest::Rename { old, new } => {
                self.volume.rename(&old, &new).await.map(|()| FsResponse::Renamed)
            }
        };

        if let Err(e) = &result {
            log_debug!("fs: request failed: {}", e);
        }
        self.served = self.served.wrapping_add(1);
        result
    }

    /// Wait for one request, process it and deliver the reply
    pub async fn serve_one<M: RawMutex, const DEPTH: usize, const CLIENTS: usize>(
        &mut self,
        mailbox: &Mailbox<M, DEPTH, CLIENTS>,
    ) {
        let envelope = mailbox.receive().await;
        let result = self.process(envelope.request).await;
        mailbox.reply(envelope.slot, envelope.seq, result);
    }

    /// Serve requests forever
    pub async fn run<M: RawMutex, const DEPTH: usize, const CLIENTS: usize>(
        &mut self,
        mailbox: &Mailbox<M, DEPTH, CLIENTS>,
    ) {
        loop {
            self.serve_one(mailbox).await;
        }
    }
}
