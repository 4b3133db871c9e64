//! Board identity report
//!
//! Reads the stored identity once the filesystem is up and logs it. A board
//! with nothing stored is provisioned from `board.toml`.

use defmt::*;
use fanctl_core::fs::FsError;
use fanctl_fs::identity::{IdentityError, IdentityStore};

use crate::board;
use crate::channels::{Client, FS_READY};

#[embassy_executor::task]
pub async fn identity_task(mut client: Client) {
    if !FS_READY.wait().await {
        warn!("No filesystem, identity unavailable");
        return;
    }

    let mut store = IdentityStore::new(&mut client);
    let identity = match store.load().await {
        Ok(identity) => identity,
        Err(IdentityError::Fs(FsError::NotFound)) => {
            let Some(identity) = board::default_identity() else {
                warn!("No identity stored");
                return;
            };
            if let Err(e) = store.save(&identity).await {
                error!("Failed to provision identity: {}", e);
                return;
            }
            info!("Identity provisioned from board.toml");
            identity
        }
        Err(e) => {
            error!("Failed to read identity: {}", e);
            return;
        }
    };

    info!(
        "Identity: vendor={=u32:#010x} product={=u32:#010x} rev={=u32:#010x} s/n={=u32:#010x}",
        identity.vendor_id, identity.product_id, identity.revision, identity.serial
    );
}
