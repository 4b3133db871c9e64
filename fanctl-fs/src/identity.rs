//! Board identity persistence
//!
//! The record is written to a temporary file and renamed over the real one,
//! so a reset mid-update leaves either the old identity or the new one.

use embassy_sync::blocking_mutex::raw::RawMutex;
use fanctl_core::fs::FsError;
use fanctl_core::identity::{Identity, IDENTITY_LEN};

use crate::mailbox::FsClient;

pub const IDENTITY_FILE: &str = "identity";
pub const IDENTITY_TMP_FILE: &str = "identity.tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentityError {
    Fs(FsError),
    /// Stored record has the wrong size; holds the bytes found
    BadLength(usize),
}

impl From<FsError> for IdentityError {
    fn from(e: FsError) -> Self {
        IdentityError::Fs(e)
    }
}

/// Loads and saves the [`Identity`] through a filesystem client
pub struct IdentityStore<'c, 'a, M: RawMutex, const DEPTH: usize, const CLIENTS: usize> {
    client: &'c mut FsClient<'a, M, DEPTH, CLIENTS>,
}

impl<'c, 'a, M: RawMutex, const DEPTH: usize, const CLIENTS: usize>
    IdentityStore<'c, 'a, M, DEPTH, CLIENTS>
{
    pub fn new(client: &'c mut FsClient<'a, M, DEPTH, CLIENTS>) -> Self {
        Self { client }
    }

    pub async fn save(&mut self, identity: &Identity) -> Result<(), IdentityError> {
        let bytes = identity.to_bytes();
        let written = self.client.write(IDENTITY_TMP_FILE, &bytes).await?;
        if written != IDENTITY_LEN {
            return Err(IdentityError::BadLength(written));
        }
        self.client.rename(IDENTITY_TMP_FILE, IDENTITY_FILE).await?;
        log_info!("identity: saved serial {=u32}", identity.serial);
        Ok(())
    }

    pub async fn load(&mut self) -> Result<Identity, IdentityError> {
        // One spare byte so an oversized record is caught
        let mut buf = [0u8; IDENTITY_LEN + 1];
        let len = self.client.read(IDENTITY_FILE, &mut buf).await?;
        Identity::from_bytes(&buf[..len]).ok_or(IdentityError::BadLength(len))
    }
}
