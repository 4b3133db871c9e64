//! Mounted filesystem volume
//!
//! Files live as entries of a `sequential-storage` map spread over a range
//! of NOR sectors. The map is wear levelled and power-fail safe: an entry
//! is either fully stored or not visible at all. A reserved superblock entry
//! marks the range as formatted and records its layout.

use core::ops::Range;

use embedded_storage_async::nor_flash::MultiwriteNorFlash;
use fanctl_core::fs::{FileData, FileName, FsError, MAX_FILE_LEN, MAX_NAME_LEN};
use sequential_storage::cache::NoCache;
use sequential_storage::map::{self, Key, SerializationError};

/// Working buffer shared by every operation, large enough for the biggest
/// entry plus its key
pub const SCRATCH_LEN: usize = 512;

const SUPERBLOCK_MAGIC: [u8; 4] = *b"FCFS";
const SUPERBLOCK_VERSION: u16 = 1;
const SUPERBLOCK_LEN: usize = 14;

const TAG_SUPERBLOCK: u8 = 0x00;
const TAG_FILE: u8 = 0x01;

/// Key of a map entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKey {
    Superblock,
    File(FileName),
}

impl Key for EntryKey {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        match self {
            EntryKey::Superblock => {
                let slot = buffer.first_mut().ok_or(SerializationError::BufferTooSmall)?;
                *slot = TAG_SUPERBLOCK;
                Ok(1)
            }
            EntryKey::File(name) => {
                let len = name.len();
                if buffer.len() < 2 + len {
                    return Err(SerializationError::BufferTooSmall);
                }
                buffer[0] = TAG_FILE;
                buffer[1] = len as u8;
                buffer[2..2 + len].copy_from_slice(name.as_bytes());
                Ok(2 + len)
            }
        }
    }

    fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError> {
        match buffer.first() {
            Some(&TAG_SUPERBLOCK) => Ok((EntryKey::Superblock, 1)),
            Some(&TAG_FILE) => {
                let len = *buffer.get(1).ok_or(SerializationError::BufferTooSmall)? as usize;
                if len > MAX_NAME_LEN {
                    return Err(SerializationError::InvalidFormat);
                }
                let bytes = buffer
                    .get(2..2 + len)
                    .ok_or(SerializationError::BufferTooSmall)?;
                let name = core::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| FileName::try_from(s).ok())
                    .ok_or(SerializationError::InvalidFormat)?;
                Ok((EntryKey::File(name), 2 + len))
            }
            Some(_) => Err(SerializationError::InvalidFormat),
            None => Err(SerializationError::BufferTooSmall),
        }
    }
}

/// Superblock contents: magic, version, erase block size, block count
fn superblock(block_size: u32, block_count: u32) -> [u8; SUPERBLOCK_LEN] {
    let mut out = [0u8; SUPERBLOCK_LEN];
    out[..4].copy_from_slice(&SUPERBLOCK_MAGIC);
    out[4..6].copy_from_slice(&SUPERBLOCK_VERSION.to_le_bytes());
    out[6..10].copy_from_slice(&block_size.to_le_bytes());
    out[10..14].copy_from_slice(&block_count.to_le_bytes());
    out
}

fn map_storage_error<E>(err: sequential_storage::Error<E>) -> FsError {
    match err {
        sequential_storage::Error::FullStorage { .. } => FsError::NoSpace,
        sequential_storage::Error::Corrupted { .. } => FsError::Corrupt,
        sequential_storage::Error::ItemTooBig { .. } => FsError::FileTooLarge,
        sequential_storage::Error::BufferTooSmall { .. } => FsError::FileTooLarge,
        sequential_storage::Error::Storage { .. } => FsError::Io,
        _ => FsError::Io,
    }
}

/// A formatted range of flash holding files
pub struct Volume<F> {
    flash: F,
    range: Range<u32>,
    scratch: [u8; SCRATCH_LEN],
}

impl<F: MultiwriteNorFlash> Volume<F> {
    /// Wrap `range` of `flash`; nothing is touched until [`Volume::mount`]
    pub fn new(flash: F, range: Range<u32>) -> Self {
        Self {
            flash,
            range,
            scratch: [0; SCRATCH_LEN],
        }
    }

    fn expected_superblock(&self) -> [u8; SUPERBLOCK_LEN] {
        let block_size = F::ERASE_SIZE as u32;
        let block_count = (self.range.end - self.range.start) / block_size;
        superblock(block_size, block_count)
    }

    /// Check that the range holds a filesystem with this layout
    pub async fn mount(&mut self) -> Result<(), FsError> {
        let expected = self.expected_superblock();
        let found = map::fetch_item::<EntryKey, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut self.scratch,
            &EntryKey::Superblock,
        )
        .await
        .map_err(map_storage_error)?;

        match found {
            Some(data) if data == expected.as_slice() => Ok(()),
            Some(_) => {
                log_warn!("fs: superblock mismatch");
                Err(FsError::Corrupt)
            }
            None => Err(FsError::Corrupt),
        }
    }

    /// Erase the range and write a fresh superblock. All files are lost.
    pub async fn format(&mut self) -> Result<(), FsError> {
        log_info!("fs: formatting {=u32:#x}..{=u32:#x}", self.range.start, self.range.end);
        self.flash
            .erase(self.range.start, self.range.end)
            .await
            .map_err(|_| FsError::Io)?;

        let superblock = self.expected_superblock();
        map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut self.scratch,
            &EntryKey::Superblock,
            &superblock.as_slice(),
        )
        .await
        .map_err(map_storage_error)
    }

    /// Read at most `max_len` bytes of `name`
    pub async fn read(&mut self, name: &FileName, max_len: usize) -> Result<FileData, FsError> {
        let found = map::fetch_item::<EntryKey, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut self.scratch,
            &EntryKey::File(name.clone()),
        )
        .await
        .map_err(map_storage_error)?;

        let data = found.ok_or(FsError::NotFound)?;
        let len = data.len().min(max_len).min(MAX_FILE_LEN);
        FileData::from_slice(&data[..len]).map_err(|_| FsError::FileTooLarge)
    }

    /// Create or replace `name` with exactly `data`
    pub async fn write(&mut self, name: &FileName, data: &[u8]) -> Result<usize, FsError> {
        if data.len() > MAX_FILE_LEN {
            return Err(FsError::FileTooLarge);
        }
        map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut self.scratch,
            &EntryKey::File(name.clone()),
            &data,
        )
        .await
        .map_err(map_storage_error)?;
        Ok(data.len())
    }

    /// Move `old` to `new`, replacing any file already called `new`
    ///
    /// The new entry is stored before the old one is removed, so a power
    /// loss in between leaves both names holding the data rather than
    /// neither. Once `new` is stored the rename has taken effect; failing
    /// to remove `old` afterwards is logged and `old` stays readable.
    pub async fn rename(&mut self, old: &FileName, new: &FileName) -> Result<(), FsError> {
        let data = self.read(old, MAX_FILE_LEN).await?;
        if old == new {
            return Ok(());
        }

        self.write(new, &data).await?;
        let removed = map::remove_item(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut self.scratch,
            &EntryKey::File(old.clone()),
        )
        .await;
        if let Err(e) = removed {
            log_warn!("fs: renamed, but old name left behind: {}", map_storage_error(e));
        }
        Ok(())
    }
}
