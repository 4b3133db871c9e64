//! Filesystem request protocol
//!
//! Callers never touch the mounted filesystem; they send an [`FsRequest`]
//! to the filesystem actor and wait for the matching reply. Names and file
//! bodies are bounded so a request fits in a channel slot.

use heapless::{String, Vec};

/// Longest file name, in bytes
pub const MAX_NAME_LEN: usize = 32;

/// Largest file body, in bytes (one flash page)
pub const MAX_FILE_LEN: usize = 256;

pub type FileName = String<MAX_NAME_LEN>;
pub type FileData = Vec<u8, MAX_FILE_LEN>;

/// Filesystem errors
///
/// [`FsError::code`] gives the negative integer used on the
/// integer-status side of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// No file with that name
    NotFound,
    /// The block device failed
    Io,
    /// On-flash structures are damaged or never formatted
    Corrupt,
    /// No room for the new data
    NoSpace,
    NameTooLong,
    FileTooLarge,
    /// Empty name or otherwise malformed request
    InvalidArgument,
}

impl FsError {
    /// Negative status code for this error
    pub const fn code(self) -> i32 {
        match self {
            FsError::NotFound => -2,
            FsError::Io => -5,
            FsError::InvalidArgument => -22,
            FsError::FileTooLarge => -27,
            FsError::NoSpace => -28,
            FsError::NameTooLong => -36,
            FsError::Corrupt => -84,
        }
    }
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            FsError::NotFound => "no such file",
            FsError::Io => "I/O error",
            FsError::Corrupt => "corrupted filesystem",
            FsError::NoSpace => "no space left",
            FsError::NameTooLong => "file name too long",
            FsError::FileTooLarge => "file too large",
            FsError::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

/// Collapse a result onto the integer protocol: a count, `0`, or a
/// negative error code
pub fn status_code(result: Result<usize, FsError>) -> i32 {
    match result {
        Ok(n) => n as i32,
        Err(e) => e.code(),
    }
}

/// Validate and copy a file name
pub fn file_name(name: &str) -> Result<FileName, FsError> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument);
    }
    FileName::try_from(name).map_err(|_| FsError::NameTooLong)
}

/// Validate and copy a file body
pub fn file_data(data: &[u8]) -> Result<FileData, FsError> {
    FileData::from_slice(data).map_err(|_| FsError::FileTooLarge)
}

/// A request to the filesystem actor
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsRequest {
    /// Read at most `max_len` bytes of `name`
    Read { name: FileName, max_len: usize },
    /// Create or truncate `name` and write `data` to it
    Write { name: FileName, data: FileData },
    /// Rename `old` to `new`, replacing any file called `new`
    Rename { old: FileName, new: FileName },
}

/// Successful reply from the filesystem actor
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsResponse {
    Read(FileData),
    /// Number of bytes written
    Written(usize),
    Renamed,
}

pub type FsResult = Result<FsResponse, FsError>;
