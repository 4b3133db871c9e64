//! Inter-task communication channels
//!
//! Defines the statics shared between Embassy tasks.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use fanctl_fs::{FsClient, Mailbox};

/// Requests that may wait for the filesystem actor
const FS_QUEUE_DEPTH: usize = 4;

/// Filesystem clients alive at once
const FS_CLIENTS: usize = 4;

pub type FsMailbox = Mailbox<CriticalSectionRawMutex, FS_QUEUE_DEPTH, FS_CLIENTS>;
pub type Client = FsClient<'static, CriticalSectionRawMutex, FS_QUEUE_DEPTH, FS_CLIENTS>;

/// Requests to the filesystem actor and its replies
pub static FS_MAILBOX: FsMailbox = Mailbox::new();

/// Raised once the filesystem task has mounted (true) or given up (false)
pub static FS_READY: Signal<CriticalSectionRawMutex, bool> = Signal::new();
