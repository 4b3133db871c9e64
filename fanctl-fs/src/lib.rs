//! Filesystem service
//!
//! One task owns the mounted [`Volume`] through an [`FsActor`]; every other
//! task talks to it with an [`FsClient`] handed out by a shared
//! [`Mailbox`]. Requests are served one at a time in arrival order and the
//! caller waits for its reply.
//!
//! ```text
//! FsClient ──request──> Mailbox ──> FsActor ──> Volume ──> NorFlash
//!     ▲                    │
//!     └──────reply─────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
extern crate fanctl_core;

pub mod actor;
pub mod identity;
pub mod mailbox;
pub mod volume;

pub use actor::FsActor;
pub use mailbox::{FsClient, Mailbox};
pub use volume::Volume;
