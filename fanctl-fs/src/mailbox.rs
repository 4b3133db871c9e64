//! Request/reply plumbing between clients and the filesystem actor
//!
//! Requests queue on one bounded channel, so the actor serves them in the
//! order they were sent. Each client owns a reply slot; a call sends its
//! request and then waits on that slot, which makes every call a
//! rendezvous with the actor.
//!
//! Every request carries a sequence number that comes back with its reply.
//! A call dropped after its request was queued still gets answered; the
//! stale reply is discarded by whichever call waits on the slot next.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use fanctl_core::fs::{file_data, file_name, FsError, FsRequest, FsResponse, FsResult, MAX_FILE_LEN};

/// A request tagged with the reply slot of its sender
#[derive(Debug)]
pub struct Envelope {
    pub slot: usize,
    pub seq: u32,
    pub request: FsRequest,
}

/// Claimed slots and the next sequence number
#[derive(Clone, Copy)]
struct Slots {
    claimed: u32,
    next_seq: u32,
}

/// Shared mailbox of the filesystem actor
///
/// `DEPTH` bounds the request queue; `CLIENTS` is the number of client
/// handles that can exist at once (at most 32).
pub struct Mailbox<M: RawMutex, const DEPTH: usize, const CLIENTS: usize> {
    requests: Channel<M, Envelope, DEPTH>,
    replies: [Signal<M, (u32, FsResult)>; CLIENTS],
    slots: BlockingMutex<M, Cell<Slots>>,
}

impl<M: RawMutex, const DEPTH: usize, const CLIENTS: usize> Mailbox<M, DEPTH, CLIENTS> {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            replies: [const { Signal::new() }; CLIENTS],
            slots: BlockingMutex::new(Cell::new(Slots {
                claimed: 0,
                next_seq: 0,
            })),
        }
    }

    /// Claim a free reply slot; `None` once `CLIENTS` handles are alive
    pub fn client(&self) -> Option<FsClient<'_, M, DEPTH, CLIENTS>> {
        let slot = self.slots.lock(|slots| {
            let mut state = slots.get();
            let slot = (0..CLIENTS.min(32)).find(|i| state.claimed & (1 << i) == 0)?;
            state.claimed |= 1 << slot;
            slots.set(state);
            Some(slot)
        })?;
        Some(FsClient { mailbox: self, slot })
    }

    fn release(&self, slot: usize) {
        self.slots.lock(|slots| {
            let mut state = slots.get();
            state.claimed &= !(1 << slot);
            slots.set(state);
        });
    }

    /// Sequence numbers are shared by all slots, so a reused slot never
    /// sees a number its previous owner was waiting for
    fn next_seq(&self) -> u32 {
        self.slots.lock(|slots| {
            let mut state = slots.get();
            let seq = state.next_seq;
            state.next_seq = seq.wrapping_add(1);
            slots.set(state);
            seq
        })
    }

    /// Next request, waiting if the queue is empty
    pub async fn receive(&self) -> Envelope {
        self.requests.receive().await
    }

    /// Deliver the result for request `seq` that came from `slot`
    pub fn reply(&self, slot: usize, seq: u32, result: FsResult) {
        match self.replies.get(slot) {
            Some(signal) => signal.signal((seq, result)),
            None => log_error!("fs: reply to unknown slot {}", slot),
        }
    }
}

impl<M: RawMutex, const DEPTH: usize, const CLIENTS: usize> Default
    for Mailbox<M, DEPTH, CLIENTS>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Caller handle for the filesystem actor
///
/// Calls take `&mut self`, so a client has at most one request in flight.
/// Dropping the handle frees its slot.
pub struct FsClient<'a, M: RawMutex, const DEPTH: usize, const CLIENTS: usize> {
    mailbox: &'a Mailbox<M, DEPTH, CLIENTS>,
    slot: usize,
}

impl<M: RawMutex, const DEPTH: usize, const CLIENTS: usize> FsClient<'_, M, DEPTH, CLIENTS> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    async fn call(&mut self, request: FsRequest) -> FsResult {
        let seq = self.mailbox.next_seq();
        let reply = &self.mailbox.replies[self.slot];
        reply.reset();
        self.mailbox
            .requests
            .send(Envelope {
                slot: self.slot,
                seq,
                request,
            })
            .await;

        loop {
            let (got, result) = reply.wait().await;
            if got == seq {
                return result;
            }
            log_debug!("fs: dropping stale reply {=u32} on slot {}", got, self.slot);
        }
    }

    /// Read `name` into `buf`, returning the byte count
    ///
    /// At most `buf.len()` bytes are read; a longer file is cut short.
    pub async fn read(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        let request = FsRequest::Read {
            name: file_name(name)?,
            max_len: buf.len().min(MAX_FILE_LEN),
        };
        match self.call(request).await? {
            FsResponse::Read(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            _ => Err(FsError::Io),
        }
    }

    /// Create or truncate `name` and write `data`, returning the byte count
    pub async fn write(&mut self, name: &str, data: &[u8]) -> Result<usize, FsError> {
        let request = FsRequest::Write {
            name: file_name(name)?,
            data: file_data(data)?,
        };
        match self.call(request).await? {
            FsResponse::Written(len) => Ok(len),
            _ => Err(FsError::Io),
        }
    }

    /// Rename `old` to `new`, replacing any file called `new`
    ///
    /// `Ok` means `new` holds the data. If the old entry could not be
    /// removed afterwards it is still readable under `old`.
    pub async fn rename(&mut self, old: &str, new: &str) -> Result<(), FsError> {
        let request = FsRequest::Rename {
            old: file_name(old)?,
            new: file_name(new)?,
        };
        match self.call(request).await? {
            FsResponse::Renamed => Ok(()),
            _ => Err(FsError::Io),
        }
    }
}

impl<M: RawMutex, const DEPTH: usize, const CLIENTS: usize> Drop for FsClient<'_, M, DEPTH, CLIENTS> {
    fn drop(&mut self) {
        self.mailbox.release(self.slot);
    }
}
