//! Filesystem actor against a simulated W25Q behind the block adapter

use core::cell::Cell;
use core::future::Future;

use embassy_futures::block_on;
use embassy_futures::join::join3;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_storage_async::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use fanctl_core::fs::{file_name, status_code, FsError, MAX_FILE_LEN};
use fanctl_core::traits::Device;
use fanctl_core::Identity;
use fanctl_drivers::flash::{BlockConfig, NorBlockDevice, W25q, W25qConfig};
use fanctl_drivers::sim::{SimDelay, SimNorFlash};
use fanctl_fs::identity::{IdentityError, IdentityStore, IDENTITY_FILE, IDENTITY_TMP_FILE};
use fanctl_fs::{FsActor, Mailbox, Volume};

type Dev<'a> = NorBlockDevice<W25q<&'a mut SimNorFlash, SimDelay>, SimDelay>;
type TestMailbox = Mailbox<NoopRawMutex, 4, 4>;

const SECTOR: u32 = 4096;
const RANGE: core::ops::Range<u32> = 0..8 * SECTOR;

fn device(sim: &mut SimNorFlash) -> Dev<'_> {
    let mut flash = W25q::new(sim, SimDelay::default(), W25qConfig::default());
    flash.start().unwrap();
    NorBlockDevice::new(flash, SimDelay::default(), BlockConfig::default()).unwrap()
}

fn start(sim: &mut SimNorFlash, range: core::ops::Range<u32>) -> FsActor<Dev<'_>> {
    block_on(FsActor::start(device(sim), range)).unwrap()
}

/// Drive `work` while the actor serves the mailbox
fn serve<F: Future>(actor: &mut FsActor<Dev<'_>>, mailbox: &TestMailbox, work: F) -> F::Output {
    block_on(async {
        match select(actor.run(mailbox), work).await {
            Either::First(()) => unreachable!("actor stopped"),
            Either::Second(out) => out,
        }
    })
}

/// Flash that, once `fail_rewrites` is set, refuses writes below
/// everything programmed up to that point. Appending still works.
struct AppendOnlyFlash<'a, F> {
    inner: F,
    high_water: u32,
    limit: Option<u32>,
    fail_rewrites: &'a Cell<bool>,
}

impl<'a, F> AppendOnlyFlash<'a, F> {
    fn new(inner: F, fail_rewrites: &'a Cell<bool>) -> Self {
        Self {
            inner,
            high_water: 0,
            limit: None,
            fail_rewrites,
        }
    }
}

impl<F: ErrorType> ErrorType for AppendOnlyFlash<'_, F> {
    type Error = NorFlashErrorKind;
}

impl<F: ReadNorFlash> ReadNorFlash for AppendOnlyFlash<'_, F> {
    const READ_SIZE: usize = F::READ_SIZE;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read(offset, bytes).await.map_err(|e| e.kind())
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<F: NorFlash> NorFlash for AppendOnlyFlash<'_, F> {
    const WRITE_SIZE: usize = F::WRITE_SIZE;
    const ERASE_SIZE: usize = F::ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.inner.erase(from, to).await.map_err(|e| e.kind())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_rewrites.get() {
            let limit = *self.limit.get_or_insert(self.high_water);
            if offset < limit {
                return Err(NorFlashErrorKind::Other);
            }
        }
        self.inner.write(offset, bytes).await.map_err(|e| e.kind())?;
        self.high_water = self.high_water.max(offset + bytes.len() as u32);
        Ok(())
    }
}

impl<F: MultiwriteNorFlash> MultiwriteNorFlash for AppendOnlyFlash<'_, F> {}

#[test]
fn test_first_boot_formats_then_writes_and_reads() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();

    let (written, read) = serve(&mut actor, &mailbox, async {
        let written = client.write("cfg", b"hello").await;
        let mut buf = [0u8; 16];
        let read = client.read("cfg", &mut buf).await.map(|n| buf[..n].to_vec());
        (written, read)
    });

    assert_eq!(status_code(written), 5);
    assert_eq!(read.unwrap(), b"hello");
    assert_eq!(actor.served(), 2);
}

#[test]
fn test_format_erases_whole_range() {
    let mut sim = SimNorFlash::new(16);
    drop(start(&mut sim, RANGE));
    let erased: Vec<u32> = sim.erase_log().to_vec();
    for sector in 0..8 {
        assert!(erased.contains(&(sector * SECTOR)));
    }
    assert!(erased.iter().all(|&a| a < RANGE.end));
}

#[test]
fn test_files_survive_remount() {
    let mut sim = SimNorFlash::new(16);
    let mailbox = TestMailbox::new();
    {
        let mut actor = start(&mut sim, RANGE);
        let mut client = mailbox.client().unwrap();
        let r = serve(&mut actor, &mailbox, client.write("boot", &[1, 2, 3]));
        assert_eq!(r, Ok(3));
    }

    sim.clear_logs();
    let mut actor = start(&mut sim, RANGE);
    let mut client = mailbox.client().unwrap();
    let mut buf = [0u8; 8];
    let n = serve(&mut actor, &mailbox, client.read("boot", &mut buf)).unwrap();
    assert_eq!(&buf[..n], &[1, 2, 3]);
    drop(client);
    drop(actor);

    // Mounted without reformatting
    assert!(sim.erase_log().is_empty());
}

#[test]
fn test_mismatched_superblock_reformats() {
    let mut sim = SimNorFlash::new(16);
    let mailbox = TestMailbox::new();
    {
        let mut actor = start(&mut sim, 0..4 * SECTOR);
        let mut client = mailbox.client().unwrap();
        serve(&mut actor, &mailbox, client.write("old", b"x")).unwrap();
    }

    // Same flash mounted with a different layout
    let mut actor = start(&mut sim, RANGE);
    let mut client = mailbox.client().unwrap();
    let mut buf = [0u8; 4];
    let r = serve(&mut actor, &mailbox, client.read("old", &mut buf));
    assert_eq!(r, Err(FsError::NotFound));
}

#[test]
fn test_garbage_flash_is_formatted_on_start() {
    let mut sim = SimNorFlash::new(16);
    for addr in 0..RANGE.end as usize {
        sim.poke(addr, ((addr as u32).wrapping_mul(2_654_435_761) >> 24) as u8);
    }

    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();
    let (written, read) = serve(&mut actor, &mailbox, async {
        let written = client.write("x", b"hi").await;
        let mut buf = [0u8; 8];
        let read = client.read("x", &mut buf).await.map(|n| buf[..n].to_vec());
        (written, read)
    });

    assert_eq!(written, Ok(2));
    assert_eq!(read.unwrap(), b"hi");
}

#[test]
fn test_largest_file_round_trips() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();
    let data: Vec<u8> = (0..MAX_FILE_LEN).map(|i| i as u8).collect();

    let (written, too_big, read) = serve(&mut actor, &mailbox, async {
        let written = client.write("big", &data).await;
        let too_big = client.write("bigger", &[0u8; MAX_FILE_LEN + 1]).await;
        let mut buf = [0u8; MAX_FILE_LEN + 16];
        let read = client.read("big", &mut buf).await.map(|n| buf[..n].to_vec());
        (written, too_big, read)
    });

    assert_eq!(written, Ok(MAX_FILE_LEN));
    assert_eq!(too_big, Err(FsError::FileTooLarge));
    assert_eq!(read.unwrap(), data);
}

#[test]
fn test_full_volume_reports_no_space_and_keeps_files() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, 0..4 * SECTOR);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();

    let (stored, last, first) = serve(&mut actor, &mailbox, async {
        let mut stored = 0;
        let mut last = Ok(0);
        for i in 0..200u32 {
            let name = format!("f{i}");
            let data = [i as u8; MAX_FILE_LEN];
            last = client.write(&name, &data).await;
            if last.is_err() {
                break;
            }
            stored += 1;
        }

        let mut buf = [0u8; MAX_FILE_LEN];
        let first = client.read("f0", &mut buf).await.map(|n| buf[..n].to_vec());
        (stored, last, first)
    });

    assert_eq!(last, Err(FsError::NoSpace));
    assert!(stored > 0);
    assert_eq!(first.unwrap(), [0u8; MAX_FILE_LEN]);

    let mut buf = [0u8; MAX_FILE_LEN];
    let newest = format!("f{}", stored - 1);
    let n = serve(&mut actor, &mailbox, client.read(&newest, &mut buf)).unwrap();
    assert_eq!(&buf[..n], &[(stored - 1) as u8; MAX_FILE_LEN][..]);
}

#[test]
fn test_missing_file_and_rename_source() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();

    let (read, renamed) = serve(&mut actor, &mailbox, async {
        let mut buf = [0u8; 4];
        let read = client.read("nope", &mut buf).await;
        let renamed = client.rename("nope", "other").await;
        (read, renamed)
    });
    assert_eq!(read, Err(FsError::NotFound));
    assert_eq!(status_code(read), -2);
    assert_eq!(renamed, Err(FsError::NotFound));
}

#[test]
fn test_rename_replaces_target() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();

    let (old, new, same) = serve(&mut actor, &mailbox, async {
        client.write("a", b"first").await.unwrap();
        client.write("b", b"second").await.unwrap();
        client.rename("a", "b").await.unwrap();

        let mut buf = [0u8; 16];
        let old = client.read("a", &mut buf).await;
        let new = client.read("b", &mut buf).await.map(|n| buf[..n].to_vec());
        let same = client.rename("b", "b").await;
        (old, new, same)
    });

    assert_eq!(old, Err(FsError::NotFound));
    assert_eq!(new.unwrap(), b"first");
    assert_eq!(same, Ok(()));
}

#[test]
fn test_rename_succeeds_when_old_name_cannot_be_removed() {
    let mut sim = SimNorFlash::new(16);
    let fail_rewrites = Cell::new(false);
    let mut volume = Volume::new(AppendOnlyFlash::new(device(&mut sim), &fail_rewrites), RANGE);
    let old = file_name("a").unwrap();
    let new = file_name("b").unwrap();

    block_on(async {
        volume.format().await.unwrap();
        volume.write(&old, b"payload").await.unwrap();

        fail_rewrites.set(true);
        assert_eq!(volume.rename(&old, &new).await, Ok(()));

        let moved = volume.read(&new, 16).await.unwrap();
        assert_eq!(&moved[..], b"payload");
        let left = volume.read(&old, 16).await.unwrap();
        assert_eq!(&left[..], b"payload");
    });
}

#[test]
fn test_write_truncates_and_read_is_bounded() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();

    let (short, whole) = serve(&mut actor, &mailbox, async {
        client.write("log", b"0123456789").await.unwrap();
        let mut small = [0u8; 4];
        let n = client.read("log", &mut small).await.unwrap();
        let short = small[..n].to_vec();

        client.write("log", b"ab").await.unwrap();
        let mut buf = [0u8; 16];
        let n = client.read("log", &mut buf).await.unwrap();
        (short, buf[..n].to_vec())
    });

    assert_eq!(short, b"0123");
    assert_eq!(whole, b"ab");
}

#[test]
fn test_requests_served_in_arrival_order() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut a = mailbox.client().unwrap();
    let mut b = mailbox.client().unwrap();
    let mut c = mailbox.client().unwrap();

    let results = serve(
        &mut actor,
        &mailbox,
        join3(
            a.write("shared", b"from-a"),
            b.write("shared", b"from-b"),
            c.write("shared", b"from-c"),
        ),
    );
    assert_eq!(results, (Ok(6), Ok(6), Ok(6)));

    let mut buf = [0u8; 16];
    let n = serve(&mut actor, &mailbox, a.read("shared", &mut buf)).unwrap();
    assert_eq!(&buf[..n], b"from-c");
}

#[test]
fn test_identity_saved_through_temp_file() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();
    let identity = Identity {
        vendor_id: 0x1209,
        product_id: 0x0001,
        revision: 3,
        serial: 0xDEAD_BEEF,
    };

    let (before, loaded, tmp) = serve(&mut actor, &mailbox, async {
        let before = IdentityStore::new(&mut client).load().await;
        IdentityStore::new(&mut client).save(&identity).await.unwrap();
        let loaded = IdentityStore::new(&mut client).load().await;

        let mut buf = [0u8; 16];
        let tmp = client.read(IDENTITY_TMP_FILE, &mut buf).await;
        (before, loaded, tmp)
    });

    assert_eq!(before, Err(IdentityError::Fs(FsError::NotFound)));
    assert_eq!(loaded, Ok(identity));
    assert_eq!(tmp, Err(FsError::NotFound));
}

#[test]
fn test_identity_rejects_wrong_length() {
    let mut sim = SimNorFlash::new(16);
    let mut actor = start(&mut sim, RANGE);
    let mailbox = TestMailbox::new();
    let mut client = mailbox.client().unwrap();

    let loaded = serve(&mut actor, &mailbox, async {
        client.write(IDENTITY_FILE, &[0u8; 10]).await.unwrap();
        IdentityStore::new(&mut client).load().await
    });
    assert_eq!(loaded, Err(IdentityError::BadLength(10)));
}
