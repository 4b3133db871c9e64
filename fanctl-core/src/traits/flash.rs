//! Serial NOR flash capability

use super::device::Device;

/// Fixed layout of an identified flash part
///
/// Only produced once the driver is `Ready`; drivers hand it out as
/// `Option<FlashGeometry>` so it cannot be consulted earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashGeometry {
    /// Program granularity; a program must not cross a page boundary
    pub page_size: u32,
    /// Erase granularity
    pub sector_size: u32,
    pub sector_count: u32,
    pub total_size: u32,
    /// Value every byte reads back as after erase
    pub erased_byte: u8,
}

impl FlashGeometry {
    /// Byte offset of the first byte of `sector`
    pub fn sector_offset(&self, sector: u32) -> u32 {
        sector * self.sector_size
    }

    /// Whether `[offset, offset + len)` lies inside the device
    pub fn contains(&self, offset: u32, len: usize) -> bool {
        (offset as u64) + (len as u64) <= self.total_size as u64
    }
}

/// JEDEC identification bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity {
    pub manufacturer: u8,
    pub memory_type: u8,
    /// log2 of the capacity in bytes
    pub capacity: u8,
}

/// Outcome of polling an erase in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EraseStatus {
    /// Still erasing; poll again after `retry_ms`
    Busy { retry_ms: u32 },
    Done,
}

/// Errors from flash drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError<E> {
    /// Bus transaction failed, error passed through unchanged
    Bus(E),
    /// Identity bytes failed the whitelist
    NotFound,
    /// Data operation attempted outside the Ready state
    NotReady,
    /// A byte did not read back as erased
    Verify,
    /// Access past the end of the device
    OutOfBounds,
    /// Device stayed busy past the poll limit
    Timeout,
}

impl<E> From<E> for FlashError<E> {
    fn from(err: E) -> Self {
        FlashError::Bus(err)
    }
}

/// Serial NOR flash
///
/// Erase is split in two: `start_erase_*` kicks the hardware and returns,
/// `query_erase` reports progress. Whoever needs a blocking erase polls.
pub trait FlashDevice: Device {
    /// Identification bytes read by the last `start()`
    fn identity(&self) -> Option<DeviceIdentity>;

    /// Geometry, `None` unless the driver is `Ready`
    fn geometry(&self) -> Option<FlashGeometry>;

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Program `data` at `offset`, split at page boundaries
    ///
    /// Stops at the first failing page; pages already written stay written.
    fn program(
        &mut self,
        offset: u32,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Begin erasing `sector`; completion is reported by [`Self::query_erase`]
    fn start_erase_sector(&mut self, sector: u32) -> Result<(), Self::Error>;

    /// Begin erasing the whole device
    fn start_erase_all(&mut self) -> Result<(), Self::Error>;

    /// Poll the erase started last
    fn query_erase(&mut self) -> Result<EraseStatus, Self::Error>;

    /// Check every byte of `sector` reads back erased
    fn verify_erase(&mut self, sector: u32) -> Result<(), Self::Error>;

    /// Read the SFDP table; not used by this firmware
    fn read_sfdp(&mut self, _offset: u32, _buf: &mut [u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Enter execute-in-place mode; not used by this firmware
    fn activate_xip(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Leave execute-in-place mode; not used by this firmware
    fn reset_xip(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One page-bounded piece of a program operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunk {
    /// Device address of the chunk
    pub address: u32,
    /// Start of the chunk within the caller's data
    pub start: usize,
    pub len: usize,
}

/// Split `[offset, offset + len)` into pieces that never cross a page
///
/// Each chunk is `min(remaining, page_size - address % page_size)` long.
pub fn page_chunks(offset: u32, len: usize, page_size: u32) -> PageChunks {
    PageChunks {
        address: offset,
        start: 0,
        remaining: len,
        page_size,
    }
}

/// Iterator returned by [`page_chunks`]
#[derive(Debug, Clone)]
pub struct PageChunks {
    address: u32,
    start: usize,
    remaining: usize,
    page_size: u32,
}

impl Iterator for PageChunks {
    type Item = PageChunk;

    fn next(&mut self) -> Option<PageChunk> {
        if self.remaining == 0 || self.page_size == 0 {
            return None;
        }

        let room = (self.page_size - self.address % self.page_size) as usize;
        let len = room.min(self.remaining);
        let chunk = PageChunk {
            address: self.address,
            start: self.start,
            len,
        };

        self.address += len as u32;
        self.start += len;
        self.remaining -= len;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chunks_straddling_page() {
        let chunks: heapless::Vec<PageChunk, 4> = page_chunks(253, 10, 256).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], PageChunk { address: 253, start: 0, len: 3 });
        assert_eq!(chunks[1], PageChunk { address: 256, start: 3, len: 7 });
    }

    #[test]
    fn test_aligned_full_page_is_one_chunk() {
        let mut chunks = page_chunks(512, 256, 256);
        assert_eq!(chunks.next(), Some(PageChunk { address: 512, start: 0, len: 256 }));
        assert_eq!(chunks.next(), None);
    }

    #[test]
    fn test_empty_program_has_no_chunks() {
        assert_eq!(page_chunks(100, 0, 256).count(), 0);
    }

    #[test]
    fn test_geometry_bounds() {
        let geo = FlashGeometry {
            page_size: 256,
            sector_size: 4096,
            sector_count: 16,
            total_size: 65536,
            erased_byte: 0xFF,
        };
        assert_eq!(geo.sector_offset(3), 12288);
        assert!(geo.contains(65535, 1));
        assert!(!geo.contains(65535, 2));
        assert!(!geo.contains(u32::MAX, 1));
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_range_without_crossing_pages(
            offset in 0u32..0x0100_0000,
            len in 0usize..2048,
            page_shift in 4u32..10,
        ) {
            let page = 1u32 << page_shift;
            let mut expected_addr = offset;
            let mut expected_start = 0usize;

            for chunk in page_chunks(offset, len, page) {
                prop_assert!(chunk.len > 0);
                prop_assert_eq!(chunk.address, expected_addr);
                prop_assert_eq!(chunk.start, expected_start);
                // first and last byte land in the same page
                let last = chunk.address + chunk.len as u32 - 1;
                prop_assert_eq!(chunk.address / page, last / page);

                expected_addr += chunk.len as u32;
                expected_start += chunk.len;
            }

            prop_assert_eq!(expected_start, len);
        }
    }
}
