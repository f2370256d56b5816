//! Single-page write-coalescing cache
//!
//! Presents byte-addressable reads and writes over a medium that is only
//! written efficiently in whole, aligned pages. Unaligned or partial
//! writes are merged into one resident page buffer which is written out
//! when another page is touched or on an explicit flush.
//!
//! ```text
//!          write (partial)            flush ok
//!  Empty ─────────────────▶ Dirty ─────────────▶ Empty
//! ```
//!
//! Reads never populate or evict the buffer: they are served from RAM
//! for the resident page and straight from the medium otherwise.

use flashpage_hal::medium::advance;
use flashpage_hal::{Medium, MediumError};

/// Cache slot status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CacheStatus {
    /// No page resident
    Empty,
    /// Page resident and clean; never entered by this cache
    HasData,
    /// Page resident with writes not yet on the medium
    Dirty,
}

/// Called with the resident page right before it is written to the medium
///
/// The hook may finalize the page in place, e.g. stamp a checksum. It is
/// only invoked for dirty pages.
pub trait PreFlush {
    fn before_flush(&mut self, page: &mut [u8], address: u32);
}

impl<F: FnMut(&mut [u8], u32)> PreFlush for F {
    fn before_flush(&mut self, page: &mut [u8], address: u32) {
        self(page, address)
    }
}

/// Hook that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl PreFlush for NoHook {
    fn before_flush(&mut self, _page: &mut [u8], _address: u32) {}
}

/// One-page cache in front of a medium
pub struct PageCache<M, const PAGE: usize> {
    medium: M,
    /// Page-aligned address of the resident page
    address: u32,
    status: CacheStatus,
    buffer: [u8; PAGE],
}

impl<M: Medium, const PAGE: usize> PageCache<M, PAGE> {
    const VALID_PAGE: () = assert!(
        PAGE.is_power_of_two() && PAGE <= u32::MAX as usize,
        "page size must be a power of two"
    );

    /// Page size in bytes
    pub const PAGE_SIZE: usize = PAGE;

    /// Create an empty cache
    pub fn new(medium: M) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_PAGE;
        Self {
            medium,
            address: 0,
            status: CacheStatus::Empty,
            buffer: [0; PAGE],
        }
    }

    /// Current status
    pub fn status(&self) -> CacheStatus {
        self.status
    }

    /// Start address of the resident page, if any
    pub fn address(&self) -> Option<u32> {
        match self.status {
            CacheStatus::Empty => None,
            _ => Some(self.address),
        }
    }

    /// Whether `address` falls in the resident page
    pub fn is_cached(&self, address: u32) -> bool {
        self.status != CacheStatus::Empty && self.address == page_base::<PAGE>(address)
    }

    /// Drop the resident page without writing it
    pub fn clear(&mut self) {
        self.status = CacheStatus::Empty;
    }

    /// Write the resident page out if it is dirty
    pub fn flush(&mut self) -> Result<(), MediumError> {
        self.flush_with(&mut NoHook)
    }

    /// Write the resident page out if it is dirty, running `hook` first
    ///
    /// On a medium failure the page stays dirty and nothing is retried.
    pub fn flush_with<H: PreFlush + ?Sized>(&mut self, hook: &mut H) -> Result<(), MediumError> {
        if self.status != CacheStatus::Dirty {
            return Ok(());
        }

        hook.before_flush(&mut self.buffer, self.address);
        if let Err(e) = self.medium.write(self.address, &self.buffer) {
            warn!("flush of page {} failed: {:?}", self.address, e);
            return Err(e);
        }

        trace!("flushed page {}", self.address);
        self.clear();
        Ok(())
    }

    /// Write `data` at any address, spanning as many pages as needed
    ///
    /// Whole aligned pages go straight to the medium. Partial pages are
    /// merged into the buffer, which may first flush a different dirty page
    /// (running `hook`).
    pub fn write_with<H: PreFlush + ?Sized>(
        &mut self,
        address: u32,
        data: &[u8],
        hook: &mut H,
    ) -> Result<(), MediumError> {
        let mut address = address;
        let mut data = data;

        while !data.is_empty() {
            let offset = page_offset::<PAGE>(address);

            if offset == 0 && data.len() >= PAGE {
                let (page, rest) = data.split_at(PAGE);
                self.medium.write(address, page)?;
                if self.is_cached(address) {
                    // Every byte of the resident page was just replaced
                    self.clear();
                }
                trace!("direct write of page {}", address);
                address = advance(address, PAGE)?;
                data = rest;
                continue;
            }

            self.select(address, hook)?;

            let len = (PAGE - offset).min(data.len());
            if self.status == CacheStatus::Empty {
                self.fill(offset, len)?;
            }
            self.buffer[offset..offset + len].copy_from_slice(&data[..len]);
            self.status = CacheStatus::Dirty;

            address = advance(address, len)?;
            data = &data[len..];
        }
        Ok(())
    }

    /// Make the page holding `address` the resident one
    fn select<H: PreFlush + ?Sized>(
        &mut self,
        address: u32,
        hook: &mut H,
    ) -> Result<(), MediumError> {
        if self.status == CacheStatus::Dirty && !self.is_cached(address) {
            self.flush_with(hook)?;
        }
        self.address = page_base::<PAGE>(address);
        Ok(())
    }

    /// Load the bytes of a freshly selected page around the span being written
    fn fill(&mut self, offset: usize, len: usize) -> Result<(), MediumError> {
        if offset > 0 {
            self.medium.read(self.address, &mut self.buffer[..offset])?;
        }
        let end = offset + len;
        if end < PAGE {
            let suffix = advance(self.address, end)?;
            self.medium.read(suffix, &mut self.buffer[end..])?;
        }
        Ok(())
    }

    /// Get the medium
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Get the medium, mutable
    ///
    /// Writes made here bypass the resident page.
    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    /// Release the medium; an unflushed page is lost
    pub fn into_inner(self) -> M {
        self.medium
    }
}

impl<M: Medium, const PAGE: usize> Medium for PageCache<M, PAGE> {
    type Checksum = M::Checksum;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), MediumError> {
        let mut address = address;
        let mut done = 0;

        while done < buf.len() {
            let offset = page_offset::<PAGE>(address);
            let len = (PAGE - offset).min(buf.len() - done);
            let out = &mut buf[done..done + len];

            if self.is_cached(address) {
                out.copy_from_slice(&self.buffer[offset..offset + len]);
            } else {
                self.medium.read(address, out)?;
            }

            address = advance(address, len)?;
            done += len;
        }
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MediumError> {
        self.write_with(address, data, &mut NoHook)
    }

    fn capacity(&self) -> u32 {
        self.medium.capacity()
    }
}

fn page_base<const PAGE: usize>(address: u32) -> u32 {
    address & !(PAGE as u32 - 1)
}

fn page_offset<const PAGE: usize>(address: u32) -> usize {
    address as usize & (PAGE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashpage_hal::{RamMedium, WriteRecord};

    const PAGE: usize = 256;

    type Cache = PageCache<RamMedium<1024>, PAGE>;

    fn cache() -> Cache {
        PageCache::new(RamMedium::new())
    }

    /// Medium pre-filled with a recognizable pattern
    fn patterned() -> Cache {
        let mut medium = RamMedium::<1024>::new();
        for (i, b) in medium.as_bytes_mut().iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        PageCache::new(medium)
    }

    #[test]
    fn test_starts_empty() {
        let cache = cache();
        assert_eq!(cache.status(), CacheStatus::Empty);
        assert_eq!(cache.address(), None);
        assert!(!cache.is_cached(0));
    }

    #[test]
    fn test_partial_write_stays_in_ram() {
        let mut cache = cache();
        cache.write(5, &[0xAA; 10]).unwrap();

        assert_eq!(cache.status(), CacheStatus::Dirty);
        assert_eq!(cache.address(), Some(0));
        assert_eq!(cache.medium().write_count(), 0);
        assert!(cache.medium().as_bytes()[5..15].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_to_other_page_flushes_first() {
        let mut cache = cache();
        cache.write(5, &[0xAA; 10]).unwrap();
        cache.write(300, &[0xBB; 10]).unwrap();

        assert_eq!(
            cache.medium().write_log(),
            &[WriteRecord { address: 0, len: 256 }]
        );
        assert!(cache.medium().as_bytes()[5..15].iter().all(|&b| b == 0xAA));
        assert_eq!(cache.address(), Some(256));
        assert_eq!(cache.status(), CacheStatus::Dirty);
    }

    #[test]
    fn test_full_aligned_page_bypasses_cache() {
        let mut cache = cache();
        cache.write(5, &[0xAA; 10]).unwrap();
        cache.write(256, &[0xCC; 256]).unwrap();

        assert_eq!(cache.status(), CacheStatus::Dirty);
        assert_eq!(cache.address(), Some(0));
        assert_eq!(
            cache.medium().write_log(),
            &[WriteRecord { address: 256, len: 256 }]
        );
    }

    #[test]
    fn test_full_page_over_resident_page_supersedes_it() {
        let mut cache = cache();
        cache.write(5, &[0xAA; 10]).unwrap();
        cache.write(0, &[0xCC; 256]).unwrap();

        assert_eq!(cache.status(), CacheStatus::Empty);
        cache.flush().unwrap();
        assert_eq!(cache.medium().write_count(), 1);
        assert!(cache.medium().as_bytes()[..256].iter().all(|&b| b == 0xCC));
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let mut cache = cache();
        let mut calls = 0;
        cache.flush_with(&mut |_: &mut [u8], _: u32| calls += 1).unwrap();

        assert_eq!(calls, 0);
        assert_eq!(cache.medium().write_count(), 0);
    }

    #[test]
    fn test_prefix_and_suffix_preserved() {
        let mut cache = patterned();
        let before: [u8; 256] = core::array::from_fn(|i| cache.medium().as_bytes()[256 + i]);

        cache.write(256 + 100, &[0xEE; 20]).unwrap();
        cache.flush().unwrap();

        let after = &cache.medium().as_bytes()[256..512];
        assert_eq!(&after[..100], &before[..100]);
        assert!(after[100..120].iter().all(|&b| b == 0xEE));
        assert_eq!(&after[120..], &before[120..]);
    }

    #[test]
    fn test_second_write_to_resident_page_does_not_refill() {
        let mut cache = patterned();
        cache.write(10, &[1; 4]).unwrap();
        // Change the medium behind the cache; a refill would pick this up
        cache.medium_mut().as_bytes_mut()[50] = 0x00;
        cache.write(20, &[2; 4]).unwrap();
        cache.flush().unwrap();

        assert_eq!(cache.medium().as_bytes()[50], 50);
    }

    #[test]
    fn test_read_sees_unflushed_writes() {
        let mut cache = patterned();
        cache.write(250, &[0x11; 12]).unwrap();

        let mut buf = [0u8; 20];
        cache.read(245, &mut buf).unwrap();

        assert_eq!(&buf[..5], &[245u8, 246, 247, 248, 249]);
        assert!(buf[5..17].iter().all(|&b| b == 0x11));
        // 262 % 251 onwards
        assert_eq!(&buf[17..], &[11u8, 12, 13]);
    }

    #[test]
    fn test_read_does_not_evict() {
        let mut cache = cache();
        cache.write(3, &[9; 3]).unwrap();

        let mut buf = [0u8; 8];
        cache.read(700, &mut buf).unwrap();

        assert_eq!(cache.status(), CacheStatus::Dirty);
        assert_eq!(cache.address(), Some(0));
        assert_eq!(cache.medium().write_count(), 0);
    }

    #[test]
    fn test_write_spanning_pages() {
        let mut cache = cache();
        let data: [u8; 600] = core::array::from_fn(|i| i as u8);
        cache.write(200, &data).unwrap();

        // Pages 1 and 2 go direct; page 0 is flushed once page 3 is touched
        assert_eq!(
            cache.medium().write_log(),
            &[
                WriteRecord { address: 256, len: 256 },
                WriteRecord { address: 512, len: 256 },
                WriteRecord { address: 0, len: 256 },
            ]
        );
        assert_eq!(cache.address(), Some(768));

        cache.flush().unwrap();
        assert_eq!(&cache.medium().as_bytes()[200..800], &data[..]);
    }

    #[test]
    fn test_hook_runs_before_write_and_can_edit() {
        let mut cache = cache();
        cache.write(0, &[0u8; 4]).unwrap();

        let mut seen = None;
        let mut hook = |page: &mut [u8], address: u32| {
            page[255] = 0x5A;
            seen = Some((address, page.len()));
        };
        cache.flush_with(&mut hook).unwrap();

        assert_eq!(seen, Some((0, 256)));
        assert_eq!(cache.medium().as_bytes()[255], 0x5A);
    }

    #[test]
    fn test_hook_runs_on_implicit_flush() {
        let mut cache = cache();
        let mut flushed = heapless::Vec::<u32, 4>::new();
        let mut hook = |_: &mut [u8], address: u32| {
            let _ = flushed.push(address);
        };

        cache.write_with(10, &[1], &mut hook).unwrap();
        cache.write_with(600, &[2], &mut hook).unwrap();
        drop(hook);

        assert_eq!(&flushed[..], &[0]);
    }

    #[test]
    fn test_failed_flush_stays_dirty() {
        let mut cache = cache();
        cache.write(1, &[7; 2]).unwrap();
        cache.medium_mut().set_fail_writes(true);

        assert_eq!(cache.flush(), Err(MediumError::Write));
        assert_eq!(cache.status(), CacheStatus::Dirty);

        cache.medium_mut().set_fail_writes(false);
        cache.flush().unwrap();
        assert_eq!(cache.status(), CacheStatus::Empty);
        assert_eq!(&cache.medium().as_bytes()[1..3], &[7, 7]);
    }

    #[test]
    fn test_failed_implicit_flush_keeps_old_page() {
        let mut cache = cache();
        cache.write(1, &[7; 2]).unwrap();
        cache.medium_mut().set_fail_writes(true);

        assert_eq!(cache.write(300, &[8]), Err(MediumError::Write));
        assert_eq!(cache.address(), Some(0));
        assert!(cache.is_cached(2));
    }

    #[test]
    fn test_clear_discards() {
        let mut cache = cache();
        cache.write(1, &[7; 2]).unwrap();
        cache.clear();
        cache.flush().unwrap();

        assert_eq!(cache.medium().write_count(), 0);
        let mut buf = [0u8; 2];
        cache.read(1, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
    }

    #[test]
    fn test_zero_length_write_is_noop() {
        let mut cache = cache();
        cache.write(17, &[]).unwrap();
        assert_eq!(cache.status(), CacheStatus::Empty);
    }

    #[test]
    fn test_compare_and_crc_go_through_cache() {
        use flashpage_hal::{Checksum, Crc32};

        let mut cache = cache();
        cache.write(40, b"cached").unwrap();

        assert!(cache.compare(40, b"cached").unwrap());
        assert_eq!(cache.calculate_crc(40, 6).unwrap(), Crc32::of(b"cached"));
    }
}
