//! Main store API.
//!
//! A `Folio` owns one backing file holding many independently allocated
//! byte streams. Each stream is a singly-linked chain of pages addressed by
//! the 32-bit index of its head page (the handle). Free pages form a
//! singly-linked list rooted at the file header's `first_free_page`; the
//! file grows one chapter (16 MiB) at a time when the list runs dry.

use crate::checksum;
use crate::error::{FolioError, Result};
use crate::header::Header;
use crate::io::FolioFile;
use crate::options::Options;
use crate::page::{
    PageHeader, PageStatus, CHAPTER_BYTES, PAGES_PER_CHAPTER, PAGE_DATA_OFFSET, PAGE_DATA_SIZE,
    PAGE_SIZE,
};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Hard ceiling on the page index space (indices are 32-bit).
const MAX_PAGES: u64 = 1 << 32;

/// Streams cannot exceed 2^32 - 1 bytes.
const MAX_STREAM_BYTES: u64 = u32::MAX as u64;

/// `read_all` materializes the whole stream; cap it at 2^31 - 1 bytes.
const MAX_READ_ALL_BYTES: u32 = i32::MAX as u32;

/// Paged compound file store.
///
/// All operations are serialized by a single store-wide mutex and run to
/// completion; a completed operation is totally ordered with respect to any
/// later one. The documented contract is that the caller invokes
/// [`Folio::close`]; dropping an unclosed store writes the header and
/// flushes on a best-effort basis.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::{Folio, Options};
///
/// # fn main() -> folio::Result<()> {
/// let store = Folio::open("data.folio", Options::default())?;
///
/// let handle = store.allocate(100)?;
/// store.write(handle, b"hello, folio")?;
/// assert_eq!(store.read_all(handle)?, b"hello, folio");
///
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Folio {
    inner: Mutex<Option<Inner>>,
}

/// Store statistics.
#[derive(Debug, Clone)]
pub struct FolioStats {
    pub chapter_count: u32,
    pub total_pages: u64,
    pub free_pages: u64,
    pub first_free_page: u32,
}

struct Inner {
    file: FolioFile,
    header: Header,
    chapter_count: u32,
    opts: Options,
}

impl Folio {
    /// Opens a store, creating and initializing the backing file if it does
    /// not exist or is empty.
    ///
    /// A fresh store is one chapter long: page 0 holds the file header and
    /// pages 1..4096 form the initial free-list.
    pub fn open<P: AsRef<Path>>(path: P, opts: Options) -> Result<Folio> {
        let mut file = FolioFile::open(path.as_ref(), &opts)?;
        let len = file.len()?;

        let inner = if len == 0 {
            info!("creating folio at {:?}", path.as_ref());
            let mut inner = Inner {
                file,
                header: Header::new(),
                chapter_count: 0,
                opts,
            };
            inner.add_chapter()?;
            inner.write_header()?;
            inner.file.sync()?;
            inner
        } else {
            if len < CHAPTER_BYTES || len % CHAPTER_BYTES != 0 {
                return Err(FolioError::CorruptData(format!(
                    "backing file length {} is not a whole number of chapters",
                    len
                )));
            }

            let mut page0 = vec![0u8; PAGE_SIZE];
            file.read_page(0, &mut page0)?;
            let header = Header::from_bytes(&page0)?;
            let chapter_count = (len / CHAPTER_BYTES) as u32;

            info!(
                "opened folio at {:?} ({} chapters)",
                path.as_ref(),
                chapter_count
            );
            Inner {
                file,
                header,
                chapter_count,
                opts,
            }
        };

        Ok(Folio {
            inner: Mutex::new(Some(inner)),
        })
    }

    /// Reserves a chain of pages sized for `size` bytes and returns its
    /// handle.
    ///
    /// `size == 0` still reserves a single page. The stream's length stays
    /// 0 until the first write establishes it.
    pub fn allocate(&self, size: u32) -> Result<u32> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        let handle = inner.allocate_chain(size)?;
        inner.finish_mutation()?;
        Ok(handle)
    }

    /// Releases a stream's pages back onto the free-list.
    ///
    /// The freed chain becomes the new prefix of the free-list in its
    /// original order. Double-free is undefined.
    pub fn free(&self, handle: u32) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.free_chain(handle)?;
        inner.finish_mutation()
    }

    /// Overwrites a stream from offset 0 with `buf`, extending or trimming
    /// its chain as needed.
    ///
    /// A shrinking rewrite returns the orphaned tail pages to the
    /// free-list.
    pub fn write(&self, handle: u32, buf: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.write(handle, buf)?;
        inner.finish_mutation()
    }

    /// Overwrites or appends `buf` at byte offset `position`.
    ///
    /// Grows the stream when `position + buf.len()` exceeds the current
    /// length; never trims.
    pub fn write_at(&self, handle: u32, position: u32, buf: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.write_at(handle, position, buf)?;
        inner.finish_mutation()
    }

    /// Returns a stream's full contents.
    ///
    /// With `verify_on_read` enabled, each page's checksum is validated
    /// before it is consumed and the whole call fails on a mismatch.
    pub fn read_all(&self, handle: u32) -> Result<Vec<u8>> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.read_all(handle)
    }

    /// Reads up to `buf.len()` bytes starting at `src_off`, returning the
    /// number of bytes read.
    ///
    /// Reads past the end of the stream are clamped; `src_off` at or beyond
    /// the stream length reads 0 bytes.
    pub fn read_at(&self, handle: u32, buf: &mut [u8], src_off: u32) -> Result<usize> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.read_at(handle, buf, src_off)
    }

    /// Returns a stream's length in bytes.
    pub fn length(&self, handle: u32) -> Result<u32> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        Ok(inner.require_stream(handle)?.length)
    }

    /// Checks every page's checksum; returns false at the first mismatch.
    pub fn validate_crc(&self) -> Result<bool> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.validate_crc()
    }

    /// Writes the file header and durably flushes the backing file.
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.write_header()?;
        inner.file.sync()
    }

    /// Returns store statistics; `free_pages` is counted by walking the
    /// free-list.
    pub fn stats(&self) -> Result<FolioStats> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(FolioError::AlreadyClosed)?;
        inner.stats()
    }

    /// Writes the file header, flushes durably, and releases the backing
    /// file. Any later operation fails with `AlreadyClosed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let mut inner = guard.take().ok_or(FolioError::AlreadyClosed)?;
        inner.write_header()?;
        inner.file.sync()?;
        info!("closed folio at {:?}", inner.file.path());
        Ok(())
    }
}

impl Drop for Folio {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.lock().take() {
            let flushed = inner.write_header().and_then(|_| inner.file.sync());
            if let Err(e) = flushed {
                warn!("failed to flush folio on drop: {}", e);
            }
        }
    }
}

impl Inner {
    fn total_pages(&self) -> u64 {
        self.chapter_count as u64 * PAGES_PER_CHAPTER as u64
    }

    fn write_header(&mut self) -> Result<()> {
        let bytes = self.header.to_bytes();
        self.file.write_page(0, &bytes)
    }

    fn finish_mutation(&mut self) -> Result<()> {
        if self.opts.flush_at_write {
            self.file.sync()?;
        }
        Ok(())
    }

    /// Appends one chapter of fully initialized free pages.
    ///
    /// The new pages form a linked free chain ending in a 0 terminator.
    /// Does not write the file header; callers fold that into the larger
    /// operation.
    fn add_chapter(&mut self) -> Result<()> {
        let total = self.total_pages();
        if total + PAGES_PER_CHAPTER as u64 > MAX_PAGES {
            return Err(FolioError::OutOfSpace);
        }
        let base = total as u32;

        info!(
            "extending folio: {} -> {} chapters",
            self.chapter_count,
            self.chapter_count + 1
        );

        let mut image = vec![0u8; CHAPTER_BYTES as usize];
        for i in 0..PAGES_PER_CHAPTER {
            let link = if i == PAGES_PER_CHAPTER - 1 {
                0
            } else {
                base + i + 1
            };
            let page = &mut image[i as usize * PAGE_SIZE..(i as usize + 1) * PAGE_SIZE];
            PageHeader {
                status: PageStatus::Free,
                link,
                length: 0,
            }
            .encode_into(page);
            checksum::stamp(page);
        }

        self.file.append_chapter(total * PAGE_SIZE as u64, &image)?;
        self.chapter_count += 1;
        Ok(())
    }

    /// Pops one page off the free-list, growing the file by a chapter if
    /// this pop would empty the list.
    fn allocate_page(&mut self) -> Result<u32> {
        let ix = self.header.first_free_page;
        if ix == 0 {
            return Err(FolioError::CorruptData("free-list head is unset".into()));
        }

        let header = self.file.read_page_header(ix)?;
        if header.status != PageStatus::Free {
            return Err(FolioError::CorruptData(format!(
                "free-list entry {} is not marked free",
                ix
            )));
        }

        let mut next = header.link;
        if next == 0 {
            self.add_chapter()?;
            next = ((self.chapter_count as u64 - 1) * PAGES_PER_CHAPTER as u64) as u32;
        }
        self.header.first_free_page = next;

        self.file.write_page_header(
            ix,
            &PageHeader {
                status: PageStatus::Allocated,
                link: 0,
                length: 0,
            },
        )?;
        self.file.restamp_page(ix)?;
        self.write_header()?;

        debug!("allocated page {}", ix);
        Ok(ix)
    }

    /// Allocates a chain sized for `size` bytes and returns the head page.
    fn allocate_chain(&mut self, size: u32) -> Result<u32> {
        let head = self.allocate_page()?;
        let mut prev = head;
        let mut remaining = size as u64;
        while remaining > PAGE_DATA_SIZE as u64 {
            let next = self.allocate_page()?;
            self.file.write_page_link(prev, next)?;
            self.file.restamp_page(prev)?;
            remaining -= PAGE_DATA_SIZE as u64;
            prev = next;
        }
        Ok(head)
    }

    /// Pushes a whole chain onto the free-list, preserving its internal
    /// order.
    fn free_chain(&mut self, handle: u32) -> Result<()> {
        self.require_stream(handle)?;

        let mut ix = handle;
        let mut released = 0u64;
        loop {
            let header = self.file.read_page_header(ix)?;
            // The terminator picks up the old free-list head; every other
            // page keeps its link into the rest of the chain.
            let link = if header.link == 0 {
                self.header.first_free_page
            } else {
                header.link
            };
            self.file.write_page_header(
                ix,
                &PageHeader {
                    status: PageStatus::Free,
                    link,
                    length: 0,
                },
            )?;
            self.file.restamp_page(ix)?;
            released += 1;

            if header.link == 0 {
                break;
            }
            ix = header.link;
        }

        self.header.first_free_page = handle;
        self.write_header()?;

        debug!("freed {} pages starting at handle {}", released, handle);
        Ok(())
    }

    /// Validates a handle and returns its head page header.
    fn require_stream(&mut self, handle: u32) -> Result<PageHeader> {
        if handle == 0 || handle as u64 >= self.total_pages() {
            return Err(FolioError::InvalidHandle(handle));
        }
        let header = self.file.read_page_header(handle)?;
        if header.status != PageStatus::Allocated {
            return Err(FolioError::InvalidHandle(handle));
        }
        Ok(header)
    }

    fn write(&mut self, handle: u32, buf: &[u8]) -> Result<()> {
        if buf.len() as u64 > MAX_STREAM_BYTES {
            return Err(FolioError::OutOfRange(format!(
                "stream length {} exceeds the 32-bit limit",
                buf.len()
            )));
        }
        self.require_stream(handle)?;

        let mut ix = handle;
        let mut offset = 0usize;
        loop {
            let header = self.file.read_page_header(ix)?;
            let remaining = buf.len() - offset;
            let take = remaining.min(PAGE_DATA_SIZE);

            // Every page records the bytes remaining from it onward, so the
            // head ends up carrying the total length.
            self.file.write_page_header(
                ix,
                &PageHeader {
                    status: PageStatus::Allocated,
                    link: header.link,
                    length: remaining as u32,
                },
            )?;
            if take > 0 {
                self.file.write_page_data(ix, 0, &buf[offset..offset + take])?;
            }
            offset += take;

            if offset < buf.len() {
                let next = if header.link == 0 {
                    let next = self.allocate_page()?;
                    self.file.write_page_link(ix, next)?;
                    next
                } else {
                    header.link
                };
                self.file.restamp_page(ix)?;
                ix = next;
            } else {
                // This page is the new tail; a shorter rewrite orphans the
                // old suffix, which goes back on the free-list.
                if header.link != 0 {
                    self.file.write_page_link(ix, 0)?;
                    self.file.restamp_page(ix)?;
                    self.free_chain(header.link)?;
                } else {
                    self.file.restamp_page(ix)?;
                }
                return Ok(());
            }
        }
    }

    fn write_at(&mut self, handle: u32, position: u32, buf: &[u8]) -> Result<()> {
        let end = position as u64 + buf.len() as u64;
        if end > MAX_STREAM_BYTES {
            return Err(FolioError::OutOfRange(format!(
                "write at {} of {} bytes exceeds the 32-bit stream limit",
                position,
                buf.len()
            )));
        }
        let head = self.require_stream(handle)?;

        // Stored even for an empty buffer: a zero-byte write past the end
        // still extends the logical length.
        let new_length = head.length.max(end as u32);
        self.file.write_page_header(
            handle,
            &PageHeader {
                status: PageStatus::Allocated,
                link: head.link,
                length: new_length,
            },
        )?;
        self.file.restamp_page(handle)?;

        // Advance to the page containing `position`, splicing in fresh
        // pages when the chain is shorter than the target offset.
        let mut ix = handle;
        let mut header = PageHeader {
            status: PageStatus::Allocated,
            link: head.link,
            length: new_length,
        };
        for _ in 0..(position as usize / PAGE_DATA_SIZE) {
            let next = if header.link == 0 {
                let next = self.allocate_page()?;
                self.file.write_page_link(ix, next)?;
                self.file.restamp_page(ix)?;
                next
            } else {
                header.link
            };
            ix = next;
            header = self.file.read_page_header(ix)?;
        }

        let mut within = position as usize % PAGE_DATA_SIZE;
        let mut offset = 0usize;
        while offset < buf.len() {
            let take = (buf.len() - offset).min(PAGE_DATA_SIZE - within);
            self.file
                .write_page_data(ix, within, &buf[offset..offset + take])?;
            offset += take;
            within = 0;

            if offset < buf.len() {
                let next = if header.link == 0 {
                    let next = self.allocate_page()?;
                    self.file.write_page_link(ix, next)?;
                    next
                } else {
                    header.link
                };
                self.file.restamp_page(ix)?;
                ix = next;
                header = self.file.read_page_header(ix)?;
            } else {
                self.file.restamp_page(ix)?;
            }
        }
        Ok(())
    }

    fn read_all(&mut self, handle: u32) -> Result<Vec<u8>> {
        let head = self.require_stream(handle)?;
        if head.length > MAX_READ_ALL_BYTES {
            return Err(FolioError::OutOfRange(format!(
                "stream length {} exceeds the single-read limit",
                head.length
            )));
        }

        let total = head.length as usize;
        let mut out = Vec::with_capacity(total);
        let mut ix = handle;
        let mut page = vec![0u8; PAGE_SIZE];
        loop {
            self.file.read_page(ix, &mut page)?;
            if self.opts.verify_on_read && !checksum::verify(&page) {
                return Err(FolioError::CorruptData(format!(
                    "page {} checksum mismatch",
                    ix
                )));
            }
            let header = PageHeader::from_bytes(&page)?;

            let take = (total - out.len()).min(PAGE_DATA_SIZE);
            out.extend_from_slice(&page[PAGE_DATA_OFFSET..PAGE_DATA_OFFSET + take]);

            if out.len() == total {
                return Ok(out);
            }
            if header.link == 0 {
                return Err(FolioError::CorruptData(format!(
                    "stream at {} ends before its recorded length",
                    handle
                )));
            }
            ix = header.link;
        }
    }

    fn read_at(&mut self, handle: u32, buf: &mut [u8], src_off: u32) -> Result<usize> {
        let head = self.require_stream(handle)?;
        if src_off >= head.length {
            return Ok(0);
        }
        let count = buf.len().min((head.length - src_off) as usize);

        let mut ix = handle;
        let mut header = head;
        for _ in 0..(src_off as usize / PAGE_DATA_SIZE) {
            if header.link == 0 {
                return Err(FolioError::CorruptData(format!(
                    "stream at {} ends before its recorded length",
                    handle
                )));
            }
            ix = header.link;
            header = self.file.read_page_header(ix)?;
        }

        let mut within = src_off as usize % PAGE_DATA_SIZE;
        let mut copied = 0usize;
        while copied < count {
            let take = (count - copied).min(PAGE_DATA_SIZE - within);
            self.file
                .read_page_data(ix, within, &mut buf[copied..copied + take])?;
            copied += take;
            within = 0;

            if copied < count {
                if header.link == 0 {
                    return Err(FolioError::CorruptData(format!(
                        "stream at {} ends before its recorded length",
                        handle
                    )));
                }
                ix = header.link;
                header = self.file.read_page_header(ix)?;
            }
        }
        Ok(copied)
    }

    fn validate_crc(&mut self) -> Result<bool> {
        let mut page = vec![0u8; PAGE_SIZE];
        for ix in 0..self.total_pages() {
            self.file.read_page(ix as u32, &mut page)?;
            if !checksum::verify(&page) {
                warn!("page {} failed checksum validation", ix);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn stats(&mut self) -> Result<FolioStats> {
        let mut free_pages = 0u64;
        let mut ix = self.header.first_free_page;
        while ix != 0 {
            free_pages += 1;
            ix = self.file.read_page_header(ix)?.link;
        }

        Ok(FolioStats {
            chapter_count: self.chapter_count,
            total_pages: self.total_pages(),
            free_pages,
            first_free_page: self.header.first_free_page,
        })
    }
}
