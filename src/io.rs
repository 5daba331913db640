//! Disk I/O facade for the backing file.
//!
//! All access goes through positioned reads and writes of whole pages or
//! individual page header fields; nothing here interprets chains or the
//! free-list.

use crate::checksum;
use crate::error::Result;
use crate::options::Options;
use crate::page::{PageHeader, PAGE_CRC_OFFSET, PAGE_DATA_OFFSET, PAGE_DATA_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Disk-backed page storage.
pub struct FolioFile {
    file: File,
    path: PathBuf,
    write_through: bool,
    chunk_size: usize,
}

impl FolioFile {
    /// Opens the backing file, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P, opts: &Options) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        Ok(FolioFile {
            file,
            path: path.as_ref().to_path_buf(),
            write_through: !opts.use_write_cache,
            chunk_size: opts.buffer_size.max(PAGE_SIZE),
        })
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current backing-file length in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Read a full page into `buf` (must be `PAGE_SIZE` bytes).
    pub fn read_page(&mut self, ix: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        self.read_at(page_offset(ix), buf)
    }

    /// Write a full page image.
    pub fn write_page(&mut self, ix: u32, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        self.write_at(page_offset(ix), buf)
    }

    /// Read a page's 9-byte header.
    pub fn read_page_header(&mut self, ix: u32) -> Result<PageHeader> {
        let mut buf = [0u8; PAGE_HEADER_SIZE];
        self.read_at(page_offset(ix), &mut buf)?;
        PageHeader::from_bytes(&buf)
    }

    /// Write a page's 9-byte header.
    pub fn write_page_header(&mut self, ix: u32, header: &PageHeader) -> Result<()> {
        self.write_at(page_offset(ix), &header.to_bytes())
    }

    /// Rewrite only the link field of a page header.
    pub fn write_page_link(&mut self, ix: u32, link: u32) -> Result<()> {
        self.write_at(page_offset(ix) + 1, &link.to_le_bytes())
    }

    /// Read from a page's data region starting at `within`.
    pub fn read_page_data(&mut self, ix: u32, within: usize, buf: &mut [u8]) -> Result<()> {
        debug_assert!(within + buf.len() <= PAGE_DATA_SIZE);
        self.read_at(page_offset(ix) + (PAGE_DATA_OFFSET + within) as u64, buf)
    }

    /// Write into a page's data region starting at `within`.
    pub fn write_page_data(&mut self, ix: u32, within: usize, data: &[u8]) -> Result<()> {
        debug_assert!(within + data.len() <= PAGE_DATA_SIZE);
        self.write_at(page_offset(ix) + (PAGE_DATA_OFFSET + within) as u64, data)
    }

    /// Recompute a page's checksum from its on-disk prefix and rewrite the
    /// trailing four bytes.
    ///
    /// Must be called after any in-place mutation of a page so the stored
    /// checksum matches before the next durable flush.
    pub fn restamp_page(&mut self, ix: u32) -> Result<()> {
        let mut prefix = vec![0u8; PAGE_CRC_OFFSET];
        self.read_at(page_offset(ix), &mut prefix)?;
        let crc = checksum::checksum(&prefix);
        self.write_at(page_offset(ix) + PAGE_CRC_OFFSET as u64, &crc.to_le_bytes())
    }

    /// Append a chapter image at `offset`, written in `buffer_size` chunks.
    pub fn append_chapter(&mut self, offset: u64, image: &[u8]) -> Result<()> {
        let mut written = 0u64;
        for chunk in image.chunks(self.chunk_size) {
            self.write_at(offset + written, chunk)?;
            written += chunk.len() as u64;
        }
        Ok(())
    }

    /// Durably flush all writes to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        if self.write_through {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

#[inline]
fn page_offset(ix: u32) -> u64 {
    ix as u64 * PAGE_SIZE as u64
}
