//! File header codec (page 0).
//!
//! The first page of the backing file is a specialized page carrying the
//! format identification and the free-list root:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0      50   magic, NUL-padded ASCII ("UNICORNS 4-LIFE")
//!  50       2   format version (current = 1)
//!  52       2   page size (informational; always 4096)
//!  54       2   chapter size in pages (informational; always 4096)
//!  60       4   first_free_page
//! 4092      4   crc (CRC-32 of bytes [0..4092))
//! ```
//!
//! Bytes 56..60 and 64..4092 are reserved and written as zero. The chapter
//! count is derived from the backing file's length, not stored.

use crate::checksum;
use crate::error::{FolioError, Result};
use crate::page::{PAGES_PER_CHAPTER, PAGE_SIZE};

/// File magic, stored NUL-padded in the first 50 bytes of page 0.
pub const MAGIC: &[u8] = b"UNICORNS 4-LIFE";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

const MAGIC_FIELD_SIZE: usize = 50;
const OFF_VERSION: usize = 50;
const OFF_PAGE_SIZE: usize = 52;
const OFF_CHAPTER_SIZE: usize = 54;
const OFF_FIRST_FREE: usize = 60;

/// Parsed file header.
///
/// `first_free_page` is the root of the free-list; it is never 0 while the
/// store is initialized (page 0 is the header itself and never a valid
/// free page or handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub page_size: u16,
    pub chapter_size: u16,
    pub first_free_page: u32,
}

impl Header {
    /// Creates a header for a freshly initialized store.
    pub fn new() -> Self {
        Header {
            version: FORMAT_VERSION,
            page_size: PAGE_SIZE as u16,
            chapter_size: PAGES_PER_CHAPTER as u16,
            first_free_page: 1,
        }
    }

    /// Serializes the header into a full, checksummed page image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; PAGE_SIZE];

        bytes[..MAGIC.len()].copy_from_slice(MAGIC);
        bytes[OFF_VERSION..OFF_VERSION + 2].copy_from_slice(&self.version.to_le_bytes());
        bytes[OFF_PAGE_SIZE..OFF_PAGE_SIZE + 2].copy_from_slice(&self.page_size.to_le_bytes());
        bytes[OFF_CHAPTER_SIZE..OFF_CHAPTER_SIZE + 2]
            .copy_from_slice(&self.chapter_size.to_le_bytes());
        bytes[OFF_FIRST_FREE..OFF_FIRST_FREE + 4]
            .copy_from_slice(&self.first_free_page.to_le_bytes());

        checksum::stamp(&mut bytes);
        bytes
    }

    /// Parses and validates a page-0 image.
    ///
    /// Checks, in order: page checksum, magic string (compared up to the
    /// first NUL within the 50-byte field), format version, and the
    /// informational size fields.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PAGE_SIZE {
            return Err(FolioError::CorruptData(format!(
                "file header too short: {} bytes",
                bytes.len()
            )));
        }

        if !checksum::verify(&bytes[..PAGE_SIZE]) {
            return Err(FolioError::CorruptData(
                "file header checksum mismatch".into(),
            ));
        }

        let magic_field = &bytes[..MAGIC_FIELD_SIZE];
        let magic_end = magic_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAGIC_FIELD_SIZE);
        if &magic_field[..magic_end] != MAGIC {
            return Err(FolioError::CorruptData("file header magic mismatch".into()));
        }

        let version = u16::from_le_bytes([bytes[OFF_VERSION], bytes[OFF_VERSION + 1]]);
        if version > FORMAT_VERSION {
            return Err(FolioError::UnsupportedVersion(version));
        }

        let page_size = u16::from_le_bytes([bytes[OFF_PAGE_SIZE], bytes[OFF_PAGE_SIZE + 1]]);
        let chapter_size =
            u16::from_le_bytes([bytes[OFF_CHAPTER_SIZE], bytes[OFF_CHAPTER_SIZE + 1]]);
        if page_size as usize != PAGE_SIZE || chapter_size as u32 != PAGES_PER_CHAPTER {
            return Err(FolioError::CorruptData(format!(
                "unexpected layout: page size {}, chapter size {}",
                page_size, chapter_size
            )));
        }

        let first_free_page = u32::from_le_bytes([
            bytes[OFF_FIRST_FREE],
            bytes[OFF_FIRST_FREE + 1],
            bytes[OFF_FIRST_FREE + 2],
            bytes[OFF_FIRST_FREE + 3],
        ]);

        Ok(Header {
            version,
            page_size,
            chapter_size,
            first_free_page,
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
