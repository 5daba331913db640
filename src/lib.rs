//! Folio Compound File Store
//!
//! A paged, single-file store for many independently allocated byte
//! streams ("embedded files"), each addressed by an opaque 32-bit handle.
//!
//! ## Features
//!
//! - **Fixed 4KB pages**, each protected by a CRC-32 stamped in its last
//!   four bytes
//! - **Chapter preallocation**: the file grows 16 MiB (4096 pages) at a
//!   time, so its length is always a whole number of chapters
//! - **Free-list discipline**: free pages form a singly-linked chain rooted
//!   in the page-0 header; allocation pops, freeing pushes
//! - **Random-offset writes** that extend a stream's page chain in place
//! - **Whole-file integrity scan** plus optional verify-on-read
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Folio File                    │
//! ├─────────────────────────────────────────────┤
//! │ Page 0: File Header (4KB)                   │
//! │  - Magic: "UNICORNS 4-LIFE"                 │
//! │  - Version, first_free_page, CRC            │
//! ├─────────────────────────────────────────────┤
//! │ Pages 1+: Stream Chains                     │
//! │  - status / link / length header (9 bytes)  │
//! │  - 4083 bytes of payload, trailing CRC      │
//! ├─────────────────────────────────────────────┤
//! │ Free Pages                                  │
//! │  - linked through the same header fields    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio::{Folio, Options, Result};
//!
//! fn main() -> Result<()> {
//!     let store = Folio::open("data.folio", Options::default())?;
//!
//!     let handle = store.allocate(1024)?;
//!     store.write(handle, b"hello")?;
//!     assert_eq!(store.read_all(handle)?, b"hello");
//!
//!     // Random-offset writes grow the stream as needed
//!     store.write_at(handle, 4090, b"tail")?;
//!
//!     store.close()?;
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod folio;
pub mod header;
pub mod io;
pub mod options;
pub mod page;

// Re-export commonly used types
pub use error::{FolioError, Result};
pub use folio::{Folio, FolioStats};
pub use header::{Header, FORMAT_VERSION, MAGIC};
pub use io::FolioFile;
pub use options::Options;
pub use page::{
    PageHeader, PageStatus, CHAPTER_BYTES, PAGES_PER_CHAPTER, PAGE_DATA_SIZE, PAGE_SIZE,
};

/// Folio format version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
