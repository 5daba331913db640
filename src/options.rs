//! Open-time configuration.

use crate::page::PAGE_SIZE;

/// Options controlling how a store is opened and operated.
///
/// # Examples
///
/// ```rust
/// use folio::Options;
///
/// let opts = Options::new().verify_on_read(true).flush_at_write(true);
/// assert!(opts.verify_on_read);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Validate each page's checksum before consuming it in `read_all`
    /// (default: false).
    pub verify_on_read: bool,

    /// When false, request write-through semantics from the backing file:
    /// every positioned write is followed by a data sync (default: true).
    pub use_write_cache: bool,

    /// End every mutating operation with a durable flush (default: false).
    pub flush_at_write: bool,

    /// Backing-file I/O buffer hint in bytes; chapter images are written in
    /// chunks of this size, rounded up to a whole page (default: 4096).
    pub buffer_size: usize,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify_on_read(mut self, verify: bool) -> Self {
        self.verify_on_read = verify;
        self
    }

    pub fn use_write_cache(mut self, cache: bool) -> Self {
        self.use_write_cache = cache;
        self
    }

    pub fn flush_at_write(mut self, flush: bool) -> Self {
        self.flush_at_write = flush;
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            verify_on_read: false,
            use_write_cache: true,
            flush_at_write: false,
            buffer_size: PAGE_SIZE,
        }
    }
}
