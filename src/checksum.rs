//! Page checksum utilities.
//!
//! Every page stores a CRC-32 of its first `PAGE_CRC_OFFSET` bytes in its
//! last four bytes, little-endian.

use crate::page::{PAGE_CRC_OFFSET, PAGE_SIZE};

/// Computes a CRC-32 checksum over the given bytes.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Computes the checksum of a page buffer and stores it in the trailing
/// four bytes.
///
/// Call this after all other modifications to the page are complete.
pub fn stamp(page: &mut [u8]) {
    debug_assert_eq!(page.len(), PAGE_SIZE);
    let crc = checksum(&page[..PAGE_CRC_OFFSET]);
    page[PAGE_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
}

/// Verifies a page buffer against its stored checksum.
pub fn verify(page: &[u8]) -> bool {
    debug_assert_eq!(page.len(), PAGE_SIZE);
    let stored = u32::from_le_bytes([
        page[PAGE_CRC_OFFSET],
        page[PAGE_CRC_OFFSET + 1],
        page[PAGE_CRC_OFFSET + 2],
        page[PAGE_CRC_OFFSET + 3],
    ]);
    checksum(&page[..PAGE_CRC_OFFSET]) == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"folio page payload";
        assert_eq!(checksum(data), checksum(data));
        assert_ne!(checksum(data), checksum(b"other payload"));
    }

    #[test]
    fn test_stamp_and_verify() {
        let mut page = vec![0u8; PAGE_SIZE];
        page[100] = 42;

        stamp(&mut page);
        assert!(verify(&page));
    }

    #[test]
    fn test_corruption_detected() {
        let mut page = vec![0u8; PAGE_SIZE];
        page[9..14].copy_from_slice(b"hello");
        stamp(&mut page);

        // Flip one payload byte
        page[10] ^= 0x01;
        assert!(!verify(&page));
    }

    #[test]
    fn test_checksum_field_excluded() {
        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 1;
        stamp(&mut page);
        let first = u32::from_le_bytes(page[PAGE_CRC_OFFSET..].try_into().unwrap());

        // Clobbering the stored checksum must not change the recomputed one
        page[PAGE_CRC_OFFSET..].copy_from_slice(&[0xFF; 4]);
        stamp(&mut page);
        let second = u32::from_le_bytes(page[PAGE_CRC_OFFSET..].try_into().unwrap());
        assert_eq!(first, second);
    }
}
