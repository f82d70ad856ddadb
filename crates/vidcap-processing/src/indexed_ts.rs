//! Indexed transport stream container
//!
//! Layout, all integers little-endian:
//!
//! | Field        | Size              |
//! |--------------|-------------------|
//! | magic        | 8 (`TSGOPIDX`)    |
//! | header size  | 4                 |
//! | entry count  | 4                 |
//! | frame count  | 4                 |
//! | entries      | 12 x entry count  |
//! | payload      | remainder         |
//!
//! Each entry is a 4-byte frame number followed by an 8-byte offset measured from the
//! start of the indexed file (payload offset + header size).

use crate::gop::{GopEntry, GopIndex};
use serde::Serialize;
use thiserror::Error;

pub const MAGIC: &[u8; 8] = b"TSGOPIDX";

/// Size of the fixed part of the header: magic, header size, entry count, frame count.
pub const FIXED_HEADER_LEN: usize = 8 + 4 + 4 + 4;

/// Size of one index table entry: frame number + offset.
pub const ENTRY_LEN: usize = 4 + 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Index with {0} entries does not fit in a 32-bit header size")]
    TooManyEntries(usize),

    #[error("Offset {offset} of frame {frame_index} overflows once the header is added")]
    OffsetOverflow { frame_index: u32, offset: u64 },

    #[error("Input is {0} bytes, shorter than the fixed header")]
    Truncated(usize),

    #[error("Bad magic: expected TSGOPIDX")]
    BadMagic,

    #[error("Header size field is {declared} but {entries} entries require {expected}")]
    SizeMismatch {
        declared: u32,
        entries: u32,
        expected: u64,
    },
}

/// Total header length for `entry_count` entries.
pub fn header_size(entry_count: usize) -> Result<u32, HeaderError> {
    entry_count
        .checked_mul(ENTRY_LEN)
        .and_then(|table| table.checked_add(FIXED_HEADER_LEN))
        .and_then(|total| u32::try_from(total).ok())
        .ok_or(HeaderError::TooManyEntries(entry_count))
}

/// Serialize the header for `index`. Offsets are shifted by the header size.
pub fn encode_header(index: &GopIndex) -> Result<Vec<u8>, HeaderError> {
    let size = header_size(index.entries.len())?;
    let entry_count = index.entries.len() as u32;

    let mut header = Vec::with_capacity(size as usize);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&size.to_le_bytes());
    header.extend_from_slice(&entry_count.to_le_bytes());
    header.extend_from_slice(&index.frame_count.to_le_bytes());

    for entry in &index.entries {
        let offset = entry.offset.checked_add(u64::from(size)).ok_or(
            HeaderError::OffsetOverflow {
                frame_index: entry.frame_index,
                offset: entry.offset,
            },
        )?;
        header.extend_from_slice(&entry.frame_index.to_le_bytes());
        header.extend_from_slice(&offset.to_le_bytes());
    }

    Ok(header)
}

/// Header followed by the unmodified payload.
pub fn build_indexed_segment(payload: &[u8], index: &GopIndex) -> Result<Vec<u8>, HeaderError> {
    let header = encode_header(index)?;
    let mut segment = Vec::with_capacity(header.len() + payload.len());
    segment.extend_from_slice(&header);
    segment.extend_from_slice(payload);
    Ok(segment)
}

/// Decoded header of an indexed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedSegmentHeader {
    pub header_size: u32,
    pub frame_count: u32,
    /// Offsets are absolute within the indexed file.
    pub entries: Vec<GopEntry>,
}

impl IndexedSegmentHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(HeaderError::Truncated(bytes.len()));
        }
        if &bytes[..8] != MAGIC {
            return Err(HeaderError::BadMagic);
        }

        let header_size = read_u32(bytes, 8);
        let entry_count = read_u32(bytes, 12);
        let frame_count = read_u32(bytes, 16);

        let expected = FIXED_HEADER_LEN as u64 + u64::from(entry_count) * ENTRY_LEN as u64;
        if u64::from(header_size) != expected {
            return Err(HeaderError::SizeMismatch {
                declared: header_size,
                entries: entry_count,
                expected,
            });
        }
        if (bytes.len() as u64) < expected {
            return Err(HeaderError::Truncated(bytes.len()));
        }

        let entries = (0..entry_count as usize)
            .map(|i| {
                let at = FIXED_HEADER_LEN + i * ENTRY_LEN;
                GopEntry {
                    frame_index: read_u32(bytes, at),
                    offset: read_u64(bytes, at + 4),
                }
            })
            .collect();

        Ok(Self {
            header_size,
            frame_count,
            entries,
        })
    }

    /// Byte range of the payload within `segment`.
    pub fn payload<'a>(&self, segment: &'a [u8]) -> &'a [u8] {
        &segment[(self.header_size as usize).min(segment.len())..]
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(u32, u64)], frame_count: u32) -> GopIndex {
        GopIndex {
            entries: entries
                .iter()
                .map(|&(frame_index, offset)| GopEntry {
                    frame_index,
                    offset,
                })
                .collect(),
            frame_count,
        }
    }

    #[test]
    fn header_size_formula() {
        assert_eq!(header_size(0).unwrap(), 20);
        assert_eq!(header_size(1).unwrap(), 32);
        assert_eq!(header_size(100).unwrap(), 1220);
        assert!(header_size(usize::MAX / 2).is_err());
    }

    #[test]
    fn empty_index_layout() {
        let payload = b"\x47payload-bytes".to_vec();
        let segment = build_indexed_segment(&payload, &index(&[], 7)).unwrap();

        assert_eq!(&segment[..8], b"TSGOPIDX");
        assert_eq!(&segment[8..12], &20u32.to_le_bytes());
        assert_eq!(&segment[12..16], &0u32.to_le_bytes());
        assert_eq!(&segment[16..20], &7u32.to_le_bytes());
        assert_eq!(&segment[20..], payload.as_slice());

        let header = IndexedSegmentHeader::parse(&segment).unwrap();
        assert_eq!(header.header_size, 20);
        assert_eq!(header.frame_count, 7);
        assert!(header.entries.is_empty());
        assert_eq!(header.payload(&segment), payload.as_slice());
    }

    #[test]
    fn entries_are_shifted_by_header_size_in_scan_order() {
        let segment = build_indexed_segment(b"", &index(&[(0, 0), (12, 4512)], 20)).unwrap();

        // 20 + 2 * 12
        assert_eq!(segment.len(), 44);
        assert_eq!(&segment[20..24], &0u32.to_le_bytes());
        assert_eq!(&segment[24..32], &44u64.to_le_bytes());
        assert_eq!(&segment[32..36], &12u32.to_le_bytes());
        assert_eq!(&segment[36..44], &4556u64.to_le_bytes());
    }

    #[test]
    fn offsets_point_at_frame_starts_in_final_file() {
        // Three 188-byte packets; I-frames start at packets 0 and 2.
        let mut payload = Vec::new();
        for marker in [b'I', b'P', b'I'] {
            let mut packet = vec![0u8; 188];
            packet[0] = 0x47;
            packet[1] = marker;
            payload.extend_from_slice(&packet);
        }
        let gop = index(&[(0, 0), (2, 376)], 3);
        let segment = build_indexed_segment(&payload, &gop).unwrap();
        let header = IndexedSegmentHeader::parse(&segment).unwrap();

        for entry in &header.entries {
            let at = entry.offset as usize;
            assert_eq!(segment[at], 0x47);
            assert_eq!(segment[at + 1], b'I');
        }
    }

    #[test]
    fn offset_overflow_is_rejected() {
        let err = encode_header(&index(&[(3, u64::MAX - 5)], 4)).unwrap_err();
        assert_eq!(
            err,
            HeaderError::OffsetOverflow {
                frame_index: 3,
                offset: u64::MAX - 5
            }
        );
    }

    #[test]
    fn parse_rejects_malformed_headers() {
        assert_eq!(
            IndexedSegmentHeader::parse(b"TSGOP").unwrap_err(),
            HeaderError::Truncated(5)
        );

        let mut segment = build_indexed_segment(b"x", &index(&[(0, 0)], 1)).unwrap();
        let mut bad_magic = segment.clone();
        bad_magic[0] = b'X';
        assert_eq!(
            IndexedSegmentHeader::parse(&bad_magic).unwrap_err(),
            HeaderError::BadMagic
        );

        segment[8..12].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            IndexedSegmentHeader::parse(&segment).unwrap_err(),
            HeaderError::SizeMismatch { declared: 99, .. }
        ));
    }
}
