//! MRT record structs.

pub mod bgp4mp;
pub mod table_dump_v2;

pub use bgp4mp::*;
use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
pub use table_dump_v2::*;

/// Size of the MRT common header on the wire.
pub const MRT_HEADER_LEN: usize = 12;

/// MRT common header.
///
/// A RecordHeader ([RFC6396 section 2][header-link]) is constructed as the following:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |             Type              |            Subtype            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             Length                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The type is kept raw: the framer accepts any type and leaves the decision to the
/// conversation that consumes the record. Use [RecordHeader::entry_type] for the known ones.
///
/// [header-link]: https://datatracker.ietf.org/doc/html/rfc6396#section-2
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordHeader {
    pub timestamp: u32,
    pub entry_type: u16,
    pub entry_subtype: u16,
    /// Length of the body, excluding this header.
    pub length: u32,
}

impl RecordHeader {
    pub fn entry_type(&self) -> Option<EntryType> {
        EntryType::try_from(self.entry_type).ok()
    }
}

/// One framed record: a validated header and exactly `header.length` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub header: RecordHeader,
    pub payload: Bytes,
    /// Number of recovery passes needed before this record framed. Zero on a clean stream.
    pub recovered_skips: u32,
}

/// MRT entry types handled by the ingest paths.
///
/// ```text
///     12   TABLE_DUMP
///     13   TABLE_DUMP_V2
///     16   BGP4MP
///     17   BGP4MP_ET
/// ```
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(non_camel_case_types)]
#[repr(u16)]
pub enum EntryType {
    TABLE_DUMP = 12,
    TABLE_DUMP_V2 = 13,
    BGP4MP = 16,
    BGP4MP_ET = 17,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_lookup() {
        let header = RecordHeader {
            timestamp: 0,
            entry_type: 13,
            entry_subtype: 1,
            length: 40,
        };
        assert_eq!(header.entry_type(), Some(EntryType::TABLE_DUMP_V2));

        let header = RecordHeader {
            entry_type: 48,
            ..header
        };
        assert_eq!(header.entry_type(), None);
    }
}
