mod peer_index_table;
mod rib_afi_entries;
mod rib_generic_entries;

use crate::error::ParserError;
use crate::models::*;
use bytes::Bytes;
use std::convert::TryFrom;

pub use peer_index_table::parse_peer_index_table;
pub use rib_afi_entries::{parse_rib_afi_entries, parse_rib_entry};
pub use rib_generic_entries::parse_rib_generic_entries;

/// One decoded TABLE_DUMP_V2 record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDumpV2Record {
    PeerIndexTable(PeerIndexTable),
    Rib(RibRecord),
    /// A known subtype carrying nothing to forward (geo peer table, add-path RIBs, RIB_GENERIC
    /// of an unsupported address family).
    Skipped(TableDumpV2Type),
}

/// Parse TABLE_DUMP V2 format MRT message.
///
/// RFC: <https://www.rfc-editor.org/rfc/rfc6396#section-4.3>
///
/// Subtypes include
/// 1. PEER_INDEX_TABLE
/// 2. RIB_IPV4_UNICAST
/// 3. RIB_IPV4_MULTICAST
/// 4. RIB_IPV6_UNICAST
/// 5. RIB_IPV6_MULTICAST
/// 6. RIB_GENERIC
/// 7. GEO_PEER_TABLE
/// 8-12. add-path variants
///
/// Unknown subtypes are [ParserError::UnexpectedSubtype].
pub fn parse_table_dump_v2_record(
    sub_type: u16,
    mut input: Bytes,
) -> Result<TableDumpV2Record, ParserError> {
    let v2_type = TableDumpV2Type::try_from(sub_type).map_err(|_| {
        ParserError::UnexpectedSubtype {
            entry_type: EntryType::TABLE_DUMP_V2.into(),
            subtype: sub_type,
        }
    })?;

    let msg = match v2_type {
        TableDumpV2Type::PeerIndexTable => {
            TableDumpV2Record::PeerIndexTable(parse_peer_index_table(&mut input)?)
        }
        TableDumpV2Type::RibIpv4Unicast
        | TableDumpV2Type::RibIpv4Multicast
        | TableDumpV2Type::RibIpv6Unicast
        | TableDumpV2Type::RibIpv6Multicast => {
            TableDumpV2Record::Rib(parse_rib_afi_entries(&mut input, v2_type)?)
        }
        TableDumpV2Type::RibGeneric => match parse_rib_generic_entries(&mut input)? {
            Some(record) => TableDumpV2Record::Rib(record),
            None => TableDumpV2Record::Skipped(v2_type),
        },
        t if t.is_ignored() => TableDumpV2Record::Skipped(t),
        t => {
            return Err(ParserError::UnexpectedSubtype {
                entry_type: EntryType::TABLE_DUMP_V2.into(),
                subtype: t.into(),
            })
        }
    };

    Ok(msg)
}
