//! RIB_GENERIC entries parser.
//!
//! Reference: RFC 6396 Section 4.3.3

use super::rib_afi_entries::parse_rib_entries;
use crate::models::{Afi, RibRecord, Safi};
use crate::parser::ReadUtils;
use crate::ParserError;
use log::warn;

/// Parse RIB_GENERIC entries (subtype 6).
///
/// RFC 6396 Section 4.3.3:
/// ```text
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         Sequence Number                       |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |    Address Family Identifier  |Subsequent AFI |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |     Network Layer Reachability Information (variable)         |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |         Entry Count           |  RIB Entries (variable)
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Only IPv4/IPv6 unicast and multicast are decoded. Other families return `Ok(None)` so the
/// caller can skip the record.
pub fn parse_rib_generic_entries(
    data: &mut bytes::Bytes,
) -> Result<Option<RibRecord>, ParserError> {
    let sequence_number = data.read_u32()?;
    let afi_raw = data.read_u16()?;
    let safi_raw = data.read_u8()?;
    let (afi, safi) = match (Afi::try_from(afi_raw), Safi::try_from(safi_raw)) {
        (Ok(afi), Ok(safi)) => (afi, safi),
        _ => {
            warn!(
                "skipping RIB_GENERIC record {} for AFI {} SAFI {}",
                sequence_number, afi_raw, safi_raw
            );
            return Ok(None);
        }
    };

    let prefix = data.read_nlri_prefix(&afi)?;
    let entries = parse_rib_entries(data, afi, safi, &prefix)?;

    Ok(Some(RibRecord {
        sequence_number,
        afi,
        safi,
        prefix,
        entries,
    }))
}
