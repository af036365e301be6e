use crate::parser::bgp::attributes::parse_rib_attributes;
use crate::models::{Afi, NetworkPrefix, RibEntry, RibRecord, Safi, TableDumpV2Type};
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::{Buf, Bytes};

fn extract_afi_safi_from_rib_type(rib_type: &TableDumpV2Type) -> Result<(Afi, Safi), ParserError> {
    let afi_safi = match rib_type {
        TableDumpV2Type::RibIpv4Unicast => (Afi::Ipv4, Safi::Unicast),
        TableDumpV2Type::RibIpv4Multicast => (Afi::Ipv4, Safi::Multicast),
        TableDumpV2Type::RibIpv6Unicast => (Afi::Ipv6, Safi::Unicast),
        TableDumpV2Type::RibIpv6Multicast => (Afi::Ipv6, Safi::Multicast),
        _ => {
            return Err(ParserError::ParseError(format!(
                "wrong RIB type for parsing: {:?}",
                rib_type
            )))
        }
    };

    Ok(afi_safi)
}

/// RIB AFI-specific entries
///
/// https://tools.ietf.org/html/rfc6396#section-4.3.2
///
/// ```text
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         Sequence Number                       |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        | Prefix Length |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                        Prefix (variable)                      |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |         Entry Count           |  RIB Entries (variable)
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// A prefix longer than the family allows is [ParserError::InvalidPrefixLength]; any entry that
/// does not fit the record fails the whole record.
pub fn parse_rib_afi_entries(
    data: &mut Bytes,
    rib_type: TableDumpV2Type,
) -> Result<RibRecord, ParserError> {
    let (afi, safi) = extract_afi_safi_from_rib_type(&rib_type)?;

    let sequence_number = data.read_u32()?;
    let prefix = data.read_nlri_prefix(&afi)?;
    let entries = parse_rib_entries(data, afi, safi, &prefix)?;

    Ok(RibRecord {
        sequence_number,
        afi,
        safi,
        prefix,
        entries,
    })
}

pub(crate) fn parse_rib_entries(
    data: &mut Bytes,
    afi: Afi,
    safi: Safi,
    prefix: &NetworkPrefix,
) -> Result<Vec<RibEntry>, ParserError> {
    let entry_count = data.read_u16()? as usize;
    // every entry takes at least 8 bytes; cap the reservation by what the record can hold
    let mut entries = Vec::with_capacity(entry_count.min(data.remaining() / 8));
    for _ in 0..entry_count {
        entries.push(parse_rib_entry(data, afi, safi, prefix)?);
    }
    Ok(entries)
}

/// RIB entry: one prefix per entry
///
/// https://datatracker.ietf.org/doc/html/rfc6396#section-4.3.4
/// ```text
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |         Peer Index            |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         Originated Time                       |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |      Attribute Length         |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                    BGP Attributes... (variable)
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
///                           Figure 10: RIB Entries
/// ```
pub fn parse_rib_entry(
    input: &mut Bytes,
    afi: Afi,
    safi: Safi,
    prefix: &NetworkPrefix,
) -> Result<RibEntry, ParserError> {
    if input.remaining() < 8 {
        return Err(ParserError::TruncatedMsg(format!(
            "RIB entry needs 8 bytes, {} left",
            input.remaining()
        )));
    }

    let peer_index = input.read_u16()?;
    let originated_time = input.read_u32()?;
    let attribute_length = input.read_u16()? as usize;

    if input.remaining() < attribute_length {
        return Err(ParserError::MalformedAttribute(format!(
            "attribute block of {} bytes, {} left in record",
            attribute_length,
            input.remaining()
        )));
    }
    let attr_data_slice = input.split_to(attribute_length);
    let attributes = parse_rib_attributes(attr_data_slice, afi, safi, prefix)?;

    Ok(RibEntry {
        peer_index,
        originated_time,
        attributes,
    })
}
