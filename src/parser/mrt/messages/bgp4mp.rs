use crate::error::ParserError;
use crate::models::*;
use crate::parser::ReadUtils;
use bytes::{Buf, Bytes};
use log::debug;
use std::convert::TryFrom;

/// Outcome of decoding one BGP4MP record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bgp4MpRecord {
    /// A BGP message to forward.
    Update(Bgp4MpUpdate),
    /// A valid record of a subtype that is not forwarded (state changes, local messages).
    Ignored(Bgp4MpType),
}

/// Parse MRT BGP4MP type
///
/// RFC: <https://www.rfc-editor.org/rfc/rfc6396#section-4.4>
///
/// Only `BGP4MP_MESSAGE` and `BGP4MP_MESSAGE_AS4` are decoded; the other known subtypes are
/// reported as [Bgp4MpRecord::Ignored]. Unknown subtypes are an error.
pub fn parse_bgp4mp(sub_type: u16, input: Bytes) -> Result<Bgp4MpRecord, ParserError> {
    let bgp4mp_type = Bgp4MpType::try_from(sub_type).map_err(|_| {
        ParserError::UnexpectedSubtype {
            entry_type: EntryType::BGP4MP.into(),
            subtype: sub_type,
        }
    })?;
    match bgp4mp_type.forwarded_asn_len() {
        Some(asn_len) => Ok(Bgp4MpRecord::Update(decode_bgp4mp_message(input, asn_len)?)),
        None => Ok(Bgp4MpRecord::Ignored(bgp4mp_type)),
    }
}

/// Parse MRT BGP4MP_ET type: the body starts with a 4 byte microsecond timestamp, the rest is
/// laid out as in [parse_bgp4mp].
pub fn parse_bgp4mp_et(sub_type: u16, mut input: Bytes) -> Result<Bgp4MpRecord, ParserError> {
    let _microseconds = input.read_u32()?;
    parse_bgp4mp(sub_type, input)
}

/*
   0                   1                   2                   3
   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |         Peer AS Number        |        Local AS Number        |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |        Interface Index        |        Address Family         |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |                      Peer IP Address (variable)               |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |                      Local IP Address (variable)              |
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
  |                    BGP Message... (variable)
  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
*/
/// Decodes a BGP4MP message record body. The embedded BGP message is returned untouched; it
/// must be longer than a bare BGP header and start with the all-ones marker.
pub fn decode_bgp4mp_message(
    mut data: Bytes,
    asn_len: AsnLength,
) -> Result<Bgp4MpUpdate, ParserError> {
    let peer_asn = data.read_asn(asn_len)?;
    let local_asn = data.read_asn(asn_len)?;
    let interface_index: u16 = data.read_u16()?;
    let afi = Afi::from_bgp4mp_field(data.read_u16()?);
    let peer_ip = data.read_address(&afi)?;
    let local_ip = data.read_address(&afi)?;

    if data.remaining() <= BGP_HEADER_LEN {
        return Err(ParserError::TruncatedMsg(format!(
            "embedded BGP message of {} bytes",
            data.remaining()
        )));
    }
    if data[..BGP_MARKER.len()] != BGP_MARKER {
        return Err(ParserError::MissingMarker);
    }

    let declared = u16::from_be_bytes([data[16], data[17]]) as usize;
    if declared != data.remaining() {
        debug!(
            "BGP message length field {} differs from {} bytes carried",
            declared,
            data.remaining()
        );
    }

    Ok(Bgp4MpUpdate {
        asn_len,
        peer_asn,
        local_asn,
        interface_index,
        peer_ip,
        local_ip,
        message: data,
    })
}
