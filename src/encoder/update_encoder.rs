use crate::models::*;
use crate::parser::bgp::attributes::{encode_as_path, parse_aggregator, parse_as_path};
use crate::ParserError;
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, warn};

/// Serializes a table-dump route as a BGP UPDATE for a session speaking `asn_len` ASNs.
///
/// IPv4 unicast routes without MP_REACH_NLRI carry their prefix in the UPDATE NLRI field;
/// every other route relies on its MP_REACH_NLRI attribute.
pub fn encode_rib_update(route: &RibRoute, asn_len: AsnLength) -> Result<Bytes, ParserError> {
    let attributes = adapt_attributes_for_asn_len(&route.attributes, asn_len);
    let nlri = match (route.afi, route.safi, route.has_mp_reach()) {
        (Afi::Ipv4, Safi::Unicast, false) => Some(&route.prefix),
        (_, _, false) => {
            debug!(
                "route {} ({:?}/{:?}) has no MP_REACH_NLRI, sending attributes only",
                route.prefix, route.afi, route.safi
            );
            None
        }
        _ => None,
    };
    encode_update(&attributes, nlri)
}

/// ```text
/// +-----------------------------------------------------+
/// |   Withdrawn Routes Length (2 octets)                |
/// +-----------------------------------------------------+
/// |   Withdrawn Routes (variable)                       |
/// +-----------------------------------------------------+
/// |   Total Path Attribute Length (2 octets)            |
/// +-----------------------------------------------------+
/// |   Path Attributes (variable)                        |
/// +-----------------------------------------------------+
/// |   Network Layer Reachability Information (variable) |
/// +-----------------------------------------------------+
/// ```
/// preceded by the 19 byte BGP header. No withdrawn routes are ever written.
pub fn encode_update(
    attributes: &[RawAttribute],
    nlri: Option<&NetworkPrefix>,
) -> Result<Bytes, ParserError> {
    let attr_len: usize = attributes.iter().map(RawAttribute::encoded_len).sum();
    let nlri_len = nlri.map(NetworkPrefix::encoded_len).unwrap_or(0);
    let total = BGP_HEADER_LEN + 2 + 2 + attr_len + nlri_len;
    if total > u16::MAX as usize {
        return Err(ParserError::MalformedAttribute(format!(
            "UPDATE of {} bytes does not fit a BGP length field",
            total
        )));
    }
    if total > BGP_MAX_MESSAGE_LEN {
        warn!("UPDATE of {} bytes exceeds the 4096 byte BGP limit", total);
    }

    let mut bytes = BytesMut::with_capacity(total);
    bytes.put_slice(&BGP_MARKER);
    bytes.put_u16(total as u16);
    bytes.put_u8(BGP_UPDATE);
    // withdrawn routes length
    bytes.put_u16(0);
    bytes.put_u16(attr_len as u16);
    for attr in attributes {
        let flags = attr.wire_flags();
        bytes.put_u8(flags.bits());
        bytes.put_u8(attr.code);
        if flags.contains(AttrFlags::EXTENDED) {
            bytes.put_u16(attr.value.len() as u16);
        } else {
            bytes.put_u8(attr.value.len() as u8);
        }
        bytes.put_slice(&attr.value);
    }
    if let Some(prefix) = nlri {
        prefix.encode_to(&mut bytes);
    }
    Ok(bytes.freeze())
}

/// Rewrites AS_PATH and AGGREGATOR for the session's ASN width.
///
/// Table dumps always carry 4 byte ASNs. For a 2 byte session AS_PATH is re-encoded with
/// [AS_TRANS] standing in for wide ASNs and the original path goes into AS4_PATH; AGGREGATOR
/// gets the same treatment with AS4_AGGREGATOR (RFC 6793). Attributes that fail to parse are
/// kept as they are.
pub fn adapt_attributes_for_asn_len(
    attributes: &[RawAttribute],
    asn_len: AsnLength,
) -> Vec<RawAttribute> {
    if asn_len.is_four_byte() {
        return attributes.to_vec();
    }

    let has_as4_path = attributes
        .iter()
        .any(|a| a.attr_type() == Some(AttrType::AS4_PATH));
    let has_as4_aggregator = attributes
        .iter()
        .any(|a| a.attr_type() == Some(AttrType::AS4_AGGREGATOR));

    let mut output = Vec::with_capacity(attributes.len() + 2);
    for attr in attributes {
        match attr.attr_type() {
            Some(AttrType::AS_PATH) => match parse_as_path(attr.value.clone(), AsnLength::Bits32) {
                Ok(segments) => {
                    output.push(RawAttribute {
                        flags: attr.flags,
                        code: attr.code,
                        value: encode_as_path(&segments, AsnLength::Bits16),
                    });
                    let wide = segments
                        .iter()
                        .flat_map(|s| s.asns.iter())
                        .any(|asn| *asn > u16::MAX as u32);
                    if wide && !has_as4_path {
                        output.push(RawAttribute::new(
                            AttrFlags::OPTIONAL | AttrFlags::TRANSITIVE,
                            AttrType::AS4_PATH,
                            attr.value.clone(),
                        ));
                    }
                }
                Err(e) => {
                    warn!("keeping AS_PATH unchanged, unable to parse it: {}", e);
                    output.push(attr.clone());
                }
            },
            Some(AttrType::AGGREGATOR) if attr.value.len() == 8 => {
                match parse_aggregator(attr.value.clone()) {
                    Ok((asn, id)) => {
                        let mut value = BytesMut::with_capacity(6);
                        value.put_u16(u16::try_from(asn).unwrap_or(AS_TRANS));
                        value.put_slice(&id.octets());
                        output.push(RawAttribute {
                            flags: attr.flags,
                            code: attr.code,
                            value: value.freeze(),
                        });
                        if asn > u16::MAX as u32 && !has_as4_aggregator {
                            output.push(RawAttribute::new(
                                AttrFlags::OPTIONAL | AttrFlags::TRANSITIVE,
                                AttrType::AS4_AGGREGATOR,
                                attr.value.clone(),
                            ));
                        }
                    }
                    Err(e) => {
                        warn!("keeping AGGREGATOR unchanged, unable to parse it: {}", e);
                        output.push(attr.clone());
                    }
                }
            }
            _ => output.push(attr.clone()),
        }
    }
    output
}
