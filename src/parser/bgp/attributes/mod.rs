mod attr_02_17_as_path;
mod attr_07_18_aggregator;
mod attr_14_15_nlri;

use bytes::{Buf, Bytes};
use log::debug;

use crate::models::*;

use crate::error::ParserError;
use crate::parser::ReadUtils;

pub use attr_02_17_as_path::{encode_as_path, parse_as_path, AsPathSegment};
pub use attr_07_18_aggregator::parse_aggregator;
pub use attr_14_15_nlri::rebuild_mp_reach;

/// Walks the path attributes of one RIB entry.
///
/// Each attribute is `{flags, code, length, value}` with a 2 byte length when the EXTENDED flag
/// is set and a 1 byte length otherwise. MP_REACH_NLRI is rebuilt into its on-wire form with
/// the record's AFI, SAFI and prefix; every other attribute is kept as read.
///
/// A length that runs past the attribute block, or leftover bytes too short to hold an
/// attribute header, is [ParserError::MalformedAttribute].
pub fn parse_rib_attributes(
    mut data: Bytes,
    afi: Afi,
    safi: Safi,
    prefix: &NetworkPrefix,
) -> Result<Vec<RawAttribute>, ParserError> {
    let mut attributes: Vec<RawAttribute> = Vec::with_capacity(8);

    while data.remaining() >= 3 {
        // each attribute is at least 3 bytes: flag(1) + type(1) + length(1)
        let flags = AttrFlags::from_bits_retain(data.read_u8()?);
        let code = data.read_u8()?;
        let attr_length = match flags.contains(AttrFlags::EXTENDED) {
            false => data.read_u8()? as usize,
            true => data.read_u16().map_err(|_| {
                ParserError::MalformedAttribute(format!(
                    "attribute {} missing its extended length",
                    code
                ))
            })? as usize,
        };

        debug!(
            "reading attribute: type -- {:?}, length -- {}",
            &code, attr_length
        );
        if data.remaining() < attr_length {
            return Err(ParserError::MalformedAttribute(format!(
                "attribute {} declares {} bytes, {} left",
                code,
                attr_length,
                data.remaining()
            )));
        }
        let attr_data = data.split_to(attr_length);

        let value = if code == u8::from(AttrType::MP_REACHABLE_NLRI) {
            rebuild_mp_reach(attr_data, afi, safi, prefix)?
        } else {
            attr_data
        };
        attributes.push(RawAttribute { flags, code, value });
    }

    if data.has_remaining() {
        return Err(ParserError::MalformedAttribute(format!(
            "{} trailing bytes after attributes",
            data.remaining()
        )));
    }

    Ok(attributes)
}
