use crate::models::*;
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One AS_PATH segment: its type code (AS_SET, AS_SEQUENCE, confederation variants) and ASNs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsPathSegment {
    pub segment_type: u8,
    pub asns: Vec<u32>,
}

pub fn parse_as_path(mut input: Bytes, asn_len: AsnLength) -> Result<Vec<AsPathSegment>, ParserError> {
    let mut output = Vec::with_capacity(5);
    while input.remaining() > 0 {
        let segment_type = input.read_u8()?;
        let count = input.read_u8()? as usize;
        input.has_n_remaining(count * asn_len.bytes())?;
        let mut asns = Vec::with_capacity(count);
        for _ in 0..count {
            asns.push(input.read_asn(asn_len)?);
        }
        output.push(AsPathSegment { segment_type, asns });
    }
    Ok(output)
}

/// Encodes segments with the given ASN width. ASNs that do not fit in 2 bytes are written as
/// [AS_TRANS] when encoding with [AsnLength::Bits16].
pub fn encode_as_path(segments: &[AsPathSegment], asn_len: AsnLength) -> Bytes {
    let size = segments
        .iter()
        .map(|s| 2 + s.asns.len() * asn_len.bytes())
        .sum();
    let mut output = BytesMut::with_capacity(size);
    for segment in segments {
        output.put_u8(segment.segment_type);
        output.put_u8(segment.asns.len() as u8);
        for asn in &segment.asns {
            match asn_len {
                AsnLength::Bits16 => output.put_u16(u16::try_from(*asn).unwrap_or(AS_TRANS)),
                AsnLength::Bits32 => output.put_u32(*asn),
            }
        }
    }
    output.freeze()
}
