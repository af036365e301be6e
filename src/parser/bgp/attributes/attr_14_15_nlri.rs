use crate::models::*;
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::{BufMut, Bytes, BytesMut};

/// Rebuilds a table-dump MP_REACH_NLRI value into its BGP form.
///
/// <https://datatracker.ietf.org/doc/html/rfc6396#section-4.3.4>: inside RIB entries the
/// attribute only carries the next hop length and next hop; AFI, SAFI and NLRI come from the
/// record and the reserved byte is omitted.
///
/// <https://datatracker.ietf.org/doc/html/rfc4760#section-3>
/// The attribute is rebuilt as shown below:
/// +---------------------------------------------------------+
/// | Address Family Identifier (2 octets)                    |
/// +---------------------------------------------------------+
/// | Subsequent Address Family Identifier (1 octet)          |
/// +---------------------------------------------------------+
/// | Length of Next Hop Network Address (1 octet)            |
/// +---------------------------------------------------------+
/// | Network Address of Next Hop (variable)                  |
/// +---------------------------------------------------------+
/// | Reserved (1 octet)                                      |
/// +---------------------------------------------------------+
/// | Network Layer Reachability Information (variable)       |
/// +---------------------------------------------------------+
///
/// Some collectors write the full form anyway. A zero first byte cannot be a next hop length,
/// so such values are passed through untouched.
pub fn rebuild_mp_reach(
    mut input: Bytes,
    afi: Afi,
    safi: Safi,
    prefix: &NetworkPrefix,
) -> Result<Bytes, ParserError> {
    if input.first() == Some(&0) {
        return Ok(input);
    }

    let malformed = |_| {
        ParserError::MalformedAttribute(
            "MP_REACH_NLRI next hop exceeds attribute length".to_string(),
        )
    };
    let next_hop_length = input.read_u8().map_err(malformed)? as usize;
    let next_hop = input.split_n(next_hop_length).map_err(malformed)?;

    let mut output = BytesMut::with_capacity(5 + next_hop_length + prefix.encoded_len());
    output.put_u16(afi.into());
    output.put_u8(safi.into());
    output.put_u8(next_hop_length as u8);
    output.put_slice(&next_hop);
    // reserved
    output.put_u8(0);
    prefix.encode_to(&mut output);
    Ok(output.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnet::IpNet;
    use std::str::FromStr;

    #[test]
    fn test_rebuild_ipv6() {
        let prefix = NetworkPrefix::new(IpNet::from_str("2001:db8::/32").unwrap());
        let mut value = vec![16];
        value.extend([0x20, 0x01, 0x0d, 0xb8]);
        value.extend([0u8; 11]);
        value.push(1);

        let rebuilt =
            rebuild_mp_reach(Bytes::from(value), Afi::Ipv6, Safi::Multicast, &prefix).unwrap();
        assert_eq!(&rebuilt[..4], &[0, 2, 2, 16]);
        assert_eq!(rebuilt[4 + 15], 1);
        // reserved, then NLRI
        assert_eq!(&rebuilt[20..], &[0, 32, 0x20, 0x01, 0x0d, 0xb8]);
    }

    #[test]
    fn test_full_form_passthrough() {
        let prefix = NetworkPrefix::new(IpNet::from_str("10.0.0.0/8").unwrap());
        let full = Bytes::from_static(&[0, 1, 1, 4, 1, 2, 3, 4, 0, 8, 10]);
        let out = rebuild_mp_reach(full.clone(), Afi::Ipv4, Safi::Unicast, &prefix).unwrap();
        assert_eq!(out, full);
    }

    #[test]
    fn test_next_hop_overrun() {
        let prefix = NetworkPrefix::new(IpNet::from_str("10.0.0.0/8").unwrap());
        let value = Bytes::from_static(&[16, 1, 2, 3]);
        assert!(matches!(
            rebuild_mp_reach(value, Afi::Ipv4, Safi::Unicast, &prefix),
            Err(ParserError::MalformedAttribute(_))
        ));
    }
}
