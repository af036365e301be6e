use bytes::{BufMut, BytesMut};
use ipnet::IpNet;
use std::fmt::{Debug, Display, Formatter};

/// A network prefix as carried in NLRI fields.
///
/// The address keeps whatever trailing bits were present on the wire so the prefix encodes
/// back to exactly the bytes it was read from.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct NetworkPrefix {
    pub prefix: IpNet,
}

impl Debug for NetworkPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

impl Display for NetworkPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

impl NetworkPrefix {
    pub fn new(prefix: IpNet) -> NetworkPrefix {
        NetworkPrefix { prefix }
    }

    /// Number of bytes [Self::encode_to] appends: one length byte plus the rounded-up prefix.
    pub fn encoded_len(&self) -> usize {
        1 + self.prefix.prefix_len().div_ceil(8) as usize
    }

    /// Appends the NLRI form (bit length followed by `ceil(len/8)` address bytes).
    pub fn encode_to(&self, bytes: &mut BytesMut) {
        let bit_len = self.prefix.prefix_len();
        let byte_len = bit_len.div_ceil(8) as usize;
        bytes.put_u8(bit_len);

        match self.prefix {
            IpNet::V4(prefix) => {
                bytes.put_slice(&prefix.addr().octets()[0..byte_len]);
            }
            IpNet::V6(prefix) => {
                bytes.put_slice(&prefix.addr().octets()[0..byte_len]);
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_encode_prefix() {
        let prefix = NetworkPrefix::new(IpNet::from_str("192.168.0.0/24").unwrap());
        let mut bytes = BytesMut::new();
        prefix.encode_to(&mut bytes);
        assert_eq!(bytes.as_ref(), &[24, 192, 168, 0]);
        assert_eq!(prefix.encoded_len(), 4);

        let prefix = NetworkPrefix::new(IpNet::from_str("2001:db8::/33").unwrap());
        let mut bytes = BytesMut::new();
        prefix.encode_to(&mut bytes);
        assert_eq!(bytes.as_ref(), &[33, 0x20, 0x01, 0x0d, 0xb8, 0]);
    }

    #[test]
    fn test_trailing_bits_preserved() {
        // 10.1.2.3/20 keeps the .2 byte's trailing bits
        let prefix = NetworkPrefix::new(IpNet::from_str("10.1.2.3/20").unwrap());
        let mut bytes = BytesMut::new();
        prefix.encode_to(&mut bytes);
        assert_eq!(bytes.as_ref(), &[20, 10, 1, 2]);
    }
}
