//! BGP path attribute structs
use bitflags::bitflags;
use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

bitflags! {
    /// The high-order bit (bit 0) of the Attribute Flags octet is the
    /// Optional bit. The second is the Transitive bit, the third the Partial bit.
    ///
    /// The fourth high-order bit (bit 3) of the Attribute Flags octet
    /// is the Extended Length bit.  It defines whether the Attribute
    /// Length is one octet (if set to 0) or two octets (if set to 1).
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AttrFlags: u8 {
        const OPTIONAL   = 0b10000000;
        const TRANSITIVE = 0b01000000;
        const PARTIAL    = 0b00100000;
        const EXTENDED   = 0b00010000;
    }
}

/// Attribute type codes this crate looks inside of. Every other attribute is carried opaquely.
#[allow(non_camel_case_types)]
#[derive(Debug, TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Hash, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AttrType {
    ORIGIN = 1,
    AS_PATH = 2,
    NEXT_HOP = 3,
    AGGREGATOR = 7,
    /// <https://tools.ietf.org/html/rfc4760>
    MP_REACHABLE_NLRI = 14,
    MP_UNREACHABLE_NLRI = 15,
    AS4_PATH = 17,
    AS4_AGGREGATOR = 18,
}

/// A path attribute kept as flags, code and value bytes.
///
/// The length field is not stored: it is derived from `value` when the attribute is written,
/// and the EXTENDED flag is recomputed at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub flags: AttrFlags,
    pub code: u8,
    pub value: Bytes,
}

impl RawAttribute {
    pub fn new(flags: AttrFlags, code: AttrType, value: Bytes) -> Self {
        RawAttribute {
            flags,
            code: code.into(),
            value,
        }
    }

    pub fn attr_type(&self) -> Option<AttrType> {
        AttrType::try_from(self.code).ok()
    }

    pub fn is_mp_reach(&self) -> bool {
        self.code == u8::from(AttrType::MP_REACHABLE_NLRI)
    }

    /// Flags to put on the wire for the current value length.
    pub fn wire_flags(&self) -> AttrFlags {
        let mut flags = self.flags;
        flags.set(AttrFlags::EXTENDED, self.value.len() > u8::MAX as usize);
        flags
    }

    /// Bytes the attribute occupies on the wire, header included.
    pub fn encoded_len(&self) -> usize {
        let header = if self.wire_flags().contains(AttrFlags::EXTENDED) {
            4
        } else {
            3
        };
        header + self.value.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_flags_follow_length() {
        let short = RawAttribute::new(
            AttrFlags::TRANSITIVE | AttrFlags::EXTENDED,
            AttrType::ORIGIN,
            Bytes::from_static(&[0]),
        );
        assert_eq!(short.wire_flags(), AttrFlags::TRANSITIVE);
        assert_eq!(short.encoded_len(), 4);

        let long = RawAttribute::new(
            AttrFlags::TRANSITIVE,
            AttrType::AS_PATH,
            Bytes::from(vec![0u8; 300]),
        );
        assert!(long.wire_flags().contains(AttrFlags::EXTENDED));
        assert_eq!(long.encoded_len(), 304);
    }
}
