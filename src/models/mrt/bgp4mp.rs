//! BGP4MP structs
use crate::models::{AsnLength, MessageKind};
use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::net::IpAddr;

/// BGP4MP message subtypes.
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum Bgp4MpType {
    StateChange = 0,
    Message = 1,
    MessageAs4 = 4,
    StateChangeAs4 = 5,
    MessageLocal = 6,
    MessageAs4Local = 7,
}

impl Bgp4MpType {
    /// AS number width of the BGP4MP header for the message subtypes this system forwards.
    pub const fn forwarded_asn_len(&self) -> Option<AsnLength> {
        match self {
            Bgp4MpType::Message => Some(AsnLength::Bits16),
            Bgp4MpType::MessageAs4 => Some(AsnLength::Bits32),
            _ => None,
        }
    }
}

/// A decoded BGP4MP_MESSAGE(_AS4) record.
///
/// `message` is the embedded BGP message, marker included, exactly as it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bgp4MpUpdate {
    pub asn_len: AsnLength,
    pub peer_asn: u32,
    pub local_asn: u32,
    pub interface_index: u16,
    pub peer_ip: IpAddr,
    pub local_ip: IpAddr,
    pub message: Bytes,
}

impl Bgp4MpUpdate {
    pub const fn kind(&self) -> MessageKind {
        MessageKind::FromPeer
    }
}
