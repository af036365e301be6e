//! MRT table dump version 2 structs
use crate::models::{Afi, NetworkPrefix, RawAttribute, Safi};
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::net::{IpAddr, Ipv4Addr};

/// TableDump version 2 subtypes.
///
/// <https://www.iana.org/assignments/mrt/mrt.xhtml#subtype-codes>
#[derive(Debug, TryFromPrimitive, IntoPrimitive, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum TableDumpV2Type {
    PeerIndexTable = 1,
    RibIpv4Unicast = 2,
    RibIpv4Multicast = 3,
    RibIpv6Unicast = 4,
    RibIpv6Multicast = 5,
    RibGeneric = 6,
    GeoPeerTable = 7,
    RibIpv4UnicastAddPath = 8,
    RibIpv4MulticastAddPath = 9,
    RibIpv6UnicastAddPath = 10,
    RibIpv6MulticastAddPath = 11,
    RibGenericAddPath = 12,
}

impl TableDumpV2Type {
    /// Subtypes that are recognised but carry nothing this system forwards.
    pub const fn is_ignored(&self) -> bool {
        matches!(
            self,
            TableDumpV2Type::GeoPeerTable
                | TableDumpV2Type::RibIpv4UnicastAddPath
                | TableDumpV2Type::RibIpv4MulticastAddPath
                | TableDumpV2Type::RibIpv6UnicastAddPath
                | TableDumpV2Type::RibIpv6MulticastAddPath
                | TableDumpV2Type::RibGenericAddPath
        )
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct PeerType: u8 {
        const AS_SIZE_32BIT = 0x2;
        const ADDRESS_FAMILY_IPV6 = 0x1;
    }
}

/// peer index table.
///
/// ```text
///    An initial PEER_INDEX_TABLE MRT record provides the BGP ID of the
///    collector, an OPTIONAL view name, and a list of indexed peers.
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIndexTable {
    pub collector_bgp_id: Ipv4Addr,
    pub view_name: String,
    /// Peers in index order; RIB entries refer to them by position.
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    pub peer_type: PeerType,
    pub peer_bgp_id: Ipv4Addr,
    pub peer_address: IpAddr,
    pub peer_asn: u32,
}

impl Peer {
    pub fn new(peer_bgp_id: Ipv4Addr, peer_address: IpAddr, peer_asn: u32) -> Self {
        let mut peer_type = PeerType::empty();
        if peer_asn > u16::MAX as u32 {
            peer_type.insert(PeerType::AS_SIZE_32BIT);
        }
        if peer_address.is_ipv6() {
            peer_type.insert(PeerType::ADDRESS_FAMILY_IPV6);
        }
        Peer {
            peer_type,
            peer_bgp_id,
            peer_address,
            peer_asn,
        }
    }
}

/// One RIB record: a prefix and the routes every peer holds for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibRecord {
    pub sequence_number: u32,
    pub afi: Afi,
    pub safi: Safi,
    pub prefix: NetworkPrefix,
    pub entries: Vec<RibEntry>,
}

/// RIB entry with its path attributes already rewritten to their on-wire BGP shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibEntry {
    pub peer_index: u16,
    pub originated_time: u32,
    pub attributes: Vec<RawAttribute>,
}

/// A route held in a per-peer table until its session is ready for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibRoute {
    pub afi: Afi,
    pub safi: Safi,
    pub prefix: NetworkPrefix,
    pub attributes: Vec<RawAttribute>,
}

impl RibRoute {
    /// True when the prefix travels inside MP_REACH_NLRI rather than the UPDATE NLRI field.
    pub fn has_mp_reach(&self) -> bool {
        self.attributes.iter().any(RawAttribute::is_mp_reach)
    }
}
