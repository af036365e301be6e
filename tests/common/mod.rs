//! Builders for synthetic MRT byte streams.
#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use mrt_ingest::models::{Peer, PeerIndexTable, RecordHeader};
use std::net::{IpAddr, Ipv4Addr};

pub const BGP4MP: u16 = 16;
pub const TABLE_DUMP_V2: u16 = 13;

pub fn record(entry_type: u16, subtype: u16, body: &[u8]) -> Vec<u8> {
    let header = RecordHeader {
        timestamp: 1_700_000_000,
        entry_type,
        entry_subtype: subtype,
        length: body.len() as u32,
    };
    let mut out = header.encode().to_vec();
    out.extend_from_slice(body);
    out
}

/// A bare header claiming `length` body bytes, with nothing behind it.
pub fn header_only(entry_type: u16, subtype: u16, length: u32) -> Vec<u8> {
    let header = RecordHeader {
        timestamp: 1_700_000_000,
        entry_type,
        entry_subtype: subtype,
        length,
    };
    header.encode().to_vec()
}

/// Minimal UPDATE: no withdrawals, no attributes, `nlri` as given.
pub fn bgp_update(nlri: &[u8]) -> Vec<u8> {
    let mut msg = vec![0xFF; 16];
    msg.extend(((23 + nlri.len()) as u16).to_be_bytes());
    msg.push(2);
    msg.extend([0, 0, 0, 0]);
    msg.extend_from_slice(nlri);
    msg
}

/// BGP4MP_MESSAGE (2 byte ASNs) body over IPv4.
pub fn bgp4mp_as2(peer_asn: u16, peer_ip: [u8; 4], message: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u16(peer_asn);
    buf.put_u16(6447);
    buf.put_u16(0);
    buf.put_u16(1);
    buf.put_slice(&peer_ip);
    buf.put_slice(&[198, 51, 100, 1]);
    buf.put_slice(message);
    buf.to_vec()
}

/// BGP4MP_MESSAGE_AS4 body over IPv4.
pub fn bgp4mp_as4(peer_asn: u32, peer_ip: [u8; 4], message: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(peer_asn);
    buf.put_u32(6447);
    buf.put_u16(0);
    buf.put_u16(1);
    buf.put_slice(&peer_ip);
    buf.put_slice(&[198, 51, 100, 1]);
    buf.put_slice(message);
    buf.to_vec()
}

pub fn update_record_as2(peer_asn: u16, peer_ip: [u8; 4], nlri: &[u8]) -> Vec<u8> {
    record(BGP4MP, 1, &bgp4mp_as2(peer_asn, peer_ip, &bgp_update(nlri)))
}

pub fn collector_id() -> Ipv4Addr {
    Ipv4Addr::new(10, 255, 0, 1)
}

pub fn two_peer_index() -> PeerIndexTable {
    PeerIndexTable {
        collector_bgp_id: collector_id(),
        view_name: "rib".to_string(),
        peers: vec![
            Peer::new(
                Ipv4Addr::new(192, 0, 2, 1),
                IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
                65001,
            ),
            Peer::new(
                Ipv4Addr::new(192, 0, 2, 2),
                IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2)),
                4_200_000_002,
            ),
        ],
    }
}

pub fn peer_index_record(index: &PeerIndexTable) -> Vec<u8> {
    record(TABLE_DUMP_V2, 1, &index.encode())
}

/// ORIGIN, a 4 byte AS_PATH and an abbreviated MP_REACH_NLRI with an IPv4 next hop.
pub fn rib_attributes(path: &[u32], next_hop: [u8; 4]) -> Vec<u8> {
    let mut attrs = vec![0x40, 1, 1, 0];
    attrs.extend([0x40, 2, (2 + 4 * path.len()) as u8, 2, path.len() as u8]);
    for asn in path {
        attrs.extend(asn.to_be_bytes());
    }
    attrs.extend([0x80, 14, 5, 4]);
    attrs.extend(next_hop);
    attrs
}

/// RIB_IPV4_UNICAST body. `prefix` is in NLRI form.
pub fn rib_ipv4_body(sequence: u32, prefix: &[u8], entries: &[(u16, Vec<u8>)]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32(sequence);
    buf.put_slice(prefix);
    buf.put_u16(entries.len() as u16);
    for (peer_index, attrs) in entries {
        buf.put_u16(*peer_index);
        buf.put_u32(1_700_000_000);
        buf.put_u16(attrs.len() as u16);
        buf.put_slice(attrs);
    }
    buf.freeze()
}

pub fn rib_ipv4_record(sequence: u32, prefix: &[u8], entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
    record(TABLE_DUMP_V2, 2, &rib_ipv4_body(sequence, prefix, entries))
}
