use bytes::{BufMut, BytesMut};
use criterion::{criterion_group, criterion_main, Criterion};
use mrt_ingest::config::{DecoderLimits, TableDumpConfig};
use mrt_ingest::connection::TableDumpReconstructor;
use mrt_ingest::models::{Peer, PeerIndexTable, RawRecord, RecordHeader};
use mrt_ingest::parser::mrt::{parse_bgp4mp, parse_table_dump_v2_record};
use mrt_ingest::session::{InMemorySessionTable, LabelAction};
use mrt_ingest::RecordReader;
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr};

const RECORDS_PER_TYPE: usize = 100;

fn record(entry_type: u16, subtype: u16, body: &[u8], out: &mut Vec<u8>) {
    let header = RecordHeader {
        timestamp: 1_700_000_000,
        entry_type,
        entry_subtype: subtype,
        length: body.len() as u32,
    };
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(body);
}

/// BGP4MP_MESSAGE_AS4 records with UPDATEs of growing NLRI counts.
fn bgp4mp_updates() -> Vec<u8> {
    let mut out = Vec::new();
    for n in 0..RECORDS_PER_TYPE {
        let nlri: Vec<u8> = (0..(n % 50) as u8).flat_map(|i| [24, 10, i, 0]).collect();
        let mut msg = vec![0xFF; 16];
        msg.extend(((23 + nlri.len()) as u16).to_be_bytes());
        msg.extend([2, 0, 0, 0, 0]);
        msg.extend(&nlri);

        let mut body = BytesMut::new();
        body.put_u32(64_512 + n as u32);
        body.put_u32(6447);
        body.put_u16(0);
        body.put_u16(1);
        body.put_slice(&[192, 0, 2, 1]);
        body.put_slice(&[198, 51, 100, 1]);
        body.put_slice(&msg);
        record(16, 4, &body, &mut out);
    }
    out
}

fn peer_index(peers: u8) -> PeerIndexTable {
    PeerIndexTable {
        collector_bgp_id: Ipv4Addr::new(10, 255, 0, 1),
        view_name: String::new(),
        peers: (0..peers)
            .map(|i| {
                Peer::new(
                    Ipv4Addr::new(192, 0, 2, i),
                    IpAddr::V4(Ipv4Addr::new(192, 0, 2, i)),
                    65000 + i as u32,
                )
            })
            .collect(),
    }
}

/// A peer index table followed by RIB_IPV4_UNICAST records, one entry per peer.
fn rib_ipv4_unicast(peers: u8) -> Vec<u8> {
    let mut out = Vec::new();
    record(13, 1, &peer_index(peers).encode(), &mut out);
    for n in 0..RECORDS_PER_TYPE as u32 {
        let mut body = BytesMut::new();
        body.put_u32(n);
        body.put_slice(&[24, 10, (n >> 8) as u8, n as u8]);
        body.put_u16(peers as u16);
        for peer in 0..peers {
            let attrs = [
                0x40, 1, 1, 0, // ORIGIN
                0x40, 2, 10, 2, 2, 0, 0, 0xfd, 0xe9, 0, 0, 0x0d, 0x1c, // AS_PATH
                0x80, 14, 5, 4, 192, 0, 2, peer, // MP_REACH_NLRI next hop
            ];
            body.put_u16(peer as u16);
            body.put_u32(1_700_000_000);
            body.put_u16(attrs.len() as u16);
            body.put_slice(&attrs);
        }
        record(13, 2, &body, &mut out);
    }
    out
}

fn frame_all(data: &[u8]) -> Vec<RawRecord> {
    let mut reader = RecordReader::new(data, DecoderLimits::default());
    let mut records = Vec::with_capacity(RECORDS_PER_TYPE + 1);
    while let Ok(record) = reader.read_record() {
        records.push(record);
    }
    records
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let updates = bgp4mp_updates();
    let rib = rib_ipv4_unicast(16);
    let update_records = frame_all(&updates);
    let rib_records = frame_all(&rib);

    c.bench_function("Framer", |b| {
        b.iter_with_large_drop(|| frame_all(black_box(&updates[..])))
    });

    c.bench_function("BGP4MP Update", |b| {
        b.iter(|| {
            for record in &update_records {
                let _ = black_box(parse_bgp4mp(
                    record.header.entry_subtype,
                    record.payload.clone(),
                ));
            }
        })
    });

    c.bench_function("TABLE_DUMP_V2 IPv4 Unicast", |b| {
        b.iter(|| {
            for record in &rib_records {
                let _ = black_box(parse_table_dump_v2_record(
                    record.header.entry_subtype,
                    record.payload.clone(),
                ));
            }
        })
    });

    c.bench_function("Table reconstruction", |b| {
        b.iter_with_large_drop(|| {
            let sessions = InMemorySessionTable::new();
            let mut reconstructor = TableDumpReconstructor::new(
                &sessions,
                TableDumpConfig::default(),
                LabelAction::Label,
            );
            for record in &rib_records {
                let _ = reconstructor.handle_record(black_box(record));
            }
            reconstructor.finish_stream();
            reconstructor.close()
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}
criterion_main!(benches);
