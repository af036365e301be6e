mod common;

use common::*;
use env_logger::Env;
use mrt_ingest::config::{DecoderLimits, IngestConfig, PacingConfig, TableDumpConfig};
use mrt_ingest::connection::{
    CancellationToken, Conversation, MrtConnection, ReconstructorState, TableDumpReconstructor,
};
use mrt_ingest::models::{AsnLength, MessageKind, RawRecord};
use mrt_ingest::session::*;
use mrt_ingest::{MessageQueue, ParserError, RecordReader};
use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn frame(data: Vec<u8>) -> Vec<RawRecord> {
    let mut reader = RecordReader::new(Cursor::new(data), DecoderLimits::default());
    let mut records = vec![];
    while let Ok(record) = reader.read_record() {
        records.push(record);
    }
    records
}

fn feed(reconstructor: &mut TableDumpReconstructor, data: Vec<u8>) {
    for record in frame(data) {
        reconstructor.handle_record(&record).unwrap();
    }
}

/// Attributes of a serialized UPDATE as (flags, code, value).
fn update_attributes(msg: &[u8]) -> Vec<(u8, u8, Vec<u8>)> {
    assert_eq!(&msg[..16], &[0xFF; 16]);
    assert_eq!(u16::from_be_bytes([msg[16], msg[17]]) as usize, msg.len());
    assert_eq!(msg[18], 2);
    assert_eq!(&msg[19..21], &[0, 0]);
    let attr_len = u16::from_be_bytes([msg[21], msg[22]]) as usize;
    let mut attrs = &msg[23..23 + attr_len];
    let mut out = vec![];
    while !attrs.is_empty() {
        let (flags, code) = (attrs[0], attrs[1]);
        let (len, start) = if flags & 0x10 != 0 {
            (u16::from_be_bytes([attrs[2], attrs[3]]) as usize, 4)
        } else {
            (attrs[2] as usize, 3)
        };
        out.push((flags, code, attrs[start..start + len].to_vec()));
        attrs = &attrs[start + len..];
    }
    out
}

fn attribute(attrs: &[(u8, u8, Vec<u8>)], code: u8) -> Option<Vec<u8>> {
    attrs.iter().find(|a| a.1 == code).map(|a| a.2.clone())
}

fn peer_key(peer: u8, asn: u32) -> SessionKey {
    SessionKey::new(
        asn,
        6447,
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, peer)),
        IpAddr::V4(collector_id()),
    )
}

fn two_peer_dump() -> Vec<u8> {
    let mut data = peer_index_record(&two_peer_index());
    data.extend(rib_ipv4_record(
        0,
        &[8, 10],
        &[
            (0, rib_attributes(&[65001, 3356], [192, 0, 2, 1])),
            (1, rib_attributes(&[4_200_000_002, 3356], [192, 0, 2, 2])),
        ],
    ));
    data.extend(rib_ipv4_record(
        1,
        &[16, 192, 168],
        &[(0, rib_attributes(&[65001], [192, 0, 2, 1]))],
    ));
    data
}

#[test]
fn test_two_peer_round_trip() {
    let sessions = InMemorySessionTable::new();
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    feed(&mut reconstructor, two_peer_dump());
    reconstructor.finish_stream();
    assert_eq!(reconstructor.state(), ReconstructorState::Draining);
    assert_eq!(reconstructor.tables()[0].routes.len(), 2);
    assert_eq!(reconstructor.tables()[1].routes.len(), 1);

    let first = sessions.find(&peer_key(1, 65001)).unwrap();
    let second = sessions.find(&peer_key(2, 4_200_000_002)).unwrap();
    let record = sessions.get(first).unwrap();
    assert_eq!(record.state, SessionState::Provisional);
    assert_eq!(record.last_event, SessionEvent::ManualStop);
    assert_eq!(record.asn_len, None);

    // live updates established both sessions, the first one speaking 2 byte ASNs
    sessions.set_state(first, SessionState::MrtEstablished, SessionEvent::None);
    sessions.set_as_number_width(first, AsnLength::Bits16);
    sessions.set_state(second, SessionState::MrtEstablished, SessionEvent::None);

    let queue = MessageQueue::new(100, PacingConfig::default());
    let reader = queue.register_reader();
    let writer = queue.register_writer();
    let mut sleeps = 0;
    let report = reconstructor.drain(&writer, &CancellationToken::new(), |_| sleeps += 1);
    assert_eq!(report.flushed_peers, 2);
    assert_eq!(report.flushed_routes, 3);
    assert_eq!(report.rounds, 1);
    assert_eq!(sleeps, 1);
    assert_eq!(report.cleaned_peers, 0);
    assert_eq!(reconstructor.state(), ReconstructorState::Done);

    let mut messages = vec![];
    while let Some(m) = reader.try_read() {
        messages.push(m);
    }
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.kind == MessageKind::TableTransfer));

    let first_messages: Vec<_> = messages.iter().filter(|m| m.session_id == first).collect();
    assert_eq!(first_messages.len(), 2);
    let attrs = update_attributes(&first_messages[0].bytes);
    // 2 byte session: narrow AS_PATH, no AS4_PATH needed
    assert_eq!(attribute(&attrs, 2).unwrap(), vec![2, 2, 0xfd, 0xe9, 0x0d, 0x1c]);
    assert_eq!(attribute(&attrs, 17), None);
    assert_eq!(
        attribute(&attrs, 14).unwrap(),
        vec![0, 1, 1, 4, 192, 0, 2, 1, 0, 8, 10]
    );
    let attrs = update_attributes(&first_messages[1].bytes);
    assert_eq!(
        attribute(&attrs, 14).unwrap(),
        vec![0, 1, 1, 4, 192, 0, 2, 1, 0, 16, 192, 168]
    );

    let second_message = messages.iter().find(|m| m.session_id == second).unwrap();
    let attrs = update_attributes(&second_message.bytes);
    let mut path = vec![2, 2];
    path.extend(4_200_000_002u32.to_be_bytes());
    path.extend(3356u32.to_be_bytes());
    assert_eq!(attribute(&attrs, 2).unwrap(), path);
    assert_eq!(
        attribute(&attrs, 14).unwrap(),
        vec![0, 1, 1, 4, 192, 0, 2, 2, 0, 8, 10]
    );
    // prefix travels in MP_REACH_NLRI, not as trailing NLRI
    let attr_len = u16::from_be_bytes([second_message.bytes[21], second_message.bytes[22]]);
    assert_eq!(second_message.bytes.len(), 23 + attr_len as usize);

    assert_eq!(sessions.get(first).unwrap().message_count, 2);
    assert_eq!(sessions.get(second).unwrap().message_count, 1);

    // a second drain finds nothing left and never sleeps
    let mut sleeps = 0;
    let report = reconstructor.drain(&writer, &CancellationToken::new(), |_| sleeps += 1);
    assert_eq!(sleeps, 0);
    assert_eq!(report.flushed_routes, 0);
    assert!(reader.try_read().is_none());
}

#[test]
fn test_empty_tables_drain_without_sleeping() {
    let sessions = InMemorySessionTable::new();
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    feed(&mut reconstructor, peer_index_record(&two_peer_index()));
    reconstructor.finish_stream();

    let queue = MessageQueue::new(10, PacingConfig::default());
    let writer = queue.register_writer();
    let mut sleeps = 0;
    let report = reconstructor.drain(&writer, &CancellationToken::new(), |_| sleeps += 1);
    assert_eq!(sleeps, 0);
    assert_eq!(report.rounds, 0);
    // nothing arrived for either peer: their stored routes are deleted
    assert_eq!(report.cleaned_peers, 2);
    for (_, record) in sessions.sessions() {
        assert_eq!(record.state, SessionState::Error);
        assert_eq!(record.rib_cleanings, 1);
    }
}

#[test]
fn test_malformed_record_discards_held_batch() {
    let sessions = InMemorySessionTable::new();
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);

    let mut data = peer_index_record(&two_peer_index());
    data.extend(rib_ipv4_record(
        0,
        &[8, 10],
        &[(0, rib_attributes(&[65001], [192, 0, 2, 1]))],
    ));
    // attribute length runs past the end of the entry
    let mut bad_attrs = rib_attributes(&[65001], [192, 0, 2, 1]);
    bad_attrs[2] = 200;
    data.extend(rib_ipv4_record(1, &[8, 11], &[(0, bad_attrs)]));
    data.extend(rib_ipv4_record(
        2,
        &[8, 12],
        &[(1, rib_attributes(&[65002], [192, 0, 2, 2]))],
    ));
    feed(&mut reconstructor, data);
    assert_eq!(reconstructor.state(), ReconstructorState::Draining);

    reconstructor.finish_stream();
    assert!(reconstructor.tables().iter().all(|t| t.routes.is_empty()));
    assert!(reconstructor.tables().iter().all(|t| !t.has_data));
    assert_eq!(reconstructor.stats().discarded_batches, 1);
    assert_eq!(reconstructor.stats().committed_routes, 0);
}

#[test]
fn test_recovery_and_invalid_prefix_discard_held_batch() {
    let sessions = InMemorySessionTable::new();
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    let mut records = frame(two_peer_dump());
    records[2].recovered_skips = 1;
    for record in &records {
        reconstructor.handle_record(record).unwrap();
    }
    // the first RIB record was still held when recovery happened
    assert_eq!(reconstructor.stats().discarded_batches, 1);

    let bad_prefix = frame(rib_ipv4_record(
        2,
        &[33, 1, 2, 3, 4, 5],
        &[(0, rib_attributes(&[65001], [192, 0, 2, 1]))],
    ));
    reconstructor.handle_record(&bad_prefix[0]).unwrap();
    assert_eq!(reconstructor.state(), ReconstructorState::Streaming);
    assert_eq!(reconstructor.stats().discarded_batches, 2);

    feed(
        &mut reconstructor,
        rib_ipv4_record(3, &[8, 13], &[(1, rib_attributes(&[65002], [192, 0, 2, 2]))]),
    );
    reconstructor.finish_stream();
    assert!(reconstructor.tables()[0].routes.is_empty());
    assert_eq!(reconstructor.tables()[1].routes.len(), 1);
    assert_eq!(
        reconstructor.tables()[1].routes[0].prefix.to_string(),
        "13.0.0.0/8"
    );
}

#[test]
fn test_failed_framing_discards_held_batch() {
    let sessions = InMemorySessionTable::new();
    let queue = MessageQueue::new(100, PacingConfig::default());
    let writer = queue.register_writer();

    let mut data = two_peer_dump();
    data.extend(header_only(TABLE_DUMP_V2, 2, 100_000));
    data.extend([0u8; 30]);
    let mut reader = RecordReader::new(Cursor::new(data), DecoderLimits::default());
    let first = reader.read_record().unwrap();

    let config = TableDumpConfig {
        drain_poll_attempts: 1,
        ..Default::default()
    };
    let (stats, outcome) = TableDumpReconstructor::new(&sessions, config, LabelAction::Label)
        .run(&mut reader, first, &writer, &CancellationToken::new(), |_| {});
    assert!(matches!(outcome, Err(ParserError::FatalRead(_))));
    // the second RIB record never saw a successor
    assert_eq!(stats.committed_routes, 2);
    assert_eq!(stats.discarded_batches, 1);
}

#[test]
fn test_out_of_range_peer_ends_streaming() {
    let sessions = InMemorySessionTable::new();
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    let mut data = peer_index_record(&two_peer_index());
    data.extend(rib_ipv4_record(
        0,
        &[8, 10],
        &[(5, rib_attributes(&[65001], [192, 0, 2, 1]))],
    ));
    feed(&mut reconstructor, data);
    assert_eq!(reconstructor.state(), ReconstructorState::Draining);
}

#[test]
fn test_conversation_aborts() {
    let sessions = InMemorySessionTable::new();

    // must open with the peer index table
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    let rib = frame(rib_ipv4_record(
        0,
        &[8, 10],
        &[(0, rib_attributes(&[65001], [192, 0, 2, 1]))],
    ));
    assert!(matches!(
        reconstructor.handle_record(&rib[0]),
        Err(ParserError::UnexpectedSubtype {
            entry_type: 13,
            subtype: 2
        })
    ));

    let index = frame(peer_index_record(&two_peer_index()));
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    reconstructor.handle_record(&index[0]).unwrap();
    assert!(matches!(
        reconstructor.handle_record(&index[0]),
        Err(ParserError::UnexpectedSubtype { subtype: 1, .. })
    ));

    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    reconstructor.handle_record(&index[0]).unwrap();
    let update = frame(update_record_as2(65001, [192, 0, 2, 1], &[]));
    assert!(matches!(
        reconstructor.handle_record(&update[0]),
        Err(ParserError::UnexpectedType(16))
    ));

    // add-path RIBs are skipped, unknown subtypes abort
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    reconstructor.handle_record(&index[0]).unwrap();
    let add_path = frame(record(TABLE_DUMP_V2, 8, &[0u8; 40]));
    reconstructor.handle_record(&add_path[0]).unwrap();
    assert_eq!(reconstructor.stats().skipped_records, 1);
    let unknown = frame(record(TABLE_DUMP_V2, 99, &[0u8; 40]));
    assert!(matches!(
        reconstructor.handle_record(&unknown[0]),
        Err(ParserError::UnexpectedSubtype { subtype: 99, .. })
    ));
}

#[test]
fn test_unestablished_sessions_cleaned_after_budget() {
    let sessions = InMemorySessionTable::new();
    let config = TableDumpConfig {
        drain_poll_attempts: 3,
        ..Default::default()
    };
    let mut reconstructor = TableDumpReconstructor::new(&sessions, config, LabelAction::Label);
    feed(&mut reconstructor, two_peer_dump());
    reconstructor.finish_stream();

    let queue = MessageQueue::new(10, PacingConfig::default());
    let reader = queue.register_reader();
    let writer = queue.register_writer();
    let mut sleeps = 0;
    let report = reconstructor.drain(&writer, &CancellationToken::new(), |_| sleeps += 1);
    assert_eq!(report.rounds, 3);
    assert_eq!(sleeps, 3);
    assert_eq!(report.flushed_peers, 0);
    assert_eq!(report.cleaned_peers, 2);
    assert!(reader.try_read().is_none());
    assert!(reconstructor.tables().iter().all(|t| t.routes.is_empty()));
    for (_, record) in sessions.sessions() {
        assert_eq!(record.state, SessionState::Error);
        assert_eq!(record.rib_cleanings, 1);
    }
}

#[test]
fn test_cancelled_drain_leaves_sessions_alone() {
    let sessions = InMemorySessionTable::new();
    let mut reconstructor =
        TableDumpReconstructor::new(&sessions, TableDumpConfig::default(), LabelAction::Label);
    feed(&mut reconstructor, two_peer_dump());
    reconstructor.finish_stream();

    let queue = MessageQueue::new(10, PacingConfig::default());
    let writer = queue.register_writer();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut sleeps = 0;
    let report = reconstructor.drain(&writer, &cancel, |_| sleeps += 1);
    assert!(report.cancelled);
    assert_eq!(sleeps, 0);
    assert_eq!(report.cleaned_peers, 0);
    for (_, record) in sessions.sessions() {
        assert_eq!(record.state, SessionState::Provisional);
    }
}

#[test]
fn test_connection_runs_table_dump() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
    let sessions = Arc::new(InMemorySessionTable::new());
    let mut config = IngestConfig::default();
    config.table_dump.drain_poll_interval_ms = 1;
    config.table_dump.drain_poll_attempts = 2;
    let queue = MessageQueue::new(10, config.pacing);
    let connection = MrtConnection::new(
        7,
        Cursor::new(two_peer_dump()),
        sessions.clone(),
        queue.register_writer(),
        config,
    );
    let summary = connection.run();
    assert_eq!(summary.id, 7);
    assert_eq!(summary.records_read, 3);
    assert!(summary.error.is_none());
    match summary.conversation {
        Conversation::TableDump(stats) => {
            assert_eq!(stats.records, 3);
            assert_eq!(stats.committed_routes, 3);
            assert_eq!(stats.drain.rounds, 2);
            assert_eq!(stats.drain.cleaned_peers, 2);
        }
        other => panic!("unexpected conversation {other:?}"),
    }
    assert_eq!(sessions.len(), 2);
}
