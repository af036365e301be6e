//! TABLE_DUMP_V2 conversation: rebuilds per-peer route tables and hands them to sessions once
//! live updates have established them.
use crate::config::TableDumpConfig;
use crate::connection::{CancellationToken, Lookahead};
use crate::encoder::encode_rib_update;
use crate::models::*;
use crate::parser::mrt::{parse_table_dump_v2_record, RecordReader, TableDumpV2Record};
use crate::queue::QueueWriter;
use crate::session::*;
use crate::ParserError;
use log::{debug, error, info, warn};
use std::io::Read;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructorState {
    AwaitIndex,
    Streaming,
    Draining,
    Done,
}

/// Routes collected for one entry of the peer index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerPeerTable {
    pub peer: Peer,
    pub session_id: SessionId,
    /// Any route was ever committed for this peer.
    pub has_data: bool,
    /// Flushed or cleaned; never looked at again.
    pub resolved: bool,
    pub routes: Vec<RibRoute>,
}

/// Routes of one RIB record, tagged with their peer index.
type Batch = Vec<(u16, RibRoute)>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub rounds: u32,
    pub sleeps: u32,
    pub flushed_peers: usize,
    pub flushed_routes: u64,
    pub cleaned_peers: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDumpStats {
    pub records: u64,
    pub committed_routes: u64,
    pub discarded_batches: u64,
    pub skipped_records: u64,
    pub drain: DrainReport,
}

pub struct TableDumpReconstructor<'a> {
    state: ReconstructorState,
    binder: &'a dyn SessionBinder,
    config: TableDumpConfig,
    label_action: LabelAction,
    index: Option<PeerIndexTable>,
    tables: Vec<PerPeerTable>,
    pending: Lookahead<Batch>,
    stats: TableDumpStats,
}

impl<'a> TableDumpReconstructor<'a> {
    pub fn new(
        binder: &'a dyn SessionBinder,
        config: TableDumpConfig,
        label_action: LabelAction,
    ) -> Self {
        TableDumpReconstructor {
            state: ReconstructorState::AwaitIndex,
            binder,
            config,
            label_action,
            index: None,
            tables: vec![],
            pending: Lookahead::new(),
            stats: TableDumpStats::default(),
        }
    }

    pub fn state(&self) -> ReconstructorState {
        self.state
    }

    pub fn tables(&self) -> &[PerPeerTable] {
        &self.tables
    }

    pub fn peer_index(&self) -> Option<&PeerIndexTable> {
        self.index.as_ref()
    }

    pub fn stats(&self) -> &TableDumpStats {
        &self.stats
    }

    /// Feeds one framed record. An `Err` aborts the conversation; decoding problems that only
    /// end streaming move the reconstructor to [ReconstructorState::Draining] instead.
    pub fn handle_record(&mut self, record: &RawRecord) -> Result<(), ParserError> {
        self.stats.records += 1;
        match self.state {
            ReconstructorState::AwaitIndex => self.handle_index(record),
            ReconstructorState::Streaming => self.handle_rib(record),
            ReconstructorState::Draining | ReconstructorState::Done => {
                debug!("record after streaming ended, ignored");
                Ok(())
            }
        }
    }

    fn handle_index(&mut self, record: &RawRecord) -> Result<(), ParserError> {
        let header = &record.header;
        if header.entry_type() != Some(EntryType::TABLE_DUMP_V2)
            || header.entry_subtype != u16::from(TableDumpV2Type::PeerIndexTable)
        {
            error!(
                "table dump must open with a peer index table, got type {} subtype {}",
                header.entry_type, header.entry_subtype
            );
            return Err(ParserError::UnexpectedSubtype {
                entry_type: header.entry_type,
                subtype: header.entry_subtype,
            });
        }
        let index = match parse_table_dump_v2_record(header.entry_subtype, record.payload.clone())? {
            TableDumpV2Record::PeerIndexTable(index) => index,
            other => {
                return Err(ParserError::ParseError(format!(
                    "expected a peer index table, decoded {:?}",
                    other
                )))
            }
        };

        // The collector's own identifier stands in for the local address. Live updates carry
        // the real local address, so both paths may bind different sessions for one peer.
        let local_addr = IpAddr::V4(index.collector_bgp_id);
        let mut tables = Vec::with_capacity(index.peers.len());
        for peer in &index.peers {
            let key = SessionKey::new(
                peer.peer_asn,
                self.config.local_asn,
                peer.peer_address,
                local_addr,
            )
            .with_ports(self.config.bgp_port, self.config.bgp_port);
            let session_id = match self.binder.find(&key) {
                Some(id) => id,
                None => {
                    let id = self.binder.create(&key, self.label_action, None)?;
                    self.binder
                        .set_state(id, SessionState::Provisional, SessionEvent::ManualStop);
                    id
                }
            };
            tables.push(PerPeerTable {
                peer: *peer,
                session_id,
                has_data: false,
                resolved: false,
                routes: vec![],
            });
        }
        info!(
            "table dump of view '{}' from collector {} with {} peers",
            index.view_name,
            index.collector_bgp_id,
            index.peers.len()
        );
        self.tables = tables;
        self.index = Some(index);
        self.state = ReconstructorState::Streaming;
        Ok(())
    }

    fn handle_rib(&mut self, record: &RawRecord) -> Result<(), ParserError> {
        let header = &record.header;
        if record.recovered_skips > 0 {
            self.discard_held("stream needed recovery");
        }
        if header.entry_type() != Some(EntryType::TABLE_DUMP_V2) {
            error!(
                "MRT type {} inside a table dump conversation",
                header.entry_type
            );
            return Err(ParserError::UnexpectedType(header.entry_type));
        }

        match parse_table_dump_v2_record(header.entry_subtype, record.payload.clone()) {
            Ok(TableDumpV2Record::PeerIndexTable(_)) => {
                error!("second peer index table in one conversation");
                Err(ParserError::UnexpectedSubtype {
                    entry_type: header.entry_type,
                    subtype: header.entry_subtype,
                })
            }
            Ok(TableDumpV2Record::Skipped(t)) => {
                warn!("skipping unsupported table dump subtype {:?}", t);
                self.stats.skipped_records += 1;
                self.discard_held("record skipped");
                Ok(())
            }
            Ok(TableDumpV2Record::Rib(rib)) => {
                if rib.entries.is_empty() {
                    self.discard_held("record without entries");
                    return Ok(());
                }
                let peer_count = self.tables.len();
                if let Some(bad) = rib.entries.iter().find(|e| e.peer_index as usize >= peer_count) {
                    self.end_streaming(
                        record,
                        &ParserError::ParseError(format!(
                            "peer index {} outside of {} peers",
                            bad.peer_index, peer_count
                        )),
                    );
                    return Ok(());
                }
                let batch: Batch = rib
                    .entries
                    .into_iter()
                    .map(|entry| {
                        (
                            entry.peer_index,
                            RibRoute {
                                afi: rib.afi,
                                safi: rib.safi,
                                prefix: rib.prefix,
                                attributes: entry.attributes,
                            },
                        )
                    })
                    .collect();
                if let Some(confirmed) = self.pending.advance(batch) {
                    self.commit(confirmed);
                }
                Ok(())
            }
            Err(e @ ParserError::UnexpectedSubtype { .. }) => {
                error!("{}", e);
                Err(e)
            }
            Err(e @ ParserError::InvalidPrefixLength { .. }) => {
                warn!("skipping RIB record: {}", e);
                self.stats.skipped_records += 1;
                self.discard_held("record had an invalid prefix");
                Ok(())
            }
            Err(e) => {
                self.end_streaming(record, &e);
                Ok(())
            }
        }
    }

    /// A malformed record leaves nothing to synchronize on: drop what is held and stop reading.
    fn end_streaming(&mut self, record: &RawRecord, e: &ParserError) {
        error!(
            "malformed RIB record (subtype {} length {}), ending table dump: {}",
            record.header.entry_subtype, record.header.length, e
        );
        debug!("malformed record body: {}", hex::encode(&record.payload));
        self.discard_held("next record was malformed");
        self.state = ReconstructorState::Draining;
    }

    fn discard_held(&mut self, reason: &str) {
        if let Some(batch) = self.pending.discard() {
            self.stats.discarded_batches += 1;
            warn!("dropping {} held routes: {}", batch.len(), reason);
        }
    }

    fn commit(&mut self, batch: Batch) {
        for (peer_index, route) in batch {
            if let Some(table) = self.tables.get_mut(peer_index as usize) {
                table.routes.push(route);
                table.has_data = true;
                self.stats.committed_routes += 1;
            }
        }
    }

    /// Clean end of stream: the held batch has no successor to wait for.
    pub fn finish_stream(&mut self) {
        if let Some(batch) = self.pending.finish() {
            self.commit(batch);
        }
        if self.state == ReconstructorState::Streaming {
            self.state = ReconstructorState::Draining;
        }
    }

    fn all_tables_empty(&self) -> bool {
        self.tables.iter().all(|t| t.routes.is_empty())
    }

    /// Waits for sessions to become established and flushes their tables.
    ///
    /// Each round is followed by a call to `sleep`. Rounds stop early once every table is
    /// empty or on cancellation. When the budget runs out without cancellation, every peer
    /// still unresolved is treated as having received nothing.
    pub fn drain<F>(
        &mut self,
        writer: &QueueWriter,
        cancel: &CancellationToken,
        mut sleep: F,
    ) -> DrainReport
    where
        F: FnMut(Duration),
    {
        self.state = ReconstructorState::Draining;
        let mut report = DrainReport::default();
        for _ in 0..self.config.drain_poll_attempts {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.all_tables_empty() {
                info!("table transfer is empty");
                break;
            }
            if !self.drain_round(writer, &mut report) {
                report.cancelled = true;
                break;
            }
            report.rounds += 1;
            sleep(self.config.drain_poll_interval());
            report.sleeps += 1;
        }

        if !report.cancelled && !cancel.is_cancelled() {
            for i in 0..self.tables.len() {
                if !self.tables[i].resolved {
                    self.clean_peer(i);
                    report.cleaned_peers += 1;
                }
            }
        }
        self.state = ReconstructorState::Done;
        self.stats.drain = report.clone();
        report
    }

    /// One pass over all peers. Returns false if the queue stopped taking messages.
    fn drain_round(&mut self, writer: &QueueWriter, report: &mut DrainReport) -> bool {
        for i in 0..self.tables.len() {
            let table = &self.tables[i];
            if table.resolved
                || self.binder.state(table.session_id) != Some(SessionState::MrtEstablished)
            {
                continue;
            }
            let (has_routes, has_data) = (!table.routes.is_empty(), table.has_data);
            if has_routes {
                match self.flush_peer(i, writer) {
                    Some(sent) => {
                        report.flushed_peers += 1;
                        report.flushed_routes += sent;
                    }
                    None => return false,
                }
            } else if !has_data {
                self.clean_peer(i);
                report.cleaned_peers += 1;
            }
        }
        true
    }

    /// Sends a peer's table with its session's ASN width. `None` if the queue is closed.
    fn flush_peer(&mut self, i: usize, writer: &QueueWriter) -> Option<u64> {
        let session_id = self.tables[i].session_id;
        let asn_len = self
            .binder
            .as_number_width(session_id)
            .unwrap_or(AsnLength::Bits32);
        info!(
            "{} established with {:?} ASNs, sending {} routes",
            session_id,
            asn_len,
            self.tables[i].routes.len()
        );

        let routes = std::mem::take(&mut self.tables[i].routes);
        self.tables[i].resolved = true;
        let mut sent = 0;
        for route in &routes {
            let bytes = match encode_rib_update(route, asn_len) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("route {} not sent: {}", route.prefix, e);
                    continue;
                }
            };
            let message = DecodedMessage::new(session_id, MessageKind::TableTransfer, bytes);
            if let Err(e) = writer.enqueue(message) {
                error!("table transfer for {} stopped: {}", session_id, e);
                return None;
            }
            self.binder.increment_message_count(session_id);
            sent += 1;
        }
        Some(sent)
    }

    fn clean_peer(&mut self, i: usize) {
        let table = &mut self.tables[i];
        info!(
            "no table dump routes for {}, deleting its stored routes",
            table.session_id
        );
        self.binder.set_state(
            table.session_id,
            SessionState::Error,
            SessionEvent::ManualStop,
        );
        if let Err(e) = self.binder.clean_rib(table.session_id) {
            warn!("could not clean routes of {}: {}", table.session_id, e);
        }
        table.routes.clear();
        table.resolved = true;
    }

    /// Drops the tables, keeping the counters.
    pub fn close(self) -> TableDumpStats {
        self.stats
    }

    /// Runs the whole conversation: `first` is the opening record, the rest comes from
    /// `reader`. Streaming ends on end of stream, cancellation or a malformed record.
    pub fn run<R, F>(
        mut self,
        reader: &mut RecordReader<R>,
        first: RawRecord,
        writer: &QueueWriter,
        cancel: &CancellationToken,
        sleep: F,
    ) -> (TableDumpStats, Result<(), ParserError>)
    where
        R: Read,
        F: FnMut(Duration),
    {
        if let Err(e) = self.handle_record(&first) {
            return (self.close(), Err(e));
        }
        // an unreadable stream still drains what was committed before it broke
        let mut outcome = Ok(());
        while self.state == ReconstructorState::Streaming && !cancel.is_cancelled() {
            let record = match reader.read_record() {
                Ok(record) => record,
                Err(e) if e.is_end_of_stream() => {
                    info!("table dump stream ended: {}", e);
                    break;
                }
                Err(e) => {
                    error!("table dump stream failed: {}", e);
                    self.discard_held("next record failed to frame");
                    outcome = Err(e);
                    break;
                }
            };
            if let Err(e) = self.handle_record(&record) {
                return (self.close(), Err(e));
            }
        }
        self.finish_stream();
        self.drain(writer, cancel, sleep);
        (self.close(), outcome)
    }
}
