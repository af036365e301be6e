//! Live BGP4MP update conversation.
use crate::connection::{CancellationToken, Lookahead};
use crate::models::*;
use crate::parser::mrt::{parse_bgp4mp, parse_bgp4mp_et, Bgp4MpRecord, RecordReader};
use crate::queue::{QueueError, QueueWriter};
use crate::session::*;
use crate::ParserError;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::io::Read;

/// Counters of one update conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStreamStats {
    pub records: u64,
    pub submitted: u64,
    /// Decoded messages dropped because a later record turned out corrupt.
    pub discarded: u64,
    pub ignored: u64,
    pub corrupt: u64,
    /// Messages dropped because no session could be bound.
    pub unbound: u64,
    pub sessions: usize,
}

enum Decoded {
    Update(Bgp4MpUpdate),
    Ignored(Bgp4MpType),
    /// Bad record: drop what is pending and resynchronize.
    Corrupt(ParserError),
    /// Ends the conversation.
    Fatal(ParserError),
}

fn decode_record(record: &RawRecord) -> Decoded {
    let result = match record.header.entry_type() {
        Some(EntryType::BGP4MP) => parse_bgp4mp(record.header.entry_subtype, record.payload.clone()),
        Some(EntryType::BGP4MP_ET) => {
            parse_bgp4mp_et(record.header.entry_subtype, record.payload.clone())
        }
        Some(EntryType::TABLE_DUMP_V2) => {
            return Decoded::Fatal(ParserError::UnexpectedType(record.header.entry_type))
        }
        _ => return Decoded::Corrupt(ParserError::UnexpectedType(record.header.entry_type)),
    };
    match result {
        Ok(Bgp4MpRecord::Update(update)) => Decoded::Update(update),
        Ok(Bgp4MpRecord::Ignored(t)) => Decoded::Ignored(t),
        Err(e) => Decoded::Corrupt(e),
    }
}

/// Decodes BGP4MP records and forwards each embedded BGP message to the queue once the record
/// after it decodes too.
pub struct UpdateStream<'a> {
    binder: &'a dyn SessionBinder,
    writer: &'a QueueWriter,
    label_action: LabelAction,
    pending: Lookahead<Bgp4MpUpdate>,
    touched: BTreeSet<SessionId>,
    stats: UpdateStreamStats,
}

impl<'a> UpdateStream<'a> {
    pub fn new(
        binder: &'a dyn SessionBinder,
        writer: &'a QueueWriter,
        label_action: LabelAction,
    ) -> Self {
        UpdateStream {
            binder,
            writer,
            label_action,
            pending: Lookahead::new(),
            touched: BTreeSet::new(),
            stats: UpdateStreamStats::default(),
        }
    }

    pub fn stats(&self) -> &UpdateStreamStats {
        &self.stats
    }

    /// Runs the conversation until the stream ends, fails or is cancelled. `first` is a record
    /// already framed by the caller.
    ///
    /// Whatever ends the loop, the held message is submitted and every session this
    /// conversation fed is marked errored, since the feed for it stops here.
    pub fn run<R: Read>(
        mut self,
        reader: &mut RecordReader<R>,
        first: Option<RawRecord>,
        cancel: &CancellationToken,
    ) -> (UpdateStreamStats, Result<(), ParserError>) {
        let outcome = self.read_loop(reader, first, cancel);

        if let Some(update) = self.pending.finish() {
            info!("final submission");
            if let Err(e) = self.submit(update) {
                warn!("final message not submitted: {}", e);
            }
        }
        for id in &self.touched {
            self.binder
                .set_state(*id, SessionState::Error, SessionEvent::ManualStop);
        }
        self.stats.sessions = self.touched.len();
        (self.stats, outcome)
    }

    fn read_loop<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        mut next: Option<RawRecord>,
        cancel: &CancellationToken,
    ) -> Result<(), ParserError> {
        loop {
            if cancel.is_cancelled() {
                info!("update stream cancelled");
                return Ok(());
            }
            let record = match next.take() {
                Some(record) => record,
                None => match reader.read_record() {
                    Ok(record) => record,
                    Err(e) if e.is_end_of_stream() => {
                        info!("update stream ended: {}", e);
                        return Ok(());
                    }
                    Err(e) => {
                        self.discard_pending("next record failed to frame");
                        return Err(e);
                    }
                },
            };
            self.stats.records += 1;

            if record.recovered_skips > 0 {
                self.discard_pending("stream needed recovery");
            }

            match decode_record(&record) {
                Decoded::Update(update) => {
                    if let Some(previous) = self.pending.advance(update) {
                        if let Err(e) = self.submit(previous) {
                            error!("queue rejected message: {}", e);
                            return Ok(());
                        }
                    }
                }
                Decoded::Ignored(t) => {
                    self.stats.ignored += 1;
                    debug!("ignoring BGP4MP record of subtype {:?}", t);
                }
                Decoded::Corrupt(e) => {
                    self.stats.corrupt += 1;
                    warn!(
                        "corrupt record (type {} subtype {} length {}): {}",
                        record.header.entry_type,
                        record.header.entry_subtype,
                        record.header.length,
                        e
                    );
                    debug!("corrupt record body: {}", hex::encode(&record.payload));
                    self.discard_pending("next record was corrupt");
                    reader.resync()?;
                }
                Decoded::Fatal(e) => {
                    error!("update stream cannot carry this record: {}", e);
                    return Err(e);
                }
            }
        }
    }

    fn discard_pending(&mut self, reason: &str) {
        if let Some(update) = self.pending.discard() {
            self.stats.discarded += 1;
            warn!(
                "dropping message from AS{} ({}): {}",
                update.peer_asn, update.peer_ip, reason
            );
        }
    }

    /// Binds the message to its session and enqueues it. A session that cannot be created
    /// costs only this message.
    fn submit(&mut self, update: Bgp4MpUpdate) -> Result<(), QueueError> {
        let key = SessionKey::new(
            update.peer_asn,
            update.local_asn,
            update.peer_ip,
            update.local_ip,
        );
        let id = match self.binder.find(&key) {
            Some(id) => id,
            None => match self
                .binder
                .create(&key, self.label_action, Some(update.asn_len))
            {
                Ok(id) => id,
                Err(e) => {
                    self.stats.unbound += 1;
                    warn!("unable to create session for {}: {}", key, e);
                    return Ok(());
                }
            },
        };
        self.touched.insert(id);

        if self.binder.state(id) != Some(SessionState::MrtEstablished) {
            self.binder
                .set_state(id, SessionState::MrtEstablished, SessionEvent::None);
        }
        if self.binder.as_number_width(id).is_none() {
            self.binder.set_as_number_width(id, update.asn_len);
        }

        self.writer
            .enqueue(DecodedMessage::new(id, update.kind(), update.message))?;
        self.binder.increment_message_count(id);
        self.stats.submitted += 1;
        Ok(())
    }
}
