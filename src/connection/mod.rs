/*!
Per-connection driver.

Each collector connection runs on its own thread. The first record decides the conversation: a
TABLE_DUMP_V2 record opens a table dump, anything else is treated as a live update stream.
The thread releases its reader and tables itself before it exits.
*/
mod cancel;
mod lookahead;
pub mod table_dump;
pub mod update_stream;

pub use cancel::CancellationToken;
pub use lookahead::Lookahead;
pub use table_dump::{
    DrainReport, PerPeerTable, ReconstructorState, TableDumpReconstructor, TableDumpStats,
};
pub use update_stream::{UpdateStream, UpdateStreamStats};

use crate::config::IngestConfig;
use crate::models::EntryType;
use crate::parser::mrt::RecordReader;
use crate::queue::QueueWriter;
use crate::session::SessionBinder;
use crate::ParserError;
use log::{error, info, warn};
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Which conversation a connection carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    /// The stream ended before its first record.
    Empty,
    UpdateStream(UpdateStreamStats),
    TableDump(TableDumpStats),
}

#[derive(Debug)]
pub struct ConnectionSummary {
    pub id: u64,
    pub conversation: Conversation,
    pub records_read: u64,
    /// Recovery scans run on the stream.
    pub recoveries: u64,
    pub cancelled: bool,
    /// The error that ended the connection, if it did not end cleanly.
    pub error: Option<ParserError>,
}

pub struct MrtConnection<R> {
    id: u64,
    reader: RecordReader<R>,
    binder: Arc<dyn SessionBinder>,
    writer: QueueWriter,
    config: IngestConfig,
    cancel: CancellationToken,
}

impl<R: Read> MrtConnection<R> {
    pub fn new(
        id: u64,
        input: R,
        binder: Arc<dyn SessionBinder>,
        writer: QueueWriter,
        config: IngestConfig,
    ) -> Self {
        MrtConnection {
            id,
            reader: RecordReader::new(input, config.limits),
            binder,
            writer,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(self) -> ConnectionSummary {
        let MrtConnection {
            id,
            mut reader,
            binder,
            writer,
            config,
            cancel,
        } = self;
        info!("MRT connection {} started", id);

        let (conversation, outcome) = match reader.read_record() {
            Err(e) if e.is_end_of_stream() => (Conversation::Empty, Ok(())),
            Err(e) => (Conversation::Empty, Err(e)),
            Ok(first) if first.header.entry_type() == Some(EntryType::TABLE_DUMP_V2) => {
                let reconstructor = TableDumpReconstructor::new(
                    binder.as_ref(),
                    config.table_dump,
                    config.label_action,
                );
                let (stats, outcome) =
                    reconstructor.run(&mut reader, first, &writer, &cancel, |interval| {
                        sleep_unless_cancelled(interval, &cancel)
                    });
                (Conversation::TableDump(stats), outcome)
            }
            Ok(first) => {
                let stream = UpdateStream::new(binder.as_ref(), &writer, config.label_action);
                let (stats, outcome) = stream.run(&mut reader, Some(first), &cancel);
                (Conversation::UpdateStream(stats), outcome)
            }
        };

        if let Err(e) = &outcome {
            match e {
                ParserError::AllocationFailure(_) => error!("connection {}: {}", id, e),
                _ => warn!("connection {} ended: {}", id, e),
            }
        }
        let summary = ConnectionSummary {
            id,
            conversation,
            records_read: reader.records_read(),
            recoveries: reader.total_recoveries(),
            cancelled: cancel.is_cancelled(),
            error: outcome.err(),
        };
        info!(
            "MRT connection {} disconnected after {} records ({} recoveries)",
            id, summary.records_read, summary.recoveries
        );
        summary
    }
}

/// Sleeps in short slices so a deletion request is noticed within a fraction of a second.
fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) {
    let deadline = Instant::now() + duration;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
}

/// Runs the connection on a thread named `mrt-conn-<id>`.
pub fn spawn_connection<R>(connection: MrtConnection<R>) -> io::Result<JoinHandle<ConnectionSummary>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("mrt-conn-{}", connection.id))
        .spawn(move || connection.run())
}
