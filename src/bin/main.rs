use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use mrt_ingest::connection::{spawn_connection, Conversation, MrtConnection};
use mrt_ingest::models::MessageKind;
use mrt_ingest::session::InMemorySessionTable;
use mrt_ingest::{IngestConfig, MessageQueue};

/// mrt-ingest replays an MRT file as if a collector had sent it over a connection.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// File path to a MRT file.
    #[clap(name = "FILE")]
    file_path: PathBuf,

    /// JSON configuration file. Missing fields keep their defaults.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Queue capacity, overriding the configuration
    #[clap(long)]
    capacity: Option<usize>,

    /// Milliseconds between table dump drain rounds, overriding the configuration
    #[clap(long)]
    drain_poll_ms: Option<u64>,

    /// Output the summary as JSON
    #[clap(long)]
    json: bool,

    /// List the sessions known at the end of the replay
    #[clap(short, long)]
    sessions: bool,
}

fn main() {
    let opts: Opts = Opts::parse();

    env_logger::init();

    let mut config = match &opts.config {
        None => IngestConfig::default(),
        Some(path) => match IngestConfig::from_json_file(path) {
            Ok(c) => c,
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        },
    };
    if let Some(capacity) = opts.capacity {
        config.queue.capacity = capacity;
    }
    if let Some(ms) = opts.drain_poll_ms {
        config.table_dump.drain_poll_interval_ms = ms;
    }
    if let Err(err) = config.validate() {
        eprintln!("{}", err);
        std::process::exit(1);
    }

    let file = match std::fs::File::open(&opts.file_path) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("{}: {}", opts.file_path.display(), err);
            std::process::exit(1);
        }
    };

    let queue = MessageQueue::new(config.queue.capacity, config.pacing);
    let reader = queue.register_reader();
    let counter = thread::spawn(move || {
        let mut counts: BTreeMap<&'static str, (u64, u64)> = BTreeMap::new();
        while let Some(message) = reader.read() {
            let kind = match message.kind {
                MessageKind::FromPeer => "from_peer",
                MessageKind::TableTransfer => "table_transfer",
            };
            let entry = counts.entry(kind).or_default();
            entry.0 += 1;
            entry.1 += message.len() as u64;
        }
        counts
    });

    let sessions = Arc::new(InMemorySessionTable::new());
    let connection = MrtConnection::new(
        1,
        std::io::BufReader::new(file),
        sessions.clone(),
        queue.register_writer(),
        config,
    );
    let summary = match spawn_connection(connection).map(|h| h.join()) {
        Ok(Ok(summary)) => summary,
        Ok(Err(_)) => {
            eprintln!("connection thread panicked");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("unable to start connection thread: {}", err);
            std::process::exit(1);
        }
    };
    queue.close();
    let counts = counter.join().unwrap_or_default();
    let stats = queue.stats();

    let conversation = match &summary.conversation {
        Conversation::Empty => json!({"type": "empty"}),
        Conversation::UpdateStream(s) => json!({
            "type": "update_stream",
            "records": s.records,
            "submitted": s.submitted,
            "discarded": s.discarded,
            "ignored": s.ignored,
            "corrupt": s.corrupt,
            "sessions": s.sessions,
        }),
        Conversation::TableDump(s) => json!({
            "type": "table_dump",
            "records": s.records,
            "committed_routes": s.committed_routes,
            "discarded_batches": s.discarded_batches,
            "skipped_records": s.skipped_records,
            "flushed_peers": s.drain.flushed_peers,
            "flushed_routes": s.drain.flushed_routes,
            "cleaned_peers": s.drain.cleaned_peers,
            "drain_rounds": s.drain.rounds,
        }),
    };
    let messages: serde_json::Map<String, serde_json::Value> = counts
        .iter()
        .map(|(k, (n, bytes))| (k.to_string(), json!({"count": n, "bytes": bytes})))
        .collect();
    let mut output = json!({
        "records_read": summary.records_read,
        "recoveries": summary.recoveries,
        "error": summary.error.as_ref().map(|e| e.to_string()),
        "conversation": conversation,
        "messages": messages,
        "pacing_activations": stats.pacing_activations,
    });
    if opts.sessions {
        output["sessions"] = sessions
            .sessions()
            .into_iter()
            .map(|(id, s)| {
                json!({
                    "id": id.0,
                    "peer_asn": s.key.peer_asn,
                    "peer_addr": s.key.peer_addr.to_string(),
                    "local_asn": s.key.local_asn,
                    "local_addr": s.key.local_addr.to_string(),
                    "state": format!("{:?}", s.state),
                    "messages": s.message_count,
                })
            })
            .collect();
    }

    if opts.json {
        println!("{}", output);
    } else {
        println!("records read:  {}", summary.records_read);
        println!("recoveries:    {}", summary.recoveries);
        for (kind, (n, bytes)) in &counts {
            println!("{:<14} {} messages, {} bytes", format!("{}:", kind), n, bytes);
        }
        if let Some(err) = &summary.error {
            println!("ended with:    {}", err);
        }
        if opts.sessions {
            for (id, s) in sessions.sessions() {
                println!(
                    "{} {} {:?} {} messages",
                    id, s.key, s.state, s.message_count
                );
            }
        }
    }
}
