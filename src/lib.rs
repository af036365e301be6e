/*!
`mrt-ingest` reads live MRT feeds from route collectors and turns every record into a
[DecodedMessage](models::DecodedMessage) bound to a BGP session, ready for distribution through
a shared, bounded and paced [queue](queue::MessageQueue).

Two conversations are supported on a collector connection:

- **update streams** of `BGP4MP` / `BGP4MP_ET` records, whose embedded BGP messages are
  forwarded as they are;
- **table dumps** of `TABLE_DUMP_V2` records, whose routes are held per peer and sent as BGP
  UPDATE messages once the peer's session has been established by live updates.

Corrupt streams are resynchronized on the next embedded BGP marker. A decoded message is only
forwarded after the record following it decodes as well.

# Example

```no_run
use mrt_ingest::config::IngestConfig;
use mrt_ingest::connection::{spawn_connection, MrtConnection};
use mrt_ingest::queue::MessageQueue;
use mrt_ingest::session::InMemorySessionTable;
use std::sync::Arc;

let config = IngestConfig::default();
let queue = MessageQueue::new(config.queue.capacity, config.pacing);
let reader = queue.register_reader();
let sessions = Arc::new(InMemorySessionTable::new());

let input = std::fs::File::open("updates.mrt").unwrap();
let connection = MrtConnection::new(1, input, sessions, queue.register_writer(), config);
let handle = spawn_connection(connection).unwrap();

while let Some(message) = reader.try_read() {
    println!("{} {:?} {} bytes", message.session_id, message.kind, message.len());
}
let summary = handle.join().unwrap();
println!("{} records", summary.records_read);
```

## Supported RFCs

- [RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271): A Border Gateway Protocol 4 (BGP-4)
- [RFC 4760](https://datatracker.ietf.org/doc/html/rfc4760): Multiprotocol Extensions for BGP-4
- [RFC 6396](https://datatracker.ietf.org/doc/html/rfc6396): Multi-Threaded Routing Toolkit (MRT) Routing Information Export Format
- [RFC 6793](https://datatracker.ietf.org/doc/html/rfc6793): BGP Support for Four-Octet Autonomous System (AS) Number Space
*/

pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod models;
pub mod parser;
pub mod queue;
pub mod session;

pub use config::IngestConfig;
pub use connection::{spawn_connection, ConnectionSummary, MrtConnection};
pub use error::ParserError;
pub use models::DecodedMessage;
pub use parser::mrt::RecordReader;
pub use queue::{MessageQueue, QueueReader, QueueWriter};
pub use session::{InMemorySessionTable, SessionBinder};
