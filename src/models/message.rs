//! The envelope handed to the shared queue.
use crate::session::SessionId;
use bytes::Bytes;

/// Where a decoded message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    /// A live BGP message relayed by the collector.
    FromPeer,
    /// A route reconstructed from a table dump.
    TableTransfer,
}

/// A BGP message bound to its session.
///
/// `bytes` is a complete BGP message, marker included. Ownership moves into the queue on
/// enqueue; readers share it until the last one releases it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub session_id: SessionId,
    pub kind: MessageKind,
    pub bytes: Bytes,
}

impl DecodedMessage {
    pub fn new(session_id: SessionId, kind: MessageKind, bytes: Bytes) -> Self {
        DecodedMessage {
            session_id,
            kind,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
