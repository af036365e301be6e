/*!
Session binding: maps the addressing tuple of a decoded message to a logical session.

Storage of sessions belongs to the surrounding system. Decoders only look sessions up, create
them when absent and move them between a few states, all through [SessionBinder].
[InMemorySessionTable] is a complete implementation used by the command line tool and tests.
*/
use crate::models::AsnLength;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use thiserror::Error;

/// Identifier of a logical BGP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionId(pub u32);

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lookup key of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub peer_asn: u32,
    pub local_asn: u32,
    pub peer_port: u16,
    pub local_port: u16,
    pub peer_addr: IpAddr,
    pub local_addr: IpAddr,
}

impl SessionKey {
    /// Key on the standard BGP port at both ends.
    pub fn new(peer_asn: u32, local_asn: u32, peer_addr: IpAddr, local_addr: IpAddr) -> Self {
        SessionKey {
            peer_asn,
            local_asn,
            peer_port: 179,
            local_port: 179,
            peer_addr,
            local_addr,
        }
    }

    pub fn with_ports(mut self, peer_port: u16, local_port: u16) -> Self {
        self.peer_port = peer_port;
        self.local_port = local_port;
        self
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AS{} {}:{} <-> AS{} {}:{}",
            self.peer_asn,
            self.peer_addr,
            self.peer_port,
            self.local_asn,
            self.local_addr,
            self.local_port
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    /// Created from a table dump; the peer's ASN width is not known yet.
    Provisional,
    /// At least one live update went through the session.
    MrtEstablished,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionEvent {
    None,
    ManualStop,
}

/// What downstream consumers do with messages of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LabelAction {
    NoAction,
    #[default]
    Label,
    StoreRibOnly,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} already exists for {1}")]
    AlreadyExists(SessionId, String),
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("session table is full ({0} sessions)")]
    TableFull(usize),
}

/// Collaborator interface through which decoders bind messages to sessions.
///
/// Implementations are shared between connection threads and synchronize internally.
pub trait SessionBinder: Send + Sync {
    fn find(&self, key: &SessionKey) -> Option<SessionId>;

    fn create(
        &self,
        key: &SessionKey,
        label_action: LabelAction,
        asn_len: Option<AsnLength>,
    ) -> Result<SessionId, SessionError>;

    fn set_state(&self, id: SessionId, state: SessionState, event: SessionEvent);

    fn state(&self, id: SessionId) -> Option<SessionState>;

    fn as_number_width(&self, id: SessionId) -> Option<AsnLength>;

    fn set_as_number_width(&self, id: SessionId, asn_len: AsnLength);

    fn increment_message_count(&self, id: SessionId);

    /// Deletes routing state held for the session by earlier conversations.
    fn clean_rib(&self, id: SessionId) -> Result<(), SessionError>;
}

/// Everything [InMemorySessionTable] tracks about one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub key: SessionKey,
    pub label_action: LabelAction,
    pub asn_len: Option<AsnLength>,
    pub state: SessionState,
    pub last_event: SessionEvent,
    pub message_count: u64,
    pub rib_cleanings: u32,
}

#[derive(Default)]
struct SessionTableInner {
    by_key: HashMap<SessionKey, SessionId>,
    sessions: HashMap<SessionId, SessionRecord>,
    next_id: u32,
}

/// Session table kept in memory behind a read-write lock.
#[derive(Default)]
pub struct InMemorySessionTable {
    inner: RwLock<SessionTableInner>,
    max_sessions: Option<usize>,
}

impl InMemorySessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that refuses to create more than `max_sessions` sessions.
    pub fn with_max_sessions(max_sessions: usize) -> Self {
        InMemorySessionTable {
            inner: RwLock::new(SessionTableInner::default()),
            max_sessions: Some(max_sessions),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one session.
    pub fn get(&self, id: SessionId) -> Option<SessionRecord> {
        self.inner.read().sessions.get(&id).cloned()
    }

    /// Snapshot of all sessions ordered by id.
    pub fn sessions(&self) -> Vec<(SessionId, SessionRecord)> {
        let inner = self.inner.read();
        let mut sessions: Vec<_> = inner
            .sessions
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect();
        sessions.sort_by_key(|(id, _)| *id);
        sessions
    }
}

impl SessionBinder for InMemorySessionTable {
    fn find(&self, key: &SessionKey) -> Option<SessionId> {
        self.inner.read().by_key.get(key).copied()
    }

    fn create(
        &self,
        key: &SessionKey,
        label_action: LabelAction,
        asn_len: Option<AsnLength>,
    ) -> Result<SessionId, SessionError> {
        let mut inner = self.inner.write();
        if let Some(id) = inner.by_key.get(key) {
            return Err(SessionError::AlreadyExists(*id, key.to_string()));
        }
        if let Some(max) = self.max_sessions {
            if inner.sessions.len() >= max {
                return Err(SessionError::TableFull(max));
            }
        }
        inner.next_id += 1;
        let id = SessionId(inner.next_id);
        inner.by_key.insert(*key, id);
        inner.sessions.insert(
            id,
            SessionRecord {
                key: *key,
                label_action,
                asn_len,
                state: SessionState::Provisional,
                last_event: SessionEvent::None,
                message_count: 0,
                rib_cleanings: 0,
            },
        );
        info!("created {} for {}", id, key);
        Ok(id)
    }

    fn set_state(&self, id: SessionId, state: SessionState, event: SessionEvent) {
        if let Some(record) = self.inner.write().sessions.get_mut(&id) {
            debug!("{}: {:?} -> {:?} ({:?})", id, record.state, state, event);
            record.state = state;
            record.last_event = event;
        }
    }

    fn state(&self, id: SessionId) -> Option<SessionState> {
        self.inner.read().sessions.get(&id).map(|r| r.state)
    }

    fn as_number_width(&self, id: SessionId) -> Option<AsnLength> {
        self.inner.read().sessions.get(&id).and_then(|r| r.asn_len)
    }

    fn set_as_number_width(&self, id: SessionId, asn_len: AsnLength) {
        if let Some(record) = self.inner.write().sessions.get_mut(&id) {
            record.asn_len = Some(asn_len);
        }
    }

    fn increment_message_count(&self, id: SessionId) {
        if let Some(record) = self.inner.write().sessions.get_mut(&id) {
            record.message_count += 1;
        }
    }

    fn clean_rib(&self, id: SessionId) -> Result<(), SessionError> {
        let mut inner = self.inner.write();
        let record = inner
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        record.rib_cleanings += 1;
        info!("{}: cleaned stored routing state", id);
        Ok(())
    }
}
