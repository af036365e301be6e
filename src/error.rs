/*!
error module defines the error types used in mrt-ingest.
*/
use crate::session::SessionError;
use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    /// Fewer than 12 bytes were available for the next record header. This is how a stream
    /// ends, not a corruption.
    ///
    /// ## Occurs during:
    ///  - Reading of an MRT record header
    #[error("stream ended before a full record header")]
    ShortRead,
    /// The header was accepted but the stream ended inside the payload.
    ///
    /// ## Occurs during:
    ///  - Reading of an MRT record body
    #[error("truncated payload: expected {expected} bytes, read {read}")]
    TruncatedPayload { expected: usize, read: usize },
    /// Header length outside the accepted record bounds.
    ///
    /// ## Occurs during:
    ///  - Validation of an MRT record header, before any payload allocation
    #[error("invalid record length {length} (accepted {min}..={max})")]
    InvalidLength { length: u32, min: u32, max: u32 },
    /// A record subtype that is not valid at this point of the conversation.
    ///
    /// ## Occurs during:
    ///  - Table dump reconstruction (first record not a peer index table, unknown subtypes)
    ///  - Update stream decoding (unknown BGP4MP subtypes)
    #[error("unexpected subtype {subtype} for MRT type {entry_type}")]
    UnexpectedSubtype { entry_type: u16, subtype: u16 },
    /// An MRT type that the current conversation cannot carry.
    #[error("unexpected MRT type {0}")]
    UnexpectedType(u16),
    /// Attribute bytes disagree with their declared lengths.
    ///
    /// ## Occurs during:
    ///  - Walking RIB entry path attributes
    #[error("malformed attribute: {0}")]
    MalformedAttribute(String),
    /// The embedded BGP message does not start with the 16 byte all-ones marker.
    #[error("embedded BGP message is missing its marker")]
    MissingMarker,
    /// Prefix length larger than the address family allows.
    #[error("invalid prefix length {bits} (maximum {max})")]
    InvalidPrefixLength { bits: u8, max: u8 },
    /// The stream became unreadable while scanning for a resynchronization point.
    ///
    /// ## Occurs during:
    ///  - Recovery scans after a rejected header
    #[error("fatal read error: {0}")]
    FatalRead(#[source] io::Error),
    /// Buffer reservation for a payload failed.
    #[error("unable to allocate {0} bytes")]
    AllocationFailure(usize),
    /// This error represents a [num_enum::TryFromPrimitiveError] error for any of a number of
    /// different types.
    ///
    /// ## Occurs during:
    ///  - Parsing of an MRT message body
    #[error("unrecognized value {value} for {type_name}")]
    UnrecognizedEnumVariant { type_name: &'static str, value: u64 },
    /// A session binder call needed to carry on the conversation failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("not enough bytes left in buffer")]
    IoNotEnoughBytes(),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("truncated message: {0}")]
    TruncatedMsg(String),
}

impl ParserError {
    /// True for the two variants that mean the peer closed the stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            ParserError::ShortRead | ParserError::TruncatedPayload { .. }
        )
    }
}

impl<T> From<TryFromPrimitiveError<T>> for ParserError
where
    T: TryFromPrimitive,
    T::Primitive: Into<u64>,
{
    #[inline]
    fn from(value: TryFromPrimitiveError<T>) -> Self {
        ParserError::UnrecognizedEnumVariant {
            type_name: T::NAME,
            value: value.number.into(),
        }
    }
}
