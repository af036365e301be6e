//! BGP message structs.

pub mod attributes;

pub use attributes::*;

/// All BGP messages start with 16 bytes of `0xFF`.
pub const BGP_MARKER: [u8; 16] = [0xFF; 16];
/// Marker, 2 byte length and 1 byte type.
pub const BGP_HEADER_LEN: usize = 19;
/// Largest BGP message allowed by RFC 4271.
pub const BGP_MAX_MESSAGE_LEN: usize = 4096;
/// BGP message type code of UPDATE.
pub const BGP_UPDATE: u8 = 2;
