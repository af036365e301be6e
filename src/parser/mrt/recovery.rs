//! Byte-level resynchronization after a rejected record header.
use crate::models::BGP_MARKER;
use crate::ParserError;
use log::{debug, info};
use std::io::{self, Read};

/// Marker plus the 2 byte length field; the embedded length counts both.
const MARKER_AND_LENGTH: u16 = BGP_MARKER.len() as u16 + 2;

/// Scans forward to the next run of sixteen `0xFF` bytes, reads the 2 byte big-endian BGP
/// length `L` following it and discards the remaining `L - 18` bytes of that BGP message.
///
/// On success the stream sits right after the recognized message and the embedded length is
/// returned. A length below 18 cannot be a BGP message; nothing beyond the length field is
/// skipped in that case. Landing on a real record boundary is not guaranteed: the next header
/// read decides.
///
/// Every read failure, end of stream included, is [ParserError::FatalRead].
pub fn resync<R: Read>(reader: &mut R) -> Result<u16, ParserError> {
    let mut run = 0usize;
    let mut scanned = 0u64;
    while run < BGP_MARKER.len() {
        let byte = read_byte(reader)?;
        scanned += 1;
        if byte == 0xFF {
            run += 1;
        } else {
            run = 0;
        }
    }

    let mut len_buf = [0u8; 2];
    reader.read_exact(&mut len_buf).map_err(ParserError::FatalRead)?;
    let length = u16::from_be_bytes(len_buf);

    if length < MARKER_AND_LENGTH {
        debug!(
            "marker after {} bytes carries impossible length {}, not skipping",
            scanned, length
        );
        return Ok(length);
    }

    let to_skip = (length - MARKER_AND_LENGTH) as u64;
    let skipped = io::copy(&mut reader.by_ref().take(to_skip), &mut io::sink())
        .map_err(ParserError::FatalRead)?;
    if skipped < to_skip {
        return Err(ParserError::FatalRead(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ended after {skipped} of {to_skip} skipped bytes"),
        )));
    }

    info!(
        "resynchronized on BGP message of length {} after scanning {} bytes",
        length, scanned
    );
    Ok(length)
}

fn read_byte<R: Read>(reader: &mut R) -> Result<u8, ParserError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).map_err(ParserError::FatalRead)?;
    Ok(byte[0])
}
