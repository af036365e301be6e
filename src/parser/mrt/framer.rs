//! Record framing: header read, length validation and payload read.
use crate::config::DecoderLimits;
use crate::models::{RawRecord, RecordHeader, MRT_HEADER_LEN};
use crate::parser::mrt::recovery::resync;
use crate::ParserError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::{error, warn};
use std::io::{self, Read};

/// Reads the 12 byte MRT common header [RFC6396][header].
///
/// [header]: https://tools.ietf.org/html/rfc6396#section-4.1
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |             Type              |            Subtype            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             Length                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Fewer than 12 bytes before the stream ends is [ParserError::ShortRead].
pub fn parse_record_header<T: Read>(input: &mut T) -> Result<RecordHeader, ParserError> {
    let mut raw_bytes = [0u8; MRT_HEADER_LEN];
    input.read_exact(&mut raw_bytes).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ParserError::ShortRead,
        _ => ParserError::FatalRead(e),
    })?;
    let mut data = &raw_bytes[..];

    Ok(RecordHeader {
        timestamp: data.get_u32(),
        entry_type: data.get_u16(),
        entry_subtype: data.get_u16(),
        // the length field does not include the length of the common header
        length: data.get_u32(),
    })
}

/// Checks the header length against the configured bounds.
pub fn validate_header(header: &RecordHeader, limits: &DecoderLimits) -> Result<(), ParserError> {
    if header.length > limits.max_record_length || header.length < limits.min_record_length {
        return Err(ParserError::InvalidLength {
            length: header.length,
            min: limits.min_record_length,
            max: limits.max_record_length,
        });
    }
    Ok(())
}

impl RecordHeader {
    pub fn encode(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(MRT_HEADER_LEN);
        bytes.put_u32(self.timestamp);
        bytes.put_u16(self.entry_type);
        bytes.put_u16(self.entry_subtype);
        bytes.put_u32(self.length);
        bytes.freeze()
    }
}

/// Frames MRT records out of a byte stream.
///
/// A header whose length is out of bounds is never trusted: the reader resynchronizes on the
/// next embedded BGP marker and tries again, counting the passes in
/// [RawRecord::recovered_skips].
pub struct RecordReader<R> {
    reader: R,
    limits: DecoderLimits,
    records_read: u64,
    total_recoveries: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R, limits: DecoderLimits) -> Self {
        RecordReader {
            reader,
            limits,
            records_read: 0,
            total_recoveries: 0,
        }
    }

    pub fn read_record(&mut self) -> Result<RawRecord, ParserError> {
        let mut recovered_skips = 0u32;
        let header = loop {
            let header = parse_record_header(&mut self.reader)?;
            match validate_header(&header, &self.limits) {
                Ok(()) => break header,
                Err(e) => {
                    warn!(
                        "rejected MRT header (type {} subtype {}): {}",
                        header.entry_type, header.entry_subtype, e
                    );
                    self.resync()?;
                    recovered_skips += 1;
                }
            }
        };
        if recovered_skips > 0 {
            error!(
                "had to fast forward {} times to recover, new record length is {}",
                recovered_skips, header.length
            );
        }

        let payload = self.read_payload(header.length as usize)?;
        self.records_read += 1;
        Ok(RawRecord {
            header,
            payload,
            recovered_skips,
        })
    }

    /// Runs one recovery scan. Callers use this after a framed record fails to decode.
    pub fn resync(&mut self) -> Result<u16, ParserError> {
        self.total_recoveries += 1;
        resync(&mut self.reader)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn total_recoveries(&self) -> u64 {
        self.total_recoveries
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_payload(&mut self, length: usize) -> Result<Bytes, ParserError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(length)
            .map_err(|_| ParserError::AllocationFailure(length))?;

        let read = (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut buffer)
            .map_err(ParserError::FatalRead)?;
        if read < length {
            return Err(ParserError::TruncatedPayload {
                expected: length,
                read,
            });
        }
        Ok(Bytes::from(buffer))
    }
}
