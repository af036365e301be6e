/*!
MRT framing, stream recovery and record decoders.
*/
pub mod framer;
pub mod messages;
pub mod recovery;

pub use framer::{parse_record_header, validate_header, RecordReader};
pub use messages::*;
pub use recovery::resync;
