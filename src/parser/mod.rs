/*!
parser module maintains the MRT framing, recovery and record decoders.
*/
pub mod bgp;
pub mod mrt;
pub mod utils;

pub use self::utils::ReadUtils;
pub use mrt::*;
