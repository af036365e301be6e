/*!
Data structures shared by the framer, the decoders, the session binder and the queue.
*/
mod bgp;
mod message;
mod mrt;
mod network;

pub use bgp::*;
pub use message::*;
pub use mrt::*;
pub use network::*;
