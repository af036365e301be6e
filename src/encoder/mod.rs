/*!
Serializes routes reconstructed from table dumps into BGP UPDATE messages.
*/
mod update_encoder;

pub use update_encoder::{adapt_attributes_for_asn_len, encode_rib_update, encode_update};
