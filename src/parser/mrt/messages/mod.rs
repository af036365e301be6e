pub(crate) mod bgp4mp;
pub(crate) mod table_dump_v2;

pub use bgp4mp::{decode_bgp4mp_message, parse_bgp4mp, parse_bgp4mp_et, Bgp4MpRecord};
pub use table_dump_v2::{
    parse_peer_index_table, parse_rib_afi_entries, parse_rib_generic_entries,
    parse_table_dump_v2_record, TableDumpV2Record,
};
