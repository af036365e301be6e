/*!
Provides parsing and rewriting of BGP path attributes.
*/
pub mod attributes;
pub use attributes::parse_rib_attributes;
