//! Lecture et écriture des collections GeoJSON

pub mod decode;
pub mod encode;

pub use decode::{collection_from_value, parse_collection, parse_crs_member, read_collection};
pub use encode::{to_string, write_collection};

/// Préfixe sous lequel l'espace de noms des features est déclaré
pub const NAMESPACE_PREFIX: &str = "feature";
