//! Registre EPSG embarqué
//!
//! Couvre les CRS géographiques courants (ordre d'autorité latitude-longitude),
//! Web Mercator, Lambert 93, les zones UTM WGS84 et quelques projections
//! nationales. Le registre est extensible (voir la configuration du CLI).

use std::collections::HashMap;

use tracing::debug;

use super::{AxisOrder, Crs, CrsProvider};
use crate::{PipelineError, Result};

/// Entrée du registre : nom et ordre des axes de l'autorité
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub axis_order: AxisOrder,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, axis_order: AxisOrder) -> Self {
        Self {
            name: name.into(),
            axis_order,
        }
    }
}

const BUILTIN: &[(u32, &str, AxisOrder)] = &[
    // Géographiques 2D : l'autorité EPSG les définit latitude en premier
    (4326, "WGS 84", AxisOrder::NorthEast),
    (4258, "ETRS89", AxisOrder::NorthEast),
    (4269, "NAD83", AxisOrder::NorthEast),
    (4267, "NAD27", AxisOrder::NorthEast),
    (4171, "RGF93", AxisOrder::NorthEast),
    (4230, "ED50", AxisOrder::NorthEast),
    (4283, "GDA94", AxisOrder::NorthEast),
    (4612, "JGD2000", AxisOrder::NorthEast),
    (4674, "SIRGAS 2000", AxisOrder::NorthEast),
    (4314, "DHDN", AxisOrder::NorthEast),
    (4277, "OSGB36", AxisOrder::NorthEast),
    (4807, "NTF (Paris)", AxisOrder::NorthEast),
    // Projetés est-nord
    (3857, "WGS 84 / Pseudo-Mercator", AxisOrder::EastNorth),
    (3395, "WGS 84 / World Mercator", AxisOrder::EastNorth),
    (2154, "RGF93 / Lambert-93", AxisOrder::EastNorth),
    (27572, "NTF (Paris) / Lambert zone II", AxisOrder::EastNorth),
    (27700, "OSGB36 / British National Grid", AxisOrder::EastNorth),
    (28992, "Amersfoort / RD New", AxisOrder::EastNorth),
    (2056, "CH1903+ / LV95", AxisOrder::EastNorth),
    (3067, "ETRS89 / TM35FIN(E,N)", AxisOrder::EastNorth),
    // Projetés nord-est
    (3035, "ETRS89-extended / LAEA Europe", AxisOrder::NorthEast),
    (3034, "ETRS89-extended / LCC Europe", AxisOrder::NorthEast),
    (3006, "SWEREF99 TM", AxisOrder::NorthEast),
    (2180, "ETRS89 / Poland CS92", AxisOrder::NorthEast),
    (31467, "DHDN / 3-degree Gauss-Kruger zone 3", AxisOrder::NorthEast),
];

/// Implémentation embarquée de [`CrsProvider`] pour l'autorité EPSG
#[derive(Debug, Clone)]
pub struct EpsgRegistry {
    entries: HashMap<u32, RegistryEntry>,
}

impl Default for EpsgRegistry {
    fn default() -> Self {
        let mut entries: HashMap<u32, RegistryEntry> = BUILTIN
            .iter()
            .map(|&(code, name, axis)| (code, RegistryEntry::new(name, axis)))
            .collect();

        // Zones UTM WGS84 nord (326xx) et sud (327xx)
        for zone in 1..=60u32 {
            entries.insert(
                32600 + zone,
                RegistryEntry::new(format!("WGS 84 / UTM zone {}N", zone), AxisOrder::EastNorth),
            );
            entries.insert(
                32700 + zone,
                RegistryEntry::new(format!("WGS 84 / UTM zone {}S", zone), AxisOrder::EastNorth),
            );
        }

        Self { entries }
    }
}

impl EpsgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registre vide (utile pour tester les échecs de résolution)
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Ajoute ou remplace une entrée
    pub fn insert(&mut self, code: u32, entry: RegistryEntry) -> Option<RegistryEntry> {
        self.entries.insert(code, entry)
    }

    pub fn get(&self, code: u32) -> Option<&RegistryEntry> {
        self.entries.get(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Forme syntaxique d'un identifiant de CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identifier {
    /// `EPSG:n`, `...epsg.xml#n` : lus longitude en premier (convention historique)
    Legacy(u32),
    /// URN et URI OGC : ordre des axes de l'autorité
    Authority(u32),
    /// CRS84 : WGS 84 longitude-latitude
    Crs84,
}

fn parse_identifier(identifier: &str) -> Option<Identifier> {
    let lower = identifier.trim().to_ascii_lowercase();

    const CRS84: &[&str] = &[
        "crs:84",
        "ogc:crs84",
        "urn:ogc:def:crs:ogc:1.3:crs84",
        "urn:ogc:def:crs:ogc::crs84",
        "http://www.opengis.net/def/crs/ogc/1.3/crs84",
    ];
    if CRS84.contains(&lower.as_str()) {
        return Some(Identifier::Crs84);
    }

    let parse_code = |s: &str| s.trim().parse::<u32>().ok();

    if let Some(rest) = lower.strip_prefix("epsg:") {
        return parse_code(rest).map(Identifier::Legacy);
    }
    if let Some(rest) = lower.strip_prefix("http://www.opengis.net/gml/srs/epsg.xml#") {
        return parse_code(rest).map(Identifier::Legacy);
    }
    if let Some(rest) = lower.strip_prefix("http://www.opengis.net/def/crs/epsg/") {
        // version/code
        let code = rest.rsplit('/').next()?;
        return parse_code(code).map(Identifier::Authority);
    }
    for prefix in ["urn:ogc:def:crs:epsg:", "urn:x-ogc:def:crs:epsg:"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            // la version optionnelle précède le dernier ':'
            let code = rest.rsplit(':').next()?;
            return parse_code(code).map(Identifier::Authority);
        }
    }

    None
}

impl CrsProvider for EpsgRegistry {
    fn decode(&self, authority: &str, code: u32, longitude_first: bool) -> Result<Crs> {
        if !authority.eq_ignore_ascii_case("EPSG") {
            return Err(PipelineError::UnknownCrs(format!("{}:{}", authority, code)));
        }
        let entry = self
            .entries
            .get(&code)
            .ok_or_else(|| PipelineError::UnknownCrs(format!("EPSG:{}", code)))?;

        let axis_order = if longitude_first {
            AxisOrder::EastNorth
        } else {
            entry.axis_order
        };

        Ok(Crs::epsg(code, axis_order).with_label(entry.name.clone()))
    }

    fn lookup_code(&self, crs: &Crs) -> Option<u32> {
        if crs.authority().eq_ignore_ascii_case("EPSG") && self.entries.contains_key(&crs.code()) {
            Some(crs.code())
        } else {
            None
        }
    }

    fn parse(&self, identifier: &str) -> Result<Crs> {
        let parsed = parse_identifier(identifier)
            .ok_or_else(|| PipelineError::UnknownCrs(identifier.to_string()))?;

        let crs = match parsed {
            Identifier::Crs84 => Crs::epsg(4326, AxisOrder::EastNorth),
            Identifier::Legacy(code) => Crs::epsg(code, AxisOrder::EastNorth),
            Identifier::Authority(code) => {
                let axis_order = match self.entries.get(&code) {
                    Some(entry) => entry.axis_order,
                    None => {
                        debug!(code, "EPSG code not in registry, assuming east-north axes");
                        AxisOrder::EastNorth
                    }
                };
                Crs::epsg(code, axis_order)
            }
        };

        Ok(crs.with_label(identifier.trim()))
    }
}
