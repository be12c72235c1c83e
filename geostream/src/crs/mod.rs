//! Systèmes de coordonnées : identité, registre, inférence et ordre des axes

pub mod axis;
pub mod registry;
pub mod resolve;

pub use axis::{correct_axis_order, swap_axes, AxisSwap, ForceCrs};
pub use registry::{EpsgRegistry, RegistryEntry};
pub use resolve::{resolve_collection_crs, CrsResolution};

use std::fmt;

use crate::Result;

/// Ordre des axes attendu par un CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisOrder {
    /// Est puis nord (longitude-latitude, x-y)
    EastNorth,
    /// Nord puis est (latitude-longitude)
    NorthEast,
}

impl AxisOrder {
    pub fn is_longitude_first(self) -> bool {
        matches!(self, Self::EastNorth)
    }
}

/// Identité d'un système de coordonnées
///
/// Deux CRS sont "égaux aux métadonnées près" s'ils partagent l'autorité, le code
/// et l'ordre des axes. Le libellé n'est qu'une métadonnée descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs {
    authority: String,
    code: u32,
    axis_order: AxisOrder,
    label: Option<String>,
}

impl Crs {
    pub fn new(authority: impl Into<String>, code: u32, axis_order: AxisOrder) -> Self {
        Self {
            authority: authority.into(),
            code,
            axis_order,
            label: None,
        }
    }

    /// Raccourci pour un code EPSG
    pub fn epsg(code: u32, axis_order: AxisOrder) -> Self {
        Self::new("EPSG", code, axis_order)
    }

    /// Attache un libellé descriptif (nom, identifiant d'origine)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn axis_order(&self) -> AxisOrder {
        self.axis_order
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Compare deux CRS en ignorant les métadonnées descriptives
    pub fn equals_ignore_metadata(&self, other: &Crs) -> bool {
        self.authority.eq_ignore_ascii_case(&other.authority)
            && self.code == other.code
            && self.axis_order == other.axis_order
    }

    /// Identifiant textuel qui se relit avec le même ordre d'axes
    ///
    /// `EPSG:n` est lu longitude en premier, l'URN suit l'ordre de l'autorité.
    /// L'ordre nord-est d'un code absent du registre n'est pas conservé à la
    /// relecture : l'URN est alors lue est-nord (voir [`EpsgRegistry::insert`]).
    pub fn identifier(&self) -> String {
        match self.axis_order {
            AxisOrder::EastNorth => format!("{}:{}", self.authority, self.code),
            AxisOrder::NorthEast => format!("urn:ogc:def:crs:{}::{}", self.authority, self.code),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axes = match self.axis_order {
            AxisOrder::EastNorth => "east-north",
            AxisOrder::NorthEast => "north-east",
        };
        write!(f, "{}:{} ({})", self.authority, self.code, axes)
    }
}

/// Capacité externe de résolution des CRS
///
/// Le pipeline ne fait qu'appeler ce contrat ; [`EpsgRegistry`] en fournit une
/// implémentation embarquée.
pub trait CrsProvider {
    /// CRS canonique du registre pour un code, éventuellement forcé longitude en premier
    fn decode(&self, authority: &str, code: u32, longitude_first: bool) -> Result<Crs>;

    /// Code du registre correspondant à un CRS (au mieux, `None` si inconnu)
    fn lookup_code(&self, crs: &Crs) -> Option<u32>;

    /// Lit un identifiant textuel (`EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, ...)
    fn parse(&self, identifier: &str) -> Result<Crs>;

    fn equals_ignore_metadata(&self, a: &Crs, b: &Crs) -> bool {
        a.equals_ignore_metadata(b)
    }
}

impl<P: CrsProvider + ?Sized> CrsProvider for &P {
    fn decode(&self, authority: &str, code: u32, longitude_first: bool) -> Result<Crs> {
        (**self).decode(authority, code, longitude_first)
    }

    fn lookup_code(&self, crs: &Crs) -> Option<u32> {
        (**self).lookup_code(crs)
    }

    fn parse(&self, identifier: &str) -> Result<Crs> {
        (**self).parse(identifier)
    }

    fn equals_ignore_metadata(&self, a: &Crs, b: &Crs) -> bool {
        (**self).equals_ignore_metadata(a, b)
    }
}
