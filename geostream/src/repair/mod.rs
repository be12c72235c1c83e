//! Réparation paresseuse des géométries
//!
//! Chaque feature tirée est inspectée : une géométrie valide passe telle quelle,
//! une géométrie invalide est remplacée par son buffer nul. Si la réparation ne
//! produit rien, la feature est quand même émise avec une géométrie nulle.
//! Aucun cache : une nouvelle passe refait le travail.

pub mod engine;

pub use engine::GeoEngine;

use std::cell::Cell;

use geo::{Geometry, HasDimensions};
use tracing::{debug, warn};

use crate::log::LogSink;
use crate::stream::{FeatureCursor, FeatureStream, MappedCursor};
use crate::types::{Feature, Schema, Value};
use crate::Result;

/// Capacité externe de validation et de réparation
pub trait GeometryEngine {
    /// Validité topologique (auto-intersections, anneaux, orientation)
    fn is_valid(&self, geometry: &Geometry) -> bool;

    /// Union dissoute du buffer de distance nulle ; `None` si vide
    fn buffer_zero(&self, geometry: &Geometry) -> Option<Geometry>;
}

impl<E: GeometryEngine + ?Sized> GeometryEngine for &E {
    fn is_valid(&self, geometry: &Geometry) -> bool {
        (**self).is_valid(geometry)
    }

    fn buffer_zero(&self, geometry: &Geometry) -> Option<Geometry> {
        (**self).buffer_zero(geometry)
    }
}

/// Issue de l'inspection d'une géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Pas de géométrie par défaut (ou valeur nulle)
    Absent,
    /// Géométrie déjà valide
    Valid,
    /// Géométrie remplacée par son buffer nul
    Repaired,
    /// Réparation vide : géométrie mise à null
    Nulled,
}

/// Inspecte et répare la géométrie par défaut d'une feature
pub fn repair_feature<E>(engine: &E, schema: &Schema, feature: &mut Feature) -> RepairOutcome
where
    E: GeometryEngine + ?Sized,
{
    let Some(index) = schema.default_geometry_index() else {
        return RepairOutcome::Absent;
    };
    let Some(Value::Geometry(geom)) = feature.values.get_mut(index) else {
        return RepairOutcome::Absent;
    };

    if engine.is_valid(&geom.geometry) {
        return RepairOutcome::Valid;
    }

    match engine.buffer_zero(&geom.geometry) {
        Some(repaired) if !repaired.is_empty() => {
            geom.geometry = repaired;
            RepairOutcome::Repaired
        }
        _ => {
            feature.values[index] = Value::Null;
            RepairOutcome::Nulled
        }
    }
}

/// Compteurs cumulés sur toutes les passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub checked: usize,
    pub repaired: usize,
    pub nulled: usize,
}

impl RepairStats {
    fn record(&mut self, outcome: RepairOutcome) {
        match outcome {
            RepairOutcome::Absent => return,
            RepairOutcome::Valid => {}
            RepairOutcome::Repaired => self.repaired += 1,
            RepairOutcome::Nulled => self.nulled += 1,
        }
        self.checked += 1;
    }
}

/// Décorateur de réparation des géométries
pub struct RepairGeometry<S, E = GeoEngine> {
    inner: S,
    engine: E,
    sink: LogSink,
    stats: Cell<RepairStats>,
}

impl<S: FeatureStream> RepairGeometry<S> {
    pub fn new(inner: S) -> Self {
        Self::with_engine(inner, GeoEngine)
    }
}

impl<S: FeatureStream, E: GeometryEngine> RepairGeometry<S, E> {
    pub fn with_engine(inner: S, engine: E) -> Self {
        Self {
            inner,
            engine,
            sink: LogSink::global(),
            stats: Cell::new(RepairStats::default()),
        }
    }

    /// Destination des logs émis pendant l'itération
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn stats(&self) -> RepairStats {
        self.stats.get()
    }

    fn repair(&self, mut feature: Feature) -> Feature {
        let outcome = repair_feature(&self.engine, self.inner.schema(), &mut feature);
        let mut stats = self.stats.get();
        stats.record(outcome);
        self.stats.set(stats);
        self.sink.in_scope(|| match outcome {
            RepairOutcome::Repaired => {
                debug!(feature = %feature.label(), "Invalid geometry repaired");
            }
            RepairOutcome::Nulled => {
                warn!(feature = %feature.label(), "Geometry repair produced no geometry, set to null");
            }
            RepairOutcome::Valid | RepairOutcome::Absent => {}
        });
        feature
    }
}

impl<S: FeatureStream, E: GeometryEngine> FeatureStream for RepairGeometry<S, E> {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        let cursor = self.inner.open()?;
        Ok(Box::new(MappedCursor::new(cursor, move |feature| {
            Ok(self.repair(feature))
        })))
    }
}

/// Enveloppe un flux dans le décorateur de réparation par défaut
pub fn repair_geometries<S: FeatureStream>(stream: S) -> RepairGeometry<S> {
    RepairGeometry::new(stream)
}
