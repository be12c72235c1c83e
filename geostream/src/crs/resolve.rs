//! Inférence du CRS d'une collection sans CRS déclaré

use tracing::{debug, warn};

use super::{Crs, CrsProvider};
use crate::stream::{FeaturePass, FeatureStream};
use crate::types::Schema;
use crate::Result;

/// Résultat de l'inférence
#[derive(Debug, Clone, PartialEq)]
pub enum CrsResolution {
    /// CRS déclaré par le schéma (aucun parcours)
    Declared(Crs),

    /// CRS commun à toutes les features qui en portent un
    Inferred(Crs),

    /// Deux features portent des CRS différents : non déterminé
    Conflicting {
        first: Crs,
        conflicting: Crs,
        /// Rang de la première feature en conflit
        index: usize,
    },

    /// Aucune feature ne porte de CRS : non déterminé
    Absent,
}

impl CrsResolution {
    pub fn crs(&self) -> Option<&Crs> {
        match self {
            Self::Declared(crs) | Self::Inferred(crs) => Some(crs),
            Self::Conflicting { .. } | Self::Absent => None,
        }
    }

    pub fn into_crs(self) -> Option<Crs> {
        match self {
            Self::Declared(crs) | Self::Inferred(crs) => Some(crs),
            Self::Conflicting { .. } | Self::Absent => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        self.crs().is_some()
    }
}

/// Détermine le CRS effectif d'une collection
///
/// Le CRS déclaré par le schéma est retourné immédiatement. Sinon une passe est
/// ouverte et chaque feature contribue son CRS (celui attaché à sa géométrie, à
/// défaut celui du descripteur de géométrie). Le premier désaccord arrête le
/// parcours. La passe est fermée sur tous les chemins ; une erreur de fermeture
/// n'est remontée que si aucun conflit n'a été détecté.
pub fn resolve_collection_crs<S, P>(stream: &S, provider: &P) -> Result<CrsResolution>
where
    S: FeatureStream + ?Sized,
    P: CrsProvider + ?Sized,
{
    let schema = stream.schema();
    if let Some(crs) = schema.crs() {
        return Ok(CrsResolution::Declared(crs.clone()));
    }

    let mut pass = stream.features()?;
    let result = scan(&mut pass, schema, provider);

    match result {
        Ok(conflict @ CrsResolution::Conflicting { .. }) => {
            if let Err(e) = pass.close() {
                warn!(error = %e, "Failed to close feature pass after CRS conflict");
            }
            Ok(conflict)
        }
        other => pass.finish(other),
    }
}

fn scan<P>(pass: &mut FeaturePass<'_>, schema: &Schema, provider: &P) -> Result<CrsResolution>
where
    P: CrsProvider + ?Sized,
{
    let descriptor_crs = schema.default_geometry().and_then(|d| d.crs.as_ref());
    let mut candidate: Option<Crs> = None;

    for (index, item) in pass.enumerate() {
        let feature = item?;

        let feature_crs = feature
            .default_geometry(schema)
            .and_then(|g| g.crs.as_ref())
            .or(descriptor_crs);

        let Some(feature_crs) = feature_crs else {
            continue;
        };

        let Some(first) = &candidate else {
            candidate = Some(feature_crs.clone());
            continue;
        };

        if !provider.equals_ignore_metadata(first, feature_crs) {
            warn!(
                feature = %feature.label(),
                index,
                first = %first,
                conflicting = %feature_crs,
                "Mixed CRS in collection, CRS left undetermined"
            );
            return Ok(CrsResolution::Conflicting {
                first: first.clone(),
                conflicting: feature_crs.clone(),
                index,
            });
        }
    }

    Ok(match candidate {
        Some(crs) => {
            debug!(crs = %crs, "Collection CRS inferred from features");
            CrsResolution::Inferred(crs)
        }
        None => CrsResolution::Absent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{AxisOrder, EpsgRegistry};
    use crate::stream::testing::InstrumentedStream;
    use crate::types::{AttributeDescriptor, Feature, FeatureGeometry, Value};
    use geo::{Geometry, Point};

    fn schema(descriptor_crs: Option<Crs>) -> Schema {
        Schema::new(
            "pts",
            vec![AttributeDescriptor::geometry("geom", descriptor_crs)],
            Some("geom"),
        )
        .unwrap()
    }

    fn feature(i: usize, crs: Option<Crs>) -> Feature {
        let geometry = Geometry::Point(Point::new(i as f64, i as f64));
        let value = match crs {
            Some(crs) => Value::Geometry(FeatureGeometry::with_crs(geometry, crs)),
            None => Value::Geometry(FeatureGeometry::new(geometry)),
        };
        Feature::new(Some(i.to_string()), vec![value])
    }

    fn lat_lon() -> Crs {
        Crs::epsg(4326, AxisOrder::NorthEast)
    }

    #[test]
    fn test_declared_crs_without_scan() {
        let stream = InstrumentedStream::new(schema(None).with_crs(Some(lat_lon())), vec![]);
        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert_eq!(resolution, CrsResolution::Declared(lat_lon()));
        assert_eq!(stream.counters.opened.get(), 0);
    }

    #[test]
    fn test_all_features_same_crs() {
        let features = (0..3).map(|i| feature(i, Some(lat_lon()))).collect();
        let stream = InstrumentedStream::new(schema(None), features);

        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert_eq!(resolution, CrsResolution::Inferred(lat_lon()));
        assert_eq!(stream.counters.closed.get(), 1);
    }

    #[test]
    fn test_label_is_metadata() {
        let features = vec![
            feature(0, Some(lat_lon().with_label("urn:ogc:def:crs:EPSG::4326"))),
            feature(1, Some(lat_lon().with_label("WGS 84"))),
        ];
        let stream = InstrumentedStream::new(schema(None), features);
        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert!(resolution.is_determined());
    }

    #[test]
    fn test_conflict_stops_scan_and_closes_once() {
        let mut features: Vec<Feature> = (0..5).map(|i| feature(i, Some(lat_lon()))).collect();
        features[2] = feature(2, Some(Crs::epsg(4326, AxisOrder::EastNorth)));
        let stream = InstrumentedStream::new(schema(None), features);

        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert!(matches!(
            resolution,
            CrsResolution::Conflicting { index: 2, .. }
        ));
        assert!(resolution.crs().is_none());
        assert_eq!(stream.counters.pulled.get(), 3);
        assert_eq!(stream.counters.closed.get(), 1);
    }

    #[test]
    fn test_features_without_crs_are_skipped() {
        let features = vec![feature(0, None), feature(1, Some(lat_lon())), feature(2, None)];
        let stream = InstrumentedStream::new(schema(None), features);
        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert_eq!(resolution, CrsResolution::Inferred(lat_lon()));
    }

    #[test]
    fn test_no_crs_anywhere() {
        let features = vec![feature(0, None), feature(1, None)];
        let stream = InstrumentedStream::new(schema(None), features);
        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert_eq!(resolution, CrsResolution::Absent);
    }

    #[test]
    fn test_override_beats_descriptor_crs() {
        let lambert = Crs::epsg(2154, AxisOrder::EastNorth);
        let features = vec![feature(0, Some(lat_lon())), feature(1, None)];
        let stream = InstrumentedStream::new(schema(Some(lambert)), features);

        // feature 0 : surcharge 4326 ; feature 1 : descripteur 2154 -> conflit
        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert!(matches!(
            resolution,
            CrsResolution::Conflicting { index: 1, .. }
        ));
    }

    #[test]
    fn test_close_error_suppressed_on_conflict() {
        let features = vec![
            feature(0, Some(lat_lon())),
            feature(1, Some(Crs::epsg(3857, AxisOrder::EastNorth))),
        ];
        let mut stream = InstrumentedStream::new(schema(None), features);
        stream.fail_close = true;

        let resolution = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap();
        assert!(!resolution.is_determined());
        assert_eq!(stream.counters.closed.get(), 1);
    }

    #[test]
    fn test_close_error_propagated_when_alone() {
        let features = vec![feature(0, Some(lat_lon()))];
        let mut stream = InstrumentedStream::new(schema(None), features);
        stream.fail_close = true;

        let err = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("close failure"));
        assert_eq!(stream.counters.closed.get(), 1);
    }

    #[test]
    fn test_read_error_propagated_and_pass_closed() {
        let features = (0..3).map(|i| feature(i, Some(lat_lon()))).collect();
        let mut stream = InstrumentedStream::new(schema(None), features);
        stream.fail_at = Some(1);
        stream.fail_close = true;

        let err = resolve_collection_crs(&stream, &EpsgRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("read failure"));
        assert_eq!(stream.counters.closed.get(), 1);
    }
}
