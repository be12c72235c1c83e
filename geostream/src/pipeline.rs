//! Chaîne de normalisation complète
//!
//! Décodage → résolution du CRS → correction de l'ordre des axes → nettoyage du
//! schéma, puis réparation optionnelle des géométries. Les événements de log,
//! y compris ceux émis paresseusement pendant l'itération, passent par le
//! [`LogSink`] du pipeline.

use std::io::Read;

use geojson::JsonValue;
use tracing::{debug, info, warn};

use crate::codec::decode;
use crate::crs::{
    correct_axis_order, resolve_collection_crs, CrsProvider, CrsResolution, EpsgRegistry,
};
use crate::log::LogSink;
use crate::repair::RepairGeometry;
use crate::sanitize::sanitize;
use crate::stream::{FeatureCursor, FeatureStream, MemoryFeatureStream};
use crate::types::{Feature, Schema};
use crate::Result;

/// Étapes activables du pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub axis_correction: bool,
    pub sanitize: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            axis_correction: true,
            sanitize: true,
        }
    }
}

/// Pipeline configuré : fournisseur de CRS, puits de logs et options
#[derive(Debug, Clone)]
pub struct Pipeline<P = EpsgRegistry> {
    provider: P,
    sink: LogSink,
    options: PipelineOptions,
}

impl Default for Pipeline<EpsgRegistry> {
    fn default() -> Self {
        Self::new(EpsgRegistry::new())
    }
}

impl<P: CrsProvider> Pipeline<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            sink: LogSink::global(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Décode des octets puis normalise
    pub fn read<R: Read>(&self, reader: R) -> Result<Normalized<'static>> {
        let raw = self.decode_reader(reader)?;
        self.normalize(raw)
    }

    /// Décode un texte puis normalise
    pub fn read_str(&self, text: &str) -> Result<Normalized<'static>> {
        let raw = self.decode_str(text)?;
        self.normalize(raw)
    }

    /// Décode une enveloppe déjà parsée puis normalise
    pub fn read_value(&self, value: JsonValue) -> Result<Normalized<'static>> {
        let raw = self.decode_value(value)?;
        self.normalize(raw)
    }

    pub fn decode_reader<R: Read>(&self, reader: R) -> Result<MemoryFeatureStream> {
        self.sink
            .in_scope(|| decode::read_collection(reader, &self.provider))
    }

    pub fn decode_str(&self, text: &str) -> Result<MemoryFeatureStream> {
        self.sink
            .in_scope(|| decode::parse_collection(text, &self.provider))
    }

    pub fn decode_value(&self, value: JsonValue) -> Result<MemoryFeatureStream> {
        self.sink
            .in_scope(|| decode::collection_from_value(value, &self.provider))
    }

    /// Applique, dans l'ordre, résolution, correction des axes et nettoyage
    ///
    /// La résolution et la correction ne s'appliquent qu'aux schémas ayant une
    /// géométrie par défaut.
    pub fn normalize<'a, S>(&self, stream: S) -> Result<Normalized<'a>>
    where
        S: FeatureStream + 'a,
    {
        self.sink.in_scope(|| self.normalize_in_scope(stream))
    }

    fn normalize_in_scope<'a, S>(&self, stream: S) -> Result<Normalized<'a>>
    where
        S: FeatureStream + 'a,
    {
        let mut resolution = None;
        let mut axis_swapped = false;

        let stream: Box<dyn FeatureStream + 'a> =
            if self.options.axis_correction && stream.schema().default_geometry().is_some() {
                let resolved = resolve_collection_crs(&stream, &self.provider)?;
                match &resolved {
                    CrsResolution::Conflicting {
                        first,
                        conflicting,
                        index,
                    } => {
                        warn!(
                            schema = %stream.schema().name(),
                            first = %first,
                            conflicting = %conflicting,
                            index = index,
                            "Features carry different CRS, collection CRS not determined"
                        );
                    }
                    CrsResolution::Absent => {
                        debug!(schema = %stream.schema().name(), "No CRS found on features");
                    }
                    CrsResolution::Declared(_) | CrsResolution::Inferred(_) => {}
                }

                let corrected = correct_axis_order(stream, resolved.crs(), &self.provider);
                if let (Some(crs), Some(published)) = (resolved.crs(), corrected.schema().crs()) {
                    axis_swapped = !self.provider.equals_ignore_metadata(crs, published);
                }
                resolution = Some(resolved);
                corrected
            } else {
                Box::new(stream)
            };

        let before: Vec<String> = stream.schema().names().map(str::to_string).collect();
        let stream: Box<dyn FeatureStream + 'a> = if self.options.sanitize {
            Box::new(sanitize(stream)?)
        } else {
            stream
        };
        let removed: Vec<String> = before
            .into_iter()
            .filter(|name| stream.schema().index_of(name).is_none())
            .collect();

        info!(
            schema = %stream.schema().name(),
            crs = ?stream.schema().crs().map(|crs| crs.identifier()),
            axis_swapped = axis_swapped,
            removed = removed.len(),
            "Collection normalized"
        );

        Ok(Normalized {
            stream,
            sink: self.sink.clone(),
            resolution,
            axis_swapped,
            removed,
        })
    }

    /// Enveloppe un flux dans le décorateur de réparation, avec le puits du pipeline
    pub fn repair<S: FeatureStream>(&self, stream: S) -> RepairGeometry<S> {
        RepairGeometry::new(stream).with_sink(self.sink.clone())
    }
}

/// Flux normalisé et compte rendu des étapes appliquées
pub struct Normalized<'a> {
    stream: Box<dyn FeatureStream + 'a>,
    sink: LogSink,
    resolution: Option<CrsResolution>,
    axis_swapped: bool,
    removed: Vec<String>,
}

impl<'a> Normalized<'a> {
    /// Résultat de la résolution, `None` si elle n'a pas été exécutée
    pub fn resolution(&self) -> Option<&CrsResolution> {
        self.resolution.as_ref()
    }

    pub fn axis_swapped(&self) -> bool {
        self.axis_swapped
    }

    /// Attributs retirés par le nettoyage
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn into_stream(self) -> Box<dyn FeatureStream + 'a> {
        self.stream
    }
}

impl FeatureStream for Normalized<'_> {
    fn schema(&self) -> &Schema {
        self.stream.schema()
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        let inner = self.sink.in_scope(|| self.stream.open())?;
        Ok(Box::new(ScopedCursor {
            inner,
            sink: &self.sink,
        }))
    }
}

/// Curseur dont chaque appel s'exécute dans la portée du puits de logs
struct ScopedCursor<'a> {
    inner: Box<dyn FeatureCursor + 'a>,
    sink: &'a LogSink,
}

impl FeatureCursor for ScopedCursor<'_> {
    fn next_feature(&mut self) -> Result<Option<Feature>> {
        let inner = &mut self.inner;
        self.sink.in_scope(|| inner.next_feature())
    }

    fn close(&mut self) -> Result<()> {
        let inner = &mut self.inner;
        self.sink.in_scope(|| inner.close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{AxisOrder, Crs};
    use crate::repair::{GeoEngine, GeometryEngine};
    use crate::stream::collect_features;
    use crate::types::{AttributeDescriptor, Value, ValueType};
    use geo::{point, Geometry};

    const LAT_LON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "a", "geometry": {"type": "Point", "coordinates": [45.0, 5.0]},
             "properties": {"name": "a"},
             "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4326"}}},
            {"type": "Feature", "id": "b", "geometry": {"type": "Point", "coordinates": [46.0, 6.0]},
             "properties": {"name": "b"},
             "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4326"}}}
        ]
    }"#;

    fn pipeline() -> Pipeline {
        Pipeline::default().with_sink(LogSink::silent())
    }

    #[test]
    fn test_inferred_lat_lon_swapped() {
        let normalized = pipeline().read_str(LAT_LON).unwrap();

        assert!(matches!(
            normalized.resolution(),
            Some(CrsResolution::Inferred(crs)) if crs.axis_order() == AxisOrder::NorthEast
        ));
        assert!(normalized.axis_swapped());
        assert!(normalized
            .schema()
            .crs()
            .unwrap()
            .equals_ignore_metadata(&Crs::epsg(4326, AxisOrder::EastNorth)));

        let features = collect_features(&normalized).unwrap();
        let geom = features[0].values[0].as_geometry().unwrap();
        assert_eq!(geom.geometry, Geometry::Point(point!(x: 5.0, y: 45.0)));
    }

    #[test]
    fn test_declared_canonical_crs_not_swapped() {
        let json = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:4326"}},
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5.0, 45.0]}, "properties": {}}
            ]
        }"#;
        let normalized = pipeline().read_str(json).unwrap();

        assert!(matches!(normalized.resolution(), Some(CrsResolution::Declared(_))));
        assert!(!normalized.axis_swapped());
        let features = collect_features(&normalized).unwrap();
        assert_eq!(
            features[0].values[0].as_geometry().unwrap().geometry,
            Geometry::Point(point!(x: 5.0, y: 45.0))
        );
    }

    #[test]
    fn test_structural_attributes_removed() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": null,
                 "properties": {"boundedBy": null, "name": "x", "description": "d"}}
            ]
        }"#;
        let normalized = pipeline().read_str(json).unwrap();

        assert_eq!(
            normalized.schema().names().collect::<Vec<_>>(),
            vec!["geometry", "name"]
        );
        assert_eq!(normalized.removed(), ["boundedBy", "description"]);
        let features = collect_features(&normalized).unwrap();
        assert_eq!(features[0].values, vec![Value::Null, Value::from("x")]);
    }

    #[test]
    fn test_steps_disabled() {
        let options = PipelineOptions {
            axis_correction: false,
            sanitize: false,
        };
        let normalized = pipeline().with_options(options).read_str(LAT_LON).unwrap();

        assert!(normalized.resolution().is_none());
        assert!(!normalized.axis_swapped());
        assert!(normalized.removed().is_empty());
        let features = collect_features(&normalized).unwrap();
        assert_eq!(
            features[0].values[0].as_geometry().unwrap().geometry,
            Geometry::Point(point!(x: 45.0, y: 5.0))
        );
    }

    #[test]
    fn test_schema_without_default_geometry_skips_resolution() {
        let schema = Schema::new(
            "plain",
            vec![AttributeDescriptor::new("n", ValueType::Integer)],
            None,
        )
        .unwrap();
        let stream = MemoryFeatureStream::new(schema, vec![]).unwrap();
        let normalized = pipeline().normalize(stream).unwrap();
        assert!(normalized.resolution().is_none());
    }

    #[test]
    fn test_repair_after_normalize() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Polygon",
                  "coordinates": [[[0,0],[2,2],[2,0],[0,2],[0,0]]]}, "properties": {}}
            ]
        }"#;
        let pipeline = pipeline();
        let normalized = pipeline.read_str(json).unwrap();
        let repaired = pipeline.repair(normalized);

        let features = collect_features(&repaired).unwrap();
        let geom = features[0].values[0].as_geometry().unwrap();
        assert!(GeoEngine.is_valid(&geom.geometry));
    }
}
