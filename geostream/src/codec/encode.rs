//! Export d'un flux en GeoJSON avec geozero (streaming)

use std::io::Write;

use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use crate::crs::Crs;
use crate::stream::FeatureStream;
use crate::types::{Feature, Schema, Value};
use crate::Result;

/// Écrit le flux en `FeatureCollection` à travers une seule passe
///
/// Retourne le nombre de features écrites.
pub fn write_collection<S, W>(stream: &S, writer: &mut W) -> Result<usize>
where
    S: FeatureStream + ?Sized,
    W: Write,
{
    let schema = stream.schema();

    // Header FeatureCollection
    write!(writer, r#"{{"type":"FeatureCollection","name":"#)?;
    serde_json::to_writer(&mut *writer, schema.name())?;
    if let Some(namespace) = schema.namespace() {
        write!(writer, r#","namespaces":{{"{}":"#, super::NAMESPACE_PREFIX)?;
        serde_json::to_writer(&mut *writer, namespace)?;
        write!(writer, "}}")?;
    }
    if let Some(crs) = schema.crs() {
        write!(writer, ",")?;
        write_crs_member(writer, crs)?;
    }
    write!(writer, r#","features":["#)?;

    let mut pass = stream.features()?;
    let result = write_features(&mut pass, schema, writer);
    let count = pass.finish(result)?;

    // Footer
    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(count)
}

/// Sérialise le flux dans une chaîne
pub fn to_string<S: FeatureStream + ?Sized>(stream: &S) -> Result<String> {
    let mut buffer = Vec::new();
    write_collection(stream, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn write_features<I, W>(features: I, schema: &Schema, writer: &mut W) -> Result<usize>
where
    I: Iterator<Item = Result<Feature>>,
    W: Write,
{
    let mut count = 0;
    for feature in features {
        let feature = feature?;
        if count > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, &feature, schema)?;
        count += 1;
    }
    Ok(count)
}

fn write_crs_member<W: Write>(writer: &mut W, crs: &Crs) -> Result<()> {
    write!(
        writer,
        r#""crs":{{"type":"name","properties":{{"name":"{}"}}}}"#,
        crs.identifier()
    )?;
    Ok(())
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(writer: &mut W, feature: &Feature, schema: &Schema) -> Result<()> {
    write!(writer, r#"{{"type":"Feature""#)?;
    if let Some(id) = &feature.id {
        write!(writer, r#","id":"#)?;
        serde_json::to_writer(&mut *writer, id)?;
    }

    // Geometry via geozero
    write!(writer, r#","geometry":"#)?;
    let default_index = schema.default_geometry_index();
    let default_geometry = default_index
        .and_then(|i| feature.values.get(i))
        .and_then(Value::as_geometry);
    match default_geometry {
        Some(geom) => write_geometry(writer, &geom.geometry)?,
        None => write!(writer, "null")?,
    }

    // Properties
    write!(writer, r#","properties":{{"#)?;
    let mut first = true;
    for (i, (attr, value)) in schema.attributes().iter().zip(&feature.values).enumerate() {
        if Some(i) == default_index {
            continue;
        }
        if !first {
            write!(writer, ",")?;
        }
        first = false;
        serde_json::to_writer(&mut *writer, &attr.name)?;
        write!(writer, ":")?;
        write_value(writer, value)?;
    }
    write!(writer, "}}")?;

    // CRS propre à la feature s'il diffère de celui de la collection
    if let Some(crs) = default_geometry.and_then(|g| g.crs.as_ref()) {
        let same_as_collection = schema
            .crs()
            .map_or(false, |declared| declared.equals_ignore_metadata(crs));
        if !same_as_collection {
            write!(writer, ",")?;
            write_crs_member(writer, crs)?;
        }
    }

    write!(writer, "}}")?;
    Ok(())
}

fn write_geometry<W: Write>(writer: &mut W, geometry: &geo::Geometry) -> Result<()> {
    let mut geom_writer = GeoJsonWriter::new(&mut *writer);
    geometry.process_geom(&mut geom_writer)?;
    Ok(())
}

fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => write!(writer, "null")?,
        Value::Text(s) => serde_json::to_writer(&mut *writer, s)?,
        Value::Integer(n) => write!(writer, "{}", n)?,
        Value::Real(f) => serde_json::to_writer(&mut *writer, f)?,
        Value::Boolean(b) => write!(writer, "{}", b)?,
        Value::Geometry(g) => write_geometry(writer, &g.geometry)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode::parse_collection;
    use crate::crs::{AxisOrder, EpsgRegistry};
    use crate::stream::{collect_features, MemoryFeatureStream};
    use crate::types::{AttributeDescriptor, FeatureGeometry, ValueType};
    use geo::{point, Geometry};

    fn sample() -> MemoryFeatureStream {
        let schema = Schema::new(
            "parcelles",
            vec![
                AttributeDescriptor::geometry("geometry", None),
                AttributeDescriptor::new("nom", ValueType::Text),
                AttributeDescriptor::new("surface", ValueType::Real),
            ],
            Some("geometry"),
        )
        .unwrap()
        .with_crs(Some(Crs::epsg(2154, AxisOrder::EastNorth)))
        .with_namespace("http://example.org/cadastre");

        let features = vec![
            Feature::new(
                Some("001".into()),
                vec![
                    Geometry::Point(point!(x: 652381.0, y: 6862047.0)).into(),
                    "Quote \" test".into(),
                    Value::Real(12.5),
                ],
            ),
            Feature::new(None, vec![Value::Null, Value::Null, Value::Null]),
        ];
        MemoryFeatureStream::new(schema, features).unwrap()
    }

    #[test]
    fn test_write_collection() {
        let json = to_string(&sample()).unwrap();
        assert!(json.contains(r#""type":"FeatureCollection""#));
        assert!(json.contains(r#""name":"parcelles""#));
        assert!(json.contains(r#""namespaces":{"feature":"http://example.org/cadastre"}"#));
        assert!(json.contains(r#""name":"EPSG:2154""#));
        assert!(json.contains(r#""id":"001""#));
        assert!(json.contains(r#""geometry":null"#));
        // JSON bien formé
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_round_trip() {
        let registry = EpsgRegistry::new();
        let original = sample();
        let json = to_string(&original).unwrap();
        let decoded = parse_collection(&json, &registry).unwrap();

        let (decoded_schema, original_schema) = (decoded.schema(), original.schema());
        assert_eq!(decoded_schema.name(), original_schema.name());
        assert_eq!(decoded_schema.namespace(), original_schema.namespace());
        assert_eq!(
            decoded_schema.names().collect::<Vec<_>>(),
            original_schema.names().collect::<Vec<_>>()
        );
        assert!(decoded_schema
            .crs()
            .unwrap()
            .equals_ignore_metadata(original_schema.crs().unwrap()));
        assert_eq!(
            collect_features(&decoded).unwrap(),
            collect_features(&original).unwrap()
        );
    }

    #[test]
    fn test_feature_crs_written_when_different() {
        let schema = Schema::new(
            "pts",
            vec![AttributeDescriptor::geometry("geometry", None)],
            Some("geometry"),
        )
        .unwrap();
        let feature = Feature::new(
            None,
            vec![Value::Geometry(FeatureGeometry::with_crs(
                Geometry::Point(point!(x: 45.0, y: 5.0)),
                Crs::epsg(4326, AxisOrder::NorthEast),
            ))],
        );
        let stream = MemoryFeatureStream::new(schema, vec![feature]).unwrap();
        let json = to_string(&stream).unwrap();
        assert!(json.contains("urn:ogc:def:crs:EPSG::4326"));
    }
}
