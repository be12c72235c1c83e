//! Décodage GeoJSON vers un flux en mémoire
//!
//! L'enveloppe est une `FeatureCollection` ou un tableau de collections (seul
//! le premier membre est retenu). Le schéma est déduit des propriétés.

use std::collections::HashMap;
use std::io::Read;

use geojson::{feature::Id, FeatureCollection, GeoJson, JsonObject, JsonValue};
use tracing::{debug, warn};

use crate::crs::{Crs, CrsProvider};
use crate::stream::MemoryFeatureStream;
use crate::types::{AttributeDescriptor, Feature, FeatureGeometry, Schema, Value, ValueType};
use crate::{PipelineError, Result};

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Noms candidats pour l'attribut de géométrie par défaut
const DEFAULT_GEOMETRY_NAMES: [&str; 3] = ["geometry", "geom", "the_geom"];

/// Lit une enveloppe depuis des octets (BOM UTF-8/UTF-16 détecté)
pub fn read_collection<R, P>(mut reader: R, provider: &P) -> Result<MemoryFeatureStream>
where
    R: Read,
    P: CrsProvider + ?Sized,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(&bytes);
    if had_errors {
        warn!(encoding = encoding.name(), "Malformed byte sequences replaced while decoding input");
    }

    parse_collection(&text, provider)
}

/// Lit une enveloppe textuelle
pub fn parse_collection<P>(text: &str, provider: &P) -> Result<MemoryFeatureStream>
where
    P: CrsProvider + ?Sized,
{
    let value: JsonValue = serde_json::from_str(text)?;
    collection_from_value(value, provider)
}

/// Extrait la première collection d'une enveloppe déjà parsée
pub fn collection_from_value<P>(value: JsonValue, provider: &P) -> Result<MemoryFeatureStream>
where
    P: CrsProvider + ?Sized,
{
    let member = match value {
        JsonValue::Array(members) => {
            let count = members.len();
            let first = members
                .into_iter()
                .next()
                .ok_or_else(|| PipelineError::MalformedEnvelope("empty envelope".to_string()))?;
            if count > 1 {
                debug!(members = count, "Envelope holds several collections, using the first");
            }
            first
        }
        other => other,
    };

    if !member.is_object() {
        return Err(PipelineError::MalformedEnvelope(format!(
            "expected a FeatureCollection object, got {}",
            json_kind(&member)
        )));
    }

    match GeoJson::from_json_value(member)? {
        GeoJson::FeatureCollection(fc) => build_stream(fc, provider),
        GeoJson::Feature(_) => Err(PipelineError::MalformedEnvelope(
            "expected a FeatureCollection, got a Feature".to_string(),
        )),
        GeoJson::Geometry(_) => Err(PipelineError::MalformedEnvelope(
            "expected a FeatureCollection, got a Geometry".to_string(),
        )),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Lit un membre `crs` (forme `name` ou `EPSG` du GeoJSON 2008)
pub fn parse_crs_member<P>(member: &JsonValue, provider: &P) -> Option<Crs>
where
    P: CrsProvider + ?Sized,
{
    let kind = member.get("type").and_then(JsonValue::as_str)?;
    let properties = member.get("properties")?;

    let parsed = match kind {
        "name" => {
            let name = properties.get("name").and_then(JsonValue::as_str)?;
            provider.parse(name)
        }
        "EPSG" => {
            let code = properties.get("code").and_then(JsonValue::as_u64)?;
            provider.parse(&format!("EPSG:{}", code))
        }
        other => {
            debug!(kind = other, "Unsupported crs member type");
            return None;
        }
    };

    match parsed {
        Ok(crs) => Some(crs),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable crs member");
            None
        }
    }
}

fn is_geometry_object(value: &JsonValue) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    let is_geometry_type = object
        .get("type")
        .and_then(JsonValue::as_str)
        .map_or(false, |t| GEOMETRY_TYPES.contains(&t));
    is_geometry_type && (object.contains_key("coordinates") || object.contains_key("geometries"))
}

/// Type déduit d'une propriété ; `None` tant que seules des valeurs nulles sont vues
fn property_kind(value: &JsonValue) -> Option<ValueType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(ValueType::Boolean),
        JsonValue::Number(n) if n.is_i64() => Some(ValueType::Integer),
        JsonValue::Number(_) => Some(ValueType::Real),
        JsonValue::String(_) | JsonValue::Array(_) => Some(ValueType::Text),
        JsonValue::Object(_) if is_geometry_object(value) => Some(ValueType::Geometry),
        JsonValue::Object(_) => Some(ValueType::Text),
    }
}

fn merge_kinds(a: ValueType, b: ValueType) -> ValueType {
    use ValueType::*;
    match (a, b) {
        (a, b) if a == b => a,
        (Integer, Real) | (Real, Integer) => Real,
        _ => Text,
    }
}

fn infer_properties(fc: &FeatureCollection) -> Vec<(String, Option<ValueType>)> {
    let mut order: Vec<(String, Option<ValueType>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for feature in &fc.features {
        let Some(properties) = &feature.properties else {
            continue;
        };
        for (name, value) in properties {
            let kind = property_kind(value);
            match index.get(name) {
                Some(&i) => {
                    let slot = &mut order[i].1;
                    *slot = match (*slot, kind) {
                        (Some(a), Some(b)) => Some(merge_kinds(a, b)),
                        (a, b) => a.or(b),
                    };
                }
                None => {
                    index.insert(name.clone(), order.len());
                    order.push((name.clone(), kind));
                }
            }
        }
    }

    order
}

fn foreign_str<'a>(members: Option<&'a JsonObject>, key: &str) -> Option<&'a str> {
    members?.get(key)?.as_str()
}

fn build_stream<P>(fc: FeatureCollection, provider: &P) -> Result<MemoryFeatureStream>
where
    P: CrsProvider + ?Sized,
{
    let foreign = fc.foreign_members.as_ref();
    let name = foreign_str(foreign, "name").unwrap_or("features").to_string();
    let namespace = foreign
        .and_then(|m| m.get("namespaces"))
        .and_then(|ns| ns.get(super::NAMESPACE_PREFIX))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    let collection_crs = foreign
        .and_then(|m| m.get("crs"))
        .and_then(|member| parse_crs_member(member, provider));

    let properties = infer_properties(&fc);

    let geometry_name = free_geometry_name(&properties);

    let mut attributes = vec![AttributeDescriptor::geometry(
        geometry_name.as_str(),
        collection_crs.clone(),
    )];
    attributes.extend(
        properties
            .iter()
            .map(|(name, kind)| AttributeDescriptor::new(name, kind.unwrap_or(ValueType::Text))),
    );

    let mut schema = Schema::new(name, attributes, Some(geometry_name.as_str()))?.with_crs(collection_crs);
    if let Some(ns) = namespace {
        schema = schema.with_namespace(ns);
    }

    let features = fc
        .features
        .into_iter()
        .map(|feature| convert_feature(feature, &schema, provider))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        schema = %schema.name(),
        attributes = schema.len(),
        features = features.len(),
        "Decoded feature collection"
    );

    MemoryFeatureStream::new(schema, features)
}

/// Premier nom libre pour la géométrie par défaut, puis `geometry_1`, `geometry_2`...
fn free_geometry_name(properties: &[(String, Option<ValueType>)]) -> String {
    let is_free = |candidate: &str| properties.iter().all(|(name, _)| name != candidate);

    if let Some(name) = DEFAULT_GEOMETRY_NAMES.iter().find(|c| is_free(c)) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("geometry_{}", n))
        .find(|candidate| is_free(candidate))
        .unwrap_or_default()
}

fn convert_feature<P>(feature: geojson::Feature, schema: &Schema, provider: &P) -> Result<Feature>
where
    P: CrsProvider + ?Sized,
{
    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    let feature_crs = feature
        .foreign_members
        .as_ref()
        .and_then(|m| m.get("crs"))
        .and_then(|member| parse_crs_member(member, provider));

    let mut values = Vec::with_capacity(schema.len());

    let geometry = match feature.geometry {
        Some(geometry) => Value::Geometry(FeatureGeometry {
            geometry: geo::Geometry::try_from(geometry)?,
            crs: feature_crs,
        }),
        None => Value::Null,
    };
    values.push(geometry);

    let mut properties = feature.properties.unwrap_or_default();
    for attr in &schema.attributes()[1..] {
        let value = properties.remove(&attr.name).unwrap_or(JsonValue::Null);
        values.push(convert_value(value, attr.value_type)?);
    }

    Ok(Feature::new(id, values))
}

fn convert_value(value: JsonValue, value_type: ValueType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    Ok(match value_type {
        ValueType::Boolean => value.as_bool().map_or(Value::Null, Value::Boolean),
        ValueType::Integer => value.as_i64().map_or(Value::Null, Value::Integer),
        ValueType::Real => value.as_f64().map_or(Value::Null, Value::Real),
        ValueType::Text => match value {
            JsonValue::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        },
        ValueType::Geometry => {
            let geometry = geojson::Geometry::from_json_value(value)?;
            Value::Geometry(FeatureGeometry::new(geo::Geometry::try_from(geometry)?))
        }
    })
}
