//! Types de données : schéma, attributs, features

use std::collections::HashSet;

use geo::Geometry;

use crate::crs::Crs;
use crate::{PipelineError, Result};

/// Type de valeur d'un attribut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Integer,
    Real,
    Boolean,
    Geometry,
}

/// Description d'un attribut du schéma
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Nom local de l'attribut (unique dans le schéma)
    pub name: String,

    /// Type des valeurs
    pub value_type: ValueType,

    /// CRS du descripteur de géométrie (ignoré pour les autres types)
    pub crs: Option<Crs>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            crs: None,
        }
    }

    pub fn geometry(name: impl Into<String>, crs: Option<Crs>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::Geometry,
            crs,
        }
    }

    pub fn is_geometry(&self) -> bool {
        self.value_type == ValueType::Geometry
    }
}

/// Disposition des attributs partagée par toutes les features d'une collection
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    namespace: Option<String>,
    attributes: Vec<AttributeDescriptor>,
    default_geometry: Option<usize>,
    crs: Option<Crs>,
}

impl Schema {
    /// Construit un schéma en vérifiant l'unicité des noms
    ///
    /// `default_geometry` doit désigner un attribut de type géométrie.
    pub fn new(
        name: impl Into<String>,
        attributes: Vec<AttributeDescriptor>,
        default_geometry: Option<&str>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for attr in &attributes {
            if !seen.insert(attr.name.as_str()) {
                return Err(PipelineError::InvalidSchema(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
        }

        let default_geometry = match default_geometry {
            Some(geom_name) => {
                let index = attributes
                    .iter()
                    .position(|a| a.name == geom_name)
                    .ok_or_else(|| {
                        PipelineError::InvalidSchema(format!(
                            "default geometry '{}' is not an attribute",
                            geom_name
                        ))
                    })?;
                if !attributes[index].is_geometry() {
                    return Err(PipelineError::InvalidSchema(format!(
                        "default geometry '{}' is not geometry-typed",
                        geom_name
                    )));
                }
                Some(index)
            }
            None => None,
        };

        Ok(Self {
            name: name.into(),
            namespace: None,
            attributes,
            default_geometry,
            crs: None,
        })
    }

    /// Déclare le CRS de la collection
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Déclare l'URI d'espace de noms du type de feature
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// CRS déclaré au niveau de la collection
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn default_geometry_index(&self) -> Option<usize> {
        self.default_geometry
    }

    pub fn default_geometry(&self) -> Option<&AttributeDescriptor> {
        self.default_geometry.map(|i| &self.attributes[i])
    }

    /// Noms des attributs dans l'ordre du schéma
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Copie du schéma avec un CRS imposé à la collection et au descripteur par défaut
    pub fn force_crs(&self, crs: &Crs) -> Schema {
        let mut schema = self.clone();
        if let Some(index) = schema.default_geometry {
            schema.attributes[index].crs = Some(crs.clone());
        }
        schema.crs = Some(crs.clone());
        schema
    }

    /// Sous-schéma restreint aux attributs retenus, dans l'ordre d'origine
    ///
    /// Si la géométrie par défaut disparaît, le premier attribut géométrique
    /// restant prend sa place.
    pub fn retype(&self, keep: &HashSet<&str>) -> Schema {
        let attributes: Vec<AttributeDescriptor> = self
            .attributes
            .iter()
            .filter(|a| keep.contains(a.name.as_str()))
            .cloned()
            .collect();

        let default_geometry = self
            .default_geometry()
            .and_then(|d| attributes.iter().position(|a| a.name == d.name))
            .or_else(|| attributes.iter().position(|a| a.is_geometry()));

        Schema {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            attributes,
            default_geometry,
            crs: self.crs.clone(),
        }
    }
}

/// Géométrie d'une feature avec son éventuel CRS propre
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGeometry {
    pub geometry: Geometry,

    /// CRS attaché à cette valeur, prioritaire sur celui du schéma
    pub crs: Option<Crs>,
}

impl FeatureGeometry {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, crs: None }
    }

    pub fn with_crs(geometry: Geometry, crs: Crs) -> Self {
        Self {
            geometry,
            crs: Some(crs),
        }
    }
}

/// Valeur d'un attribut
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Geometry(FeatureGeometry),
}

impl Value {
    /// Type de la valeur (`None` pour null, compatible avec tous les types)
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(ValueType::Text),
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Real(_) => Some(ValueType::Real),
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::Geometry(_) => Some(ValueType::Geometry),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_geometry(&self) -> Option<&FeatureGeometry> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Self {
        Value::Geometry(FeatureGeometry::new(geometry))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

/// Une feature : une valeur par attribut, dans l'ordre du schéma
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identifiant de la feature (optionnel)
    pub id: Option<String>,

    pub values: Vec<Value>,
}

impl Feature {
    pub fn new(id: Option<String>, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// Identifiant lisible pour les logs
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("<no id>")
    }

    /// Géométrie par défaut selon le schéma (`None` si absente ou nulle)
    pub fn default_geometry<'a>(&'a self, schema: &Schema) -> Option<&'a FeatureGeometry> {
        schema
            .default_geometry_index()
            .and_then(|i| self.values.get(i))
            .and_then(Value::as_geometry)
    }

    /// Vérifie que la feature correspond à son schéma
    pub fn check(&self, schema: &Schema) -> Result<()> {
        if self.values.len() != schema.len() {
            return Err(PipelineError::feature_mismatch(
                self.label(),
                format!(
                    "{} values for {} attributes",
                    self.values.len(),
                    schema.len()
                ),
            ));
        }

        for (value, attr) in self.values.iter().zip(schema.attributes()) {
            if let Some(t) = value.value_type() {
                if t != attr.value_type {
                    return Err(PipelineError::feature_mismatch(
                        self.label(),
                        format!(
                            "attribute '{}' expects {:?}, got {:?}",
                            attr.name, attr.value_type, t
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn sample_schema() -> Schema {
        Schema::new(
            "parcels",
            vec![
                AttributeDescriptor::geometry("geom", None),
                AttributeDescriptor::new("name", ValueType::Text),
                AttributeDescriptor::geometry("location", None),
            ],
            Some("geom"),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Schema::new(
            "dup",
            vec![
                AttributeDescriptor::new("a", ValueType::Text),
                AttributeDescriptor::new("a", ValueType::Integer),
            ],
            None,
        );
        assert!(matches!(result, Err(PipelineError::InvalidSchema(_))));
    }

    #[test]
    fn test_default_geometry_must_be_geometry() {
        let result = Schema::new(
            "bad",
            vec![AttributeDescriptor::new("a", ValueType::Text)],
            Some("a"),
        );
        assert!(result.is_err());

        let result = Schema::new("bad", vec![], Some("missing"));
        assert!(result.is_err());
    }

    #[test]
    fn test_retype_keeps_order_and_reassigns_default() {
        let schema = sample_schema();
        let keep: HashSet<&str> = ["location", "name"].into_iter().collect();
        let retyped = schema.retype(&keep);

        assert_eq!(retyped.names().collect::<Vec<_>>(), vec!["name", "location"]);
        assert_eq!(retyped.default_geometry().unwrap().name, "location");
    }

    #[test]
    fn test_feature_check() {
        let schema = sample_schema();
        let ok = Feature::new(
            Some("1".into()),
            vec![Geometry::Point(Point::new(1.0, 2.0)).into(), "a".into(), Value::Null],
        );
        assert!(ok.check(&schema).is_ok());

        let wrong_type = Feature::new(None, vec![Value::Integer(1), "a".into(), Value::Null]);
        assert!(wrong_type.check(&schema).is_err());

        let wrong_len = Feature::new(None, vec![Value::Null]);
        assert!(wrong_len.check(&schema).is_err());
    }
}
