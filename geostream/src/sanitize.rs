//! Nettoyage du schéma : retrait des attributs structurels parasites
//!
//! Le décodage GML/GeoJSON produit souvent des attributs vides qui gênent les
//! traitements en aval : emprise (`boundedBy`), métadonnées, description, et
//! l'alias `location` qui peut détourner la géométrie par défaut.

use std::collections::HashSet;

use tracing::debug;

use crate::stream::{FeatureCursor, FeatureStream, MappedCursor};
use crate::types::{Feature, Schema, Value};
use crate::{PipelineError, Result};

/// Attributs retirés, comparés sans tenir compte de la casse
pub const NOISE_ATTRIBUTES: [&str; 3] = ["boundedBy", "metaDataProperty", "description"];

/// Alias de géométrie "emplacement par défaut"
pub const LOCATION_ALIAS: &str = "location";

/// Noms retenus, dans l'ordre du schéma
///
/// `location` est toujours retiré (comparaison exacte) : le test "une autre
/// géométrie existe" du décodeur historique vaut toujours vrai, comportement
/// conservé tel quel.
pub fn retained_names(schema: &Schema) -> Vec<&str> {
    let mut names: Vec<&str> = schema
        .names()
        .filter(|name| {
            !NOISE_ATTRIBUTES
                .iter()
                .any(|noise| noise.eq_ignore_ascii_case(name))
        })
        .collect();

    names.retain(|name| *name != LOCATION_ALIAS);
    names
}

/// Schéma nettoyé, ou `None` si aucun attribut n'est retiré
pub fn sanitized_schema(schema: &Schema) -> Option<Schema> {
    let retained = retained_names(schema);
    if retained.len() < schema.len() {
        let keep: HashSet<&str> = retained.into_iter().collect();
        Some(schema.retype(&keep))
    } else {
        None
    }
}

/// Décorateur projetant chaque feature sur un sous-schéma
pub struct Retype<S> {
    inner: S,
    schema: Schema,
    /// Index amont de chaque attribut retenu
    indices: Vec<usize>,
}

impl<S: FeatureStream> Retype<S> {
    /// `target` doit être un sous-ensemble (ordonné) du schéma amont
    pub fn new(inner: S, target: Schema) -> Result<Self> {
        let source = inner.schema();
        let indices = target
            .names()
            .map(|name| {
                source.index_of(name).ok_or_else(|| {
                    PipelineError::InvalidSchema(format!(
                        "attribute '{}' not in upstream schema '{}'",
                        name,
                        source.name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            inner,
            schema: target,
            indices,
        })
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn project(&self, feature: Feature) -> Feature {
        let mut values: Vec<Option<Value>> = feature.values.into_iter().map(Some).collect();
        let projected = self
            .indices
            .iter()
            .map(|&i| values.get_mut(i).and_then(Option::take).unwrap_or(Value::Null))
            .collect();
        Feature::new(feature.id, projected)
    }
}

impl<S: FeatureStream> FeatureStream for Retype<S> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        let cursor = self.inner.open()?;
        Ok(Box::new(MappedCursor::new(cursor, move |feature| {
            Ok(self.project(feature))
        })))
    }
}

/// Flux nettoyé : l'original s'il n'y avait rien à retirer
pub enum Sanitized<S> {
    Unchanged(S),
    Retyped(Retype<S>),
}

impl<S> Sanitized<S> {
    pub fn is_retyped(&self) -> bool {
        matches!(self, Self::Retyped(_))
    }
}

impl<S: FeatureStream> FeatureStream for Sanitized<S> {
    fn schema(&self) -> &Schema {
        match self {
            Self::Unchanged(s) => s.schema(),
            Self::Retyped(s) => s.schema(),
        }
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        match self {
            Self::Unchanged(s) => s.open(),
            Self::Retyped(s) => s.open(),
        }
    }
}

/// Retire les attributs parasites du schéma et des features
pub fn sanitize<S: FeatureStream>(stream: S) -> Result<Sanitized<S>> {
    let Some(target) = sanitized_schema(stream.schema()) else {
        return Ok(Sanitized::Unchanged(stream));
    };

    debug!(
        schema = %stream.schema().name(),
        before = stream.schema().len(),
        after = target.len(),
        "Removing structural attributes"
    );

    Ok(Sanitized::Retyped(Retype::new(stream, target)?))
}
