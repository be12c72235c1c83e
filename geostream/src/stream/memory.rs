//! Flux en mémoire, source des collections décodées

use std::sync::Arc;

use super::{FeatureCursor, FeatureStream};
use crate::types::{Feature, Schema};
use crate::Result;

/// Collection matérialisée ; les clones partagent les mêmes features
#[derive(Debug, Clone)]
pub struct MemoryFeatureStream {
    schema: Schema,
    features: Arc<[Feature]>,
}

impl MemoryFeatureStream {
    /// Construit le flux en vérifiant chaque feature contre le schéma
    pub fn new(schema: Schema, features: Vec<Feature>) -> Result<Self> {
        for feature in &features {
            feature.check(&schema)?;
        }
        Ok(Self {
            schema,
            features: features.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

struct MemoryCursor<'a> {
    features: &'a [Feature],
    position: usize,
}

impl FeatureCursor for MemoryCursor<'_> {
    fn next_feature(&mut self) -> Result<Option<Feature>> {
        let feature = self.features.get(self.position).cloned();
        if feature.is_some() {
            self.position += 1;
        }
        Ok(feature)
    }

    fn close(&mut self) -> Result<()> {
        self.position = self.features.len();
        Ok(())
    }
}

impl FeatureStream for MemoryFeatureStream {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        Ok(Box::new(MemoryCursor {
            features: &self.features,
            position: 0,
        }))
    }
}
