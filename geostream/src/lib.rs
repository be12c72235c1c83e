//! # geostream
//!
//! Normalisation paresseuse de collections de features géographiques.
//!
//! ## Features
//!
//! - Flux de features rejouables, chaque passe étant fermée sur tous les chemins
//! - Inférence du CRS d'une collection à partir des CRS portés par les features
//! - Correction de l'ordre des axes (latitude/longitude → longitude/latitude)
//! - Nettoyage des attributs structurels parasites (`boundedBy`, ...)
//! - Réparation paresseuse des géométries invalides (buffer nul via `geo`)
//! - Lecture et écriture GeoJSON (`geojson`, `geozero`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geostream::{codec, Pipeline};
//! use std::fs::File;
//!
//! let pipeline = Pipeline::default();
//! let normalized = pipeline.read(File::open("communes.geojson")?)?;
//! println!("CRS: {:?}", normalized.resolution());
//!
//! let repaired = pipeline.repair(normalized);
//! codec::write_collection(&repaired, &mut std::io::stdout())?;
//! ```

pub mod codec;
pub mod crs;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod repair;
pub mod sanitize;
pub mod stream;
pub mod types;

pub use crs::{AxisOrder, Crs, CrsProvider, CrsResolution, EpsgRegistry};
pub use error::{PipelineError, Result};
pub use log::LogSink;
pub use pipeline::{Normalized, Pipeline, PipelineOptions};
pub use repair::{GeoEngine, GeometryEngine, RepairGeometry, RepairStats};
pub use stream::{FeaturePass, FeatureStream, MemoryFeatureStream};
pub use types::{AttributeDescriptor, Feature, FeatureGeometry, Schema, Value, ValueType};
