//! # geostream-cli
//!
//! Normalisation de fichiers GeoJSON en ligne de commande.
//!
//! ## Features
//!
//! - Traitement parallèle des fichiers d'un dossier (un pipeline par fichier)
//! - Configuration JSON (étapes, registre EPSG étendu)
//! - Rapport texte ou JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Normaliser un dossier et réparer les géométries
//! geostream convert --path ./data/ --output ./normalized/ --repair
//!
//! # Inspecter sans écrire, rapport JSON
//! geostream inspect --path ./communes.geojson --json
//! ```

pub mod config;
pub mod convert;
pub mod report;

pub use config::PipelineConfig;
pub use report::{ConversionReport, ConversionStatus, FileReport};
