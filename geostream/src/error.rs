//! Types d'erreurs pour le crate geostream

use thiserror::Error;

/// Alias pratique pour les résultats du pipeline
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Erreurs pouvant survenir dans le pipeline de features
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Erreur d'I/O lors de la lecture ou de l'écriture
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON syntaxiquement invalide
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Objet GeoJSON invalide
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Erreur d'encodage d'une géométrie
    #[error("Encode error: {0}")]
    Encode(#[from] geozero::error::GeozeroError),

    /// Enveloppe d'entrée de forme inattendue (fatal)
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// CRS inconnu du registre ou identifiant illisible
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    /// Schéma incohérent (noms dupliqués, géométrie par défaut absente...)
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Feature qui ne correspond pas à son schéma
    #[error("Feature {feature} does not match schema: {reason}")]
    FeatureMismatch { feature: String, reason: String },

    /// Erreur d'un curseur de lecture (ouverture, lecture, fermeture)
    #[error("Cursor error: {0}")]
    Cursor(String),
}

impl PipelineError {
    /// Crée une erreur de feature non conforme avec contexte
    pub fn feature_mismatch(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FeatureMismatch {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de curseur
    pub fn cursor(reason: impl Into<String>) -> Self {
        Self::Cursor(reason.into())
    }
}
