//! Configuration du pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geostream::crs::RegistryEntry;
use geostream::{AxisOrder, EpsgRegistry, Pipeline, PipelineOptions};

/// Variable d'environnement pointant vers le fichier de configuration
pub const CONFIG_ENV: &str = "GEOSTREAM_CONFIG";

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Résolution du CRS et correction de l'ordre des axes
    pub axis_correction: bool,

    /// Retrait des attributs structurels
    pub sanitize: bool,

    /// Réparation des géométries invalides
    pub repair: bool,

    /// Entrées ajoutées (ou remplacées) dans le registre EPSG, par code
    pub registry: BTreeMap<String, RegistryOverride>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            axis_correction: true,
            sanitize: true,
            repair: false,
            registry: BTreeMap::new(),
        }
    }
}

/// Entrée de registre déclarée en configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegistryOverride {
    pub axis: AxisSetting,

    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSetting {
    EastNorth,
    NorthEast,
}

impl From<AxisSetting> for AxisOrder {
    fn from(axis: AxisSetting) -> Self {
        match axis {
            AxisSetting::EastNorth => AxisOrder::EastNorth,
            AxisSetting::NorthEast => AxisOrder::NorthEast,
        }
    }
}

impl PipelineConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge le fichier donné, sinon celui de `GEOSTREAM_CONFIG`, sinon les défauts
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match config_path(path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            axis_correction: self.axis_correction,
            sanitize: self.sanitize,
        }
    }

    /// Registre embarqué complété par les entrées de la configuration
    pub fn registry(&self) -> Result<EpsgRegistry> {
        let mut registry = EpsgRegistry::new();
        for (code, entry) in &self.registry {
            let code: u32 = code
                .trim()
                .parse()
                .with_context(|| format!("Invalid EPSG code in registry config: {}", code))?;
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("EPSG:{}", code));
            registry.insert(code, RegistryEntry::new(name, entry.axis.into()));
        }
        Ok(registry)
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(self.registry()?).with_options(self.options()))
    }
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}
