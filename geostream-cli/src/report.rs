//! Rapport de conversion avec graceful degradation
//!
//! Un fichier en échec n'interrompt pas le lot : il est consigné dans le
//! rapport avec son message d'erreur.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global du lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConversionStatus {
    /// Tous les fichiers ont été traités
    Success,
    /// Certains fichiers sont en échec
    PartialSuccess,
    /// Aucun fichier traité
    Failed,
}

/// Résultat de la résolution du CRS pour un fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsSource {
    Declared,
    Inferred,
    Conflicting,
    Absent,
    /// Résolution désactivée ou schéma sans géométrie par défaut
    Skipped,
}

/// Compte rendu d'un fichier
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: String,
    /// Fichier écrit (absent pour `inspect`)
    pub output: Option<String>,
    pub schema: String,
    pub features: usize,
    pub attributes: Vec<String>,
    pub crs_source: CrsSource,
    /// CRS publié après normalisation
    pub crs: Option<String>,
    pub axis_swapped: bool,
    pub removed_attributes: Vec<String>,
    pub repaired: usize,
    pub nulled: usize,
}

/// Fichier en échec
#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub input: String,
    pub message: String,
}

/// Rapport complet d'un lot
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub status: ConversionStatus,
    pub duration_secs: f64,
    pub files: Vec<FileReport>,
    pub errors: Vec<FileError>,
}

impl Default for ConversionReport {
    fn default() -> Self {
        Self {
            status: ConversionStatus::Success,
            duration_secs: 0.0,
            files: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un fichier traité
    pub fn record_file(&mut self, file: FileReport) {
        self.files.push(file);
    }

    /// Enregistre un fichier en échec
    pub fn record_failure(&mut self, input: &Path, message: &str) {
        self.errors.push(FileError {
            input: input.display().to_string(),
            message: message.to_string(),
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = match (self.files.is_empty(), self.errors.is_empty()) {
            (_, true) => ConversionStatus::Success,
            (false, false) => ConversionStatus::PartialSuccess,
            (true, false) => ConversionStatus::Failed,
        };
    }

    pub fn total_features(&self) -> usize {
        self.files.iter().map(|f| f.features).sum()
    }

    pub fn total_repaired(&self) -> usize {
        self.files.iter().map(|f| f.repaired).sum()
    }

    pub fn total_nulled(&self) -> usize {
        self.files.iter().map(|f| f.nulled).sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("CONVERSION REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Files: {} processed, {} failed",
            self.files.len(),
            self.errors.len()
        );
        println!(
            "Features: {} total, {} repaired, {} nulled",
            self.total_features(),
            self.total_repaired(),
            self.total_nulled()
        );

        if !self.files.is_empty() {
            println!("\n--- FILES ---");
            for f in &self.files {
                let crs = f.crs.as_deref().unwrap_or("none");
                let swap = if f.axis_swapped { ", axes swapped" } else { "" };
                println!(
                    "  {}: {} features, CRS {} ({:?}{})",
                    f.input, f.features, crs, f.crs_source, swap
                );
                if !f.removed_attributes.is_empty() {
                    println!("    removed: {}", f.removed_attributes.join(", "));
                }
                if f.repaired > 0 || f.nulled > 0 {
                    println!("    geometries: {} repaired, {} nulled", f.repaired, f.nulled);
                }
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                println!("  [{}] {}", e.input, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{} files, {} features, {} repaired, {} nulled, {} errors",
            self.files.len(),
            self.total_features(),
            self.total_repaired(),
            self.total_nulled(),
            self.errors.len()
        )
    }
}
