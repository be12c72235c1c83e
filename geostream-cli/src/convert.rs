//! Traitement des fichiers GeoJSON : lecture, normalisation, écriture

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use geostream::{codec, CrsResolution, FeatureStream, Normalized, Pipeline};
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::report::{ConversionReport, CrsSource, FileReport};

/// Extensions reconnues comme entrées
pub const INPUT_EXTENSIONS: [&str; 2] = ["geojson", "json"];

fn is_input(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            INPUT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Collecte récursivement les fichiers GeoJSON (ordre déterministe)
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    if path.is_file() {
        if is_input(path) {
            inputs.push(path.to_path_buf());
        }
        return Ok(inputs);
    }

    let entries = std::fs::read_dir(path)
        .with_context(|| format!("Cannot read directory {}", path.display()))?;
    for entry in entries {
        let entry_path = entry?.path();

        if entry_path.is_dir() {
            inputs.extend(collect_inputs(&entry_path)?);
        } else if is_input(&entry_path) {
            inputs.push(entry_path);
        }
    }

    inputs.sort();
    Ok(inputs)
}

/// Chemin de sortie : arborescence relative à `root` reproduite sous `output`
pub fn output_path(input: &Path, root: &Path, output: &Path) -> PathBuf {
    let relative = match input.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => input
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("output")),
    };
    output.join(relative).with_extension("geojson")
}

fn crs_source(normalized: &Normalized<'_>) -> CrsSource {
    match normalized.resolution() {
        Some(CrsResolution::Declared(_)) => CrsSource::Declared,
        Some(CrsResolution::Inferred(_)) => CrsSource::Inferred,
        Some(CrsResolution::Conflicting { .. }) => CrsSource::Conflicting,
        Some(CrsResolution::Absent) => CrsSource::Absent,
        None => CrsSource::Skipped,
    }
}

fn file_report(input: &Path, normalized: &Normalized<'_>) -> FileReport {
    let schema = normalized.schema();
    FileReport {
        input: input.display().to_string(),
        output: None,
        schema: schema.name().to_string(),
        features: 0,
        attributes: schema.names().map(str::to_string).collect(),
        crs_source: crs_source(normalized),
        crs: schema.crs().map(|crs| crs.identifier()),
        axis_swapped: normalized.axis_swapped(),
        removed_attributes: normalized.removed().to_vec(),
        repaired: 0,
        nulled: 0,
    }
}

fn read_normalized(pipeline: &Pipeline, input: &Path) -> Result<Normalized<'static>> {
    let file = File::open(input).with_context(|| format!("Cannot open {}", input.display()))?;
    pipeline
        .read(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", input.display()))
}

/// Compte les features d'une passe complète
pub fn count_features<S: FeatureStream + ?Sized>(stream: &S) -> Result<usize> {
    let mut pass = stream.features()?;
    let result = pass
        .by_ref()
        .try_fold(0usize, |count, feature| feature.map(|_| count + 1));
    Ok(pass.finish(result)?)
}

/// Écrit `output` via un fichier temporaire voisin, renommé une fois l'écriture réussie
///
/// En cas d'échec, le fichier temporaire est supprimé et `output` n'est pas touché.
pub fn write_atomically<T, F>(output: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<T>,
{
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Cannot create temporary file in {}", parent.display()))?;
    let value = {
        let mut writer = BufWriter::new(temp.as_file());
        let value = write(&mut writer)?;
        writer.flush()?;
        value
    };
    temp.persist(output)
        .with_context(|| format!("Cannot create {}", output.display()))?;
    Ok(value)
}

/// Normalise un fichier et écrit le résultat
pub fn convert_file(
    pipeline: &Pipeline,
    repair: bool,
    input: &Path,
    output: &Path,
) -> Result<FileReport> {
    let normalized = read_normalized(pipeline, input)?;
    let mut report = file_report(input, &normalized);

    if repair {
        let repaired = pipeline.repair(normalized);
        report.features = write_atomically(output, |writer| {
            Ok(codec::write_collection(&repaired, writer)?)
        })
        .with_context(|| format!("Failed to write {}", output.display()))?;
        let stats = repaired.stats();
        report.repaired = stats.repaired;
        report.nulled = stats.nulled;
    } else {
        report.features = write_atomically(output, |writer| {
            Ok(codec::write_collection(&normalized, writer)?)
        })
        .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    report.output = Some(output.display().to_string());
    Ok(report)
}

/// Normalise un fichier sans rien écrire
pub fn inspect_file(pipeline: &Pipeline, repair: bool, input: &Path) -> Result<FileReport> {
    let normalized = read_normalized(pipeline, input)?;
    let mut report = file_report(input, &normalized);

    if repair {
        let repaired = pipeline.repair(normalized);
        report.features = count_features(&repaired)?;
        let stats = repaired.stats();
        report.repaired = stats.repaired;
        report.nulled = stats.nulled;
    } else {
        report.features = count_features(&normalized)?;
    }

    Ok(report)
}

/// Traite les fichiers en parallèle ; un échec n'interrompt pas le lot
pub fn run_batch<F>(inputs: &[PathBuf], jobs: Option<usize>, process: F) -> Result<ConversionReport>
where
    F: Fn(&Path) -> Result<FileReport> + Send + Sync,
{
    let start = Instant::now();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .context("Failed to build thread pool")?;

    let results: Vec<(&PathBuf, Result<FileReport>)> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| (input, process(input)))
            .collect()
    });

    let mut report = ConversionReport::new();
    for (input, result) in results {
        match result {
            Ok(file) => {
                info!(
                    input = %input.display(),
                    features = file.features,
                    crs = ?file.crs,
                    "File processed"
                );
                report.record_file(file);
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(input = %input.display(), error = %message, "File failed");
                report.record_failure(input, &message);
            }
        }
    }

    report.set_duration(start.elapsed());
    report.finalize();
    Ok(report)
}
