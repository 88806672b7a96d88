//! Module for reading and writing Models
//!
//! [`load_model`] accepts SBML (`.xml`, `.sbml`) or COBRA JSON (`.json`), either of
//! them optionally gzipped. Parsing a genome scale SBML file is slow, so the
//! parsed model is cached as JSON next to the source, see [`cache_path`].
pub mod json;
pub mod sbml;

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::json::JsonError;
use crate::io::sbml::SbmlError;
use crate::metabolic_model::model::Model;

/// Errors raised while loading a model file
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model file {0} does not exist")]
    NotFound(PathBuf),
    #[error("Unable to read model file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to parse SBML model {path}: {source}")]
    Sbml { path: PathBuf, source: SbmlError },
    #[error("Unable to parse JSON model {path}: {source}")]
    Json { path: PathBuf, source: JsonError },
    #[error("Model file {0} is neither SBML (.xml, .sbml) nor JSON (.json)")]
    UnsupportedFormat(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModelFormat {
    Sbml,
    Json,
}

/// Strip a trailing `.gz`, returning the inner file name and whether it was there
fn inner_name(path: &Path) -> (String, bool) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".gz") {
        Some(inner) => (inner.to_string(), true),
        None => (name, false),
    }
}

fn model_format(path: &Path) -> Result<ModelFormat, ModelLoadError> {
    let (name, _) = inner_name(path);
    let extension = Path::new(&name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("xml") | Some("sbml") => Ok(ModelFormat::Sbml),
        Some("json") => Ok(ModelFormat::Json),
        _ => Err(ModelLoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// File name without `.gz` and the format extension: `Recon3D.xml.gz` -> `Recon3D`
fn model_stem(path: &Path) -> String {
    let (name, _) = inner_name(path);
    Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name)
}

/// Location of the JSON cache for a model file: `<dir>/cache/<stem>.json`
///
/// ```rust
/// use std::path::{Path, PathBuf};
/// use scfaflux_core::io::cache_path;
/// assert_eq!(
///     cache_path(Path::new("data/models/Recon3D.xml.gz")),
///     PathBuf::from("data/models/cache/Recon3D.json")
/// );
/// ```
pub fn cache_path(path: &Path) -> PathBuf {
    let stem = model_stem(path);
    path.parent()
        .unwrap_or_else(|| Path::new(""))
        .join("cache")
        .join(format!("{stem}.json"))
}

/// Read a file to a string, decompressing it first when it ends in `.gz`
fn read_source(path: &Path) -> Result<String, ModelLoadError> {
    let read_error = |source| ModelLoadError::Read {
        path: path.to_path_buf(),
        source,
    };
    let (_, gzipped) = inner_name(path);
    let mut contents = String::new();
    if gzipped {
        let file = File::open(path).map_err(read_error)?;
        GzDecoder::new(file)
            .read_to_string(&mut contents)
            .map_err(read_error)?;
    } else {
        contents = fs::read_to_string(path).map_err(read_error)?;
    }
    Ok(contents)
}

/// Whether `cache` exists, is non-empty, and is not older than `source`
fn cache_is_fresh(cache: &Path, source: &Path) -> bool {
    let (Ok(cache_meta), Ok(source_meta)) = (fs::metadata(cache), fs::metadata(source)) else {
        return false;
    };
    if cache_meta.len() == 0 {
        return false;
    }
    match (cache_meta.modified(), source_meta.modified()) {
        (Ok(cached), Ok(original)) => cached >= original,
        _ => false,
    }
}

/// Parse a model file without consulting the cache
pub fn read_model(path: &Path) -> Result<Model, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let format = model_format(path)?;
    let contents = read_source(path)?;
    match format {
        ModelFormat::Sbml => {
            let mut model =
                Model::from_sbml_str(&contents).map_err(|source| ModelLoadError::Sbml {
                    path: path.to_path_buf(),
                    source,
                })?;
            // SBML models are named after their file
            model.id.get_or_insert_with(|| model_stem(path));
            Ok(model)
        }
        ModelFormat::Json => Model::from_json_str(&contents).map_err(|source| ModelLoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load a model, going through the JSON cache for SBML sources when `use_cache` is set
///
/// An unreadable cache is not fatal: it is reported and the source is parsed again.
pub fn load_model(path: &Path, use_cache: bool) -> Result<Model, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let format = model_format(path)?;
    if !use_cache || format == ModelFormat::Json {
        return read_model(path);
    }

    let cache = cache_path(path);
    if cache_is_fresh(&cache, path) {
        match Model::read_json(&cache) {
            Ok(model) => {
                debug!(cache = %cache.display(), "loaded model from cache");
                return Ok(model);
            }
            Err(err) => warn!(cache = %cache.display(), %err, "ignoring unreadable model cache"),
        }
    }

    info!(path = %path.display(), "parsing SBML model");
    let model = read_model(path)?;
    let written = cache
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .map_err(JsonError::from)
        .and_then(|_| model.write_json(&cache));
    match written {
        Ok(()) => debug!(cache = %cache.display(), "wrote model cache"),
        Err(err) => warn!(cache = %cache.display(), %err, "unable to write model cache"),
    }
    Ok(model)
}
