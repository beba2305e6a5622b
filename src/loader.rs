//! Source and Catalog Loading
//!
//! Reads already-parsed sources and catalogs from JSON files. A sources file
//! holds either one source object or an array of them; a directory is walked
//! for `*.json` files in path order.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::datatype::{Catalog, Source};
use crate::error::{DatatypeError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceFile {
    Many(Vec<Source>),
    One(Box<Source>),
}

/// Load sources from a JSON file or a directory of JSON files
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    if path.is_dir() {
        load_sources_from_directory(path)
    } else {
        load_sources_from_file(path)
    }
}

/// Load sources from one JSON file
pub fn load_sources_from_file(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)?;
    let parsed: SourceFile = serde_json::from_str(&content).map_err(|e| DatatypeError::InvalidSource {
        source_key: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let sources = match parsed {
        SourceFile::Many(sources) => sources,
        SourceFile::One(source) => vec![*source],
    };

    for source in &sources {
        if source.source_key.is_empty() {
            return Err(DatatypeError::InvalidSource {
                source_key: path.display().to_string(),
                reason: "empty sourceKey".to_string(),
            });
        }
    }

    Ok(sources)
}

/// Load sources from every `*.json` file below `dir`, sorted by path
pub fn load_sources_from_directory(dir: &Path) -> Result<Vec<Source>> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let mut sources = Vec::new();
    for file in files {
        let loaded = load_sources_from_file(&file)?;
        tracing::debug!(path = %file.display(), count = loaded.len(), "loaded sources");
        sources.extend(loaded);
    }
    Ok(sources)
}

/// Load a catalog (object of datatype name -> `{ "fields": [...] }`)
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
