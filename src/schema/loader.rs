//! Schema Loading
//!
//! Collects schema documents from a file or a directory tree. Each document keeps
//! the sub-directories it was found under, which drive package derivation.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CodegenError, Result};

/// Configuration for schema loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip schemas matching these path prefixes
    pub skip_prefixes: Vec<String>,
    /// File extensions treated as schema documents
    pub extensions: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
            ],
            extensions: vec!["json".to_string()],
        }
    }
}

/// A document read from disk, not yet parsed into the tree
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// `file://` URI of the document
    pub uri: String,
    pub path: PathBuf,
    /// Directories between the load root and the file
    pub sub_directories: Vec<String>,
    pub content: Value,
}

/// Load a single file, or every matching file under a directory (sorted by path)
pub fn load_path(path: &Path, config: &LoadConfig) -> Result<Vec<LoadedDocument>> {
    if path.is_file() {
        return Ok(vec![load_file(path, Vec::new())?]);
    }
    if !path.is_dir() {
        return Err(CodegenError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("schema path not found: {}", path.display()),
        )));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let file = entry.path();
        if !file.is_file() {
            continue;
        }
        let matches_extension = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| config.extensions.iter().any(|x| x == e))
            .unwrap_or(false);
        if !matches_extension {
            continue;
        }
        let relative = file.strip_prefix(path).unwrap_or(file);
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p)) {
            debug!(path = %relative_str, "skipping schema");
            continue;
        }
        let sub_directories = relative
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        documents.push(load_file(file, sub_directories)?);
    }
    Ok(documents)
}

fn load_file(path: &Path, sub_directories: Vec<String>) -> Result<LoadedDocument> {
    let content = fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&content)?;
    let absolute = fs::canonicalize(path)?;
    let uri = format!("file://{}", absolute.to_string_lossy().replace('\\', "/"));
    Ok(LoadedDocument {
        uri,
        path: path.to_path_buf(),
        sub_directories,
        content: json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_directory_with_sub_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("billing");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("person.schema.json"), r#"{"type":"object"}"#).unwrap();
        fs::write(nested.join("invoice.schema.json"), r#"{"type":"object"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();

        let docs = load_path(dir.path(), &LoadConfig::default()).unwrap();
        assert_eq!(docs.len(), 2);
        let invoice = docs.iter().find(|d| d.uri.ends_with("invoice.schema.json")).unwrap();
        assert_eq!(invoice.sub_directories, vec!["billing".to_string()]);
        assert!(invoice.uri.starts_with("file://"));
        let person = docs.iter().find(|d| d.uri.ends_with("person.schema.json")).unwrap();
        assert!(person.sub_directories.is_empty());
    }

    #[test]
    fn test_load_missing_path() {
        let err = load_path(Path::new("/definitely/not/here"), &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, CodegenError::Io(_)));
    }
}
