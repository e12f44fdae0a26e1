//! Turns a directory of text files into `Document`s.
//!
//! The document id is the path relative to the corpus root, so it stays stable
//! across machines; the title is the file stem.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Document, SourceMeta};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub dir: String,
    pub extensions: Vec<String>,
    /// Replace line breaks with spaces and trim, as text extracted from
    /// paged sources is usually hard-wrapped.
    pub normalize_whitespace: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: "data/corpus".to_string(),
            extensions: vec!["txt".to_string(), "md".to_string()],
            normalize_whitespace: true,
        }
    }
}

pub fn load_directory(root: &Path, config: &CorpusConfig) -> Result<Vec<Document>> {
    let files = list_files(root, &config.extensions);
    if files.is_empty() {
        tracing::warn!(dir = %root.display(), "no corpus files found");
        return Ok(vec![]);
    }
    let mut documents = Vec::with_capacity(files.len());
    for file_path in &files {
        let raw = read_file_content(file_path)?;
        let text = if config.normalize_whitespace { normalize(&raw) } else { raw };
        if text.trim().is_empty() {
            tracing::warn!(path = %file_path.display(), "skipping empty corpus file");
            continue;
        }
        let relative = file_path.strip_prefix(root).unwrap_or(file_path);
        let id = relative.to_string_lossy().replace('\\', "/");
        let title = file_path.file_stem().map(|s| s.to_string_lossy().to_string());
        documents.push(Document::new(id, text).with_meta(SourceMeta {
            title,
            path: Some(file_path.to_string_lossy().to_string()),
        }));
    }
    tracing::info!(files = files.len(), documents = documents.len(), dir = %root.display(), "corpus loaded");
    Ok(documents)
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ").trim().to_string()
}

fn list_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}
