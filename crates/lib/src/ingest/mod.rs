//! Dataset loading and chunking.
//!
//! The [`DatasetLoader`] reads CSV, JSON and PDF files from a confined
//! uploads directory, or fetches website URLs, and turns the extracted text
//! into an ordered chunk sequence honoring a chunk-size / overlap policy.
//! CSV rows keep their row boundaries; every other source goes through the
//! sliding character-window chunker.

pub mod csv;
pub mod embedding;
pub mod json;
pub mod pdf;
pub mod website;

use crate::text::clean_text;
use crate::types::Chunk;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::info;

/// Errors surfaced by the dataset loading pipeline. Each variant maps to a
/// distinct client-visible failure kind at the HTTP boundary.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Unsupported dataset type: {0}")]
    UnsupportedType(String),
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("Chunk overlap must be non-negative and less than chunk size")]
    InvalidChunkOverlap,
    #[error("File path is required for file uploads")]
    MissingPath,
    #[error("At least one URL is required for website datasets")]
    MissingUrls,
    #[error("Dataset file not found at {0}")]
    NotFound(String),
    #[error("Access to the specified file path is not permitted")]
    Forbidden,
    #[error("{0}")]
    NoContent(String),
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    Parse(String),
    #[error("Failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chunk generation policy. `chunk_overlap` must stay below `chunk_size`.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
}

impl ChunkingOptions {
    pub const DEFAULT_CHUNK_SIZE: u32 = 1000;
    pub const DEFAULT_CHUNK_OVERLAP: u32 = 200;

    pub fn new(chunk_size: u32, chunk_overlap: u32) -> Result<Self, LoaderError> {
        if chunk_size == 0 {
            return Err(LoaderError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(LoaderError::InvalidChunkOverlap);
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            chunk_overlap: Self::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Loads datasets from disk or remote sources and chunks their content.
///
/// File paths are confined to the configured uploads directory: relative
/// paths resolve against it and anything escaping it fails closed.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    uploads_dir: PathBuf,
    http: reqwest::Client,
}

impl DatasetLoader {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Result<Self, LoaderError> {
        let uploads_dir: PathBuf = uploads_dir.into();
        std::fs::create_dir_all(&uploads_dir)?;
        let uploads_dir = uploads_dir.canonicalize()?;
        Ok(Self {
            uploads_dir,
            http: reqwest::Client::new(),
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Loads data for the dataset type and returns ordered chunks.
    ///
    /// `file_path` is required for `csv`, `json` and `pdf`; `urls` is
    /// required for `website`.
    pub async fn load_and_chunk(
        &self,
        dataset_type: &str,
        options: &ChunkingOptions,
        file_path: Option<&str>,
        urls: Option<&[String]>,
    ) -> Result<Vec<Chunk>, LoaderError> {
        let dataset_type = dataset_type.trim().to_lowercase();
        if !matches!(dataset_type.as_str(), "csv" | "json" | "website" | "pdf") {
            return Err(LoaderError::UnsupportedType(dataset_type));
        }

        if dataset_type == "website" {
            let urls = urls.ok_or(LoaderError::MissingUrls)?;
            let filtered: Vec<String> = urls
                .iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if filtered.is_empty() {
                return Err(LoaderError::MissingUrls);
            }
            let text = website::load_from_urls(&self.http, &filtered).await?;
            return chunk_text(&text, options);
        }

        let resolved = self.resolve_file_path(file_path)?;
        match dataset_type.as_str() {
            "csv" => {
                let rows = csv::load_rows(&resolved)?;
                rows_to_chunks(rows)
            }
            "json" => {
                let text = json::load_flattened(&resolved)?;
                chunk_text(&text, options)
            }
            _ => {
                let text = pdf::load_text(&resolved).await?;
                chunk_text(&text, options)
            }
        }
    }

    /// Decodes inline base64 file content into a temporary file under the
    /// uploads directory. The file is removed when the returned guard drops.
    pub fn materialize_base64(
        &self,
        content: &str,
        extension: &str,
    ) -> Result<TempPath, LoaderError> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(content.trim())
            .map_err(|e| LoaderError::Parse(format!("Failed to decode file content: {e}")))?;
        if decoded.is_empty() {
            return Err(LoaderError::NoContent("Uploaded file content is empty".to_string()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(extension)
            .tempfile_in(&self.uploads_dir)?;
        file.write_all(&decoded)?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    /// Resolves and validates a file path inside the uploads directory.
    fn resolve_file_path(&self, file_path: Option<&str>) -> Result<PathBuf, LoaderError> {
        let file_path = file_path.map(str::trim).filter(|p| !p.is_empty());
        let Some(file_path) = file_path else {
            return Err(LoaderError::MissingPath);
        };

        let candidate = PathBuf::from(file_path);
        let candidate = if candidate.is_absolute() {
            candidate
        } else {
            // A leading component equal to the uploads directory name is a
            // client-side convenience; strip it rather than nesting.
            let uploads_name = self.uploads_dir.file_name();
            let mut components = candidate.components();
            match (components.next(), uploads_name) {
                (Some(Component::Normal(first)), Some(name)) if first == name => {
                    self.uploads_dir.join(components.as_path())
                }
                _ => self.uploads_dir.join(&candidate),
            }
        };

        let resolved = normalize_path(&candidate);
        if !resolved.starts_with(&self.uploads_dir) {
            return Err(LoaderError::Forbidden);
        }
        if !resolved.exists() {
            return Err(LoaderError::NotFound(resolved.display().to_string()));
        }
        Ok(resolved)
    }
}

/// Lexically normalizes a path, resolving `.` and `..` without touching the
/// filesystem, so escape checks work for paths that do not exist yet.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Chunks sanitized text with a sliding character window.
///
/// Consecutive chunks share `chunk_overlap` trailing/leading characters,
/// except where trimming removes boundary whitespace.
pub fn chunk_text(text: &str, options: &ChunkingOptions) -> Result<Vec<Chunk>, LoaderError> {
    let sanitized = clean_text(text);
    if sanitized.is_empty() {
        return Err(LoaderError::NoContent(
            "No textual content available for chunking".to_string(),
        ));
    }

    let chars: Vec<char> = sanitized.chars().collect();
    let length = chars.len();
    let chunk_size = options.chunk_size as usize;
    let overlap = options.chunk_overlap as usize;

    let mut chunks = Vec::new();
    let mut order = 0u32;
    let mut start = 0usize;

    while start < length {
        let end = usize::min(start + chunk_size, length);
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                order,
                text: trimmed.to_string(),
            });
            order += 1;
        }

        if end >= length {
            break;
        }
        start = end.saturating_sub(overlap);
    }

    info!(
        count = chunks.len(),
        chunk_size = options.chunk_size,
        "generated chunks"
    );
    Ok(chunks)
}

/// Converts structured rows into discrete chunks preserving row boundaries.
fn rows_to_chunks(rows: Vec<String>) -> Result<Vec<Chunk>, LoaderError> {
    let mut chunks = Vec::new();
    for row_text in rows {
        let sanitized = clean_text(&row_text);
        if sanitized.is_empty() {
            continue;
        }
        chunks.push(Chunk {
            order: chunks.len() as u32,
            text: sanitized,
        });
    }

    if chunks.is_empty() {
        return Err(LoaderError::NoContent(
            "No valid rows available for chunking".to_string(),
        ));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(size: u32, overlap: u32) -> ChunkingOptions {
        ChunkingOptions::new(size, overlap).unwrap()
    }

    #[test]
    fn rejects_overlap_not_below_size() {
        assert!(matches!(
            ChunkingOptions::new(100, 100),
            Err(LoaderError::InvalidChunkOverlap)
        ));
        assert!(matches!(
            ChunkingOptions::new(0, 0),
            Err(LoaderError::InvalidChunkSize)
        ));
    }

    #[test]
    fn windows_share_exactly_the_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunk_text(text, &options(10, 3)).unwrap();
        for pair in chunks.windows(2) {
            let left: String = pair[0].text.chars().rev().take(3).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(pair[1].text.starts_with(&left));
        }
        // Orders are gap-free from zero.
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.order, index as u32);
        }
    }

    #[test]
    fn reconstructs_input_modulo_boundary_trimming() {
        let text = "one two three four five six seven eight nine ten";
        let opts = options(12, 4);
        let chunks = chunk_text(text, &opts).unwrap();
        // Strip each chunk's overlap prefix and re-join: the result must
        // cover the sanitized input's non-space content.
        let sanitized = clean_text(text);
        let rebuilt: String = chunks.iter().map(|c| c.text.replace(' ', "")).collect();
        let flat = sanitized.replace(' ', "");
        assert!(rebuilt.len() >= flat.len());
        for chunk in &chunks {
            assert!(sanitized.contains(&chunk.text));
        }
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunks = chunk_text("tiny", &options(1000, 200)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!(chunks[0].order, 0);
    }

    #[test]
    fn whitespace_only_input_is_unprocessable() {
        assert!(matches!(
            chunk_text("   \n ", &options(10, 2)),
            Err(LoaderError::NoContent(_))
        ));
    }

    #[test]
    fn path_escape_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path()).unwrap();
        let err = loader
            .resolve_file_path(Some("../../etc/passwd"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::Forbidden));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path()).unwrap();
        let err = loader.resolve_file_path(Some("absent.csv")).unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[test]
    fn relative_path_with_uploads_prefix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path()).unwrap();
        let file = loader.uploads_dir().join("data.csv");
        std::fs::write(&file, "a,b\n1,2\n").unwrap();

        let prefix = dir.path().file_name().unwrap().to_str().unwrap();
        let resolved = loader
            .resolve_file_path(Some(&format!("{prefix}/data.csv")))
            .unwrap();
        assert_eq!(resolved, file.canonicalize().unwrap());
    }
}
