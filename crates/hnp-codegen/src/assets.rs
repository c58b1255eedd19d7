use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{GenerationError, HtmlDocument};

/// Everything a generator run produced, still in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAssets {
    files: BTreeMap<String, String>,
    html: Option<HtmlDocument>,
}

impl GeneratedAssets {
    pub(crate) fn new(files: BTreeMap<String, String>, html: Option<HtmlDocument>) -> Self {
        Self { files, html }
    }

    /// Generated files by name, in name order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// The rewritten HTML shell, when an HTML action ran.
    pub fn html(&self) -> Option<&HtmlDocument> {
        self.html.as_ref()
    }

    /// Writes every file (and the HTML shell) into `dir`, creating it if
    /// needed. Returns the written paths.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, GenerationError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| GenerationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let html = self.html.iter().map(|h| (h.name.as_str(), h.content.as_str()));
        let mut written = Vec::new();
        for (name, content) in self.files().chain(html) {
            let path = dir.join(name);
            fs::write(&path, content).map_err(|source| GenerationError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), bytes = content.len(), "wrote generated file");
            written.push(path);
        }
        Ok(written)
    }
}
