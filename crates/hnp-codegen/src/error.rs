use std::path::PathBuf;

/// Errors produced while generating or writing client assets.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Mutually exclusive options were combined. Nothing was generated.
    #[error("conflicting options: {}", .0.join(", "))]
    ConflictingOptions(Vec<&'static str>),

    /// An HTML transform was requested without a document to rewrite.
    #[error("{0} requires an HTML document")]
    MissingHtml(&'static str),

    /// A managed block was opened but never closed.
    #[error("unterminated `{0}` block in HTML document")]
    MalformedHtml(&'static str),

    #[error("failed to render schema table: {0}")]
    Render(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
