use thiserror::Error;

/// Configuration defects and internal failures that end a call as an `exception` result.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Transformers are not defined in props.")]
    MissingTransformers,
    #[error("No transformer factory provided in transformers.")]
    MissingTransformerFactory,
    #[error("Could not print {file}: {source}")]
    Print {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid compiler options: {0}")]
    InvalidCompilerOptions(String),
    #[error("Could not build the external snapshot: {0}")]
    ExternalSnapshot(String),
}

impl EmbedError {
    /// Stable name reported in `exception` results.
    pub fn name(&self) -> &'static str {
        match self {
            EmbedError::MissingTransformers => "MissingTransformers",
            EmbedError::MissingTransformerFactory => "MissingTransformerFactory",
            EmbedError::Print { .. } => "PrintError",
            EmbedError::InvalidCompilerOptions(_) => "InvalidCompilerOptions",
            EmbedError::ExternalSnapshot(_) => "ExternalSnapshotError",
        }
    }
}
