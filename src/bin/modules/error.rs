use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// Errors originating from the qeqnet training core.
    #[error("Training error: {0}")]
    Train(#[from] qeqnet::QeqNetError),

    /// I/O errors associated with a specific file path.
    #[error("I/O error for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// General I/O errors not tied to a specific file.
    #[error("I/O error: {0}")]
    GenericIo(#[from] std::io::Error),

    /// Errors parsing the JSON dataset.
    #[error("Failed to parse dataset from {source_name}: {details}")]
    DatasetParse {
        source_name: String,
        details: String,
    },
}
