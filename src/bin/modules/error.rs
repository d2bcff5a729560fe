use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// Errors originating from the core eeq library calculations.
    #[error("Calculation error: {0}")]
    Calculation(#[from] eeq::EeqError),

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

    /// Errors parsing XYZ format input.
    #[error("Failed to parse XYZ from {source_name}: {details}")]
    XyzParse {
        source_name: String,
        details: String,
    },

    /// Errors serializing JSON output.
    #[error("Failed to write JSON output: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors configuring the global thread pool.
    #[error("Failed to build global thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Errors installing the log subscriber.
    #[error("Failed to set up logging: {0}")]
    Logging(String),
}
