use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// Errors originating from the core espfit library.
    #[error("Calculation error: {0}")]
    Calculation(#[from] espfit::EspError),

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

    /// Errors parsing a cube file.
    #[error("Failed to parse cube file '{}': {details}", .path.display())]
    CubeParse { path: PathBuf, details: String },

    /// Errors reading or writing the JSON result store.
    #[error("Invalid result store '{}'", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The density cube does not live on the potential grid.
    #[error("The grid of '{}' does not match the potential grid", .path.display())]
    GridMismatch { path: PathBuf },
}
