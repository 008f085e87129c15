//! Settings error types.

/// Errors that can occur while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid JSON, or does not match the schema.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience alias for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;
