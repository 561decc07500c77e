//! CLI-specific error types and exit code mapping

use strata_core::error::StrataError;
use strata_layer_scanner::LayerScanError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The scan itself failed (no usable layer, report failure).
    #[error("scan error: {0}")]
    Scan(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from strata-core.
    #[error("{0}")]
    Core(#[from] StrataError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General / command error  |
    /// | 2    | Configuration error      |
    /// | 3    | Scan error               |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(StrataError::Config(_)) => 2,
            Self::Scan(_) | Self::Core(StrataError::Scan(_)) => 3,
            Self::Io(_) | Self::Core(StrataError::Io(_)) => 10,
            Self::Command(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<LayerScanError> for CliError {
    fn from(e: LayerScanError) -> Self {
        Self::Core(e.into())
    }
}
