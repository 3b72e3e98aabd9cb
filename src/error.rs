use std::path::PathBuf;

use thiserror::Error;

/// Fatal startup failures. Every kind aborts the boot sequence;
/// nothing is retried or degraded.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A required top-level config field is absent.
    #[error("required config field \"{0}\" is missing")]
    MissingRequiredField(&'static str),

    /// A required config field is present but holds the wrong type.
    #[error("config field \"{field}\" must be of type {expected}")]
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
    },

    /// The config file exists but could not be read.
    #[error("could not read the config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not a well-formed TOML document.
    #[error("could not parse the config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The bundled default config could not be written to disk.
    #[error("could not create the default config at {path}: {source}")]
    DefaultConfigCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The embedded database refused the connection.
    #[error("database connection failed: {0}")]
    DatabaseConnectionFailed(#[source] sqlx::Error),

    /// The gateway client could not be built with the provided credentials.
    #[error("gateway client failed to start: {0}")]
    GatewayStartFailed(#[source] serenity::Error),
}

/// Outcome of a single boot sequence step
pub type BootResult<T = ()> = Result<T, StartupError>;
