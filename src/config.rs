use std::fmt;
use std::fs;
use std::path::Path;

use slog::Logger;

use crate::error::{BootResult, StartupError};
use crate::prelude::*;

pub const PACKAGE_VERSION: &'static str = std::env!("CARGO_PKG_VERSION");

/// Key of the gateway credential in the config file
pub const API_KEY_KEY: &str = "api_key";

/// Key of the embedded database name in the config file
pub const DATABASE_NAME_KEY: &str = "database_name";

pub(crate) const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Parsed but not yet validated configuration document
pub type RawConfigDocument = toml::value::Table;

/// Validated startup configuration. Both values are carried through
/// exactly as they appear in the file, without trimming or case folding.
#[derive(Clone)]
pub struct Config {
    api_key: String,
    database_name: String,
}

impl Config {
    /// Validate a raw document into a usable config.
    ///
    /// Fields are checked in a fixed order, presence before type, and
    /// the first violation wins: absent 'api_key', mistyped 'api_key',
    /// absent 'database_name', mistyped 'database_name'.
    pub fn from_document(document: &RawConfigDocument) -> BootResult<Self> {
        let api_key = require_string(document, API_KEY_KEY)?;
        let database_name = require_string(document, DATABASE_NAME_KEY)?;
        Ok(Self {
            api_key,
            database_name,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the api key is a live credential, keep it out of the logs
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("database_name", &self.database_name)
            .finish()
    }
}

fn require_string(document: &RawConfigDocument, key: &'static str) -> BootResult<String> {
    let value = document
        .get(key)
        .ok_or(StartupError::MissingRequiredField(key))?;
    match value.as_str() {
        Some(text) => Ok(text.to_owned()),
        None => Err(StartupError::InvalidFieldType {
            field: key,
            expected: "string",
        }),
    }
}

/// Materialize the bundled default config at `path` unless a file is
/// already there. An existing file is never touched.
pub fn ensure_exists(logger: &Logger, path: &Path) -> BootResult {
    if path.exists() {
        return Ok(());
    }
    info!(logger, "No config detected, creating a default one";
        "path" => path.display().to_string(),
    );
    fs::write(path, DEFAULT_CONFIG).map_err(|source| StartupError::DefaultConfigCopyFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read, parse and validate the config file at `path`.
pub fn load(logger: &Logger, path: &Path) -> BootResult<Config> {
    let contents = fs::read_to_string(path).map_err(|source| StartupError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let document =
        toml::from_str::<RawConfigDocument>(&contents).map_err(|source| StartupError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    match Config::from_document(&document) {
        Ok(config) => Ok(config),
        Err(why) => {
            error!(logger, "Config file validation failed";
                "path" => path.display().to_string(),
                "reason" => why.to_string(),
            );
            Err(why)
        }
    }
}
