use std::fmt;

#[cfg(not(target_arch = "wasm32"))]
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[cfg(feature = "wasm")]
use serde_wasm_bindgen::Error as WasmError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum CatalogError {
    #[error("Invalid policy record at index {index}: {reason}")]
    Validation { index: usize, reason: String },
    #[error("Record store integrity violated: {0}")]
    Integrity(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    /// A caller-supplied value (tag name, record id text) that does not parse.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Catalog is already processing an event")]
    Busy,
}

/// Fieldless mirror of [CatalogError], carried by `error(kind, message)` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Integrity,
    NotFound,
    InvalidInput,
    Serialization,
    Config,
    Busy,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Validation { .. } => ErrorKind::Validation,
            CatalogError::Integrity(_) => ErrorKind::Integrity,
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::InvalidInput(_) => ErrorKind::InvalidInput,
            CatalogError::Serialization(_) => ErrorKind::Serialization,
            CatalogError::Config(_) => ErrorKind::Config,
            CatalogError::Busy => ErrorKind::Busy,
        }
    }

    /// Whether the session can carry on after this error. Integrity failures and load-time
    /// serialization failures leave no usable store behind.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound(_)
                | CatalogError::InvalidInput(_)
                | CatalogError::Validation { .. }
                | CatalogError::Busy
        )
    }

    pub(crate) fn validation<S: Into<String>>(index: usize, reason: S) -> Self {
        CatalogError::Validation {
            index,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<toml::de::Error> for CatalogError {
    fn from(src: toml::de::Error) -> CatalogError {
        CatalogError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<JsonError> for CatalogError {
    fn from(src: JsonError) -> CatalogError {
        CatalogError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<io::Error> for CatalogError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CatalogError::NotFound(format!("{x}")),
            _ => CatalogError::Config(format!("IOError: {}", x.kind())),
        }
    }
}

#[cfg(feature = "wasm")]
impl From<WasmError> for CatalogError {
    fn from(wasm_error: WasmError) -> Self {
        CatalogError::Serialization(format!("Serde-wasm-bindgen error: {wasm_error}"))
    }
}
