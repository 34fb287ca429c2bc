//! Error types for pgmodel

use crate::changeset::ValidationErrors;
use thiserror::Error;

/// Result type alias for pgmodel operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for model loading, validation and dispatch.
///
/// Every variant carries an HTTP-style status code (see [`ModelError::status_code`])
/// so a transport front can turn it into a response without inspecting messages.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Required parameters are absent for the requested verb
    #[error("Missing parameters: {}", .0.join(", "))]
    MissingParams(Vec<String>),

    /// One or more parameters failed validation
    #[error("Invalid parameters: {}", field_list(.0))]
    Invalid(ValidationErrors),

    /// Malformed request (bad selector, bad pagination bounds, unsafe identifier...)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown entity or related entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport method with no verb mapping
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Verb not enabled on the entity
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Entity definition could not be read or violates its invariants
    #[error("Load error: {0}")]
    Load(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error, surfaced by the driver unchanged
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn field_list(errors: &ValidationErrors) -> String {
    errors.fields().join(", ")
}

impl ModelError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a load error
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load(message.into())
    }

    /// Create a not implemented error
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingParams(_) | Self::Invalid(_) | Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::NotImplemented(_) => 501,
            #[cfg(feature = "pool")]
            Self::Pool(_) => 503,
            Self::Timeout(_) => 504,
            Self::Load(_) | Self::Connection(_) | Self::Query(_) | Self::Other(_) => 500,
        }
    }

    /// Check if this error was caused by the request (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Field names this error points at, if any.
    pub fn offending_fields(&self) -> Vec<String> {
        match self {
            Self::MissingParams(fields) => fields.clone(),
            Self::Invalid(errors) => errors.fields(),
            _ => Vec::new(),
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for ModelError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<toml::de::Error> for ModelError {
    fn from(err: toml::de::Error) -> Self {
        Self::Load(err.to_string())
    }
}
