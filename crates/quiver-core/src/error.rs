//! Error types for quiver operations.
//!
//! Only structural misuse, configuration problems, and persistence failures
//! surface through these types. Staleness, lock contention, and sampling
//! timeouts are resolved inside the engine and never reach callers.

use thiserror::Error;

/// Result type alias for quiver operations.
pub type QuiverResult<T> = Result<T, QuiverError>;

/// Main error type for all quiver operations.
#[derive(Error, Debug)]
pub enum QuiverError {
    /// Invalid configuration (bad tunable, uncompilable custom pattern).
    #[error("Configuration error: {message}")]
    Configuration { message: String, code: ErrorCode },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Element not present in the index.
    #[error("Element not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        element_id: Option<String>,
    },

    /// Writing the index to durable storage failed.
    #[error("Persist error: {message}")]
    Persist {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialized index was rejected by the content validator.
    #[error("Content rejected: {}", issues.join("; "))]
    ContentRejected { issues: Vec<String>, code: ErrorCode },

    /// The cross-process build lock is held elsewhere.
    #[error("Lock error: {message}")]
    Lock { message: String, code: ErrorCode },

    /// Graph collaborator failure or absence.
    #[error("Graph error: {message}")]
    Graph { message: String, code: ErrorCode },

    /// Catalog collaborator failure.
    #[error("Catalog error: {message}")]
    Catalog {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Configuration (CFG_xxx)
    CfgInvalidValue,
    CfgInvalidPattern,
    CfgUnsupportedFormat,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValInvalidIdentity,

    // Index (IDX_xxx)
    IdxElementNotFound,
    IdxPersistFailed,
    IdxContentRejected,
    IdxLockUnavailable,

    // Graph (GRP_xxx)
    GrpNotConfigured,
    GrpOperationFailed,

    // Catalog (CAT_xxx)
    CatListFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CfgInvalidValue => "CFG_001",
            ErrorCode::CfgInvalidPattern => "CFG_002",
            ErrorCode::CfgUnsupportedFormat => "CFG_003",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValInvalidIdentity => "VAL_002",
            ErrorCode::IdxElementNotFound => "IDX_001",
            ErrorCode::IdxPersistFailed => "IDX_002",
            ErrorCode::IdxContentRejected => "IDX_003",
            ErrorCode::IdxLockUnavailable => "IDX_004",
            ErrorCode::GrpNotConfigured => "GRP_001",
            ErrorCode::GrpOperationFailed => "GRP_002",
            ErrorCode::CatListFailed => "CAT_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl QuiverError {
    /// Create a configuration error for an out-of-range tunable.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            code: ErrorCode::CfgInvalidValue,
        }
    }

    /// Create a configuration error for a pattern that failed to compile or validate.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            code: ErrorCode::CfgInvalidPattern,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: None,
        }
    }

    /// Create an error for a malformed `type:name` identity.
    pub fn invalid_identity(identity: impl Into<String>) -> Self {
        Self::Validation {
            message: format!("'{}' is not a valid element identity", identity.into()),
            code: ErrorCode::ValInvalidIdentity,
            suggestion: Some("Use the form 'type:name', e.g. 'personas:Creative Writer'".to_string()),
        }
    }

    /// Create a not found error.
    pub fn not_found(element_id: impl Into<String>) -> Self {
        let id = element_id.into();
        Self::NotFound {
            message: format!("Element '{}' is not in the capability index", id),
            code: ErrorCode::IdxElementNotFound,
            element_id: Some(id),
        }
    }

    /// Create a persist error.
    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist {
            message: message.into(),
            code: ErrorCode::IdxPersistFailed,
            source: None,
        }
    }

    /// Create a persist error wrapping an underlying cause.
    pub fn persist_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persist {
            message: message.into(),
            code: ErrorCode::IdxPersistFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Create a content rejection error.
    pub fn content_rejected(issues: Vec<String>) -> Self {
        Self::ContentRejected {
            issues,
            code: ErrorCode::IdxContentRejected,
        }
    }

    /// Create a lock error.
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
            code: ErrorCode::IdxLockUnavailable,
        }
    }

    /// Create an error for a missing graph collaborator.
    pub fn graph_not_configured() -> Self {
        Self::Graph {
            message: "no graph operations configured for this engine".to_string(),
            code: ErrorCode::GrpNotConfigured,
        }
    }

    /// Create a graph error.
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
            code: ErrorCode::GrpOperationFailed,
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
            code: ErrorCode::CatListFailed,
            source: None,
        }
    }

    /// Create a catalog error wrapping an underlying cause.
    pub fn catalog_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Catalog {
            message: message.into(),
            code: ErrorCode::CatListFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Persist { code, .. } => *code,
            Self::ContentRejected { code, .. } => *code,
            Self::Lock { code, .. } => *code,
            Self::Graph { code, .. } => *code,
            Self::Catalog { code, .. } => *code,
            Self::Io(_) => ErrorCode::IdxPersistFailed,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration {
                code: ErrorCode::CfgInvalidPattern,
                ..
            } => Some("Check the custom verb/noun patterns in the trigger configuration"),
            Self::Configuration { .. } => Some("Please check the index configuration values"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("Rebuild the index or check the element identity"),
            Self::ContentRejected { .. } => {
                Some("Remove control or invisible Unicode characters from element metadata")
            }
            Self::Graph {
                code: ErrorCode::GrpNotConfigured,
                ..
            } => Some("Attach graph operations with CapabilityIndexEngine::with_graph"),
            _ => None,
        }
    }

    /// True for configuration errors, which are fatal at startup.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<regex::Error> for QuiverError {
    fn from(err: regex::Error) -> Self {
        Self::invalid_pattern(err.to_string())
    }
}
