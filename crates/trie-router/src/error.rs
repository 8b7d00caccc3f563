//! Error types for routing.

use thiserror::Error;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No route or catch-all resolved the request path.
    #[error("no route matched: {method} {path}")]
    NotFound { method: String, path: String },

    /// The path resolved, but no handler is bound for the method.
    #[error("method not allowed: {method} for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// A leaf route was declared without a method.
    #[error("route {path:?} has no children and no method")]
    MissingMethod { path: String },

    /// A leaf route was declared without a handler.
    #[error("route {path:?} has no children and no handler")]
    MissingHandler { path: String },

    /// Invalid path pattern.
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two leaf templates resolve to the same trie node.
    #[error("route template {incoming:?} collides with {existing:?}")]
    TemplateConflict { existing: String, incoming: String },

    /// Unrecognised HTTP method name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Reading the request body or writing to the transport failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RouterError {
    /// Returns true for errors raised while building the route tree.
    ///
    /// These are fatal to startup and never surface at request time.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::MissingMethod { .. }
                | Self::MissingHandler { .. }
                | Self::InvalidPattern { .. }
                | Self::TemplateConflict { .. }
        )
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
