//! Build-time router configuration.

use serde::Deserialize;

use crate::error::Result;

/// What to do when two leaf templates land on the same trie node.
///
/// Parameter names are not part of the trie key, so `/users/:id` and
/// `/users/:name` share a node and only one template can be stored on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Log a warning and keep the last registered template.
    #[default]
    Warn,
    /// Fail the build with [`RouterError::TemplateConflict`](crate::RouterError::TemplateConflict).
    Reject,
}

/// Router configuration.
///
/// # Example
///
/// ```
/// use trie_router::{ConflictPolicy, RouterConfig};
///
/// let config = RouterConfig::from_json(r#"{"param_conflicts": "reject"}"#).unwrap();
/// assert_eq!(config.param_conflicts, ConflictPolicy::Reject);
/// assert!(config.allow_header);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Policy for template collisions on a shared node.
    pub param_conflicts: ConflictPolicy,
    /// Send an `Allow` header with 405 responses.
    pub allow_header: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            param_conflicts: ConflictPolicy::Warn,
            allow_header: true,
        }
    }
}

impl RouterConfig {
    /// Parses a configuration from JSON text. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Sets the template conflict policy.
    #[must_use]
    pub fn param_conflicts(mut self, policy: ConflictPolicy) -> Self {
        self.param_conflicts = policy;
        self
    }

    /// Enables or disables the `Allow` header on 405 responses.
    #[must_use]
    pub fn allow_header(mut self, enabled: bool) -> Self {
        self.allow_header = enabled;
        self
    }
}
