//! Graph Configuration
//!
//! A graph needs no configuration to work. The knobs here only affect how the
//! graph reports itself through `tracing`.

use serde::{Deserialize, Serialize};

/// Settings for a [`Graph`](crate::Graph).
///
/// Can be built in code or loaded from JSON:
///
/// ```rust
/// use tether_core::GraphConfig;
///
/// let config = GraphConfig::from_json(r#"{ "label": "editor" }"#).unwrap();
/// assert_eq!(config.label, "editor");
/// assert!(!config.trace_recompute);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Name attached to every event the graph emits.
    pub label: String,

    /// Emit a `TRACE` event for every node recomputed during a wave.
    /// Off by default; waves can be large.
    pub trace_recompute: bool,
}

impl GraphConfig {
    /// Parse a config from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Enable or disable per-node recompute tracing.
    pub fn with_trace_recompute(mut self, enabled: bool) -> Self {
        self.trace_recompute = enabled;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            label: "graph".to_string(),
            trace_recompute: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = GraphConfig::from_json("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn json_overrides_fields() {
        let config =
            GraphConfig::from_json(r#"{ "label": "forms", "trace_recompute": true }"#).unwrap();
        assert_eq!(config.label, "forms");
        assert!(config.trace_recompute);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(GraphConfig::from_json("{ label: ").is_err());
    }

    #[test]
    fn builder_methods() {
        let config = GraphConfig::default()
            .with_label("x")
            .with_trace_recompute(true);
        assert_eq!(config.label, "x");
        assert!(config.trace_recompute);
    }
}
