//! Runtime configuration.
//!
//! Every field has a default, so a config only has to name what it changes:
//!
//! ```rust
//! use trellis_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json(r#"{ "eval_error_marker": "??" }"#).unwrap();
//! assert_eq!(config.eval_error_marker, "??");
//! assert_eq!(config.interpolation_open, "{{");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub interpolation_open: String,
    pub interpolation_close: String,
    /// Prefix of directive attributes (`v-if`, `v-for`, ...).
    pub directive_prefix: String,
    /// Shorthand prefix for dynamic attributes (`:title`).
    pub bind_prefix: String,
    /// Shorthand prefix for event listeners (`@click`).
    pub event_prefix: String,
    /// Text shown by an interpolation whose expression failed.
    pub eval_error_marker: String,
    /// Class of the inline element rendered for a malformed directive.
    pub structural_error_class: String,
    /// Hyphenated tag names that are plain elements, never components.
    pub reserved_tags: Vec<String>,
    /// Bound attributes written as node properties instead of attributes.
    pub property_bindings: Vec<String>,
    /// Appended to a component tag to find its source by convention.
    pub component_extension: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpolation_open: "{{".into(),
            interpolation_close: "}}".into(),
            directive_prefix: "v-".into(),
            bind_prefix: ":".into(),
            event_prefix: "@".into(),
            eval_error_marker: "[error]".into(),
            structural_error_class: "trellis-error".into(),
            reserved_tags: [
                "annotation-xml",
                "color-profile",
                "font-face",
                "font-face-src",
                "font-face-uri",
                "font-face-format",
                "font-face-name",
                "missing-glyph",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            property_bindings: ["value", "checked", "selected", "disabled"]
                .into_iter()
                .map(String::from)
                .collect(),
            component_extension: ".html".into(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from JSON, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.interpolation_open.is_empty() || self.interpolation_close.is_empty() {
            return Err(Error::Config("interpolation delimiters must not be empty".into()));
        }
        if self.directive_prefix.is_empty() {
            return Err(Error::Config("directive prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn is_reserved(&self, tag: &str) -> bool {
        self.reserved_tags.iter().any(|reserved| reserved.eq_ignore_ascii_case(tag))
    }

    pub fn is_property(&self, name: &str) -> bool {
        self.property_bindings.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.directive_prefix, "v-");
        assert!(config.is_reserved("font-face"));
        assert!(!config.is_reserved("todo-item"));
        assert!(config.is_property("checked"));
    }

    #[test]
    fn partial_json_overrides() {
        let config = RuntimeConfig::from_json(
            r#"{ "interpolation_open": "[[", "interpolation_close": "]]" }"#,
        )
        .unwrap();
        assert_eq!(config.interpolation_open, "[[");
        assert_eq!(config.event_prefix, "@");
    }

    #[test]
    fn rejects_bad_json_and_empty_delimiters() {
        assert!(matches!(
            RuntimeConfig::from_json("{ not json"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{ "interpolation_open": "" }"#),
            Err(Error::Config(_))
        ));
    }
}
