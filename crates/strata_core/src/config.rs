//! Reader configuration.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading a `ReaderConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid reader config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("max_prim_nesting must be at least 1")]
    ZeroNesting,
}

/// Options controlling how strictly a document is reconstructed.
///
/// Each `allow_unknown_*` flag only decides whether the unknown condition is a
/// warning (`true`, default) or a hard error (`false`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Accept prims whose type name has no registered schema, as untyped models
    pub allow_unknown_prim_types: bool,

    /// Accept unrecognized `apiSchemas` tokens (dropped with a warning)
    pub allow_unknown_api_schemas: bool,

    /// Maximum prim nesting depth accepted by tree assembly
    pub max_prim_nesting: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            allow_unknown_prim_types: true,
            allow_unknown_api_schemas: true,
            max_prim_nesting: 256,
        }
    }
}

impl ReaderConfig {
    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ReaderConfig = serde_json::from_str(json)?;
        if config.max_prim_nesting == 0 {
            return Err(ConfigError::ZeroNesting);
        }
        Ok(config)
    }

    /// Config that rejects every unknown prim type and API schema.
    pub fn strict() -> Self {
        Self {
            allow_unknown_prim_types: false,
            allow_unknown_api_schemas: false,
            ..Default::default()
        }
    }
}
