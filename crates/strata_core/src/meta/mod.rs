//! Prim metadata.
//!
//! The parser hands over a prim's metadata as an untyped, ordered map of
//! `key -> (list-edit qualifier, value)`. `normalize_prim_meta` turns it into a
//! strongly-typed `PrimMeta`, checking each recognized key's dynamic type.
//!
//! Error policy:
//!
//! - Unknown keys are kept in `PrimMeta::unregistered` and reported as warnings.
//! - A recognized key with the wrong type is a field error: the field stays
//!   unset and the error is returned alongside the result.
//! - An unknown API schema with `allow_unknown_api_schemas = false` is fatal.

mod arcs;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strata_value::{Dictionary, FromValue, ListEditQual, Path, Payload, Reference, Token, Value};
use thiserror::Error;

use crate::config::ReaderConfig;
use crate::diagnostics::Diagnostics;

pub use arcs::{api_schema_from_token, ApiSchema};

/// Untyped metadata as delivered by the parser.
pub type PrimMetaMap = BTreeMap<String, (ListEditQual, Value)>;

/// Variant set name -> selected variant name.
pub type VariantSelectionMap = BTreeMap<String, String>;

/// Errors produced while normalizing metadata.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetaError {
    #[error("`{key}` metadatum must be {expected}, got `{actual}`")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid token `{0}` for `kind` metadatum")]
    InvalidKind(String),

    #[error("ListEdit op for `apiSchemas` must be empty or `prepend`, got `{0}`")]
    ApiSchemasQualifier(ListEditQual),

    #[error("`variants` selection for `{name}` must be a string, got `{actual}`")]
    VariantSelection { name: String, actual: &'static str },

    #[error("Unknown API schema `{0}` in `apiSchemas`")]
    UnknownApiSchema(String),
}

impl MetaError {
    /// Metadata key the error is about.
    pub fn key(&self) -> &str {
        match self {
            MetaError::TypeMismatch { key, .. } => key,
            MetaError::InvalidKind(_) => "kind",
            MetaError::ApiSchemasQualifier(_) | MetaError::UnknownApiSchema(_) => "apiSchemas",
            MetaError::VariantSelection { .. } => "variants",
        }
    }

    /// Fatal errors abort reconstruction; the rest only unset their field.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MetaError::UnknownApiSchema(_))
    }
}

/// Model hierarchy kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Kind {
    Subcomponent,
    Component,
    Model,
    Group,
    Assembly,
    /// USDZ-specific `sceneLibrary`
    SceneLibrary,
}

impl Kind {
    pub fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "subcomponent" => Some(Kind::Subcomponent),
            "component" => Some(Kind::Component),
            "model" => Some(Kind::Model),
            "group" => Some(Kind::Group),
            "assembly" => Some(Kind::Assembly),
            "sceneLibrary" => Some(Kind::SceneLibrary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Subcomponent => "subcomponent",
            Kind::Component => "component",
            Kind::Model => "model",
            Kind::Group => "group",
            Kind::Assembly => "assembly",
            Kind::SceneLibrary => "sceneLibrary",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list-edited list: the qualifier it was written with plus its items.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListOp<T> {
    pub qual: ListEditQual,
    pub items: Vec<T>,
}

impl<T> ListOp<T> {
    pub fn new(qual: ListEditQual, items: Vec<T>) -> Self {
        Self { qual, items }
    }
}

/// One applied API schema, with its instance name for multi-apply schemas.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedSchema {
    pub schema: ApiSchema,
    pub instance: Option<String>,
}

/// Strongly-typed prim metadata.
///
/// Every field is optional: unset means "not authored". Accessors give the
/// documented fallbacks (`is_active() == true`, empty arc lists).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PrimMeta {
    pub active: Option<bool>,
    pub hidden: Option<bool>,
    pub kind: Option<Kind>,
    pub display_name: Option<String>,
    pub scene_name: Option<String>,
    pub comment: Option<String>,

    pub custom_data: Option<Dictionary>,
    pub asset_info: Option<Dictionary>,

    /// `variants = { string shading = "red" }`
    pub variants: Option<VariantSelectionMap>,

    pub inherits: Option<ListOp<Path>>,
    pub specializes: Option<ListOp<Path>>,
    pub references: Option<ListOp<Reference>>,
    pub payload: Option<ListOp<Payload>>,
    pub variant_sets: Option<ListOp<String>>,
    pub api_schemas: Option<ListOp<AppliedSchema>>,

    /// Metadata keys this reader does not know, kept verbatim
    pub unregistered: BTreeMap<String, Value>,
}

impl PrimMeta {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    pub fn references(&self) -> &[Reference] {
        self.references.as_ref().map(|op| op.items.as_slice()).unwrap_or(&[])
    }

    pub fn payloads(&self) -> &[Payload] {
        self.payload.as_ref().map(|op| op.items.as_slice()).unwrap_or(&[])
    }

    pub fn inherits(&self) -> &[Path] {
        self.inherits.as_ref().map(|op| op.items.as_slice()).unwrap_or(&[])
    }

    pub fn specializes(&self) -> &[Path] {
        self.specializes.as_ref().map(|op| op.items.as_slice()).unwrap_or(&[])
    }

    pub fn variant_set_names(&self) -> &[String] {
        self.variant_sets.as_ref().map(|op| op.items.as_slice()).unwrap_or(&[])
    }

    pub fn applied_schemas(&self) -> &[AppliedSchema] {
        self.api_schemas.as_ref().map(|op| op.items.as_slice()).unwrap_or(&[])
    }

    pub fn has_api_schema(&self, schema: ApiSchema) -> bool {
        self.applied_schemas().iter().any(|a| a.schema == schema)
    }

    /// Selected variant for `set`, if authored.
    pub fn variant_selection(&self, set: &str) -> Option<&str> {
        self.variants.as_ref()?.get(set).map(String::as_str)
    }
}

/// Result of a normalization: the typed metadata plus per-field errors.
#[derive(Clone, Debug, Default)]
pub struct Normalized {
    pub meta: PrimMeta,
    pub errors: Vec<MetaError>,
}

/// Convert an untyped metadata map into `PrimMeta`.
///
/// Returns `Err` only for fatal errors. Field errors are collected in
/// `Normalized::errors` with the field left unset; warnings go to `diag`.
pub fn normalize_prim_meta(
    in_meta: &PrimMetaMap,
    config: &ReaderConfig,
    diag: &mut Diagnostics,
) -> Result<Normalized, MetaError> {
    let mut out = Normalized::default();
    let meta = &mut out.meta;

    for (key, (qual, value)) in in_meta {
        let qual = *qual;
        let result = match key.as_str() {
            "active" => expect::<bool>(key, value).map(|v| meta.active = Some(v)),
            "hidden" => expect::<bool>(key, value).map(|v| meta.hidden = Some(v)),
            "displayName" => expect::<String>(key, value).map(|v| meta.display_name = Some(v)),
            "sceneName" => expect::<String>(key, value).map(|v| meta.scene_name = Some(v)),
            "comment" => expect::<String>(key, value).map(|v| meta.comment = Some(v)),
            "kind" => kind(value).map(|v| meta.kind = Some(v)),
            "customData" => expect::<Dictionary>(key, value).map(|v| meta.custom_data = Some(v)),
            "assetInfo" => expect::<Dictionary>(key, value).map(|v| meta.asset_info = Some(v)),
            "variants" => arcs::variant_selections(value).map(|v| meta.variants = Some(v)),
            "inherits" => arcs::paths(key, qual, value).map(|v| meta.inherits = Some(v)),
            "specializes" => arcs::paths(key, qual, value).map(|v| meta.specializes = Some(v)),
            "references" => arcs::references(qual, value).map(|v| meta.references = Some(v)),
            "payload" => arcs::payloads(qual, value).map(|v| meta.payload = Some(v)),
            "variantSets" => arcs::variant_set_names(qual, value).map(|v| meta.variant_sets = Some(v)),
            "apiSchemas" => {
                arcs::api_schemas(qual, value, config, diag).map(|v| meta.api_schemas = Some(v))
            }
            _ => {
                diag.warn(format!("Unsupported prim metadatum `{}` kept as-is", key));
                meta.unregistered.insert(key.clone(), value.clone());
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => out.errors.push(e),
        }
    }

    Ok(out)
}

/// Extract `T` from a metadata value or report a type mismatch for `key`.
fn expect<T: FromValue>(key: &str, value: &Value) -> Result<T, MetaError> {
    value.get::<T>().ok_or_else(|| MetaError::TypeMismatch {
        key: key.to_string(),
        expected: T::TYPE_NAME,
        actual: value.type_name(),
    })
}

fn kind(value: &Value) -> Result<Kind, MetaError> {
    let tok = expect::<Token>("kind", value)?;
    Kind::from_token(tok.as_str()).ok_or_else(|| MetaError::InvalidKind(tok.0))
}
