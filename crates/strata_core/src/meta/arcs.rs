//! Composition arc metadata.
//!
//! `references`, `payload`, `inherits`, `specializes`, `variantSets` and
//! `apiSchemas` all normalize into a `ListOp`: the qualifier they were written
//! with plus an ordered list. A single target, a target list and the `None`
//! block (clear to empty) all land in the same shape.

use serde::Serialize;
use strata_value::{ListEditQual, Path, Payload, Reference, Token, Value};

use super::{AppliedSchema, ListOp, MetaError, VariantSelectionMap};
use crate::config::ReaderConfig;
use crate::diagnostics::Diagnostics;

/// API schemas this reader recognizes in `apiSchemas`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ApiSchema {
    SkelBinding,
    MaterialBinding,
    /// Multi-apply: `CollectionAPI:<instance>`
    Collection,
    Shaping,
    Shadow,
    PhysicsMaterial,
    PhysicsRigidBody,
    PhysicsCollider,
}

impl ApiSchema {
    pub fn token(&self) -> &'static str {
        match self {
            ApiSchema::SkelBinding => "SkelBindingAPI",
            ApiSchema::MaterialBinding => "MaterialBindingAPI",
            ApiSchema::Collection => "CollectionAPI",
            ApiSchema::Shaping => "ShapingAPI",
            ApiSchema::Shadow => "ShadowAPI",
            ApiSchema::PhysicsMaterial => "Preliminary_PhysicsMaterialAPI",
            ApiSchema::PhysicsRigidBody => "Preliminary_PhysicsRigidBodyAPI",
            ApiSchema::PhysicsCollider => "Preliminary_PhysicsColliderAPI",
        }
    }

    pub fn is_multiple_apply(&self) -> bool {
        matches!(self, ApiSchema::Collection)
    }
}

const API_SCHEMAS: [ApiSchema; 8] = [
    ApiSchema::SkelBinding,
    ApiSchema::MaterialBinding,
    ApiSchema::Collection,
    ApiSchema::Shaping,
    ApiSchema::Shadow,
    ApiSchema::PhysicsMaterial,
    ApiSchema::PhysicsRigidBody,
    ApiSchema::PhysicsCollider,
];

/// Look up an `apiSchemas` token, splitting off a multi-apply instance name.
///
/// `CollectionAPI:lights` -> `(Collection, Some("lights"))`. An instance name on a
/// single-apply schema does not match.
pub fn api_schema_from_token(tok: &str) -> Option<AppliedSchema> {
    let (name, instance) = match tok.split_once(':') {
        Some((name, instance)) => (name, Some(instance)),
        None => (tok, None),
    };

    let schema = API_SCHEMAS.iter().copied().find(|s| s.token() == name)?;
    match (schema.is_multiple_apply(), instance) {
        (false, Some(_)) => None,
        (true, Some("")) => None,
        (_, instance) => Some(AppliedSchema {
            schema,
            instance: instance.map(str::to_string),
        }),
    }
}

pub(super) fn api_schemas(
    qual: ListEditQual,
    value: &Value,
    config: &ReaderConfig,
    diag: &mut Diagnostics,
) -> Result<ListOp<AppliedSchema>, MetaError> {
    if qual != ListEditQual::Prepend && qual != ListEditQual::ResetToExplicit {
        return Err(MetaError::ApiSchemasQualifier(qual));
    }

    let Some(tokens) = value.get::<Vec<Token>>() else {
        return Err(mismatch("apiSchemas", "token[]", value));
    };

    let mut names = Vec::with_capacity(tokens.len());
    for tok in &tokens {
        match api_schema_from_token(tok.as_str()) {
            Some(applied) => names.push(applied),
            None if config.allow_unknown_api_schemas => {
                diag.warn(format!("Unknown API schema `{}` dropped from `apiSchemas`", tok));
            }
            None => return Err(MetaError::UnknownApiSchema(tok.0.clone())),
        }
    }

    Ok(ListOp::new(qual, names))
}

/// `inherits` / `specializes`: a path, a path list, or `None`.
pub(super) fn paths(key: &str, qual: ListEditQual, value: &Value) -> Result<ListOp<Path>, MetaError> {
    match value {
        Value::Blocked => Ok(ListOp::new(qual, Vec::new())),
        Value::Path(p) => Ok(ListOp::new(qual, vec![p.clone()])),
        Value::PathVec(ps) => Ok(ListOp::new(qual, ps.clone())),
        other => Err(mismatch(key, "path or path[]", other)),
    }
}

pub(super) fn references(qual: ListEditQual, value: &Value) -> Result<ListOp<Reference>, MetaError> {
    match value {
        Value::Blocked => Ok(ListOp::new(qual, Vec::new())),
        Value::Reference(r) => Ok(ListOp::new(qual, vec![r.clone()])),
        Value::ReferenceVec(rs) => Ok(ListOp::new(qual, rs.clone())),
        other => Err(mismatch("references", "reference or reference[]", other)),
    }
}

pub(super) fn payloads(qual: ListEditQual, value: &Value) -> Result<ListOp<Payload>, MetaError> {
    match value {
        Value::Blocked => Ok(ListOp::new(qual, Vec::new())),
        Value::Reference(r) => Ok(ListOp::new(qual, vec![Payload::from(r)])),
        Value::ReferenceVec(rs) => Ok(ListOp::new(qual, rs.iter().map(Payload::from).collect())),
        other => Err(mismatch("payload", "reference or reference[]", other)),
    }
}

/// `variantSets`: a string, a string list, or `None`.
pub(super) fn variant_set_names(qual: ListEditQual, value: &Value) -> Result<ListOp<String>, MetaError> {
    match value {
        Value::Blocked => Ok(ListOp::new(qual, Vec::new())),
        Value::String(s) => Ok(ListOp::new(qual, vec![s.clone()])),
        Value::StringArray(ss) => Ok(ListOp::new(qual, ss.clone())),
        other => Err(mismatch("variantSets", "string or string[]", other)),
    }
}

/// `variants`: a dictionary whose values are all plain strings.
pub(super) fn variant_selections(value: &Value) -> Result<VariantSelectionMap, MetaError> {
    let Value::Dictionary(dict) = value else {
        return Err(mismatch("variants", "dictionary", value));
    };

    let mut selections = VariantSelectionMap::new();
    for (name, v) in dict {
        match v {
            Value::String(s) => {
                selections.insert(name.clone(), s.clone());
            }
            other => {
                return Err(MetaError::VariantSelection {
                    name: name.clone(),
                    actual: other.type_name(),
                })
            }
        }
    }
    Ok(selections)
}

fn mismatch(key: &str, expected: &'static str, value: &Value) -> MetaError {
    MetaError::TypeMismatch {
        key: key.to_string(),
        expected,
        actual: value.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{normalize_prim_meta, PrimMetaMap};
    use super::*;
    use strata_value::Dictionary;

    fn tokens(names: &[&str]) -> Value {
        Value::TokenArray(names.iter().map(|n| Token::new(*n)).collect())
    }

    fn run(qual: ListEditQual, value: Value, config: &ReaderConfig) -> (Result<ListOp<AppliedSchema>, MetaError>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let result = api_schemas(qual, &value, config, &mut diag);
        (result, diag)
    }

    #[test]
    fn test_api_schemas_qualifier_rejection() {
        let config = ReaderConfig::default();

        let (append, _) = run(ListEditQual::Append, tokens(&["SkelBindingAPI"]), &config);
        assert_eq!(append.unwrap_err(), MetaError::ApiSchemasQualifier(ListEditQual::Append));

        let (prepend, _) = run(ListEditQual::Prepend, tokens(&["SkelBindingAPI"]), &config);
        assert_eq!(prepend.unwrap().items[0].schema, ApiSchema::SkelBinding);

        let (explicit, _) = run(ListEditQual::ResetToExplicit, tokens(&["MaterialBindingAPI"]), &config);
        assert_eq!(explicit.unwrap().qual, ListEditQual::ResetToExplicit);
    }

    #[test]
    fn test_api_schemas_append_is_named_field_error() {
        let mut map = PrimMetaMap::new();
        map.insert("apiSchemas".into(), (ListEditQual::Append, tokens(&["SkelBindingAPI"])));

        let mut diag = Diagnostics::new();
        let normalized = normalize_prim_meta(&map, &ReaderConfig::default(), &mut diag).unwrap();
        assert!(normalized.meta.api_schemas.is_none());
        assert_eq!(normalized.errors.len(), 1);
        assert!(normalized.errors[0].to_string().contains("append"));
    }

    #[test]
    fn test_unknown_api_schema_is_dropped_with_warning() {
        let (result, diag) = run(
            ListEditQual::Prepend,
            tokens(&["FancyAPI", "MaterialBindingAPI"]),
            &ReaderConfig::default(),
        );
        let op = result.unwrap();
        assert_eq!(op.items.len(), 1);
        assert_eq!(op.items[0].schema, ApiSchema::MaterialBinding);
        assert_eq!(diag.warnings().len(), 1);
        assert!(diag.warnings()[0].contains("FancyAPI"));
    }

    #[test]
    fn test_unknown_api_schema_denied_by_config() {
        let (result, _) = run(ListEditQual::Prepend, tokens(&["FancyAPI"]), &ReaderConfig::strict());
        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err, MetaError::UnknownApiSchema("FancyAPI".into()));
    }

    #[test]
    fn test_multi_apply_instance_name() {
        let applied = api_schema_from_token("CollectionAPI:lights").unwrap();
        assert_eq!(applied.schema, ApiSchema::Collection);
        assert_eq!(applied.instance.as_deref(), Some("lights"));

        assert!(api_schema_from_token("SkelBindingAPI:foo").is_none());
        assert!(api_schema_from_token("CollectionAPI:").is_none());
    }

    #[test]
    fn test_references_three_shapes() {
        let one = Reference::new("./a.usda", None);
        let single = references(ListEditQual::Prepend, &Value::Reference(one.clone())).unwrap();
        assert_eq!(single.items, vec![one.clone()]);
        assert_eq!(single.qual, ListEditQual::Prepend);

        let list = references(ListEditQual::Append, &Value::ReferenceVec(vec![one.clone(), one])).unwrap();
        assert_eq!(list.items.len(), 2);

        let blocked = references(ListEditQual::ResetToExplicit, &Value::Blocked).unwrap();
        assert!(blocked.items.is_empty());

        assert!(references(ListEditQual::ResetToExplicit, &Value::String("x".into())).is_err());
    }

    #[test]
    fn test_payload_converts_references() {
        let r = Reference::new("./heavy.usda", Some(Path::prim("/Heavy")));
        let op = payloads(ListEditQual::ResetToExplicit, &Value::Reference(r)).unwrap();
        assert_eq!(op.items[0].asset_path, "./heavy.usda");
        assert_eq!(op.items[0].prim_path, Some(Path::prim("/Heavy")));
    }

    #[test]
    fn test_inherits_single_path() {
        let op = paths("inherits", ListEditQual::Prepend, &Value::Path(Path::prim("/_class_Tree"))).unwrap();
        assert_eq!(op.items, vec![Path::prim("/_class_Tree")]);
    }

    #[test]
    fn test_variant_set_names() {
        let op = variant_set_names(ListEditQual::Prepend, &Value::String("shading".into())).unwrap();
        assert_eq!(op.items, vec!["shading".to_string()]);

        let op = variant_set_names(ListEditQual::ResetToExplicit, &Value::Blocked).unwrap();
        assert!(op.items.is_empty());
    }

    #[test]
    fn test_variant_selections_require_strings() {
        let mut dict = Dictionary::new();
        dict.insert("shading".into(), Value::String("red".into()));
        let selections = variant_selections(&Value::Dictionary(dict.clone())).unwrap();
        assert_eq!(selections.get("shading").map(String::as_str), Some("red"));

        dict.insert("lod".into(), Value::Token("high".into()));
        let err = variant_selections(&Value::Dictionary(dict)).unwrap_err();
        assert_eq!(err.key(), "variants");
        assert!(err.to_string().contains("lod"));
    }
}
