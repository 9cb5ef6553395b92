//! Attributes, relationships and composition inputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::path::Path;
use crate::value::{Dictionary, FromValue, Value};

/// How a list-valued field combines with weaker opinions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ListEditQual {
    /// No qualifier written: the list replaces weaker opinions
    #[default]
    ResetToExplicit,
    Prepend,
    Append,
    Delete,
    /// Written with the `explicit` qualifier
    Explicit,
}

impl ListEditQual {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListEditQual::ResetToExplicit => "resetToExplicit",
            ListEditQual::Prepend => "prepend",
            ListEditQual::Append => "append",
            ListEditQual::Delete => "delete",
            ListEditQual::Explicit => "explicit",
        }
    }
}

impl fmt::Display for ListEditQual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prim specifier (`def`, `over`, `class`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

/// Attribute variability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
    Config,
}

/// A reference arc target: `@asset.usda@</Prim>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Reference {
    /// Asset path between the `@` delimiters (empty for internal references)
    pub asset_path: String,

    /// Optional target prim inside the asset
    pub prim_path: Option<Path>,

    /// Per-arc custom data
    pub custom_data: Dictionary,
}

impl Reference {
    pub fn new(asset_path: impl Into<String>, prim_path: Option<Path>) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path,
            custom_data: Dictionary::new(),
        }
    }
}

/// A payload arc target. Same syntax as a reference, loaded lazily.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Payload {
    pub asset_path: String,
    pub prim_path: Option<Path>,
}

impl From<&Reference> for Payload {
    fn from(r: &Reference) -> Self {
        Self {
            asset_path: r.asset_path.clone(),
            prim_path: r.prim_path.clone(),
        }
    }
}

/// A typed attribute as declared in the document.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Attribute {
    /// Declared type name (`float3[]`, `token`, ...)
    pub type_name: String,

    pub variability: Variability,

    /// Default value; `None` when declared without a value
    pub value: Option<Value>,

    /// Target of a `.connect` statement
    pub connection: Option<Path>,
}

impl Attribute {
    /// A varying attribute holding `value`.
    pub fn new(value: Value) -> Self {
        Self {
            type_name: value.type_name().to_string(),
            variability: Variability::Varying,
            value: Some(value),
            connection: None,
        }
    }

    /// A `uniform` attribute holding `value`.
    pub fn uniform(value: Value) -> Self {
        Self {
            variability: Variability::Uniform,
            ..Self::new(value)
        }
    }

    /// A value-less attribute connected to `target`.
    pub fn connected(type_name: impl Into<String>, target: Path) -> Self {
        Self {
            type_name: type_name.into(),
            connection: Some(target),
            ..Default::default()
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.variability == Variability::Uniform
    }

    pub fn get<T: FromValue>(&self) -> Option<T> {
        self.value.as_ref().and_then(T::from_value)
    }

    /// Dynamic type of the held value, or the declared type when empty.
    pub fn value_type_name(&self) -> &str {
        match &self.value {
            Some(v) => v.type_name(),
            None => &self.type_name,
        }
    }
}

/// A relationship (`rel material:binding = </Mat>`).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Relationship {
    pub qual: ListEditQual,
    pub targets: Vec<Path>,
}

impl Relationship {
    pub fn new(targets: Vec<Path>) -> Self {
        Self {
            qual: ListEditQual::ResetToExplicit,
            targets,
        }
    }

    /// First target, if any.
    pub fn target(&self) -> Option<&Path> {
        self.targets.first()
    }
}

/// A prim property.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Property {
    Attribute(Attribute),
    Relationship(Relationship),
}

impl Property {
    pub fn is_relationship(&self) -> bool {
        matches!(self, Property::Relationship(_))
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            Property::Attribute(a) => Some(a),
            Property::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Property::Relationship(r) => Some(r),
            Property::Attribute(_) => None,
        }
    }
}

impl From<Attribute> for Property {
    fn from(a: Attribute) -> Self {
        Property::Attribute(a)
    }
}

impl From<Relationship> for Property {
    fn from(r: Relationship) -> Self {
        Property::Relationship(r)
    }
}

/// Property name -> property, as handed over by the parser.
pub type PropertyMap = BTreeMap<String, Property>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_attribute() {
        let attr = Attribute::uniform(Value::Token("face".into()));
        assert!(attr.is_uniform());
        assert_eq!(attr.type_name, "token");
        assert_eq!(attr.value_type_name(), "token");
    }

    #[test]
    fn test_connected_attribute_has_no_value() {
        let attr = Attribute::connected("token", Path::new("/Mat/Shader", "outputs:surface"));
        assert!(attr.value.is_none());
        assert_eq!(attr.value_type_name(), "token");
        assert_eq!(attr.get::<f32>(), None);
    }

    #[test]
    fn test_payload_from_reference() {
        let r = Reference::new("./a.usda", Some(Path::prim("/A")));
        let p = Payload::from(&r);
        assert_eq!(p.asset_path, "./a.usda");
        assert_eq!(p.prim_path, Some(Path::prim("/A")));
    }
}
