//! Dynamically-typed values.
//!
//! Metadata and attribute values arrive from the parser untyped. `Value` is the
//! closed set of shapes the engine understands, and `FromValue` is how typed
//! fields pull a concrete Rust type back out of it.

use std::collections::BTreeMap;
use std::fmt;

use glam::{DMat4, DVec3, Quat, Vec2, Vec3};
use serde::Serialize;

use crate::path::Path;
use crate::property::Reference;

/// A USD `token`: an interned identifier, kept distinct from `string`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Token(pub String);

impl Token {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Nested dictionary (`customData`, `assetInfo`, `customLayerData`, ...).
pub type Dictionary = BTreeMap<String, Value>;

/// A dynamically-typed value as produced by the parser.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    /// The `None` value block: an explicit "no value / clear" sentinel
    Blocked,

    Bool(bool),
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Token(Token),
    String(String),
    AssetPath(String),
    Path(Path),
    PathVec(Vec<Path>),
    Reference(Reference),
    ReferenceVec(Vec<Reference>),

    Float2(Vec2),
    Float3(Vec3),
    Double3(DVec3),
    Quatf(Quat),
    Matrix4d(DMat4),

    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    TokenArray(Vec<Token>),
    StringArray(Vec<String>),
    Float2Array(Vec<Vec2>),
    Float3Array(Vec<Vec3>),
    QuatfArray(Vec<Quat>),
    Matrix4dArray(Vec<DMat4>),

    Dictionary(Dictionary),
}

impl Value {
    /// USD type name of this value, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Blocked => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Token(_) => "token",
            Value::String(_) => "string",
            Value::AssetPath(_) => "asset",
            Value::Path(_) => "path",
            Value::PathVec(_) => "path[]",
            Value::Reference(_) => "reference",
            Value::ReferenceVec(_) => "reference[]",
            Value::Float2(_) => "float2",
            Value::Float3(_) => "float3",
            Value::Double3(_) => "double3",
            Value::Quatf(_) => "quatf",
            Value::Matrix4d(_) => "matrix4d",
            Value::IntArray(_) => "int[]",
            Value::FloatArray(_) => "float[]",
            Value::TokenArray(_) => "token[]",
            Value::StringArray(_) => "string[]",
            Value::Float2Array(_) => "float2[]",
            Value::Float3Array(_) => "float3[]",
            Value::QuatfArray(_) => "quatf[]",
            Value::Matrix4dArray(_) => "matrix4d[]",
            Value::Dictionary(_) => "dictionary",
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Value::Blocked)
    }

    /// Extract a typed value, `None` if the dynamic type does not match.
    pub fn get<T: FromValue>(&self) -> Option<T> {
        T::from_value(self)
    }
}

/// Typed extraction from a `Value`.
///
/// Extraction is exact: no widening, no narrowing. A `float` attribute does not
/// satisfy a `double` field.
pub trait FromValue: Sized {
    /// USD type name expected by this extraction, for error messages.
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $name:literal, $variant:ident) => {
        impl FromValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(bool, "bool", Bool);
impl_from_value!(i32, "int", Int);
impl_from_value!(i64, "int64", Int64);
impl_from_value!(f32, "float", Float);
impl_from_value!(f64, "double", Double);
impl_from_value!(Token, "token", Token);
impl_from_value!(String, "string", String);
impl_from_value!(Path, "path", Path);
impl_from_value!(Vec2, "float2", Float2);
impl_from_value!(Vec3, "float3", Float3);
impl_from_value!(DVec3, "double3", Double3);
impl_from_value!(Quat, "quatf", Quatf);
impl_from_value!(DMat4, "matrix4d", Matrix4d);
impl_from_value!(Vec<i32>, "int[]", IntArray);
impl_from_value!(Vec<f32>, "float[]", FloatArray);
impl_from_value!(Vec<Token>, "token[]", TokenArray);
impl_from_value!(Vec<String>, "string[]", StringArray);
impl_from_value!(Vec<Vec2>, "float2[]", Float2Array);
impl_from_value!(Vec<Vec3>, "float3[]", Float3Array);
impl_from_value!(Vec<Quat>, "quatf[]", QuatfArray);
impl_from_value!(Vec<DMat4>, "matrix4d[]", Matrix4dArray);
impl_from_value!(Dictionary, "dictionary", Dictionary);
