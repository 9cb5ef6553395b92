//! Schema reconstruction.
//!
//! Turns a prim's declared type name and raw property map into one typed
//! `PrimContent`. Dispatch goes through a `SchemaRegistry` that maps type
//! names to reconstruction functions, so adding a schema is one `register` call.
//!
//! Each reconstruction function pulls the properties it knows out of a
//! `PropertyReader`. Type and variability problems on a single property are
//! field errors (the field stays unset); properties nobody consumed are kept
//! on the prim and reported as warnings.

mod geom;
mod lux;
mod shade;
mod skel;
mod xform;

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use strata_value::{FromValue, Path, Property, PropertyMap, Relationship, Token, Value};
use thiserror::Error;

use crate::config::ReaderConfig;
use crate::diagnostics::Diagnostics;

pub use geom::*;
pub use lux::*;
pub use shade::*;
pub use skel::*;
pub use xform::*;

/// Errors that can occur while reconstructing a prim's schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("`{property}` must be `{expected}`, got `{actual}`")]
    PropertyType {
        property: String,
        expected: String,
        actual: String,
    },

    #[error("`{property}` must be `uniform {expected}`")]
    NotUniform {
        property: String,
        expected: &'static str,
    },

    #[error("`{0}` must be an attribute, not a relationship")]
    ExpectedAttribute(String),

    #[error("`{0}` must be a relationship, not an attribute")]
    ExpectedRelationship(String),

    #[error("Invalid token `{token}` for `{property}`. Allowed tokens are [{allowed}]")]
    InvalidToken {
        property: String,
        token: String,
        allowed: String,
    },

    #[error("`{property}[{index}]` = {value} does not fit in an unsigned index")]
    OutOfRange {
        property: String,
        index: usize,
        value: i64,
    },

    #[error("`{0}` is listed in xformOpOrder but not authored")]
    MissingXformOp(String),

    #[error("{prim_type} prim `{prim}` must be defined as a child of a {required} prim, but its parent is {actual}")]
    ParentType {
        prim_type: &'static str,
        prim: String,
        required: &'static str,
        actual: String,
    },

    #[error("Unknown prim type `{0}`")]
    UnknownPrimType(String),
}

impl SchemaError {
    /// Fatal errors abort reconstruction; the rest only unset their field.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchemaError::ParentType { .. } | SchemaError::UnknownPrimType(_)
        )
    }
}

/// A closed token vocabulary for an enum-valued attribute.
pub trait TokenEnum: Sized + Copy + 'static {
    const TOKENS: &'static [(Self, &'static str)];

    fn from_token(tok: &str) -> Option<Self> {
        Self::TOKENS.iter().find(|(_, t)| *t == tok).map(|(e, _)| *e)
    }

    fn allowed() -> String {
        Self::TOKENS
            .iter()
            .map(|(_, t)| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Untyped model: any prim without a registered schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Model {
    /// Type name exactly as written (`""` for typeless `def "Name"`)
    pub prim_type_name: String,
}

/// Typed content of one prim.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PrimContent {
    Model(Model),
    Scope(Scope),
    Xform(Xform),
    Mesh(GeomMesh),
    GeomSubset(GeomSubset),
    Points(GeomPoints),
    Sphere(GeomSphere),
    Cube(GeomCube),
    Cone(GeomCone),
    Cylinder(GeomCylinder),
    Capsule(GeomCapsule),
    BasisCurves(GeomBasisCurves),
    Camera(GeomCamera),
    SphereLight(SphereLight),
    DomeLight(DomeLight),
    DiskLight(DiskLight),
    DistantLight(DistantLight),
    CylinderLight(CylinderLight),
    Material(Material),
    Shader(Shader),
    NodeGraph(NodeGraph),
    SkelRoot(SkelRoot),
    Skeleton(Skeleton),
    SkelAnimation(SkelAnimation),
    BlendShape(BlendShape),
}

impl PrimContent {
    /// Schema type name. For untyped models this is the declared type name.
    pub fn type_name(&self) -> &str {
        match self {
            PrimContent::Model(m) => &m.prim_type_name,
            PrimContent::Scope(_) => "Scope",
            PrimContent::Xform(_) => "Xform",
            PrimContent::Mesh(_) => "Mesh",
            PrimContent::GeomSubset(_) => "GeomSubset",
            PrimContent::Points(_) => "Points",
            PrimContent::Sphere(_) => "Sphere",
            PrimContent::Cube(_) => "Cube",
            PrimContent::Cone(_) => "Cone",
            PrimContent::Cylinder(_) => "Cylinder",
            PrimContent::Capsule(_) => "Capsule",
            PrimContent::BasisCurves(_) => "BasisCurves",
            PrimContent::Camera(_) => "Camera",
            PrimContent::SphereLight(_) => "SphereLight",
            PrimContent::DomeLight(_) => "DomeLight",
            PrimContent::DiskLight(_) => "DiskLight",
            PrimContent::DistantLight(_) => "DistantLight",
            PrimContent::CylinderLight(_) => "CylinderLight",
            PrimContent::Material(_) => "Material",
            PrimContent::Shader(_) => "Shader",
            PrimContent::NodeGraph(_) => "NodeGraph",
            PrimContent::SkelRoot(_) => "SkelRoot",
            PrimContent::Skeleton(_) => "Skeleton",
            PrimContent::SkelAnimation(_) => "SkelAnimation",
            PrimContent::BlendShape(_) => "BlendShape",
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, PrimContent::Model(_))
    }

    /// Transform stack, for schemas that have one.
    pub fn xformable(&self) -> Option<&Xformable> {
        match self {
            PrimContent::Xform(x) => Some(&x.xformable),
            PrimContent::Mesh(g) => Some(&g.gprim.xformable),
            PrimContent::Points(g) => Some(&g.gprim.xformable),
            PrimContent::Sphere(g) => Some(&g.gprim.xformable),
            PrimContent::Cube(g) => Some(&g.gprim.xformable),
            PrimContent::Cone(g) => Some(&g.gprim.xformable),
            PrimContent::Cylinder(g) => Some(&g.gprim.xformable),
            PrimContent::Capsule(g) => Some(&g.gprim.xformable),
            PrimContent::BasisCurves(g) => Some(&g.gprim.xformable),
            PrimContent::Camera(c) => Some(&c.xformable),
            PrimContent::SphereLight(l) => Some(&l.light.xformable),
            PrimContent::DomeLight(l) => Some(&l.light.xformable),
            PrimContent::DiskLight(l) => Some(&l.light.xformable),
            PrimContent::DistantLight(l) => Some(&l.light.xformable),
            PrimContent::CylinderLight(l) => Some(&l.light.xformable),
            PrimContent::SkelRoot(s) => Some(&s.xformable),
            PrimContent::Skeleton(s) => Some(&s.xformable),
            _ => None,
        }
    }
}

/// Pulls typed values out of a raw property map, remembering what was consumed
/// and collecting field errors.
pub struct PropertyReader<'a> {
    type_name: &'a str,
    prim_path: &'a Path,
    parent_type: Option<&'a str>,
    props: &'a PropertyMap,
    consumed: BTreeSet<&'a str>,
    untyped: bool,
    errors: Vec<SchemaError>,
    warnings: Vec<String>,
}

impl<'a> PropertyReader<'a> {
    pub fn new(
        type_name: &'a str,
        prim_path: &'a Path,
        parent_type: Option<&'a str>,
        props: &'a PropertyMap,
    ) -> Self {
        Self {
            type_name,
            prim_path,
            parent_type,
            props,
            consumed: BTreeSet::new(),
            untyped: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Declared type name of the prim being reconstructed.
    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    pub fn prim_path(&self) -> &'a Path {
        self.prim_path
    }

    /// Declared type of the parent prim, `None` for toplevel prims.
    pub fn parent_type(&self) -> Option<&'a str> {
        self.parent_type
    }

    /// Keep every remaining property without warnings (untyped prims).
    pub fn accept_all(&mut self) {
        self.untyped = true;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn push_error(&mut self, err: SchemaError) {
        self.errors.push(err);
    }

    fn take(&mut self, name: &str) -> Option<(&'a str, &'a Property)> {
        let (key, prop) = self.props.get_key_value(name)?;
        self.consumed.insert(key.as_str());
        Some((key.as_str(), prop))
    }

    fn take_attr_value(&mut self, name: &str) -> Option<(&'a str, &'a strata_value::Attribute, &'a Value)> {
        let (key, prop) = self.take(name)?;
        let Some(attr) = prop.as_attribute() else {
            self.errors.push(SchemaError::ExpectedAttribute(key.to_string()));
            return None;
        };
        // Declared without a value, connected, or blocked: nothing to store.
        match &attr.value {
            Some(Value::Blocked) | None => None,
            Some(value) => Some((key, attr, value)),
        }
    }

    /// Read a (varying or uniform) attribute of type `T`.
    pub fn attr<T: FromValue>(&mut self, name: &str) -> Option<T> {
        let (key, _, value) = self.take_attr_value(name)?;
        self.extract(key, value)
    }

    /// Read a `uniform` attribute of type `T`.
    pub fn uniform<T: FromValue>(&mut self, name: &str) -> Option<T> {
        let (key, attr, value) = self.take_attr_value(name)?;
        let extracted = self.extract::<T>(key, value)?;
        if !attr.is_uniform() {
            self.errors.push(SchemaError::NotUniform {
                property: key.to_string(),
                expected: T::TYPE_NAME,
            });
            return None;
        }
        Some(extracted)
    }

    /// Read a token attribute restricted to `E`'s vocabulary.
    pub fn token_enum<E: TokenEnum>(&mut self, name: &str) -> Option<E> {
        let tok = self.attr::<Token>(name)?;
        self.to_enum(name, tok)
    }

    /// Read a `uniform token` attribute restricted to `E`'s vocabulary.
    pub fn uniform_enum<E: TokenEnum>(&mut self, name: &str) -> Option<E> {
        let tok = self.uniform::<Token>(name)?;
        self.to_enum(name, tok)
    }

    /// Read an `int[]` attribute into unsigned indices.
    ///
    /// Every element is checked; a negative element is a field error naming
    /// its position and the whole field is left unset.
    pub fn indices(&mut self, name: &str) -> Option<Vec<u32>> {
        let ints = self.attr::<Vec<i32>>(name)?;
        let mut out = Vec::with_capacity(ints.len());
        for (index, &v) in ints.iter().enumerate() {
            match u32::try_from(v) {
                Ok(u) => out.push(u),
                Err(_) => {
                    self.errors.push(SchemaError::OutOfRange {
                        property: name.to_string(),
                        index,
                        value: i64::from(v),
                    });
                    return None;
                }
            }
        }
        Some(out)
    }

    /// Read an `asset` attribute (`@path@`).
    pub fn asset(&mut self, name: &str) -> Option<String> {
        let (key, _, value) = self.take_attr_value(name)?;
        match value {
            Value::AssetPath(p) => Some(p.clone()),
            other => {
                self.errors.push(SchemaError::PropertyType {
                    property: key.to_string(),
                    expected: "asset".to_string(),
                    actual: other.type_name().to_string(),
                });
                None
            }
        }
    }

    /// Read a relationship.
    pub fn relationship(&mut self, name: &str) -> Option<Relationship> {
        let (key, prop) = self.take(name)?;
        match prop.as_relationship() {
            Some(rel) => Some(rel.clone()),
            None => {
                self.errors.push(SchemaError::ExpectedRelationship(key.to_string()));
                None
            }
        }
    }

    /// Read the `.connect` target of an attribute.
    pub fn connection(&mut self, name: &str) -> Option<Path> {
        let (key, prop) = self.take(name)?;
        match prop.as_attribute() {
            Some(attr) => attr.connection.clone(),
            None => {
                self.errors.push(SchemaError::ExpectedAttribute(key.to_string()));
                None
            }
        }
    }

    /// Take every not yet consumed property whose name starts with `prefix`.
    pub fn take_prefixed(&mut self, prefix: &str) -> PropertyMap {
        let mut out = PropertyMap::new();
        for (key, prop) in self.props.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if self.consumed.insert(key.as_str()) {
                out.insert(key.clone(), prop.clone());
            }
        }
        out
    }

    fn extract<T: FromValue>(&mut self, key: &str, value: &Value) -> Option<T> {
        match value.get::<T>() {
            Some(v) => Some(v),
            None => {
                self.errors.push(SchemaError::PropertyType {
                    property: key.to_string(),
                    expected: T::TYPE_NAME.to_string(),
                    actual: value.type_name().to_string(),
                });
                None
            }
        }
    }

    fn to_enum<E: TokenEnum>(&mut self, name: &str, tok: Token) -> Option<E> {
        match E::from_token(tok.as_str()) {
            Some(e) => Some(e),
            None => {
                self.errors.push(SchemaError::InvalidToken {
                    property: name.to_string(),
                    token: tok.0,
                    allowed: E::allowed(),
                });
                None
            }
        }
    }

    /// Properties nobody consumed, plus collected errors and warnings.
    fn finish(self) -> (PropertyMap, Vec<SchemaError>, Vec<String>) {
        let mut warnings = self.warnings;
        let mut leftovers = PropertyMap::new();
        for (key, prop) in self.props {
            if self.consumed.contains(key.as_str()) {
                continue;
            }
            if !self.untyped {
                warnings.push(format!(
                    "{} prim <{}>: unsupported property `{}` kept as-is",
                    self.type_name, self.prim_path, key
                ));
            }
            leftovers.insert(key.clone(), prop.clone());
        }
        (leftovers, self.errors, warnings)
    }
}

/// A schema reconstruction function.
pub type ReconstructFn = fn(&mut PropertyReader<'_>) -> Result<PrimContent, SchemaError>;

/// Output of a successful reconstruction.
#[derive(Clone, Debug)]
pub struct Reconstructed {
    pub content: PrimContent,

    /// Properties the schema did not consume
    pub extra: PropertyMap,

    /// Field-level errors (fields left unset)
    pub errors: Vec<SchemaError>,
}

/// Type name -> reconstruction function.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, ReconstructFn>,
}

impl SchemaRegistry {
    /// An empty registry: every type name falls back to `Model`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in schema.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("Model", reconstruct_model);
        registry.register("Scope", geom::reconstruct_scope);
        registry.register("Xform", geom::reconstruct_xform);
        registry.register("Mesh", geom::reconstruct_mesh);
        registry.register("GeomSubset", geom::reconstruct_geom_subset);
        registry.register("Points", geom::reconstruct_points);
        registry.register("Sphere", geom::reconstruct_sphere);
        registry.register("Cube", geom::reconstruct_cube);
        registry.register("Cone", geom::reconstruct_cone);
        registry.register("Cylinder", geom::reconstruct_cylinder);
        registry.register("Capsule", geom::reconstruct_capsule);
        registry.register("BasisCurves", geom::reconstruct_basis_curves);
        registry.register("Camera", geom::reconstruct_camera);
        registry.register("SphereLight", lux::reconstruct_sphere_light);
        registry.register("DomeLight", lux::reconstruct_dome_light);
        registry.register("DiskLight", lux::reconstruct_disk_light);
        registry.register("DistantLight", lux::reconstruct_distant_light);
        registry.register("CylinderLight", lux::reconstruct_cylinder_light);
        registry.register("Material", shade::reconstruct_material);
        registry.register("Shader", shade::reconstruct_shader);
        registry.register("NodeGraph", shade::reconstruct_node_graph);
        registry.register("SkelRoot", skel::reconstruct_skel_root);
        registry.register("Skeleton", skel::reconstruct_skeleton);
        registry.register("SkelAnimation", skel::reconstruct_skel_animation);
        registry.register("BlendShape", skel::reconstruct_blend_shape);
        registry
    }

    pub fn register(&mut self, type_name: impl Into<String>, f: ReconstructFn) {
        self.entries.insert(type_name.into(), f);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reconstruct the typed content of one prim.
    ///
    /// Unknown type names become `Model`s carrying the declared name, with a
    /// warning, unless `config.allow_unknown_prim_types` is off.
    pub fn reconstruct(
        &self,
        type_name: &str,
        prim_path: &Path,
        parent_type: Option<&str>,
        props: &PropertyMap,
        config: &ReaderConfig,
        diag: &mut Diagnostics,
    ) -> Result<Reconstructed, SchemaError> {
        let f = match self.entries.get(type_name) {
            Some(f) => *f,
            None if type_name.is_empty() => reconstruct_model as ReconstructFn,
            None if config.allow_unknown_prim_types => {
                diag.warn(format!(
                    "Unknown prim type `{}` at <{}> reconstructed as an untyped model",
                    type_name, prim_path
                ));
                reconstruct_model as ReconstructFn
            }
            None => return Err(SchemaError::UnknownPrimType(type_name.to_string())),
        };

        let mut reader = PropertyReader::new(type_name, prim_path, parent_type, props);
        let content = f(&mut reader)?;
        let (extra, errors, warnings) = reader.finish();
        for w in warnings {
            diag.warn(w);
        }

        log::debug!(
            "Reconstructed <{}> as {} ({} field errors)",
            prim_path,
            content.type_name(),
            errors.len()
        );

        Ok(Reconstructed {
            content,
            extra,
            errors,
        })
    }
}

fn reconstruct_model(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    reader.accept_all();
    Ok(PrimContent::Model(Model {
        prim_type_name: reader.type_name().to_string(),
    }))
}
