//! Transform stacks and the attributes every imageable prim shares.

use serde::Serialize;
use strata_value::{DMat4, DQuat, DVec3, Property, Token, Value, Vec3};

use super::{PropertyReader, SchemaError, TokenEnum};

const XFORM_OP_PREFIX: &str = "xformOp:";
const INVERT_PREFIX: &str = "!invert!";

/// Transform operation found in `xformOp:*` attributes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum XformOp {
    /// Translation (xformOp:translate)
    Translate(DVec3),

    /// Rotation in degrees around X axis
    RotateX(f64),

    /// Rotation in degrees around Y axis
    RotateY(f64),

    /// Rotation in degrees around Z axis
    RotateZ(f64),

    /// Euler rotation in degrees, X applied first
    RotateXYZ(DVec3),

    /// Orientation quaternion
    Orient(DQuat),

    /// Scale (uniform or non-uniform)
    Scale(DVec3),

    /// Full 4x4 transform matrix
    Transform(DMat4),
}

impl XformOp {
    /// Convert this operation to a transformation matrix.
    pub fn to_matrix(&self) -> DMat4 {
        match self {
            XformOp::Translate(t) => DMat4::from_translation(*t),
            XformOp::RotateX(deg) => DMat4::from_rotation_x(deg.to_radians()),
            XformOp::RotateY(deg) => DMat4::from_rotation_y(deg.to_radians()),
            XformOp::RotateZ(deg) => DMat4::from_rotation_z(deg.to_radians()),
            XformOp::RotateXYZ(euler) => {
                DMat4::from_rotation_z(euler.z.to_radians())
                    * DMat4::from_rotation_y(euler.y.to_radians())
                    * DMat4::from_rotation_x(euler.x.to_radians())
            }
            XformOp::Orient(q) => DMat4::from_quat(*q),
            XformOp::Scale(s) => DMat4::from_scale(*s),
            XformOp::Transform(m) => *m,
        }
    }

    /// Op kind as written after `xformOp:`.
    pub fn kind(&self) -> &'static str {
        match self {
            XformOp::Translate(_) => "translate",
            XformOp::RotateX(_) => "rotateX",
            XformOp::RotateY(_) => "rotateY",
            XformOp::RotateZ(_) => "rotateZ",
            XformOp::RotateXYZ(_) => "rotateXYZ",
            XformOp::Orient(_) => "orient",
            XformOp::Scale(_) => "scale",
            XformOp::Transform(_) => "transform",
        }
    }
}

/// One entry of an ordered transform stack.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct XformOpEntry {
    /// Attribute name, e.g. `xformOp:translate:pivot`
    pub name: String,

    pub op: XformOp,

    /// Listed as `!invert!<name>` in xformOpOrder
    pub inverted: bool,
}

impl XformOpEntry {
    pub fn to_matrix(&self) -> DMat4 {
        let m = self.op.to_matrix();
        if self.inverted {
            m.inverse()
        } else {
            m
        }
    }
}

/// Ordered transform stack from `xformOpOrder`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Xformable {
    pub ops: Vec<XformOpEntry>,

    /// `xformOpOrder` exactly as authored
    pub op_order: Vec<Token>,
}

impl Xformable {
    /// Local transform: ops composed in `xformOpOrder` order.
    pub fn local_matrix(&self) -> DMat4 {
        compose_xform_ops(&self.ops)
    }

    pub(crate) fn read(reader: &mut PropertyReader<'_>) -> Self {
        let authored = reader.take_prefixed(XFORM_OP_PREFIX);
        let op_order = reader.uniform::<Vec<Token>>("xformOpOrder").unwrap_or_default();

        let mut ops = Vec::with_capacity(op_order.len());
        for tok in &op_order {
            let (name, inverted) = match tok.as_str().strip_prefix(INVERT_PREFIX) {
                Some(rest) => (rest, true),
                None => (tok.as_str(), false),
            };
            let Some(prop) = authored.get(name) else {
                reader.push_error(SchemaError::MissingXformOp(name.to_string()));
                continue;
            };
            match parse_xform_op(name, prop) {
                Ok(Some(op)) => ops.push(XformOpEntry {
                    name: name.to_string(),
                    op,
                    inverted,
                }),
                Ok(None) => {}
                Err(e) => reader.push_error(e),
            }
        }

        for name in authored.keys() {
            let listed = op_order
                .iter()
                .any(|t| t.as_str().trim_start_matches(INVERT_PREFIX) == name.as_str());
            if !listed {
                reader.warn(format!(
                    "<{}>: `{}` is not listed in xformOpOrder and has no effect",
                    reader.prim_path(),
                    name
                ));
            }
        }

        Self { ops, op_order }
    }
}

/// Combine an ordered transform stack into a single matrix.
pub fn compose_xform_ops(ops: &[XformOpEntry]) -> DMat4 {
    let mut result = DMat4::IDENTITY;
    for op in ops {
        result *= op.to_matrix();
    }
    result
}

fn dvec3(v: &Value) -> Option<DVec3> {
    match v {
        Value::Double3(d) => Some(*d),
        Value::Float3(f) => Some(f.as_dvec3()),
        _ => None,
    }
}

fn degrees(v: &Value) -> Option<f64> {
    match v {
        Value::Double(d) => Some(*d),
        Value::Float(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Parse one `xformOp:<kind>[:suffix]` attribute. `Ok(None)` when it holds no value.
fn parse_xform_op(name: &str, prop: &Property) -> Result<Option<XformOp>, SchemaError> {
    let attr = prop
        .as_attribute()
        .ok_or_else(|| SchemaError::ExpectedAttribute(name.to_string()))?;
    let value = match &attr.value {
        Some(Value::Blocked) | None => return Ok(None),
        Some(v) => v,
    };

    let kind = name
        .strip_prefix(XFORM_OP_PREFIX)
        .and_then(|rest| rest.split(':').next())
        .unwrap_or("");

    let mismatch = |expected: &str| SchemaError::PropertyType {
        property: name.to_string(),
        expected: expected.to_string(),
        actual: value.type_name().to_string(),
    };

    let op = match kind {
        "translate" => XformOp::Translate(dvec3(value).ok_or_else(|| mismatch("double3"))?),
        "scale" => XformOp::Scale(dvec3(value).ok_or_else(|| mismatch("double3"))?),
        "rotateXYZ" => XformOp::RotateXYZ(dvec3(value).ok_or_else(|| mismatch("double3"))?),
        "rotateX" => XformOp::RotateX(degrees(value).ok_or_else(|| mismatch("double"))?),
        "rotateY" => XformOp::RotateY(degrees(value).ok_or_else(|| mismatch("double"))?),
        "rotateZ" => XformOp::RotateZ(degrees(value).ok_or_else(|| mismatch("double"))?),
        "orient" => match value {
            Value::Quatf(q) => XformOp::Orient(q.as_dquat()),
            _ => return Err(mismatch("quatf")),
        },
        "transform" => match value {
            Value::Matrix4d(m) => XformOp::Transform(*m),
            _ => return Err(mismatch("matrix4d")),
        },
        _ => {
            return Err(SchemaError::InvalidToken {
                property: name.to_string(),
                token: kind.to_string(),
                allowed: "translate, scale, rotateX, rotateY, rotateZ, rotateXYZ, orient, transform"
                    .to_string(),
            })
        }
    };
    Ok(Some(op))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Visibility {
    #[default]
    Inherited,
    Invisible,
}

impl TokenEnum for Visibility {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Visibility::Inherited, "inherited"),
        (Visibility::Invisible, "invisible"),
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Purpose {
    #[default]
    Default,
    Render,
    Proxy,
    Guide,
}

impl TokenEnum for Purpose {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Purpose::Default, "default"),
        (Purpose::Render, "render"),
        (Purpose::Proxy, "proxy"),
        (Purpose::Guide, "guide"),
    ];
}

/// Attributes shared by everything that can be drawn.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Imageable {
    pub visibility: Option<Visibility>,
    pub purpose: Option<Purpose>,

    /// Bounding box as `[min, max]`
    pub extent: Option<Vec<Vec3>>,
}

impl Imageable {
    pub(crate) fn read(reader: &mut PropertyReader<'_>) -> Self {
        Self {
            visibility: reader.token_enum("visibility"),
            purpose: reader.uniform_enum("purpose"),
            extent: reader.attr("extent"),
        }
    }
}
