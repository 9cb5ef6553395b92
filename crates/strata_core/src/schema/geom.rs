//! Geometry schemas: scopes, transforms, gprims, subsets and cameras.

use serde::Serialize;
use strata_value::{PropertyMap, Relationship, Token, Vec2, Vec3};

use super::{Imageable, PrimContent, PropertyReader, SchemaError, TokenEnum, Xformable};

/// Grouping prim with no transform.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Scope {
    pub imageable: Imageable,
}

/// Transform prim.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Xform {
    pub xformable: Xformable,
    pub imageable: Imageable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Orientation {
    #[default]
    RightHanded,
    LeftHanded,
}

impl TokenEnum for Orientation {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Orientation::RightHanded, "rightHanded"),
        (Orientation::LeftHanded, "leftHanded"),
    ];
}

/// Attributes shared by every geometric primitive.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Gprim {
    pub xformable: Xformable,
    pub imageable: Imageable,
    pub double_sided: Option<bool>,
    pub orientation: Option<Orientation>,

    /// `rel material:binding`
    pub material_binding: Option<Relationship>,

    /// Every `primvars:*` property, names unchanged
    pub primvars: PropertyMap,
}

impl Gprim {
    fn read(reader: &mut PropertyReader<'_>) -> Self {
        Self {
            xformable: Xformable::read(reader),
            imageable: Imageable::read(reader),
            double_sided: reader.uniform("doubleSided"),
            orientation: reader.uniform_enum("orientation"),
            material_binding: reader.relationship("material:binding"),
            primvars: reader.take_prefixed("primvars:"),
        }
    }

    /// `primvars:displayColor`, when authored as `color3f[]`/`float3[]`.
    pub fn display_color(&self) -> Option<Vec<Vec3>> {
        self.primvars
            .get("primvars:displayColor")
            .and_then(|p| p.as_attribute())
            .and_then(|a| a.get::<Vec<Vec3>>())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SubdivisionScheme {
    #[default]
    CatmullClark,
    Loop,
    Bilinear,
    None,
}

impl TokenEnum for SubdivisionScheme {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (SubdivisionScheme::CatmullClark, "catmullClark"),
        (SubdivisionScheme::Loop, "loop"),
        (SubdivisionScheme::Bilinear, "bilinear"),
        (SubdivisionScheme::None, "none"),
    ];
}

/// Polygon mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomMesh {
    pub gprim: Gprim,

    /// Vertex positions
    pub points: Option<Vec<Vec3>>,

    /// Vertex normals (optional)
    pub normals: Option<Vec<Vec3>>,

    /// Number of vertices per face
    pub face_vertex_counts: Option<Vec<i32>>,

    /// Vertex indices for each face
    pub face_vertex_indices: Option<Vec<i32>>,

    pub subdivision_scheme: Option<SubdivisionScheme>,

    /// `rel skel:skeleton`
    pub skeleton: Option<Relationship>,

    /// `skel:blendShapes`
    pub blend_shapes: Option<Vec<Token>>,
}

impl GeomMesh {
    /// Triangulate the mesh with fan triangulation.
    ///
    /// Faces with fewer than 3 vertices are skipped. Triangulation stops at
    /// the first face that runs past the end of `face_vertex_indices` or
    /// holds a negative index.
    pub fn triangulate(&self) -> Vec<u32> {
        let counts = self.face_vertex_counts.as_deref().unwrap_or_default();
        let face_indices = self.face_vertex_indices.as_deref().unwrap_or_default();

        let mut indices = Vec::new();
        let mut vertex_offset = 0usize;

        for &count in counts {
            let Ok(count) = usize::try_from(count) else {
                break;
            };
            let Some(face) = face_indices.get(vertex_offset..vertex_offset + count) else {
                break;
            };
            vertex_offset += count;
            if count < 3 {
                continue;
            }
            let Ok(face) = face.iter().map(|&i| u32::try_from(i)).collect::<Result<Vec<_>, _>>() else {
                break;
            };

            // (0,1,2), (0,2,3), ... (0,n-2,n-1)
            for i in 1..(count - 1) {
                indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
            }
        }

        indices
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SubsetElementType {
    #[default]
    Face,
    Point,
    Edge,
}

impl TokenEnum for SubsetElementType {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (SubsetElementType::Face, "face"),
        (SubsetElementType::Point, "point"),
        (SubsetElementType::Edge, "edge"),
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SubsetFamilyType {
    Partition,
    NonOverlapping,
    #[default]
    Unrestricted,
}

impl TokenEnum for SubsetFamilyType {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (SubsetFamilyType::Partition, "partition"),
        (SubsetFamilyType::NonOverlapping, "nonOverlapping"),
        (SubsetFamilyType::Unrestricted, "unrestricted"),
    ];
}

/// A named subset of a mesh's faces. Only valid directly under a `Mesh`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomSubset {
    pub element_type: Option<SubsetElementType>,
    pub family_type: Option<SubsetFamilyType>,
    pub family_name: Option<Token>,

    /// Element indices into the parent mesh
    pub indices: Option<Vec<u32>>,

    pub material_binding: Option<Relationship>,
}

/// Points cloud.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomPoints {
    pub gprim: Gprim,
    pub points: Option<Vec<Vec3>>,
    pub normals: Option<Vec<Vec3>>,
    pub widths: Option<Vec<f32>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomSphere {
    pub gprim: Gprim,
    pub radius: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomCube {
    pub gprim: Gprim,
    pub size: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl TokenEnum for Axis {
    const TOKENS: &'static [(Self, &'static str)] =
        &[(Axis::X, "X"), (Axis::Y, "Y"), (Axis::Z, "Z")];
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomCone {
    pub gprim: Gprim,
    pub radius: Option<f64>,
    pub height: Option<f64>,
    pub axis: Option<Axis>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomCylinder {
    pub gprim: Gprim,
    pub radius: Option<f64>,
    pub height: Option<f64>,
    pub axis: Option<Axis>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomCapsule {
    pub gprim: Gprim,
    pub radius: Option<f64>,
    pub height: Option<f64>,
    pub axis: Option<Axis>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CurveType {
    Cubic,
    Linear,
}

impl TokenEnum for CurveType {
    const TOKENS: &'static [(Self, &'static str)] =
        &[(CurveType::Cubic, "cubic"), (CurveType::Linear, "linear")];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CurveBasis {
    Bezier,
    Bspline,
    CatmullRom,
}

impl TokenEnum for CurveBasis {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (CurveBasis::Bezier, "bezier"),
        (CurveBasis::Bspline, "bspline"),
        (CurveBasis::CatmullRom, "catmullRom"),
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CurveWrap {
    Nonperiodic,
    Periodic,
    Pinned,
}

impl TokenEnum for CurveWrap {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (CurveWrap::Nonperiodic, "nonperiodic"),
        (CurveWrap::Periodic, "periodic"),
        (CurveWrap::Pinned, "pinned"),
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomBasisCurves {
    pub gprim: Gprim,
    pub curve_type: Option<CurveType>,
    pub basis: Option<CurveBasis>,
    pub wrap: Option<CurveWrap>,
    pub points: Option<Vec<Vec3>>,
    pub curve_vertex_counts: Option<Vec<i32>>,
    pub widths: Option<Vec<f32>>,
    pub normals: Option<Vec<Vec3>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

impl TokenEnum for Projection {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Projection::Perspective, "perspective"),
        (Projection::Orthographic, "orthographic"),
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeomCamera {
    pub xformable: Xformable,
    pub imageable: Imageable,
    pub projection: Option<Projection>,
    pub focal_length: Option<f32>,
    pub horizontal_aperture: Option<f32>,
    pub vertical_aperture: Option<f32>,
    pub clipping_range: Option<Vec2>,
    pub f_stop: Option<f32>,
    pub focus_distance: Option<f32>,
}

pub(super) fn reconstruct_scope(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Scope(Scope {
        imageable: Imageable::read(reader),
    }))
}

pub(super) fn reconstruct_xform(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Xform(Xform {
        xformable: Xformable::read(reader),
        imageable: Imageable::read(reader),
    }))
}

pub(super) fn reconstruct_mesh(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Mesh(GeomMesh {
        gprim: Gprim::read(reader),
        points: reader.attr("points"),
        normals: reader.attr("normals"),
        face_vertex_counts: reader.attr("faceVertexCounts"),
        face_vertex_indices: reader.attr("faceVertexIndices"),
        subdivision_scheme: reader.uniform_enum("subdivisionScheme"),
        skeleton: reader.relationship("skel:skeleton"),
        blend_shapes: reader.uniform("skel:blendShapes"),
    }))
}

pub(super) fn reconstruct_geom_subset(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    match reader.parent_type() {
        Some("Mesh") => {}
        other => {
            return Err(SchemaError::ParentType {
                prim_type: "GeomSubset",
                prim: reader.prim_path().to_string(),
                required: "Mesh",
                actual: match other {
                    Some(t) if !t.is_empty() => format!("`{}`", t),
                    Some(_) => "an untyped prim".to_string(),
                    None => "the pseudo root".to_string(),
                },
            })
        }
    }

    Ok(PrimContent::GeomSubset(GeomSubset {
        element_type: reader.uniform_enum("elementType"),
        family_type: reader.uniform_enum("familyType"),
        family_name: reader.uniform("familyName"),
        indices: reader.indices("indices"),
        material_binding: reader.relationship("material:binding"),
    }))
}

pub(super) fn reconstruct_points(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Points(GeomPoints {
        gprim: Gprim::read(reader),
        points: reader.attr("points"),
        normals: reader.attr("normals"),
        widths: reader.attr("widths"),
    }))
}

pub(super) fn reconstruct_sphere(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Sphere(GeomSphere {
        gprim: Gprim::read(reader),
        radius: reader.attr("radius"),
    }))
}

pub(super) fn reconstruct_cube(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Cube(GeomCube {
        gprim: Gprim::read(reader),
        size: reader.attr("size"),
    }))
}

pub(super) fn reconstruct_cone(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Cone(GeomCone {
        gprim: Gprim::read(reader),
        radius: reader.attr("radius"),
        height: reader.attr("height"),
        axis: reader.uniform_enum("axis"),
    }))
}

pub(super) fn reconstruct_cylinder(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Cylinder(GeomCylinder {
        gprim: Gprim::read(reader),
        radius: reader.attr("radius"),
        height: reader.attr("height"),
        axis: reader.uniform_enum("axis"),
    }))
}

pub(super) fn reconstruct_capsule(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Capsule(GeomCapsule {
        gprim: Gprim::read(reader),
        radius: reader.attr("radius"),
        height: reader.attr("height"),
        axis: reader.uniform_enum("axis"),
    }))
}

pub(super) fn reconstruct_basis_curves(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::BasisCurves(GeomBasisCurves {
        gprim: Gprim::read(reader),
        curve_type: reader.uniform_enum("type"),
        basis: reader.uniform_enum("basis"),
        wrap: reader.uniform_enum("wrap"),
        points: reader.attr("points"),
        curve_vertex_counts: reader.attr("curveVertexCounts"),
        widths: reader.attr("widths"),
        normals: reader.attr("normals"),
    }))
}

pub(super) fn reconstruct_camera(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Camera(GeomCamera {
        xformable: Xformable::read(reader),
        imageable: Imageable::read(reader),
        projection: reader.token_enum("projection"),
        focal_length: reader.attr("focalLength"),
        horizontal_aperture: reader.attr("horizontalAperture"),
        vertical_aperture: reader.attr("verticalAperture"),
        clipping_range: reader.attr("clippingRange"),
        f_stop: reader.attr("fStop"),
        focus_distance: reader.attr("focusDistance"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderConfig;
    use crate::diagnostics::Diagnostics;
    use crate::schema::{Reconstructed, SchemaRegistry};
    use strata_value::{Attribute, Path, Value};

    fn reconstruct(
        type_name: &str,
        parent_type: Option<&str>,
        props: &PropertyMap,
    ) -> Result<Reconstructed, SchemaError> {
        let mut diag = Diagnostics::new();
        SchemaRegistry::builtin().reconstruct(
            type_name,
            &Path::prim("/Root/Prim"),
            parent_type,
            props,
            &ReaderConfig::default(),
            &mut diag,
        )
    }

    #[test]
    fn test_triangulate_triangle() {
        let mesh = GeomMesh {
            face_vertex_counts: Some(vec![3]),
            face_vertex_indices: Some(vec![0, 1, 2]),
            ..Default::default()
        };

        let indices = mesh.triangulate();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_triangulate_quad() {
        let mesh = GeomMesh {
            face_vertex_counts: Some(vec![4]),
            face_vertex_indices: Some(vec![0, 1, 2, 3]),
            ..Default::default()
        };

        let indices = mesh.triangulate();
        // Quad (0,1,2,3) -> triangles (0,1,2) and (0,2,3)
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_triangulate_truncated_indices() {
        let mesh = GeomMesh {
            face_vertex_counts: Some(vec![3, 3]),
            face_vertex_indices: Some(vec![0, 1, 2, 3]),
            ..Default::default()
        };

        assert_eq!(mesh.triangulate(), vec![0, 1, 2]);
    }

    #[test]
    fn test_mesh_fields() {
        let mut props = PropertyMap::new();
        props.insert(
            "points".into(),
            Attribute::new(Value::Float3Array(vec![Vec3::ZERO, Vec3::X, Vec3::Y])).into(),
        );
        props.insert("faceVertexCounts".into(), Attribute::new(Value::IntArray(vec![3])).into());
        props.insert("faceVertexIndices".into(), Attribute::new(Value::IntArray(vec![0, 1, 2])).into());
        props.insert("doubleSided".into(), Attribute::uniform(Value::Bool(true)).into());
        props.insert(
            "primvars:displayColor".into(),
            Attribute::new(Value::Float3Array(vec![Vec3::ONE])).into(),
        );
        props.insert(
            "material:binding".into(),
            Relationship::new(vec![Path::prim("/Looks/Red")]).into(),
        );

        let rec = reconstruct("Mesh", None, &props).unwrap();
        assert!(rec.errors.is_empty());
        assert!(rec.extra.is_empty());

        let PrimContent::Mesh(mesh) = rec.content else {
            panic!("Expected Mesh");
        };
        assert_eq!(mesh.points.as_ref().map(Vec::len), Some(3));
        assert_eq!(mesh.gprim.double_sided, Some(true));
        assert_eq!(mesh.gprim.display_color(), Some(vec![Vec3::ONE]));
        assert_eq!(
            mesh.gprim.material_binding.as_ref().and_then(|r| r.target()),
            Some(&Path::prim("/Looks/Red"))
        );
        assert_eq!(mesh.triangulate(), vec![0, 1, 2]);
    }

    #[test]
    fn test_relationship_where_attribute_expected() {
        let mut props = PropertyMap::new();
        props.insert("points".into(), Relationship::new(vec![Path::prim("/P")]).into());

        let rec = reconstruct("Points", None, &props).unwrap();
        assert_eq!(rec.errors, vec![SchemaError::ExpectedAttribute("points".into())]);
    }

    fn subset_props() -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("elementType".into(), Attribute::uniform(Value::Token("face".into())).into());
        props.insert(
            "familyType".into(),
            Attribute::uniform(Value::Token("partition".into())).into(),
        );
        props.insert(
            "familyName".into(),
            Attribute::uniform(Value::Token("materialBind".into())).into(),
        );
        props.insert("indices".into(), Attribute::new(Value::IntArray(vec![0, 2, 4])).into());
        props.insert(
            "material:binding".into(),
            Relationship::new(vec![Path::prim("/Looks/Blue")]).into(),
        );
        props
    }

    #[test]
    fn test_geom_subset_under_mesh() {
        let rec = reconstruct("GeomSubset", Some("Mesh"), &subset_props()).unwrap();
        assert!(rec.errors.is_empty());

        let PrimContent::GeomSubset(subset) = rec.content else {
            panic!("Expected GeomSubset");
        };
        assert_eq!(subset.element_type, Some(SubsetElementType::Face));
        assert_eq!(subset.family_type, Some(SubsetFamilyType::Partition));
        assert_eq!(subset.family_name, Some(Token::from("materialBind")));
        assert_eq!(subset.indices, Some(vec![0, 2, 4]));
        assert!(subset.material_binding.is_some());
    }

    #[test]
    fn test_geom_subset_requires_mesh_parent() {
        let err = reconstruct("GeomSubset", Some("Xform"), &subset_props()).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, SchemaError::ParentType { required: "Mesh", .. }));

        let err = reconstruct("GeomSubset", None, &subset_props()).unwrap_err();
        assert!(err.to_string().contains("pseudo root"));
    }

    #[test]
    fn test_geom_subset_negative_index() {
        let mut props = subset_props();
        props.insert("indices".into(), Attribute::new(Value::IntArray(vec![1, -3])).into());

        let rec = reconstruct("GeomSubset", Some("Mesh"), &props).unwrap();
        let PrimContent::GeomSubset(subset) = &rec.content else {
            panic!("Expected GeomSubset");
        };
        assert!(subset.indices.is_none());
        assert_eq!(
            rec.errors,
            vec![SchemaError::OutOfRange { property: "indices".into(), index: 1, value: -3 }]
        );
    }

    #[test]
    fn test_geom_subset_invalid_element_type() {
        let mut props = subset_props();
        props.insert("elementType".into(), Attribute::uniform(Value::Token("vertex".into())).into());

        let rec = reconstruct("GeomSubset", Some("Mesh"), &props).unwrap();
        assert!(matches!(
            &rec.errors[0],
            SchemaError::InvalidToken { property, token, .. } if property == "elementType" && token == "vertex"
        ));
    }

    #[test]
    fn test_camera() {
        let mut props = PropertyMap::new();
        props.insert("focalLength".into(), Attribute::new(Value::Float(35.0)).into());
        props.insert(
            "clippingRange".into(),
            Attribute::new(Value::Float2(Vec2::new(0.1, 1000.0))).into(),
        );
        props.insert("projection".into(), Attribute::new(Value::Token("orthographic".into())).into());

        let rec = reconstruct("Camera", None, &props).unwrap();
        let PrimContent::Camera(cam) = rec.content else {
            panic!("Expected Camera");
        };
        assert_eq!(cam.focal_length, Some(35.0));
        assert_eq!(cam.projection, Some(Projection::Orthographic));
        assert_eq!(cam.clipping_range, Some(Vec2::new(0.1, 1000.0)));
    }
}
