//! Skeletal schemas.

use serde::Serialize;
use strata_value::{DMat4, Quat, Relationship, Token, Vec3};

use super::{Imageable, PrimContent, PropertyReader, SchemaError, Xformable};

/// Root of a skinned hierarchy.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SkelRoot {
    pub xformable: Xformable,
    pub imageable: Imageable,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Skeleton {
    pub xformable: Xformable,
    pub imageable: Imageable,

    /// Joint paths, e.g. `Hips/Spine`
    pub joints: Option<Vec<Token>>,
    pub joint_names: Option<Vec<Token>>,

    /// World-space bind pose, one per joint
    pub bind_transforms: Option<Vec<DMat4>>,

    /// Local rest pose, one per joint
    pub rest_transforms: Option<Vec<DMat4>>,

    /// `rel skel:animationSource`
    pub animation_source: Option<Relationship>,
}

impl Skeleton {
    pub fn joint_count(&self) -> usize {
        self.joints.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SkelAnimation {
    pub joints: Option<Vec<Token>>,
    pub translations: Option<Vec<Vec3>>,
    pub rotations: Option<Vec<Quat>>,
    pub scales: Option<Vec<Vec3>>,
    pub blend_shapes: Option<Vec<Token>>,
    pub blend_shape_weights: Option<Vec<f32>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BlendShape {
    pub offsets: Option<Vec<Vec3>>,
    pub normal_offsets: Option<Vec<Vec3>>,

    /// Sparse target points; all points when unset
    pub point_indices: Option<Vec<u32>>,
}

pub(super) fn reconstruct_skel_root(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::SkelRoot(SkelRoot {
        xformable: Xformable::read(reader),
        imageable: Imageable::read(reader),
    }))
}

pub(super) fn reconstruct_skeleton(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Skeleton(Skeleton {
        xformable: Xformable::read(reader),
        imageable: Imageable::read(reader),
        joints: reader.uniform("joints"),
        joint_names: reader.uniform("jointNames"),
        bind_transforms: reader.uniform("bindTransforms"),
        rest_transforms: reader.uniform("restTransforms"),
        animation_source: reader.relationship("skel:animationSource"),
    }))
}

pub(super) fn reconstruct_skel_animation(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::SkelAnimation(SkelAnimation {
        joints: reader.uniform("joints"),
        translations: reader.attr("translations"),
        rotations: reader.attr("rotations"),
        scales: reader.attr("scales"),
        blend_shapes: reader.uniform("blendShapes"),
        blend_shape_weights: reader.attr("blendShapeWeights"),
    }))
}

pub(super) fn reconstruct_blend_shape(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::BlendShape(BlendShape {
        offsets: reader.uniform("offsets"),
        normal_offsets: reader.uniform("normalOffsets"),
        point_indices: reader.indices("pointIndices"),
    }))
}
