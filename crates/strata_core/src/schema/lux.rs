//! Light schemas.

use serde::Serialize;
use strata_value::{Token, Vec3};

use super::{PrimContent, PropertyReader, SchemaError, Xformable};

/// Attributes shared by every light.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LightCommon {
    pub xformable: Xformable,
    pub intensity: Option<f32>,
    pub exposure: Option<f32>,
    pub color: Option<Vec3>,
    pub enable_color_temperature: Option<bool>,
    pub color_temperature: Option<f32>,
    pub normalize: Option<bool>,
}

impl LightCommon {
    fn read(reader: &mut PropertyReader<'_>) -> Self {
        Self {
            xformable: Xformable::read(reader),
            intensity: reader.attr("inputs:intensity"),
            exposure: reader.attr("inputs:exposure"),
            color: reader.attr("inputs:color"),
            enable_color_temperature: reader.attr("inputs:enableColorTemperature"),
            color_temperature: reader.attr("inputs:colorTemperature"),
            normalize: reader.attr("inputs:normalize"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SphereLight {
    pub light: LightCommon,
    pub radius: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DomeLight {
    pub light: LightCommon,

    /// Environment texture asset path
    pub texture_file: Option<String>,
    pub texture_format: Option<Token>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DiskLight {
    pub light: LightCommon,
    pub radius: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DistantLight {
    pub light: LightCommon,

    /// Angular diameter in degrees
    pub angle: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CylinderLight {
    pub light: LightCommon,
    pub radius: Option<f32>,
    pub length: Option<f32>,
}

pub(super) fn reconstruct_sphere_light(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::SphereLight(SphereLight {
        light: LightCommon::read(reader),
        radius: reader.attr("inputs:radius"),
    }))
}

pub(super) fn reconstruct_dome_light(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    let light = LightCommon::read(reader);
    let texture_file = reader.asset("inputs:texture:file");
    Ok(PrimContent::DomeLight(DomeLight {
        light,
        texture_file,
        texture_format: reader.attr("inputs:texture:format"),
    }))
}

pub(super) fn reconstruct_disk_light(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::DiskLight(DiskLight {
        light: LightCommon::read(reader),
        radius: reader.attr("inputs:radius"),
    }))
}

pub(super) fn reconstruct_distant_light(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::DistantLight(DistantLight {
        light: LightCommon::read(reader),
        angle: reader.attr("inputs:angle"),
    }))
}

pub(super) fn reconstruct_cylinder_light(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::CylinderLight(CylinderLight {
        light: LightCommon::read(reader),
        radius: reader.attr("inputs:radius"),
        length: reader.attr("inputs:length"),
    }))
}
