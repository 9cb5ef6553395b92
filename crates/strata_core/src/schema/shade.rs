//! Shading schemas: materials, shaders and node graphs.

use serde::Serialize;
use strata_value::{Attribute, FromValue, Path, PropertyMap, Token};

use super::{PrimContent, PropertyReader, SchemaError};

/// Material prim. Terminal outputs are connections into its shader network.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Material {
    /// `outputs:surface.connect`
    pub surface: Option<Path>,
    pub displacement: Option<Path>,
    pub volume: Option<Path>,

    /// Public interface (`inputs:*`)
    pub inputs: PropertyMap,

    /// Remaining `outputs:*`, e.g. render-context specific terminals
    pub outputs: PropertyMap,
}

/// Shader node.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Shader {
    /// `uniform token info:id`, e.g. `UsdPreviewSurface`
    pub shader_id: Option<Token>,

    pub inputs: PropertyMap,
    pub outputs: PropertyMap,
}

impl Shader {
    /// Authored value of `inputs:<name>`.
    pub fn input<T: FromValue>(&self, name: &str) -> Option<T> {
        self.input_attr(name).and_then(|a| a.get::<T>())
    }

    /// Connection source of `inputs:<name>`.
    pub fn input_connection(&self, name: &str) -> Option<&Path> {
        self.input_attr(name).and_then(|a| a.connection.as_ref())
    }

    fn input_attr(&self, name: &str) -> Option<&Attribute> {
        self.inputs
            .get(&format!("inputs:{}", name))
            .and_then(|p| p.as_attribute())
    }
}

/// Shader sub-network with its own interface.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodeGraph {
    pub inputs: PropertyMap,
    pub outputs: PropertyMap,
}

pub(super) fn reconstruct_material(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    let surface = reader.connection("outputs:surface");
    let displacement = reader.connection("outputs:displacement");
    let volume = reader.connection("outputs:volume");
    Ok(PrimContent::Material(Material {
        surface,
        displacement,
        volume,
        inputs: reader.take_prefixed("inputs:"),
        outputs: reader.take_prefixed("outputs:"),
    }))
}

pub(super) fn reconstruct_shader(reader: &mut PropertyReader<'_>) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::Shader(Shader {
        shader_id: reader.uniform("info:id"),
        inputs: reader.take_prefixed("inputs:"),
        outputs: reader.take_prefixed("outputs:"),
    }))
}

pub(super) fn reconstruct_node_graph(
    reader: &mut PropertyReader<'_>,
) -> Result<PrimContent, SchemaError> {
    Ok(PrimContent::NodeGraph(NodeGraph {
        inputs: reader.take_prefixed("inputs:"),
        outputs: reader.take_prefixed("outputs:"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderConfig;
    use crate::diagnostics::Diagnostics;
    use crate::schema::{Reconstructed, SchemaRegistry};
    use strata_value::{Value, Vec3};

    fn reconstruct(type_name: &str, props: &PropertyMap) -> Reconstructed {
        let mut diag = Diagnostics::new();
        SchemaRegistry::builtin()
            .reconstruct(type_name, &Path::prim("/Looks/M"), None, props, &ReaderConfig::default(), &mut diag)
            .unwrap()
    }

    #[test]
    fn test_material_outputs() {
        let mut props = PropertyMap::new();
        props.insert(
            "outputs:surface".into(),
            Attribute::connected("token", Path::new("/Looks/M/PBR", "outputs:surface")).into(),
        );
        props.insert(
            "outputs:mtlx:surface".into(),
            Attribute::connected("token", Path::new("/Looks/M/Mtlx", "outputs:out")).into(),
        );

        let rec = reconstruct("Material", &props);
        assert!(rec.extra.is_empty());

        let PrimContent::Material(mat) = rec.content else {
            panic!("Expected Material");
        };
        assert_eq!(mat.surface, Some(Path::new("/Looks/M/PBR", "outputs:surface")));
        assert_eq!(mat.displacement, None);
        assert!(mat.outputs.contains_key("outputs:mtlx:surface"));
        assert!(!mat.outputs.contains_key("outputs:surface"));
    }

    #[test]
    fn test_preview_surface_shader() {
        let mut props = PropertyMap::new();
        props.insert(
            "info:id".into(),
            Attribute::uniform(Value::Token("UsdPreviewSurface".into())).into(),
        );
        props.insert(
            "inputs:diffuseColor".into(),
            Attribute::new(Value::Float3(Vec3::new(0.8, 0.1, 0.1))).into(),
        );
        props.insert(
            "inputs:roughness".into(),
            Attribute::connected("float", Path::new("/Looks/M/Tex", "outputs:r")).into(),
        );
        props.insert("outputs:surface".into(), Attribute::connected("token", Path::default()).into());

        let rec = reconstruct("Shader", &props);
        let PrimContent::Shader(shader) = rec.content else {
            panic!("Expected Shader");
        };
        assert_eq!(shader.shader_id, Some(Token::from("UsdPreviewSurface")));
        assert_eq!(shader.input::<Vec3>("diffuseColor"), Some(Vec3::new(0.8, 0.1, 0.1)));
        assert_eq!(
            shader.input_connection("roughness"),
            Some(&Path::new("/Looks/M/Tex", "outputs:r"))
        );
        assert_eq!(shader.outputs.len(), 1);
    }
}
