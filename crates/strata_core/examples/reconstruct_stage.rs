//! Example: Feed a small scene through the reader and inspect the result.
//!
//! Run with: cargo run --example reconstruct_stage
//! Pass `--json` to dump the reconstructed stage as JSON.

use std::env;

use strata_core::reader::VariantContent;
use strata_core::schema::PrimContent;
use strata_core::{PrimEvent, ReaderConfig, StageMetaEvent, StageReader};
use strata_value::{Attribute, DVec3, ListEditQual, Path, Relationship, Token, Value, Vec3};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let dump_json = env::args().any(|a| a == "--json");
    let mut reader = StageReader::new(ReaderConfig::default());

    reader.on_stage_meta(StageMetaEvent {
        up_axis: Some(Token::from("Y")),
        default_prim: Some(Token::from("World")),
        meters_per_unit: Some(1.0),
        ..Default::default()
    })?;

    // The parser opens blocks top-down and closes them bottom-up.
    let world_path = Path::prim("/World");
    let looks_path = Path::prim("/World/Looks");
    let red_path = Path::prim("/World/Looks/Red");
    let hero_path = Path::prim("/World/Hero");

    let world = reader.assign_prim_index(None, "Xform")?;
    let looks = reader.assign_prim_index(Some(world), "Scope")?;
    let red = reader.assign_prim_index(Some(looks), "Material")?;
    let surface = reader.assign_prim_index(Some(red), "Shader")?;
    let hero = reader.assign_prim_index(Some(world), "Xform")?;
    let quad = reader.assign_prim_index(Some(hero), "Mesh")?;
    let proxy = reader.assign_prim_index(Some(hero), "Cube")?;

    reader.on_prim(
        PrimEvent::new(&red_path, "Surface", "Shader", surface, Some(red))
            .with_property("info:id", Attribute::uniform(Value::Token(Token::from("UsdPreviewSurface"))))
            .with_property(
                "inputs:diffuseColor",
                Attribute::new(Value::Float3(Vec3::new(0.8, 0.1, 0.1))),
            )
            .with_property("outputs:surface", Attribute::new(Value::Token(Token::from("")))),
    )?;
    reader.on_prim(
        PrimEvent::new(&looks_path, "Red", "Material", red, Some(looks)).with_property(
            "outputs:surface",
            Attribute::connected("token", Path::new("/World/Looks/Red/Surface", "outputs:surface")),
        ),
    )?;
    reader.on_prim(PrimEvent::new(&world_path, "Looks", "Scope", looks, Some(world)))?;

    reader.on_prim(
        PrimEvent::new(&hero_path, "Quad", "Mesh", quad, Some(hero))
            .with_property(
                "points",
                Attribute::new(Value::Float3Array(vec![
                    Vec3::new(-1.0, 0.0, -1.0),
                    Vec3::new(1.0, 0.0, -1.0),
                    Vec3::new(1.0, 0.0, 1.0),
                    Vec3::new(-1.0, 0.0, 1.0),
                ])),
            )
            .with_property("faceVertexCounts", Attribute::new(Value::IntArray(vec![4])))
            .with_property("faceVertexIndices", Attribute::new(Value::IntArray(vec![0, 1, 2, 3])))
            .with_property("material:binding", Relationship::new(vec![red_path.clone()])),
    )?;
    reader.on_prim(
        PrimEvent::new(&hero_path, "Proxy", "Cube", proxy, Some(hero))
            .with_property("size", Attribute::new(Value::Double(2.0))),
    )?;
    reader.on_prim(
        PrimEvent::new(&world_path, "Hero", "Xform", hero, Some(world))
            .with_property(
                "xformOp:translate",
                Attribute::new(Value::Double3(DVec3::new(0.0, 1.0, 0.0))),
            )
            .with_property(
                "xformOpOrder",
                Attribute::uniform(Value::TokenArray(vec![Token::from("xformOp:translate")])),
            )
            .with_meta(
                "variants",
                ListEditQual::ResetToExplicit,
                Value::Dictionary([("lod".to_string(), Value::String("full".into()))].into_iter().collect()),
            )
            .with_variant(
                "lod",
                "full",
                VariantContent {
                    prim_indices: vec![quad],
                    ..Default::default()
                },
            )
            .with_variant(
                "lod",
                "proxy",
                VariantContent {
                    prim_indices: vec![proxy],
                    ..Default::default()
                },
            ),
    )?;
    reader.on_prim(
        PrimEvent::new(&Path::root(), "World", "Xform", world, None)
            .with_meta("kind", ListEditQual::ResetToExplicit, Value::Token(Token::from("assembly"))),
    )?;

    let stage = reader.reconstruct_stage()?;

    println!("=== Stage ===");
    println!("Up axis: {:?}", stage.meta.up_axis);
    println!("Meters per unit: {}", stage.meta.meters_per_unit);
    println!(
        "Default prim: {}",
        stage.default_prim().map_or("<none>", |p| p.element_name.as_str())
    );
    println!("Prims: {}", stage.prim_count());

    println!("\n--- Prims ---");
    for prim in stage.iter() {
        println!("  [{}] {} ({})", prim.prim_id, prim.abs_path, prim.type_name());
        match &prim.content {
            PrimContent::Mesh(mesh) => {
                println!("       Triangles: {}", mesh.triangulate().len() / 3);
            }
            PrimContent::Shader(shader) => {
                if let Some(color) = shader.input::<Vec3>("diffuseColor") {
                    println!("       diffuseColor: ({:.2}, {:.2}, {:.2})", color.x, color.y, color.z);
                }
            }
            _ => {}
        }
        let pos = prim.local_matrix().transform_point3(DVec3::ZERO);
        if pos != DVec3::ZERO {
            println!("       Local offset: ({:.2}, {:.2}, {:.2})", pos.x, pos.y, pos.z);
        }
    }

    println!("\n--- Diagnostics ---");
    for warning in reader.warnings() {
        println!("  warning: {}", warning);
    }
    for error in reader.errors() {
        println!("  error: {}", error);
    }

    if dump_json {
        println!("\n{}", serde_json::to_string_pretty(&stage)?);
    }

    Ok(())
}
