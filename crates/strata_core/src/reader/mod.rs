//! Reader session: turns parse events into a `Stage` or a `Layer`.
//!
//! The document parser drives a `StageReader` through three callbacks:
//!
//! - `assign_prim_index` when it opens a prim block, before the body is parsed
//! - `on_prim` once the whole block (children included) has been parsed
//! - `on_stage_meta` for the document's header metadata
//!
//! Children therefore arrive before their parents. Each event is normalized
//! and reconstructed immediately and parked in a `NodeTable`; the tree is only
//! assembled by `reconstruct_stage` (or `get_as_layer`) after parsing ends.
//!
//! # Example
//!
//! ```
//! use strata_core::reader::{PrimEvent, StageReader};
//! use strata_core::ReaderConfig;
//! use strata_value::Path;
//!
//! let mut reader = StageReader::new(ReaderConfig::default());
//! let world = reader.assign_prim_index(None, "Xform")?;
//! let mesh = reader.assign_prim_index(Some(world), "Mesh")?;
//!
//! let world_path = Path::root().append_element("World");
//! reader.on_prim(PrimEvent::new(&world_path, "Mesh", "Mesh", mesh, Some(world)))?;
//! reader.on_prim(PrimEvent::new(&Path::root(), "World", "Xform", world, None))?;
//!
//! let stage = reader.reconstruct_stage()?;
//! assert_eq!(stage.prim_count(), 2);
//! # Ok::<(), strata_core::reader::ReadError>(())
//! ```

mod assemble;
mod events;
mod table;
mod variant;

use std::collections::BTreeMap;

use strata_value::{Path, PropertyMap, Specifier};
use thiserror::Error;

pub use assemble::{AssembleError, AssembleNode, Assembler};
pub use events::{PrimEvent, StageMetaEvent};
pub use table::{NodeTable, PrimIndex, TableError, TakenNode, VariantNodeMap};
pub use variant::{Variant, VariantContent, VariantNode, VariantSet, VariantSetList};

use crate::config::{ConfigError, ReaderConfig};
use crate::diagnostics::Diagnostics;
use crate::layer::{Layer, PrimSpec};
use crate::meta::{normalize_prim_meta, MetaError, PrimMeta, PrimMetaMap};
use crate::schema::{Axis, PrimContent, SchemaError, SchemaRegistry, TokenEnum};
use crate::stage::{PlaybackMode, Prim, Stage, StageMeta};
use variant::build_variant_sets;

/// Errors that abort a read.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Invalid prim name `{name}`: {reason}")]
    InvalidPrimName { name: String, reason: &'static str },

    #[error("Failed to reconstruct prim <{path}>: {source}")]
    Schema {
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error("Invalid metadata on prim <{path}>: {source}")]
    Meta {
        path: String,
        #[source]
        source: MetaError,
    },

    #[error("Node table error: {0}")]
    Table(#[from] TableError),

    #[error("Node table error at prim <{path}>: {source}")]
    PrimTable {
        path: String,
        #[source]
        source: TableError,
    },

    #[error("Tree assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stage metadata was already processed")]
    DuplicateStageMeta,

    #[error("Unsupported playbackMode `{0}`")]
    PlaybackMode(String),

    #[error("Invalid upAxis `{0}`")]
    UpAxis(String),

    #[error("{operation} is not available while loading as {state:?}")]
    WrongLoadState {
        operation: &'static str,
        state: LoadState,
    },

    #[error("Reader was already consumed by an earlier run or error")]
    Spent,
}

/// Result type for reader operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Why the document is being read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Top-level document: prims are schema-reconstructed into a `Stage`
    #[default]
    Toplevel,
    /// The following keep prims as uncomposed specs, read back with `get_as_layer`
    Sublayer,
    Reference,
    Payload,
}

impl LoadState {
    pub fn reconstructs_prims(self) -> bool {
        self == LoadState::Toplevel
    }
}

/// Table payload for stage mode.
#[derive(Debug)]
struct PendingPrim {
    element_name: String,
    specifier: Specifier,
    meta: PrimMeta,
    content: PrimContent,
    properties: PropertyMap,
}

impl AssembleNode for PendingPrim {
    type Output = Prim;

    fn assemble(self, children: Vec<Prim>, variant_sets: BTreeMap<String, VariantSet<Prim>>) -> Prim {
        Prim {
            element_name: self.element_name,
            specifier: self.specifier,
            meta: self.meta,
            content: self.content,
            properties: self.properties,
            children,
            variant_sets,
            abs_path: Path::default(),
            prim_id: 0,
        }
    }
}

/// Table payload for layer mode.
#[derive(Debug)]
struct PendingSpec {
    name: String,
    specifier: Specifier,
    type_name: String,
    meta: PrimMeta,
    properties: PropertyMap,
}

impl AssembleNode for PendingSpec {
    type Output = PrimSpec;

    fn assemble(
        self,
        children: Vec<PrimSpec>,
        variant_sets: BTreeMap<String, VariantSet<PrimSpec>>,
    ) -> PrimSpec {
        PrimSpec {
            name: self.name,
            specifier: self.specifier,
            type_name: self.type_name,
            meta: self.meta,
            properties: self.properties,
            children,
            variant_sets,
        }
    }
}

/// Reconstruction state for one document.
pub struct StageReader {
    config: ReaderConfig,
    registry: SchemaRegistry,
    load_state: LoadState,
    prims: NodeTable<PendingPrim>,
    specs: NodeTable<PendingSpec>,

    /// Populated toplevel prims, in declaration order
    toplevel: Vec<PrimIndex>,
    stage_meta: Option<StageMeta>,
    diag: Diagnostics,
    spent: bool,
}

impl StageReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self::with_registry(config, SchemaRegistry::builtin())
    }

    /// A reader dispatching through a custom schema registry.
    pub fn with_registry(config: ReaderConfig, registry: SchemaRegistry) -> Self {
        Self {
            config,
            registry,
            load_state: LoadState::Toplevel,
            prims: NodeTable::new(),
            specs: NodeTable::new(),
            toplevel: Vec::new(),
            stage_meta: None,
            diag: Diagnostics::new(),
            spent: false,
        }
    }

    /// A reader configured from JSON.
    pub fn from_config_json(json: &str) -> ReadResult<Self> {
        Ok(Self::new(ReaderConfig::from_json(json)?))
    }

    pub fn with_load_state(mut self, load_state: LoadState) -> Self {
        self.load_state = load_state;
        self
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn warnings(&self) -> &[String] {
        self.diag.warnings()
    }

    pub fn errors(&self) -> &[String] {
        self.diag.errors()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Record a fatal error. Nothing can be assembled afterwards.
    fn fail(&mut self, err: ReadError) -> ReadError {
        self.diag.error(err.to_string());
        self.spent = true;
        err
    }

    fn ensure_usable(&self) -> ReadResult<()> {
        if self.spent {
            Err(ReadError::Spent)
        } else {
            Ok(())
        }
    }

    /// Reserve a table slot for a prim block the parser just opened.
    pub fn assign_prim_index(
        &mut self,
        parent: Option<PrimIndex>,
        declared_type: &str,
    ) -> ReadResult<PrimIndex> {
        self.ensure_usable()?;
        let reserved = if self.load_state.reconstructs_prims() {
            self.prims.reserve(parent, declared_type)
        } else {
            self.specs.reserve(parent, declared_type)
        };
        reserved.map_err(|e| self.fail(e.into()))
    }

    /// Handle a fully parsed prim block.
    pub fn on_prim(&mut self, event: PrimEvent) -> ReadResult<()> {
        self.ensure_usable()?;
        let path = event.full_path.to_string();
        let result = if self.load_state.reconstructs_prims() {
            self.on_prim_reconstruct(event)
        } else {
            self.on_prim_spec(event)
        };
        result.map_err(|e| {
            let e = match e {
                ReadError::Table(source) => ReadError::PrimTable { path, source },
                other => other,
            };
            self.fail(e)
        })
    }

    fn on_prim_reconstruct(&mut self, event: PrimEvent) -> ReadResult<()> {
        let element_name = validate_prim_name(&event.prim_name)?;
        // Children were checked against the reserved type; hold the event to it.
        self.prims.expect_declared_type(event.prim_index, &event.type_name)?;
        let path = event.full_path;

        let meta = self.normalize_meta(&path, &event.metas)?;

        let parent_type = match event.parent_index {
            Some(p) => Some(self.prims.declared_type(p)?.to_string()),
            None => None,
        };
        let rec = self
            .registry
            .reconstruct(
                &event.type_name,
                &path,
                parent_type.as_deref(),
                &event.properties,
                &self.config,
                &mut self.diag,
            )
            .map_err(|source| ReadError::Schema {
                path: path.to_string(),
                source,
            })?;
        for err in &rec.errors {
            self.diag.error(format!("<{}> {}", path, err));
        }

        let variants = build_variant_sets(
            &mut self.prims,
            event.prim_index,
            &path,
            event.variant_sets,
            &self.config,
            &mut self.diag,
        )?;

        let body = PendingPrim {
            element_name,
            specifier: event.specifier,
            meta,
            content: rec.content,
            properties: rec.extra,
        };
        link(
            &mut self.prims,
            &mut self.toplevel,
            event.prim_index,
            event.parent_index,
            body,
            variants,
        )
    }

    fn on_prim_spec(&mut self, event: PrimEvent) -> ReadResult<()> {
        let name = validate_prim_name(&event.prim_name)?;
        self.specs.expect_declared_type(event.prim_index, &event.type_name)?;
        let path = event.full_path;
        let meta = self.normalize_meta(&path, &event.metas)?;

        let variants = build_variant_sets(
            &mut self.specs,
            event.prim_index,
            &path,
            event.variant_sets,
            &self.config,
            &mut self.diag,
        )?;

        let body = PendingSpec {
            name,
            specifier: event.specifier,
            type_name: event.type_name,
            meta,
            properties: event.properties,
        };
        link(
            &mut self.specs,
            &mut self.toplevel,
            event.prim_index,
            event.parent_index,
            body,
            variants,
        )
    }

    fn normalize_meta(
        &mut self,
        path: &Path,
        metas: &PrimMetaMap,
    ) -> ReadResult<PrimMeta> {
        let normalized =
            normalize_prim_meta(metas, &self.config, &mut self.diag).map_err(|source| {
                ReadError::Meta {
                    path: path.to_string(),
                    source,
                }
            })?;
        for err in &normalized.errors {
            self.diag.error(format!("<{}> {}", path, err));
        }
        Ok(normalized.meta)
    }

    /// Handle the document's header metadata. Delivered at most once.
    pub fn on_stage_meta(&mut self, event: StageMetaEvent) -> ReadResult<()> {
        self.ensure_usable()?;
        if self.stage_meta.is_some() {
            return Err(self.fail(ReadError::DuplicateStageMeta));
        }
        let meta = stage_meta_from_event(event).map_err(|e| self.fail(e))?;
        self.stage_meta = Some(meta);
        Ok(())
    }

    /// Assemble the composed stage. Only available in `LoadState::Toplevel`.
    ///
    /// On error no stage is produced and the reader is spent.
    pub fn reconstruct_stage(&mut self) -> ReadResult<Stage> {
        self.ensure_usable()?;
        if !self.load_state.reconstructs_prims() {
            return Err(ReadError::WrongLoadState {
                operation: "reconstruct_stage",
                state: self.load_state,
            });
        }
        self.spent = true;

        let mut table = std::mem::take(&mut self.prims);
        let toplevel = std::mem::take(&mut self.toplevel);
        let roots = assemble_roots(&mut table, toplevel, self.config.max_prim_nesting)
            .map_err(|e| self.fail(e))?;

        let stage = Stage::new(self.stage_meta.take().unwrap_or_default(), roots);
        log::info!(
            "Reconstructed stage: {} root prims, {} prims, {} warnings, {} errors",
            stage.root_prims().len(),
            stage.prim_count(),
            self.diag.warnings().len(),
            self.diag.errors().len()
        );
        Ok(stage)
    }

    /// Assemble the uncomposed layer. Not available in `LoadState::Toplevel`.
    pub fn get_as_layer(&mut self) -> ReadResult<Layer> {
        self.ensure_usable()?;
        if self.load_state.reconstructs_prims() {
            return Err(ReadError::WrongLoadState {
                operation: "get_as_layer",
                state: self.load_state,
            });
        }
        self.spent = true;

        let mut table = std::mem::take(&mut self.specs);
        let toplevel = std::mem::take(&mut self.toplevel);
        let prim_specs = assemble_roots(&mut table, toplevel, self.config.max_prim_nesting)
            .map_err(|e| self.fail(e))?;

        let layer = Layer {
            meta: self.stage_meta.take().unwrap_or_default(),
            prim_specs,
        };
        log::info!("Read layer with {} prim specs", layer.prim_spec_count());
        Ok(layer)
    }
}

/// Assemble every toplevel prim, then require that no slot was left behind.
fn assemble_roots<B: AssembleNode>(
    table: &mut NodeTable<B>,
    toplevel: Vec<PrimIndex>,
    max_depth: usize,
) -> ReadResult<Vec<B::Output>> {
    let mut assembler = Assembler::new(table, max_depth);
    let mut roots = Vec::with_capacity(toplevel.len());
    for idx in toplevel {
        roots.push(assembler.assemble(idx)?);
    }
    table.ensure_drained()?;
    Ok(roots)
}

/// Store `body` at `index` and hook it under its parent (or the toplevel list).
fn link<B>(
    table: &mut NodeTable<B>,
    toplevel: &mut Vec<PrimIndex>,
    index: PrimIndex,
    parent: Option<PrimIndex>,
    body: B,
    variants: VariantNodeMap,
) -> ReadResult<()> {
    table.populate(index, parent, body)?;
    table.set_variant_sets(index, variants)?;
    match parent {
        Some(p) => table.add_child(p, index)?,
        None => toplevel.push(index),
    }
    Ok(())
}

/// Check a prim name and return its element name.
fn validate_prim_name(name: &Path) -> ReadResult<String> {
    let invalid = |reason| ReadError::InvalidPrimName {
        name: name.full_path_name(),
        reason,
    };
    if !name.is_valid() || name.prim_part().is_empty() {
        return Err(invalid("prim name must not be empty"));
    }
    if name.is_absolute() || name.is_root() || name.prim_part().contains('/') {
        return Err(invalid("prim name must not start with '/' or contain '/'"));
    }
    if !name.prop_part().is_empty() {
        return Err(invalid("prim name must not contain a property part ('.')"));
    }
    Ok(name.prim_part().to_string())
}

fn stage_meta_from_event(event: StageMetaEvent) -> ReadResult<StageMeta> {
    let mut meta = StageMeta::default();

    if let Some(doc) = event.doc {
        meta.doc = doc;
    }
    if let Some(tok) = event.up_axis {
        meta.up_axis = Axis::from_token(tok.as_str()).ok_or(ReadError::UpAxis(tok.0))?;
    }
    meta.default_prim = event.default_prim;
    if let Some(v) = event.meters_per_unit {
        meta.meters_per_unit = v;
    }
    if let Some(v) = event.time_codes_per_second {
        meta.time_codes_per_second = v;
    }
    meta.start_time_code = event.start_time_code;
    meta.end_time_code = event.end_time_code;
    if let Some(v) = event.frames_per_second {
        meta.frames_per_second = v;
    }
    if let Some(v) = event.auto_play {
        meta.auto_play = v;
    }
    if let Some(tok) = event.playback_mode {
        meta.playback_mode =
            PlaybackMode::from_token(tok.as_str()).ok_or(ReadError::PlaybackMode(tok.0))?;
    }
    meta.sub_layers = event.sub_layers;
    if let Some(comment) = event.comment {
        meta.comment = comment;
    }
    meta.custom_layer_data = event.custom_layer_data;

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ApiSchema;
    use strata_value::{Attribute, ListEditQual, Relationship, Token, Value, Vec3};

    /// Parent index and path of a prim, for declaring its children.
    type Parent<'a> = Option<(PrimIndex, &'a Path)>;

    fn open(reader: &mut StageReader, parent: Parent<'_>, type_name: &str) -> PrimIndex {
        reader.assign_prim_index(parent.map(|p| p.0), type_name).unwrap()
    }

    fn event(parent: Parent<'_>, idx: PrimIndex, name: &str, type_name: &str) -> PrimEvent {
        let root = Path::root();
        let (parent_index, parent_path) = match parent {
            Some((i, p)) => (Some(i), p),
            None => (None, &root),
        };
        PrimEvent::new(parent_path, name, type_name, idx, parent_index)
    }

    #[test]
    fn test_reconstruct_hierarchy() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let world_path = Path::prim("/World");

        let world = open(&mut reader, None, "Xform");
        let mesh = open(&mut reader, Some((world, &world_path)), "Mesh");
        let ball = open(&mut reader, Some((world, &world_path)), "Sphere");

        reader
            .on_prim(
                event(Some((world, &world_path)), mesh, "Mesh", "Mesh").with_property(
                    "points",
                    Attribute::new(Value::Float3Array(vec![Vec3::ZERO, Vec3::X, Vec3::Y])),
                ),
            )
            .unwrap();
        reader
            .on_prim(
                event(Some((world, &world_path)), ball, "Ball", "Sphere")
                    .with_property("radius", Attribute::new(Value::Double(0.5))),
            )
            .unwrap();
        reader.on_prim(event(None, world, "World", "Xform")).unwrap();

        let stage = reader.reconstruct_stage().unwrap();
        assert_eq!(stage.root_prims().len(), 1);
        assert_eq!(stage.prim_count(), 3);

        let world = &stage.root_prims()[0];
        assert_eq!(world.type_name(), "Xform");
        let names: Vec<&str> = world.children.iter().map(|c| c.element_name.as_str()).collect();
        assert_eq!(names, vec!["Mesh", "Ball"]);

        let ball = stage.find_prim_at_path(&Path::prim("/World/Ball")).unwrap();
        assert!(matches!(&ball.content, PrimContent::Sphere(s) if s.radius == Some(0.5)));
        assert_eq!(ball.prim_id, 3);
        assert!(reader.errors().is_empty());
    }

    #[test]
    fn test_variant_children_attached_to_variant() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let model_path = Path::prim("/Model");
        let parent = Some((PrimIndex::new(0), &model_path));

        let model = open(&mut reader, None, "Xform");
        let plain = open(&mut reader, parent, "Scope");
        let red = open(&mut reader, parent, "Mesh");
        let blue = open(&mut reader, parent, "Mesh");

        reader.on_prim(event(parent, plain, "Plain", "Scope")).unwrap();
        reader.on_prim(event(parent, red, "RedGeo", "Mesh")).unwrap();
        reader.on_prim(event(parent, blue, "BlueGeo", "Mesh")).unwrap();
        reader
            .on_prim(
                event(None, model, "Model", "Xform")
                    .with_meta(
                        "variants",
                        ListEditQual::ResetToExplicit,
                        Value::Dictionary(
                            [("look".to_string(), Value::String("red".into()))].into_iter().collect(),
                        ),
                    )
                    .with_variant(
                        "look",
                        "red",
                        VariantContent {
                            prim_indices: vec![red],
                            ..Default::default()
                        },
                    )
                    .with_variant(
                        "look",
                        "blue",
                        VariantContent {
                            prim_indices: vec![blue],
                            ..Default::default()
                        },
                    ),
            )
            .unwrap();

        let stage = reader.reconstruct_stage().unwrap();
        let model = &stage.root_prims()[0];

        // Each prim appears exactly once: plain as a child, geos under their variant.
        assert_eq!(model.children.len(), 1);
        assert_eq!(model.children[0].element_name, "Plain");
        assert_eq!(model.variant_children("look", "red")[0].element_name, "RedGeo");
        assert_eq!(model.variant_children("look", "blue")[0].element_name, "BlueGeo");
        assert_eq!(model.meta.variant_selection("look"), Some("red"));
        assert_eq!(stage.prim_count(), 4);

        let red = stage.find_prim_at_path(&Path::prim("/Model{look=red}RedGeo")).unwrap();
        assert_eq!(red.type_name(), "Mesh");
    }

    #[test]
    fn test_double_variant_claim_produces_no_tree() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let model_path = Path::prim("/Model");
        let model = open(&mut reader, None, "");
        let parent = Some((model, &model_path));
        let geo = open(&mut reader, parent, "");

        reader.on_prim(event(parent, geo, "Geo", "")).unwrap();
        let content = || VariantContent {
            prim_indices: vec![geo],
            ..Default::default()
        };
        let err = reader
            .on_prim(
                event(None, model, "Model", "")
                    .with_variant("lod", "high", content())
                    .with_variant("lod", "low", content()),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ReadError::PrimTable { ref path, source: TableError::DuplicateVariantMember { .. } }
                if path == "/Model"
        ));
        assert!(err.to_string().contains("/Model"), "{}", err);
        assert_eq!(reader.errors().len(), 1);
        assert!(matches!(reader.reconstruct_stage(), Err(ReadError::Spent)));
    }

    #[test]
    fn test_unknown_prim_type() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let idx = open(&mut reader, None, "MyCustomType");
        reader.on_prim(event(None, idx, "Thing", "MyCustomType")).unwrap();
        let stage = reader.reconstruct_stage().unwrap();
        assert_eq!(stage.root_prims()[0].type_name(), "MyCustomType");
        assert!(stage.root_prims()[0].content.is_model());
        assert_eq!(reader.warnings().len(), 1);

        let mut reader = StageReader::new(ReaderConfig::strict());
        let idx = open(&mut reader, None, "MyCustomType");
        let err = reader.on_prim(event(None, idx, "Thing", "MyCustomType")).unwrap_err();
        assert!(err.to_string().contains("MyCustomType"));
        assert!(matches!(err, ReadError::Schema { source: SchemaError::UnknownPrimType(_), .. }));
    }

    #[test]
    fn test_geom_subset_parent_type() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let mesh_path = Path::prim("/Mesh");
        let mesh = open(&mut reader, None, "Mesh");
        let parent = Some((mesh, &mesh_path));
        let subset = open(&mut reader, parent, "GeomSubset");
        reader
            .on_prim(
                event(parent, subset, "Faces", "GeomSubset")
                    .with_property("indices", Attribute::new(Value::IntArray(vec![0, 1])))
                    .with_property("material:binding", Relationship::new(vec![Path::prim("/Mat")])),
            )
            .unwrap();
        reader.on_prim(event(None, mesh, "Mesh", "Mesh")).unwrap();
        let stage = reader.reconstruct_stage().unwrap();
        assert_eq!(stage.root_prims()[0].children[0].type_name(), "GeomSubset");

        let mut reader = StageReader::new(ReaderConfig::default());
        let xform_path = Path::prim("/X");
        let xform = open(&mut reader, None, "Xform");
        let parent = Some((xform, &xform_path));
        let subset = open(&mut reader, parent, "GeomSubset");
        let err = reader.on_prim(event(parent, subset, "Faces", "GeomSubset")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Mesh"), "{}", message);
        assert!(message.contains("/X/Faces"), "{}", message);
    }

    #[test]
    fn test_field_errors_do_not_abort() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let idx = open(&mut reader, None, "Xform");
        reader
            .on_prim(
                event(None, idx, "World", "Xform")
                    .with_meta("active", ListEditQual::ResetToExplicit, Value::Int(0))
                    .with_meta("kind", ListEditQual::ResetToExplicit, Value::Token("group".into()))
                    .with_meta(
                        "apiSchemas",
                        ListEditQual::Append,
                        Value::TokenArray(vec![Token::from("MaterialBindingAPI")]),
                    )
                    .with_meta("customThing", ListEditQual::ResetToExplicit, Value::Int(1)),
            )
            .unwrap();

        let stage = reader.reconstruct_stage().unwrap();
        let world = &stage.root_prims()[0];
        assert!(world.meta.is_active());
        assert!(world.meta.kind.is_some());
        assert!(!world.meta.has_api_schema(ApiSchema::MaterialBinding));
        assert!(world.meta.unregistered.contains_key("customThing"));

        assert_eq!(reader.errors().len(), 2);
        assert!(reader.errors().iter().any(|e| e.contains("apiSchemas")));
        assert!(reader.errors().iter().all(|e| e.contains("/World")));
        assert_eq!(reader.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_api_schema_denied() {
        let mut reader = StageReader::new(ReaderConfig::strict());
        let idx = open(&mut reader, None, "");
        let err = reader
            .on_prim(event(None, idx, "A", "").with_meta(
                "apiSchemas",
                ListEditQual::Prepend,
                Value::TokenArray(vec![Token::from("FancyAPI")]),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            ReadError::Meta { ref path, source: MetaError::UnknownApiSchema(_) } if path == "/A"
        ));
        assert!(err.to_string().contains("FancyAPI"), "{}", err);
    }

    #[test]
    fn test_invalid_prim_names() {
        for name in ["", "/Abs", "A/B"] {
            let mut reader = StageReader::new(ReaderConfig::default());
            let idx = open(&mut reader, None, "");
            let mut ev = event(None, idx, "X", "");
            ev.prim_name = Path::prim(name);
            assert!(
                matches!(reader.on_prim(ev), Err(ReadError::InvalidPrimName { .. })),
                "{}",
                name
            );
        }

        let mut reader = StageReader::new(ReaderConfig::default());
        let idx = open(&mut reader, None, "");
        let mut ev = event(None, idx, "X", "");
        ev.prim_name = Path::new("X", "points");
        assert!(matches!(reader.on_prim(ev), Err(ReadError::InvalidPrimName { .. })));
    }

    #[test]
    fn test_stage_meta() {
        let mut reader = StageReader::new(ReaderConfig::default());
        reader
            .on_stage_meta(StageMetaEvent {
                up_axis: Some(Token::from("Z")),
                default_prim: Some(Token::from("World")),
                meters_per_unit: Some(1.0),
                playback_mode: Some(Token::from("none")),
                ..Default::default()
            })
            .unwrap();
        let idx = open(&mut reader, None, "Xform");
        reader.on_prim(event(None, idx, "World", "Xform")).unwrap();

        let stage = reader.reconstruct_stage().unwrap();
        assert_eq!(stage.meta.up_axis, Axis::Z);
        assert_eq!(stage.meta.meters_per_unit, 1.0);
        assert_eq!(stage.meta.time_codes_per_second, 24.0);
        assert_eq!(stage.meta.playback_mode, PlaybackMode::None);
        assert_eq!(stage.default_prim().map(|p| p.element_name.as_str()), Some("World"));
    }

    #[test]
    fn test_stage_meta_errors() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let err = reader
            .on_stage_meta(StageMetaEvent {
                playback_mode: Some(Token::from("bounce")),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ReadError::PlaybackMode(ref m) if m == "bounce"));

        let mut reader = StageReader::new(ReaderConfig::default());
        reader.on_stage_meta(StageMetaEvent::default()).unwrap();
        assert!(matches!(
            reader.on_stage_meta(StageMetaEvent::default()),
            Err(ReadError::DuplicateStageMeta)
        ));
    }

    #[test]
    fn test_layer_mode_keeps_raw_properties() {
        let mut reader = StageReader::new(ReaderConfig::default()).with_load_state(LoadState::Reference);
        let asset_path = Path::prim("/Asset");
        let asset = open(&mut reader, None, "Xform");
        let parent = Some((asset, &asset_path));
        let geo = open(&mut reader, parent, "NotARealType");
        reader
            .on_prim(
                event(parent, geo, "Geo", "NotARealType")
                    .with_property("radius", Attribute::new(Value::Double(2.0))),
            )
            .unwrap();
        reader
            .on_prim(
                event(None, asset, "Asset", "Xform")
                    .with_specifier(Specifier::Over)
                    .with_meta(
                        "references",
                        ListEditQual::Prepend,
                        Value::Reference(strata_value::Reference::new("./base.usda", None)),
                    ),
            )
            .unwrap();

        assert!(matches!(reader.reconstruct_stage(), Err(ReadError::WrongLoadState { .. })));

        let layer = reader.get_as_layer().unwrap();
        assert_eq!(layer.prim_spec_count(), 2);
        let asset = &layer.prim_specs[0];
        assert_eq!(asset.specifier, Specifier::Over);
        assert_eq!(asset.meta.references().len(), 1);

        let geo = layer.find_prim_spec(&Path::prim("/Asset/Geo")).unwrap();
        assert_eq!(geo.type_name, "NotARealType");
        assert!(geo.properties.contains_key("radius"));
        // No schema reconstruction: no unknown-type or unknown-property warnings.
        assert!(reader.warnings().is_empty());
    }

    #[test]
    fn test_nesting_limit_from_config() {
        let mut reader = StageReader::from_config_json(r#"{ "max_prim_nesting": 1 }"#).unwrap();
        let a_path = Path::prim("/A");
        let b_path = Path::prim("/A/B");
        let a = open(&mut reader, None, "");
        let b = open(&mut reader, Some((a, &a_path)), "");
        let c = open(&mut reader, Some((b, &b_path)), "");
        reader.on_prim(event(Some((b, &b_path)), c, "C", "")).unwrap();
        reader.on_prim(event(Some((a, &a_path)), b, "B", "")).unwrap();
        reader.on_prim(event(None, a, "A", "")).unwrap();

        let err = reader.reconstruct_stage().unwrap_err();
        assert!(matches!(
            err,
            ReadError::Assemble(AssembleError::NestingTooDeep { limit: 1, .. })
        ));
        assert_eq!(reader.errors().len(), 1);
    }

    #[test]
    fn test_unpopulated_variant_member() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let model_path = Path::prim("/Model");
        let model = open(&mut reader, None, "");
        let ghost = open(&mut reader, Some((model, &model_path)), "");
        reader
            .on_prim(event(None, model, "Model", "").with_variant(
                "lod",
                "high",
                VariantContent {
                    prim_indices: vec![ghost],
                    ..Default::default()
                },
            ))
            .unwrap();

        let err = reader.reconstruct_stage().unwrap_err();
        assert!(matches!(
            err,
            ReadError::Assemble(AssembleError::Table(TableError::Unpopulated(i))) if i == ghost
        ));
    }

    #[test]
    fn test_reconstruct_twice_is_spent() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let idx = open(&mut reader, None, "");
        reader.on_prim(event(None, idx, "A", "")).unwrap();
        assert!(reader.reconstruct_stage().is_ok());
        assert!(matches!(reader.reconstruct_stage(), Err(ReadError::Spent)));
    }

    #[test]
    fn test_unpopulated_parent_fails_assembly() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let a_path = Path::prim("/A");
        let a = open(&mut reader, None, "Xform");
        let b = open(&mut reader, Some((a, &a_path)), "Mesh");
        reader.on_prim(event(Some((a, &a_path)), b, "B", "Mesh")).unwrap();

        // A's block never closed: B must not vanish silently.
        let err = reader.reconstruct_stage().unwrap_err();
        assert!(matches!(err, ReadError::Table(TableError::Unpopulated(i)) if i == a));
        assert_eq!(reader.errors().len(), 1);
    }

    #[test]
    fn test_unpopulated_parent_fails_layer() {
        let mut reader = StageReader::new(ReaderConfig::default()).with_load_state(LoadState::Sublayer);
        let a_path = Path::prim("/A");
        let a = open(&mut reader, None, "");
        let b = open(&mut reader, Some((a, &a_path)), "");
        reader.on_prim(event(Some((a, &a_path)), b, "B", "")).unwrap();

        let err = reader.get_as_layer().unwrap_err();
        assert!(matches!(err, ReadError::Table(TableError::Unpopulated(i)) if i == a));
    }

    #[test]
    fn test_event_type_must_match_reservation() {
        let mut reader = StageReader::new(ReaderConfig::default());
        let mesh_path = Path::prim("/P");
        let p = open(&mut reader, None, "Mesh");
        let parent = Some((p, &mesh_path));
        let subset = open(&mut reader, parent, "GeomSubset");
        reader.on_prim(event(parent, subset, "Faces", "GeomSubset")).unwrap();

        // The subset was accepted under a Mesh; the parent may not turn into an Xform.
        let err = reader.on_prim(event(None, p, "P", "Xform")).unwrap_err();
        match &err {
            ReadError::PrimTable {
                path,
                source: TableError::TypeMismatch { reserved, declared, .. },
            } => {
                assert_eq!(path, "/P");
                assert_eq!(reserved, "Mesh");
                assert_eq!(declared, "Xform");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(reader.reconstruct_stage(), Err(ReadError::Spent)));
    }
}
