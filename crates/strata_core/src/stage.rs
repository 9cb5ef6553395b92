//! Reconstructed stage: the composed, typed prim tree of one document.
//!
//! A `Stage` is built from fully assembled root prims. Building it runs the
//! finalizer pass that assigns every prim its absolute path and a stable id.

use std::collections::BTreeMap;

use serde::Serialize;
use strata_value::{DMat4, Dictionary, Path, PropertyMap, Specifier, Token};

use crate::meta::PrimMeta;
use crate::reader::VariantSet;
use crate::schema::{Axis, PrimContent, TokenEnum};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum PlaybackMode {
    None,
    #[default]
    Loop,
}

impl TokenEnum for PlaybackMode {
    const TOKENS: &'static [(Self, &'static str)] =
        &[(PlaybackMode::None, "none"), (PlaybackMode::Loop, "loop")];
}

/// Document-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageMeta {
    pub doc: String,
    pub up_axis: Axis,
    pub default_prim: Option<Token>,
    pub meters_per_unit: f64,
    pub time_codes_per_second: f64,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub frames_per_second: f64,
    pub auto_play: bool,
    pub playback_mode: PlaybackMode,

    /// Sublayer asset paths, strongest first
    pub sub_layers: Vec<String>,
    pub comment: String,
    pub custom_layer_data: Dictionary,
}

impl Default for StageMeta {
    fn default() -> Self {
        Self {
            doc: String::new(),
            up_axis: Axis::Y,
            default_prim: None,
            meters_per_unit: 0.01,
            time_codes_per_second: 24.0,
            start_time_code: None,
            end_time_code: None,
            frames_per_second: 24.0,
            auto_play: true,
            playback_mode: PlaybackMode::Loop,
            sub_layers: Vec::new(),
            comment: String::new(),
            custom_layer_data: Dictionary::new(),
        }
    }
}

/// A reconstructed prim.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prim {
    /// Element name (last path component)
    pub element_name: String,
    pub specifier: Specifier,
    pub meta: PrimMeta,

    /// Typed schema content
    pub content: PrimContent,

    /// Properties the schema did not recognize
    pub properties: PropertyMap,

    /// Direct children in declaration order
    pub children: Vec<Prim>,

    pub variant_sets: BTreeMap<String, VariantSet<Prim>>,

    /// Absolute path, set when the stage is built
    pub abs_path: Path,

    /// Stable id, unique within the stage and starting at 1
    pub prim_id: u64,
}

impl Prim {
    pub fn new(element_name: impl Into<String>, content: PrimContent) -> Self {
        Self {
            element_name: element_name.into(),
            specifier: Specifier::Def,
            meta: PrimMeta::default(),
            content,
            properties: PropertyMap::new(),
            children: Vec::new(),
            variant_sets: BTreeMap::new(),
            abs_path: Path::default(),
            prim_id: 0,
        }
    }

    /// Schema type name (declared type name for untyped models).
    pub fn type_name(&self) -> &str {
        self.content.type_name()
    }

    /// Local transform, identity for prims without a transform stack.
    pub fn local_matrix(&self) -> DMat4 {
        self.content
            .xformable()
            .map_or(DMat4::IDENTITY, |x| x.local_matrix())
    }

    pub fn child(&self, name: &str) -> Option<&Prim> {
        self.children.iter().find(|c| c.element_name == name)
    }

    /// Children owned by variant `variant` of set `set`.
    pub fn variant_children(&self, set: &str, variant: &str) -> &[Prim] {
        self.variant_sets
            .get(set)
            .and_then(|s| s.variant(variant))
            .map(|v| v.children.as_slice())
            .unwrap_or(&[])
    }
}

/// A composed stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stage {
    pub meta: StageMeta,
    root_prims: Vec<Prim>,
}

impl Stage {
    /// Build a stage from fully assembled root prims.
    pub fn new(meta: StageMeta, root_prims: Vec<Prim>) -> Self {
        let mut stage = Self { meta, root_prims };
        stage.finalize();
        stage
    }

    pub fn root_prims(&self) -> &[Prim] {
        &self.root_prims
    }

    /// Number of prims, variant-owned prims included.
    pub fn prim_count(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first iterator over every prim.
    pub fn iter(&self) -> PrimIter<'_> {
        PrimIter {
            stack: self.root_prims.iter().rev().collect(),
        }
    }

    pub fn find_prim_at_path(&self, path: &Path) -> Option<&Prim> {
        if !path.prop_part().is_empty() {
            return None;
        }
        self.iter().find(|p| p.abs_path.prim_part() == path.prim_part())
    }

    pub fn find_prim_by_id(&self, prim_id: u64) -> Option<&Prim> {
        if prim_id == 0 {
            return None;
        }
        self.iter().find(|p| p.prim_id == prim_id)
    }

    /// Prim named by the `defaultPrim` stage metadatum.
    pub fn default_prim(&self) -> Option<&Prim> {
        let name = self.meta.default_prim.as_ref()?;
        self.root_prims.iter().find(|p| p.element_name == name.as_str())
    }

    /// Assign absolute paths and ids. Runs over the finished tree.
    fn finalize(&mut self) {
        let mut next_id = 1u64;
        let root = Path::root();
        for prim in &mut self.root_prims {
            assign_paths(prim, &root, &mut next_id);
        }
        log::debug!("Finalized stage with {} prims", next_id - 1);
    }
}

fn assign_paths(prim: &mut Prim, parent_path: &Path, next_id: &mut u64) {
    prim.abs_path = parent_path.append_element(&prim.element_name);
    prim.prim_id = *next_id;
    *next_id += 1;

    for child in &mut prim.children {
        assign_paths(child, &prim.abs_path, next_id);
    }
    for (set_name, set) in &mut prim.variant_sets {
        for (variant_name, variant) in &mut set.variants {
            let variant_path = prim.abs_path.append_variant_selection(set_name, variant_name);
            for child in &mut variant.children {
                assign_paths(child, &variant_path, next_id);
            }
        }
    }
}

/// Pre-order prim iterator.
pub struct PrimIter<'a> {
    stack: Vec<&'a Prim>,
}

impl<'a> Iterator for PrimIter<'a> {
    type Item = &'a Prim;

    fn next(&mut self) -> Option<Self::Item> {
        let prim = self.stack.pop()?;
        let variant_children = prim
            .variant_sets
            .values()
            .flat_map(|s| s.variants.values())
            .flat_map(|v| v.children.iter());
        let pending: Vec<&Prim> = prim.children.iter().chain(variant_children).collect();
        self.stack.extend(pending.into_iter().rev());
        Some(prim)
    }
}
