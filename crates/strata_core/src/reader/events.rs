//! Parse events delivered by the document parser.

use std::collections::BTreeMap;

use strata_value::{Dictionary, ListEditQual, Path, Property, PropertyMap, Specifier, Token, Value};

use super::table::PrimIndex;
use super::variant::{VariantContent, VariantSetList};
use crate::meta::PrimMetaMap;

/// One fully parsed prim block.
#[derive(Clone, Debug, Default)]
pub struct PrimEvent {
    /// Absolute path of the prim in the document
    pub full_path: Path,
    pub specifier: Specifier,
    pub type_name: String,

    /// Element name as written (a relative, single-element path)
    pub prim_name: Path,
    pub prim_index: PrimIndex,
    pub parent_index: Option<PrimIndex>,
    pub properties: PropertyMap,
    pub metas: PrimMetaMap,
    pub variant_sets: VariantSetList,
}

impl PrimEvent {
    /// A `def` event for `name` under `parent_path`.
    pub fn new(
        parent_path: &Path,
        name: &str,
        type_name: &str,
        prim_index: PrimIndex,
        parent_index: Option<PrimIndex>,
    ) -> Self {
        Self {
            full_path: parent_path.append_element(name),
            type_name: type_name.to_string(),
            prim_name: Path::prim(name),
            prim_index,
            parent_index,
            ..Default::default()
        }
    }

    pub fn with_specifier(mut self, specifier: Specifier) -> Self {
        self.specifier = specifier;
        self
    }

    pub fn with_property(mut self, name: &str, property: impl Into<Property>) -> Self {
        self.properties.insert(name.to_string(), property.into());
        self
    }

    pub fn with_meta(mut self, key: &str, qual: ListEditQual, value: Value) -> Self {
        self.metas.insert(key.to_string(), (qual, value));
        self
    }

    pub fn with_variant(mut self, set: &str, variant: &str, content: VariantContent) -> Self {
        self.variant_sets
            .entry(set.to_string())
            .or_insert_with(BTreeMap::new)
            .insert(variant.to_string(), content);
        self
    }
}

/// Document-level metadata, delivered at most once per document.
#[derive(Clone, Debug, Default)]
pub struct StageMetaEvent {
    pub doc: Option<String>,
    pub up_axis: Option<Token>,
    pub default_prim: Option<Token>,
    pub meters_per_unit: Option<f64>,
    pub time_codes_per_second: Option<f64>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub frames_per_second: Option<f64>,
    pub auto_play: Option<bool>,
    pub playback_mode: Option<Token>,
    pub sub_layers: Vec<String>,
    pub comment: Option<String>,
    pub custom_layer_data: Dictionary,
}
