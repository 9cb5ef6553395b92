//! Uncomposed layer: the declaration-only prim tree of a document.
//!
//! Used when a document is read as a sublayer, reference or payload source.
//! Prim specs keep their raw property maps; no schema reconstruction happens.

use std::collections::BTreeMap;

use serde::Serialize;
use strata_value::{Path, PropertyMap, Specifier};

use crate::meta::PrimMeta;
use crate::reader::VariantSet;
use crate::stage::StageMeta;

/// One declared prim, uncomposed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PrimSpec {
    pub name: String,
    pub specifier: Specifier,

    /// Declared type name, empty for typeless prims
    pub type_name: String,
    pub meta: PrimMeta,
    pub properties: PropertyMap,
    pub children: Vec<PrimSpec>,
    pub variant_sets: BTreeMap<String, VariantSet<PrimSpec>>,
}

impl PrimSpec {
    pub fn child(&self, name: &str) -> Option<&PrimSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    fn count(&self) -> usize {
        let variant_members: usize = self
            .variant_sets
            .values()
            .flat_map(|s| s.variants.values())
            .flat_map(|v| v.children.iter())
            .map(PrimSpec::count)
            .sum();
        1 + self.children.iter().map(PrimSpec::count).sum::<usize>() + variant_members
    }
}

/// A document read as a layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Layer {
    pub meta: StageMeta,
    pub prim_specs: Vec<PrimSpec>,
}

impl Layer {
    /// Number of prim specs, variant-owned specs included.
    pub fn prim_spec_count(&self) -> usize {
        self.prim_specs.iter().map(PrimSpec::count).sum()
    }

    /// Look up a spec by absolute path, following ordinary children only.
    pub fn find_prim_spec(&self, path: &Path) -> Option<&PrimSpec> {
        if !path.is_absolute() || !path.prop_part().is_empty() {
            return None;
        }
        let mut names = path.prim_part().split('/').filter(|s| !s.is_empty());
        let first = names.next()?;
        let mut spec = self.prim_specs.iter().find(|s| s.name == first)?;
        for name in names {
            spec = spec.child(name)?;
        }
        Some(spec)
    }
}
