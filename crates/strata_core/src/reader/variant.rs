//! Variant sets: grouping of variant-declared prims under their owner.

use std::collections::BTreeMap;

use serde::Serialize;
use strata_value::{Path, PropertyMap};

use super::table::{NodeTable, PrimIndex, VariantNodeMap};
use super::ReadError;
use crate::config::ReaderConfig;
use crate::diagnostics::Diagnostics;
use crate::meta::{normalize_prim_meta, PrimMeta, PrimMetaMap};

/// Contents of one `variant "name" { ... }` block, as delivered by the parser.
#[derive(Clone, Debug, Default)]
pub struct VariantContent {
    pub metas: PrimMetaMap,
    pub properties: PropertyMap,

    /// Prims declared inside the variant block
    pub prim_indices: Vec<PrimIndex>,
}

/// Variant set name -> variant name -> contents.
pub type VariantSetList = BTreeMap<String, BTreeMap<String, VariantContent>>;

/// A variant held in the node table until assembly.
#[derive(Clone, Debug, Default)]
pub struct VariantNode {
    pub meta: PrimMeta,

    /// Raw properties, not schema-reconstructed
    pub properties: PropertyMap,
    pub members: Vec<PrimIndex>,
}

/// An assembled variant set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantSet<N> {
    pub name: String,
    pub variants: BTreeMap<String, Variant<N>>,
}

impl<N> VariantSet<N> {
    pub fn variant(&self, name: &str) -> Option<&Variant<N>> {
        self.variants.get(name)
    }
}

/// An assembled variant: its own metadata, raw properties and member prims.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Variant<N> {
    pub name: String,
    pub meta: PrimMeta,
    pub properties: PropertyMap,
    pub children: Vec<N>,
}

/// Convert the parser's variant contents for `owner` into `VariantNode`s.
///
/// Every member index is claimed for `owner`; a member already claimed by
/// any variant is a structural error.
pub(crate) fn build_variant_sets<B>(
    table: &mut NodeTable<B>,
    owner: PrimIndex,
    owner_path: &Path,
    variant_sets: VariantSetList,
    config: &ReaderConfig,
    diag: &mut Diagnostics,
) -> Result<VariantNodeMap, ReadError> {
    let mut out = VariantNodeMap::new();

    for (set_name, variants) in variant_sets {
        let mut nodes = BTreeMap::new();
        for (variant_name, content) in variants {
            let normalized =
                normalize_prim_meta(&content.metas, config, diag).map_err(|source| ReadError::Meta {
                    path: owner_path
                        .append_variant_selection(&set_name, &variant_name)
                        .to_string(),
                    source,
                })?;
            for err in normalized.errors {
                diag.error(format!(
                    "<{}> variant {{{}={}}}: {}",
                    owner_path, set_name, variant_name, err
                ));
            }

            for &member in &content.prim_indices {
                table.claim_variant_member(owner, member)?;
            }

            log::debug!(
                "<{}> variant {{{}={}}}: {} member prims",
                owner_path,
                set_name,
                variant_name,
                content.prim_indices.len()
            );

            nodes.insert(
                variant_name,
                VariantNode {
                    meta: normalized.meta,
                    properties: content.properties,
                    members: content.prim_indices,
                },
            );
        }
        out.insert(set_name, nodes);
    }

    Ok(out)
}
