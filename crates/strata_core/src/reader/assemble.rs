//! Bottom-up tree assembly out of a `NodeTable`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;

use super::table::{NodeTable, PrimIndex, TableError};
use super::variant::{Variant, VariantSet};

/// Errors that abort tree assembly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssembleError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Prim index {0} contains itself")]
    Cycle(PrimIndex),

    #[error("Prim index {index} is nested deeper than the limit of {limit}")]
    NestingTooDeep { index: PrimIndex, limit: usize },
}

/// A table payload that knows how to become a finished tree node.
pub trait AssembleNode {
    type Output;

    fn assemble(
        self,
        children: Vec<Self::Output>,
        variant_sets: BTreeMap<String, VariantSet<Self::Output>>,
    ) -> Self::Output;
}

/// Moves nodes out of a table into owned trees.
pub struct Assembler<'t, B> {
    table: &'t mut NodeTable<B>,
    max_depth: usize,

    /// Indices on the current recursion path
    visiting: HashSet<PrimIndex>,
}

impl<'t, B: AssembleNode> Assembler<'t, B> {
    pub fn new(table: &'t mut NodeTable<B>, max_depth: usize) -> Self {
        Self {
            table,
            max_depth,
            visiting: HashSet::new(),
        }
    }

    /// Assemble the subtree rooted at `index`.
    pub fn assemble(&mut self, index: PrimIndex) -> Result<B::Output, AssembleError> {
        self.assemble_rec(index, 0)
    }

    fn assemble_rec(&mut self, index: PrimIndex, depth: usize) -> Result<B::Output, AssembleError> {
        if !self.visiting.insert(index) {
            return Err(AssembleError::Cycle(index));
        }
        if depth > self.max_depth {
            return Err(AssembleError::NestingTooDeep {
                index,
                limit: self.max_depth,
            });
        }
        let result = self.assemble_node(index, depth);
        self.visiting.remove(&index);
        result
    }

    fn assemble_node(&mut self, index: PrimIndex, depth: usize) -> Result<B::Output, AssembleError> {
        let taken = self.table.take(index)?;

        // Variant members hang off their variant, never off the node.
        let mut consumed = BTreeSet::new();
        let mut variant_sets = BTreeMap::new();
        for (set_name, variants) in taken.variant_sets {
            let mut assembled = BTreeMap::new();
            for (variant_name, node) in variants {
                let mut children = Vec::with_capacity(node.members.len());
                for member in node.members {
                    consumed.insert(member);
                    children.push(self.assemble_rec(member, depth + 1)?);
                }
                assembled.insert(
                    variant_name.clone(),
                    Variant {
                        name: variant_name,
                        meta: node.meta,
                        properties: node.properties,
                        children,
                    },
                );
            }
            variant_sets.insert(
                set_name.clone(),
                VariantSet {
                    name: set_name,
                    variants: assembled,
                },
            );
        }

        let mut children = Vec::with_capacity(taken.children.len());
        for child in taken.children {
            if consumed.contains(&child) || taken.variant_owned.contains(&child) {
                continue;
            }
            children.push(self.assemble_rec(child, depth + 1)?);
        }

        Ok(taken.body.assemble(children, variant_sets))
    }
}
