//! Node table: a dense arena of prim slots addressed by `PrimIndex`.
//!
//! Slots are reserved when the parser opens a prim block, populated once when
//! the prim's event arrives, and taken exactly once during tree assembly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::variant::VariantNode;

/// Handle into a `NodeTable`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PrimIndex(usize);

impl PrimIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for PrimIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised by node table access.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Prim index {index} exceeds node table size {len}")]
    OutOfRange { index: PrimIndex, len: usize },

    #[error("Prim index {0} was reserved but never populated")]
    Unpopulated(PrimIndex),

    #[error("Prim index {0} is already populated")]
    AlreadyPopulated(PrimIndex),

    #[error("Prim index {0} was already consumed")]
    Consumed(PrimIndex),

    #[error("Prim index {index} was reserved under parent {reserved:?} but declared under {declared:?}")]
    ParentMismatch {
        index: PrimIndex,
        reserved: Option<PrimIndex>,
        declared: Option<PrimIndex>,
    },

    #[error("Prim index {index} was reserved as `{reserved}` but declared as `{declared}`")]
    TypeMismatch {
        index: PrimIndex,
        reserved: String,
        declared: String,
    },

    #[error("Prim index {0} was populated but is not reachable from any toplevel prim")]
    Orphaned(PrimIndex),

    #[error("Prim index {member} is claimed by variants of both {first} and {second}")]
    DuplicateVariantMember {
        member: PrimIndex,
        first: PrimIndex,
        second: PrimIndex,
    },
}

/// Variant set name -> variant name -> variant.
pub type VariantNodeMap = BTreeMap<String, BTreeMap<String, VariantNode>>;

#[derive(Debug)]
enum SlotState<B> {
    Reserved,
    Populated(B),
    Consumed,
}

#[derive(Debug)]
struct NodeRecord<B> {
    parent: Option<PrimIndex>,
    declared_type: String,
    children: Vec<PrimIndex>,
    variant_owned: BTreeSet<PrimIndex>,
    variant_sets: VariantNodeMap,

    /// Node whose variant owns this one
    claimed_by: Option<PrimIndex>,
    state: SlotState<B>,
}

/// Everything a slot held, moved out by `NodeTable::take`.
#[derive(Debug)]
pub struct TakenNode<B> {
    pub body: B,
    pub children: Vec<PrimIndex>,
    pub variant_owned: BTreeSet<PrimIndex>,
    pub variant_sets: VariantNodeMap,
}

/// Append-only arena of node records.
#[derive(Debug)]
pub struct NodeTable<B> {
    records: Vec<NodeRecord<B>>,
}

impl<B> Default for NodeTable<B> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<B> NodeTable<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reserve a fresh slot. Content is supplied later with `populate`.
    pub fn reserve(
        &mut self,
        parent: Option<PrimIndex>,
        declared_type: &str,
    ) -> Result<PrimIndex, TableError> {
        if let Some(p) = parent {
            self.check(p)?;
        }
        let index = PrimIndex(self.records.len());
        self.records.push(NodeRecord {
            parent,
            declared_type: declared_type.to_string(),
            children: Vec::new(),
            variant_owned: BTreeSet::new(),
            variant_sets: VariantNodeMap::new(),
            claimed_by: None,
            state: SlotState::Reserved,
        });
        Ok(index)
    }

    fn check(&self, index: PrimIndex) -> Result<(), TableError> {
        if index.0 < self.records.len() {
            Ok(())
        } else {
            Err(TableError::OutOfRange {
                index,
                len: self.records.len(),
            })
        }
    }

    /// Type name recorded when the slot was reserved.
    pub fn declared_type(&self, index: PrimIndex) -> Result<&str, TableError> {
        self.check(index)?;
        Ok(&self.records[index.0].declared_type)
    }

    /// Fail unless `type_name` is the type the slot was reserved with.
    pub fn expect_declared_type(&self, index: PrimIndex, type_name: &str) -> Result<(), TableError> {
        let reserved = self.declared_type(index)?;
        if reserved != type_name {
            return Err(TableError::TypeMismatch {
                index,
                reserved: reserved.to_string(),
                declared: type_name.to_string(),
            });
        }
        Ok(())
    }

    /// Fill a reserved slot. `declared_parent` must match the reservation.
    pub fn populate(
        &mut self,
        index: PrimIndex,
        declared_parent: Option<PrimIndex>,
        body: B,
    ) -> Result<(), TableError> {
        self.check(index)?;
        let record = &mut self.records[index.0];
        match record.state {
            SlotState::Reserved => {}
            SlotState::Populated(_) => return Err(TableError::AlreadyPopulated(index)),
            SlotState::Consumed => return Err(TableError::Consumed(index)),
        }
        if record.parent != declared_parent {
            return Err(TableError::ParentMismatch {
                index,
                reserved: record.parent,
                declared: declared_parent,
            });
        }
        record.state = SlotState::Populated(body);
        Ok(())
    }

    /// Append `child` to `parent`'s ordered child list.
    pub fn add_child(&mut self, parent: PrimIndex, child: PrimIndex) -> Result<(), TableError> {
        self.check(parent)?;
        self.check(child)?;
        self.records[parent.0].children.push(child);
        Ok(())
    }

    /// Mark `member` as owned by a variant of `owner`.
    ///
    /// A member may be claimed once across the whole table.
    pub fn claim_variant_member(
        &mut self,
        owner: PrimIndex,
        member: PrimIndex,
    ) -> Result<(), TableError> {
        self.check(owner)?;
        self.check(member)?;
        if let Some(first) = self.records[member.0].claimed_by {
            return Err(TableError::DuplicateVariantMember {
                member,
                first,
                second: owner,
            });
        }
        self.records[member.0].claimed_by = Some(owner);
        self.records[owner.0].variant_owned.insert(member);
        Ok(())
    }

    pub fn set_variant_sets(
        &mut self,
        index: PrimIndex,
        variant_sets: VariantNodeMap,
    ) -> Result<(), TableError> {
        self.check(index)?;
        self.records[index.0].variant_sets = variant_sets;
        Ok(())
    }

    /// Fail on the first slot that assembly never took.
    ///
    /// Run after every toplevel prim has been assembled.
    pub fn ensure_drained(&self) -> Result<(), TableError> {
        for (i, record) in self.records.iter().enumerate() {
            match record.state {
                SlotState::Consumed => {}
                SlotState::Reserved => return Err(TableError::Unpopulated(PrimIndex(i))),
                SlotState::Populated(_) => return Err(TableError::Orphaned(PrimIndex(i))),
            }
        }
        Ok(())
    }

    /// Move a populated slot's content out. Each slot can be taken once.
    pub fn take(&mut self, index: PrimIndex) -> Result<TakenNode<B>, TableError> {
        self.check(index)?;
        let record = &mut self.records[index.0];
        match std::mem::replace(&mut record.state, SlotState::Consumed) {
            SlotState::Populated(body) => Ok(TakenNode {
                body,
                children: std::mem::take(&mut record.children),
                variant_owned: std::mem::take(&mut record.variant_owned),
                variant_sets: std::mem::take(&mut record.variant_sets),
            }),
            SlotState::Reserved => {
                record.state = SlotState::Reserved;
                Err(TableError::Unpopulated(index))
            }
            SlotState::Consumed => Err(TableError::Consumed(index)),
        }
    }
}
