//! Strata Core - Scene reconstruction for USD-style documents.
//!
//! This crate provides:
//!
//! - **Reader session**: `StageReader` consumes parse events and builds the prim tree
//! - **Schemas**: typed reconstruction of geometry, lights, shading and skeleton prims
//! - **Stage / Layer**: the composed prim tree, or the raw declared one
//!
//! # Example
//!
//! ```ignore
//! use strata_core::{ReaderConfig, StageReader};
//!
//! let mut reader = StageReader::new(ReaderConfig::default());
//! // ... feed events from the document parser ...
//! let stage = reader.reconstruct_stage()?;
//! println!("Reconstructed {} prims", stage.prim_count());
//! for warning in reader.warnings() {
//!     println!("warning: {}", warning);
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod layer;
pub mod meta;
pub mod reader;
pub mod schema;
pub mod stage;

// Re-export commonly used types
pub use config::{ConfigError, ReaderConfig};
pub use diagnostics::Diagnostics;
pub use layer::{Layer, PrimSpec};
pub use meta::{PrimMeta, PrimMetaMap};
pub use reader::{LoadState, PrimEvent, PrimIndex, ReadError, ReadResult, StageMetaEvent, StageReader};
pub use schema::{PrimContent, SchemaError, SchemaRegistry};
pub use stage::{PlaybackMode, Prim, Stage, StageMeta};
