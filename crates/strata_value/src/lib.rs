//! Strata Value - typed values and properties carried by parse events.
//!
//! The reconstruction engine in `strata_core` never looks at source text. The
//! parser hands it these types instead:
//!
//! - **Values**: `Value`, `Token`, `Dictionary` and the `FromValue` extraction trait
//! - **Paths**: `Path` (prim part + property part)
//! - **Properties**: `Attribute`, `Relationship`, `Property`, `PropertyMap`
//! - **Composition inputs**: `Reference`, `Payload`, `ListEditQual`, `Specifier`

// Re-export glam for the fixed-size vector/matrix catalog
pub use glam::{DMat4, DQuat, DVec3, Quat, Vec2, Vec3};

mod path;
mod property;
mod value;

pub use path::Path;
pub use property::{
    Attribute, ListEditQual, Payload, Property, PropertyMap, Reference, Relationship, Specifier,
    Variability,
};
pub use value::{Dictionary, FromValue, Token, Value};
