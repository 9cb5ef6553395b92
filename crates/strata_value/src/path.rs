//! Scene paths.

use std::fmt;

use serde::Serialize;

/// A scene path split into its prim part and optional property part.
///
/// `/World/Mesh.points` has prim part `/World/Mesh` and property part `points`.
/// A bare element name such as `Mesh` is a relative path with one element.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Path {
    prim: String,
    prop: String,
}

impl Path {
    pub fn new(prim: impl Into<String>, prop: impl Into<String>) -> Self {
        Self {
            prim: prim.into(),
            prop: prop.into(),
        }
    }

    /// A path with only a prim part.
    pub fn prim(prim: impl Into<String>) -> Self {
        Self::new(prim, "")
    }

    /// The absolute root path `/`.
    pub fn root() -> Self {
        Self::prim("/")
    }

    pub fn prim_part(&self) -> &str {
        &self.prim
    }

    pub fn prop_part(&self) -> &str {
        &self.prop
    }

    pub fn is_valid(&self) -> bool {
        !self.prim.is_empty() || !self.prop.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.prim.starts_with('/')
    }

    pub fn is_root(&self) -> bool {
        self.prim == "/"
    }

    /// Last element of the prim part (`Mesh` for `/World/Mesh`).
    pub fn element_name(&self) -> &str {
        let tail = self.prim.rsplit('/').next().unwrap_or("");
        // `/A{set=v}B` -> `B`
        tail.rsplit('}').next().unwrap_or(tail)
    }

    /// Append a child prim element.
    pub fn append_element(&self, name: &str) -> Path {
        let prim = if self.prim.is_empty() || self.is_root() {
            format!("/{}", name)
        } else if self.prim.ends_with('}') {
            format!("{}{}", self.prim, name)
        } else {
            format!("{}/{}", self.prim, name)
        };
        Path::prim(prim)
    }

    /// Append a variant selection: `/A` -> `/A{set=variant}`.
    pub fn append_variant_selection(&self, set: &str, variant: &str) -> Path {
        Path::prim(format!("{}{{{}={}}}", self.prim, set, variant))
    }

    /// Append a property: `/A` -> `/A.prop`.
    pub fn append_property(&self, prop: &str) -> Path {
        Path::new(self.prim.clone(), prop)
    }

    /// Full textual form, prim and property parts joined by `.`.
    pub fn full_path_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prop.is_empty() {
            write!(f, "{}", self.prim)
        } else {
            write!(f, "{}.{}", self.prim, self.prop)
        }
    }
}
