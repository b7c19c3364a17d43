//! Type and signature entities (spec.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionLevel {
    Raw,
    Builtin,
    Local,
    Module,
    Project,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeFlavor {
    Primitive,
    Builtin,
    User,
    External,
    TypeVar,
    Generic,
    Callable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeEntity {
    pub id: u32,
    pub raw: String,
    pub flavor: TypeFlavor,
    pub generic_param_ids: Vec<u32>,
    pub resolution_level: ResolutionLevel,
}

impl TypeEntity {
    pub fn new(id: u32, raw: impl Into<String>, flavor: TypeFlavor, resolution_level: ResolutionLevel) -> Self {
        Self { id, raw: raw.into(), flavor, generic_param_ids: Vec::new(), resolution_level }
    }

    /// Enrichment is the only permitted in-place mutation (spec.md §3): the
    /// entity's resolution level only ever moves forward.
    pub fn enrich(&mut self, raw: impl Into<String>, level: ResolutionLevel) {
        if level > self.resolution_level {
            self.raw = raw.into();
            self.resolution_level = level;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Positional,
    Keyword,
    Variadic,
    KwOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_id: Option<u32>,
    pub default: Option<String>,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntity {
    pub id: u32,
    pub parameters: Vec<Parameter>,
    pub return_type_id: Option<u32>,
    pub visibility: String,
    pub is_async: bool,
    pub is_static: bool,
    pub is_classmethod: bool,
}
