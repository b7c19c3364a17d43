//! IR edges (spec.md §3): directional, `CONTAINS` forms a tree.

use serde::{Deserialize, Serialize};

use crate::types::{EdgeKind, SymbolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrEdge {
    pub source_id: SymbolId,
    pub target_id: SymbolId,
    pub kind: EdgeKind,
}

impl IrEdge {
    pub fn new(source_id: SymbolId, target_id: SymbolId, kind: EdgeKind) -> Self {
        Self { source_id, target_id, kind }
    }
}
