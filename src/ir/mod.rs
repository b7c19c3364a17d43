//! Typed, graph-structured intermediate representation (spec.md §3, §4.2):
//! one arena-with-indices [`IrDocument`] per file, each function carrying a
//! [`Cfg`] and derived [`FunctionMetrics`].

mod cfg;
mod document;
mod edge;
mod generator;
mod node;

pub use cfg::{BlockKind, Cfg, CfgBlock, CfgBuilder, CfgEdge, CfgEdgeKind};
pub use document::IrDocument;
pub use edge::IrEdge;
pub use generator::{profile_for, IrGenerator, LanguageProfile};
pub use node::{FunctionMetrics, IrNode};
