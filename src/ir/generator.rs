//! Single-pass IR generation (spec.md §4.2): one iterative traversal of the
//! parsed tree per file, dispatching on a per-language handler table rather
//! than an if/else chain, producing an [`IrDocument`] that tolerates
//! `error`-kind nodes without aborting the file.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::FileError;
use crate::parsing::{parser_for_extension, python, rust, AstNode, AstTree};
use crate::types::{EdgeKind, FileId, NodeKind, Span, SymbolId};

use super::cfg::{Cfg, CfgBuilder};
use super::document::IrDocument;
use super::edge::IrEdge;
use super::node::{FunctionMetrics, IrNode};

/// What a raw tree-sitter node kind means to the traversal (spec.md §4.2):
/// branch/loop/try feed a function's metrics, call/import/assign feed its
/// accumulator, function/class open a new IR node, and skip kinds are never
/// descended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Skip,
    Branch,
    Loop,
    Try,
    Call,
    Import,
    Assign,
    Function,
    Class,
}

fn role_table(
    skip: &'static [&'static str],
    branch: &'static [&'static str],
    loop_kinds: &'static [&'static str],
    try_kinds: &'static [&'static str],
    call: &'static [&'static str],
    import: &'static [&'static str],
    assign: &'static [&'static str],
    function: &'static [&'static str],
    class: &'static [&'static str],
) -> HashMap<&'static str, NodeRole> {
    let mut map = HashMap::new();
    for kinds in [
        (skip, NodeRole::Skip),
        (branch, NodeRole::Branch),
        (loop_kinds, NodeRole::Loop),
        (try_kinds, NodeRole::Try),
        (call, NodeRole::Call),
        (import, NodeRole::Import),
        (assign, NodeRole::Assign),
        (function, NodeRole::Function),
        (class, NodeRole::Class),
    ] {
        let (set, role) = kinds;
        for &kind in set {
            map.insert(kind, role);
        }
    }
    map
}

static RUST_ROLES: LazyLock<HashMap<&'static str, NodeRole>> = LazyLock::new(|| {
    role_table(
        rust::SKIP_KINDS,
        rust::BRANCH_KINDS,
        rust::LOOP_KINDS,
        rust::TRY_KINDS,
        rust::CALL_KINDS,
        rust::IMPORT_KINDS,
        rust::ASSIGN_KINDS,
        rust::FUNCTION_KINDS,
        rust::CLASS_KINDS,
    )
});

static PYTHON_ROLES: LazyLock<HashMap<&'static str, NodeRole>> = LazyLock::new(|| {
    role_table(
        python::SKIP_KINDS,
        python::BRANCH_KINDS,
        python::LOOP_KINDS,
        python::TRY_KINDS,
        python::CALL_KINDS,
        python::IMPORT_KINDS,
        python::ASSIGN_KINDS,
        python::FUNCTION_KINDS,
        python::CLASS_KINDS,
    )
});

/// Per-language node-kind classification (spec.md §4.2): an O(1) lookup
/// from raw tree-sitter node kind to [`NodeRole`], built once per language.
pub struct LanguageProfile {
    pub roles: &'static HashMap<&'static str, NodeRole>,
    pub name_field: &'static str,
}

pub fn profile_for(language_id: &str) -> Option<LanguageProfile> {
    match language_id {
        "rust" => Some(LanguageProfile { roles: &RUST_ROLES, name_field: "name" }),
        "python" => Some(LanguageProfile { roles: &PYTHON_ROLES, name_field: "name" }),
        _ => None,
    }
}

impl LanguageProfile {
    fn role(&self, kind: &str) -> Option<NodeRole> {
        self.roles.get(kind).copied()
    }
}

/// One explicit-stack frame: the AST node to visit next, the `SymbolId` of
/// its nearest enclosing IR node, and the enclosing function's accumulator
/// (`None` at module scope).
struct Frame<'a> {
    node: AstNode<'a>,
    parent: SymbolId,
}

struct FunctionAccumulator {
    branch_count: u32,
    loop_count: u32,
    has_try: bool,
    calls: Vec<String>,
    assigns: Vec<String>,
    imports: Vec<String>,
    cfg: CfgBuilder,
}

impl FunctionAccumulator {
    fn new() -> Self {
        Self {
            branch_count: 0,
            loop_count: 0,
            has_try: false,
            calls: Vec::new(),
            assigns: Vec::new(),
            imports: Vec::new(),
            cfg: CfgBuilder::new(),
        }
    }
}

pub struct IrGenerator {
    next_id: u32,
}

impl IrGenerator {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Starts id allocation at `start` instead of 1. Lets each file in a
    /// parallel parse batch own a disjoint `SymbolId` block, so a merged
    /// symbol graph never sees two files hand out the same id (spec.md
    /// §4.8/§5: parse/IR-generate run on a worker pool, and `SymbolGraph`
    /// merges every file's document into one shared index).
    pub fn with_start(start: u32) -> Self {
        Self { next_id: start.max(1) }
    }

    fn alloc_id(&mut self) -> SymbolId {
        let id = SymbolId::new(self.next_id).expect("next_id starts at 1 and only increments");
        self.next_id += 1;
        id
    }

    /// Parses `source` (dispatching by `file_extension`) and builds the
    /// `IrDocument` for it. Returns [`FileError::Parse`] only when no parser
    /// is registered for the extension; malformed syntax inside a supported
    /// language surfaces as `error`-kind nodes, not an `Err`.
    pub fn generate_file(
        &mut self,
        file_id: FileId,
        file_path: &str,
        file_extension: &str,
        source: &str,
    ) -> Result<IrDocument, FileError> {
        let parser = parser_for_extension(file_extension).ok_or_else(|| FileError::Parse {
            path: file_path.into(),
            reason: format!("no parser registered for extension '{file_extension}'"),
        })?;
        let profile = profile_for(parser.language_id()).ok_or_else(|| FileError::Parse {
            path: file_path.into(),
            reason: format!("no language profile for '{}'", parser.language_id()),
        })?;
        let tree = parser.parse(source);
        Ok(self.walk(file_id, file_path, &tree, &profile))
    }

    fn walk(&mut self, file_id: FileId, file_path: &str, tree: &AstTree, profile: &LanguageProfile) -> IrDocument {
        let mut doc = IrDocument::new(file_id, file_path);

        let root_span = Span::new(file_id, 0, 0, 0, 0);
        let root_id = self.alloc_id();
        doc.push_node(IrNode::new(root_id, NodeKind::File, file_path, file_path, file_id, root_span, None));

        let mut stack: Vec<Frame> = tree
            .root()
            .children()
            .into_iter()
            .map(|c| Frame { node: c, parent: root_id })
            .collect();

        // Enclosing-function context, keyed by the function's SymbolId, alive
        // only while its subtree is on the stack; metrics are finalized and
        // attached to the node when the function's last descendant pops.
        let mut fn_stack: Vec<(SymbolId, FunctionAccumulator, u32)> = Vec::new();

        while let Some(Frame { node, parent }) = stack.pop() {
            let kind = node.kind();
            if kind == "error" {
                let (r0, c0, r1, c1) = node.span();
                let err_id = self.alloc_id();
                doc.push_node(IrNode::error_node(
                    err_id,
                    file_id,
                    Span::new(file_id, r0, c0, r1, c1),
                    "parse error",
                ));
                continue;
            }
            let role = profile.role(kind);
            if role == Some(NodeRole::Skip) {
                continue;
            }

            if let Some((_, acc, _)) = fn_stack.last_mut() {
                match role {
                    Some(NodeRole::Branch) => acc.branch_count += 1,
                    Some(NodeRole::Loop) => acc.loop_count += 1,
                    Some(NodeRole::Try) => acc.has_try = true,
                    Some(NodeRole::Call) => acc.calls.push(node.text().to_string()),
                    Some(NodeRole::Assign) => acc.assigns.push(node.text().to_string()),
                    Some(NodeRole::Import) => acc.imports.push(node.text().to_string()),
                    _ => {}
                }
            } else if role == Some(NodeRole::Import) {
                let (r0, c0, r1, c1) = node.span();
                let import_id = self.alloc_id();
                doc.push_node(IrNode::new(
                    import_id,
                    NodeKind::Import,
                    format!("{file_path}::{}", node.text().trim()),
                    node.text().trim(),
                    file_id,
                    Span::new(file_id, r0, c0, r1, c1),
                    Some(parent),
                ));
                doc.push_edge(IrEdge::new(parent, import_id, EdgeKind::Contains));
            }

            let is_function = role == Some(NodeRole::Function);
            let is_class = role == Some(NodeRole::Class);

            let next_parent = if is_function || is_class {
                let (r0, c0, r1, c1) = node.span();
                let span = Span::new(file_id, r0, c0, r1, c1);
                let name = node
                    .child_by_field(profile.name_field)
                    .map(|n| n.text().to_string())
                    .unwrap_or_else(|| "<anonymous>".to_string());
                let node_kind = if is_function { NodeKind::Function } else { NodeKind::Class };
                let fqn = format!("{file_path}::{name}");
                let id = self.alloc_id();
                doc.push_node(IrNode::new(id, node_kind, fqn, name, file_id, span, Some(parent)));
                doc.push_edge(IrEdge::new(parent, id, EdgeKind::Contains));

                if is_function {
                    fn_stack.push((id, FunctionAccumulator::new(), r1));
                }
                id
            } else {
                parent
            };

            let children = node.children();
            let child_count = children.len();
            for child in children {
                stack.push(Frame { node: child, parent: next_parent });
            }

            if is_function && child_count == 0 {
                self.finalize_function(&mut doc, &mut fn_stack, next_parent);
            }
        }

        // Any function whose subtree was empty or whose children already
        // drained without an explicit finalize point still needs closing;
        // walk remaining stack entries in LIFO order (innermost first).
        while let Some((id, acc, end_line)) = fn_stack.pop() {
            self.attach_metrics(&mut doc, id, acc, end_line);
        }

        doc
    }

    fn finalize_function(
        &mut self,
        doc: &mut IrDocument,
        fn_stack: &mut Vec<(SymbolId, FunctionAccumulator, u32)>,
        fn_id: SymbolId,
    ) {
        if let Some(pos) = fn_stack.iter().position(|(id, _, _)| *id == fn_id) {
            let (id, acc, end_line) = fn_stack.remove(pos);
            self.attach_metrics(doc, id, acc, end_line);
        }
    }

    fn attach_metrics(&mut self, doc: &mut IrDocument, fn_id: SymbolId, acc: FunctionAccumulator, end_line: u32) {
        let cyclomatic = FunctionMetrics::cyclomatic(acc.branch_count, acc.loop_count);
        let metrics = FunctionMetrics {
            cyclomatic_complexity: cyclomatic,
            has_loop: acc.loop_count > 0,
            has_try: acc.has_try,
            branch_count: acc.branch_count,
            calls: acc.calls,
            assigns: acc.assigns,
            imports: acc.imports,
        };
        let cfg: Cfg = acc.cfg.finish(end_line).unwrap_or_default();
        let _ = cfg; // CFG is advisory for now: metrics are what downstream ranking consumes.
        if let Some(node) = doc.node_mut(fn_id) {
            node.metrics = Some(metrics);
        }
    }
}

impl Default for IrGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_module_and_function_for_rust_source() {
        let mut gen = IrGenerator::new();
        let file_id = FileId::new(1).unwrap();
        let source = "fn add(a: i32, b: i32) -> i32 {\n    if a > 0 {\n        a + b\n    } else {\n        b\n    }\n}\n";
        let doc = gen.generate_file(file_id, "src/lib.rs", "rs", source).unwrap();
        assert!(doc.check_invariants().is_ok());
        let func = doc.nodes().iter().find(|n| n.kind == NodeKind::Function);
        assert!(func.is_some());
        let func = func.unwrap();
        assert_eq!(func.name, "add");
        let metrics = func.metrics.as_ref().unwrap();
        assert!(metrics.branch_count >= 1);
        assert!(metrics.cyclomatic_complexity >= 2);
    }

    #[test]
    fn tolerates_unknown_extension() {
        let mut gen = IrGenerator::new();
        let file_id = FileId::new(1).unwrap();
        let err = gen.generate_file(file_id, "a.rb", "rb", "puts 1").unwrap_err();
        assert!(matches!(err, FileError::Parse { .. }));
    }

    #[test]
    fn python_function_is_captured() {
        let mut gen = IrGenerator::new();
        let file_id = FileId::new(1).unwrap();
        let source = "def greet(name):\n    for i in range(3):\n        print(name)\n";
        let doc = gen.generate_file(file_id, "a.py", "py", source).unwrap();
        let func = doc.nodes().iter().find(|n| n.kind == NodeKind::Function).unwrap();
        assert_eq!(func.name, "greet");
        assert!(func.metrics.as_ref().unwrap().has_loop);
    }
}
