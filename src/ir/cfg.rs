//! Per-function control-flow graph (spec.md §3, §4.3): one `Entry`, at
//! least one `Exit`, every block reachable from `Entry`. Built with an
//! iterative walk, one block per straight-line statement sequence.

use serde::{Deserialize, Serialize};

use crate::error::InvariantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Entry,
    Exit,
    Block,
    Condition,
    LoopHeader,
    Try,
    Catch,
    Finally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfgEdgeKind {
    Normal,
    TrueBranch,
    FalseBranch,
    Exception,
    LoopBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgBlock {
    pub kind: BlockKind,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from: usize,
    pub to: usize,
    pub kind: CfgEdgeKind,
}

/// Arena-with-indices CFG: blocks live in `Vec<CfgBlock>`, edges hold plain
/// `usize` indices into that vec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cfg {
    pub blocks: Vec<CfgBlock>,
    pub edges: Vec<CfgEdge>,
}

pub struct CfgBuilder {
    cfg: Cfg,
    entry: Option<usize>,
    current: Option<usize>,
}

impl CfgBuilder {
    pub fn new() -> Self {
        let mut cfg = Cfg::default();
        let entry_idx = cfg.blocks.len();
        cfg.blocks.push(CfgBlock { kind: BlockKind::Entry, start_line: 0, end_line: 0 });
        Self { cfg, entry: Some(entry_idx), current: Some(entry_idx) }
    }

    fn push_block(&mut self, kind: BlockKind, start_line: u32, end_line: u32) -> usize {
        let idx = self.cfg.blocks.len();
        self.cfg.blocks.push(CfgBlock { kind, start_line, end_line });
        idx
    }

    fn link(&mut self, from: usize, to: usize, kind: CfgEdgeKind) {
        self.cfg.edges.push(CfgEdge { from, to, kind });
    }

    /// Appends a straight-line statement block after the current block.
    pub fn straight_line(&mut self, start_line: u32, end_line: u32) -> usize {
        let idx = self.push_block(BlockKind::Block, start_line, end_line);
        if let Some(cur) = self.current {
            self.link(cur, idx, CfgEdgeKind::Normal);
        }
        self.current = Some(idx);
        idx
    }

    /// Introduces a branch (`if`/`match` arm): a `Condition` block with a
    /// true-branch and false-branch target, returning their indices so the
    /// caller can recurse into each arm before joining.
    pub fn branch(&mut self, line: u32) -> (usize, usize, usize) {
        let cond = self.push_block(BlockKind::Condition, line, line);
        if let Some(cur) = self.current {
            self.link(cur, cond, CfgEdgeKind::Normal);
        }
        let true_blk = self.push_block(BlockKind::Block, line, line);
        let false_blk = self.push_block(BlockKind::Block, line, line);
        self.link(cond, true_blk, CfgEdgeKind::TrueBranch);
        self.link(cond, false_blk, CfgEdgeKind::FalseBranch);
        (cond, true_blk, false_blk)
    }

    /// Introduces a loop header; caller links the loop body back to it with
    /// `close_loop`.
    pub fn loop_header(&mut self, line: u32) -> usize {
        let idx = self.push_block(BlockKind::LoopHeader, line, line);
        if let Some(cur) = self.current {
            self.link(cur, idx, CfgEdgeKind::Normal);
        }
        self.current = Some(idx);
        idx
    }

    pub fn close_loop(&mut self, body_end: usize, header: usize) {
        self.link(body_end, header, CfgEdgeKind::LoopBack);
    }

    pub fn try_catch_finally(&mut self, line: u32) -> (usize, usize, usize) {
        let try_blk = self.push_block(BlockKind::Try, line, line);
        if let Some(cur) = self.current {
            self.link(cur, try_blk, CfgEdgeKind::Normal);
        }
        let catch_blk = self.push_block(BlockKind::Catch, line, line);
        let finally_blk = self.push_block(BlockKind::Finally, line, line);
        self.link(try_blk, catch_blk, CfgEdgeKind::Exception);
        self.link(try_blk, finally_blk, CfgEdgeKind::Normal);
        self.link(catch_blk, finally_blk, CfgEdgeKind::Normal);
        (try_blk, catch_blk, finally_blk)
    }

    pub fn set_current(&mut self, idx: usize) {
        self.current = Some(idx);
    }

    pub fn add_exit(&mut self, line: u32) -> usize {
        let idx = self.push_block(BlockKind::Exit, line, line);
        if let Some(cur) = self.current {
            self.link(cur, idx, CfgEdgeKind::Normal);
        }
        idx
    }

    /// Finalizes the CFG, ensuring at least one `Exit` exists (functions
    /// that fall off the end implicitly return) and checking the one-Entry
    /// / reachable-from-Entry invariants (spec.md §3).
    pub fn finish(mut self, end_line: u32) -> Result<Cfg, InvariantError> {
        if !self.cfg.blocks.iter().any(|b| b.kind == BlockKind::Exit) {
            self.add_exit(end_line);
        }
        self.validate()?;
        Ok(self.cfg)
    }

    fn validate(&self) -> Result<(), InvariantError> {
        let entries = self.cfg.blocks.iter().filter(|b| b.kind == BlockKind::Entry).count();
        if entries != 1 {
            return Err(InvariantError::MissingEntry { function: "<anonymous>".into() });
        }
        let exits = self.cfg.blocks.iter().filter(|b| b.kind == BlockKind::Exit).count();
        if exits == 0 {
            return Err(InvariantError::MissingEntry { function: "<anonymous>".into() });
        }

        // BFS reachability from Entry.
        let entry = self.entry.expect("entry always set in new()");
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); self.cfg.blocks.len()];
        for e in &self.cfg.edges {
            adj[e.from].push(e.to);
        }
        let mut seen = vec![false; self.cfg.blocks.len()];
        let mut stack = vec![entry];
        seen[entry] = true;
        while let Some(node) = stack.pop() {
            for &next in &adj[node] {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        if seen.iter().any(|&s| !s) {
            return Err(InvariantError::MissingEntry { function: "<unreachable-block>".into() });
        }
        Ok(())
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_function_has_entry_and_exit() {
        let mut b = CfgBuilder::new();
        b.straight_line(1, 2);
        let cfg = b.finish(3).unwrap();
        assert_eq!(cfg.blocks.iter().filter(|b| b.kind == BlockKind::Entry).count(), 1);
        assert!(cfg.blocks.iter().any(|b| b.kind == BlockKind::Exit));
    }

    #[test]
    fn branch_produces_true_and_false_edges() {
        let mut b = CfgBuilder::new();
        let (_, true_blk, false_blk) = b.branch(5);
        b.set_current(true_blk);
        b.add_exit(6);
        b.set_current(false_blk);
        let cfg = b.finish(7).unwrap();
        assert!(cfg.edges.iter().any(|e| e.kind == CfgEdgeKind::TrueBranch));
        assert!(cfg.edges.iter().any(|e| e.kind == CfgEdgeKind::FalseBranch));
    }

    #[test]
    fn loop_back_edge_present() {
        let mut b = CfgBuilder::new();
        let header = b.loop_header(2);
        let body = b.straight_line(3, 4);
        b.close_loop(body, header);
        b.set_current(header);
        let cfg = b.finish(5).unwrap();
        assert!(cfg.edges.iter().any(|e| e.kind == CfgEdgeKind::LoopBack));
    }
}
