//! Statement blocks.
//!
//! A block groups statements that are scanned together: same iteration
//! domain, same scattering up to a constant. Blocks live in a per-program
//! [`BlockArena`] and are addressed by [`BlockId`]; loop leaves hold ids, and
//! the arena keeps the reference counts.

use log::debug;
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::polyhedral::Value;
use crate::utils::errors::{PolyError, PolyResult};

/// A statement of the input program, identified by its 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    /// Position in the input, starting at 1
    pub number: usize,
}

impl Statement {
    /// Statement `number`.
    pub fn new(number: usize) -> Self {
        Self { number }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.number)
    }
}

/// Handle to a block in a [`BlockArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(usize);

impl BlockId {
    /// Arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A group of statements sharing a domain and a scattering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    statements: Vec<Statement>,
    depth: usize,
    scalars: Vec<Value>,
    references: usize,
}

impl Block {
    /// The statements, in execution order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Number of original loop dimensions around the statements.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Values of the scalar scattering dimensions.
    pub fn scalars(&self) -> &[Value] {
        &self.scalars
    }

    /// Current reference count.
    pub fn references(&self) -> usize {
        self.references
    }

    /// True when the block holds no statement.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Owner of every block of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockArena {
    blocks: Vec<Block>,
}

impl BlockArena {
    /// An empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block with one reference.
    pub fn alloc(&mut self, statements: Vec<Statement>, depth: usize) -> BlockId {
        self.blocks.push(Block { statements, depth, scalars: Vec::new(), references: 1 });
        BlockId(self.blocks.len() - 1)
    }

    /// Access a block.
    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Record the scalar dimension values of a block.
    pub fn set_scalars(&mut self, id: BlockId, scalars: Vec<Value>) {
        self.blocks[id.0].scalars = scalars;
    }

    /// One more handle to the same block.
    pub fn share(&mut self, id: BlockId) -> BlockId {
        self.blocks[id.0].references += 1;
        id
    }

    /// Drop a handle. The statements go away with the last one.
    pub fn release(&mut self, id: BlockId) {
        let block = &mut self.blocks[id.0];
        block.references = block.references.saturating_sub(1);
        if block.references == 0 {
            block.statements.clear();
            block.scalars.clear();
        }
    }

    /// Blocks still referenced.
    pub fn live_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.references > 0).count()
    }

    /// Every block, live or not.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().enumerate().map(|(i, b)| (BlockId(i), b))
    }

    /// Merge two blocks of equal depth whose scalar values agree on their
    /// common prefix. The statements of the block with fewer scalar values
    /// (`b` on a tie) are appended to the other one, which is returned; the
    /// emptied block keeps its reference count.
    pub fn merge(&mut self, a: BlockId, b: BlockId) -> PolyResult<BlockId> {
        if a == b {
            return Err(PolyError::BlockMismatch { reason: format!("block {} merged with itself", a.0) });
        }
        let (ba, bb) = (&self.blocks[a.0], &self.blocks[b.0]);
        if ba.depth != bb.depth && !ba.is_empty() && !bb.is_empty() {
            return Err(PolyError::BlockMismatch {
                reason: format!("depth {} differs from depth {}", ba.depth, bb.depth),
            });
        }
        let common = ba.scalars.len().min(bb.scalars.len());
        if ba.scalars[..common] != bb.scalars[..common] {
            return Err(PolyError::BlockMismatch {
                reason: "scalar dimension values differ".to_string(),
            });
        }
        let (into, from) = if bb.scalars.len() > ba.scalars.len() { (b, a) } else { (a, b) };
        let from_depth = self.blocks[from.0].depth;
        let moved = std::mem::take(&mut self.blocks[from.0].statements);
        debug!("merging {} statement(s) of block {} into block {}", moved.len(), from.0, into.0);
        let target = &mut self.blocks[into.0];
        if target.statements.is_empty() {
            target.depth = from_depth;
        }
        target.statements.extend(moved);
        Ok(into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::value::int;

    fn statements(arena: &BlockArena, id: BlockId) -> Vec<usize> {
        arena.get(id).statements().iter().map(|s| s.number).collect()
    }

    #[test]
    fn test_merge_appends_statements() {
        let mut arena = BlockArena::new();
        let a = arena.alloc(vec![Statement::new(1)], 2);
        let b = arena.alloc(vec![Statement::new(2), Statement::new(3)], 2);
        let into = arena.merge(a, b).unwrap();
        assert_eq!(into, a);
        assert_eq!(statements(&arena, a), vec![1, 2, 3]);
        assert!(arena.get(b).is_empty());
        assert_eq!(arena.get(b).references(), 1);
    }

    #[test]
    fn test_merge_into_longer_scalar_array() {
        let mut arena = BlockArena::new();
        let a = arena.alloc(vec![Statement::new(1)], 1);
        let b = arena.alloc(vec![Statement::new(2)], 1);
        arena.set_scalars(a, vec![int(0)]);
        arena.set_scalars(b, vec![int(0), int(4)]);
        assert_eq!(arena.merge(a, b).unwrap(), b);
        assert_eq!(statements(&arena, b), vec![2, 1]);
    }

    #[test]
    fn test_merge_mismatch() {
        let mut arena = BlockArena::new();
        let a = arena.alloc(vec![Statement::new(1)], 1);
        let b = arena.alloc(vec![Statement::new(2)], 2);
        assert!(matches!(arena.merge(a, b), Err(PolyError::BlockMismatch { .. })));
        let c = arena.alloc(vec![Statement::new(3)], 1);
        arena.set_scalars(a, vec![int(1)]);
        arena.set_scalars(c, vec![int(2)]);
        assert!(matches!(arena.merge(a, c), Err(PolyError::BlockMismatch { .. })));
    }

    #[test]
    fn test_merge_with_empty_block_is_identity() {
        let mut arena = BlockArena::new();
        let a = arena.alloc(vec![Statement::new(1), Statement::new(2)], 1);
        let empty = arena.alloc(Vec::new(), 1);
        arena.merge(a, empty).unwrap();
        assert_eq!(statements(&arena, a), vec![1, 2]);
    }

    #[test]
    fn test_share_and_release() {
        let mut arena = BlockArena::new();
        let a = arena.alloc(vec![Statement::new(1)], 0);
        let again = arena.share(a);
        assert_eq!(again, a);
        assert_eq!(arena.get(a).references(), 2);
        arena.release(a);
        assert_eq!(arena.live_count(), 1);
        arena.release(again);
        assert_eq!(arena.live_count(), 0);
        assert!(arena.get(a).is_empty());
    }
}
