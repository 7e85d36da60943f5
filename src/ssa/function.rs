//! The built SSA function: symbol table, blocks, φ-nodes, and three-address
//! instructions (spec §3 "SSA function", "SSA instruction").

use std::collections::BTreeMap;

use crate::cfg::BlockId;

use super::value::{PhiNode, SsaValue};

/// One entry in a function's dense symbol table: a source-level name and its
/// declared type, indexed by symbol id.
#[derive(Debug, Clone)]
pub struct SsaSymbol {
    /// Source-level name, where one exists (absent for pure temporaries).
    pub name: String,
    /// Declared type name, where known.
    pub type_name: Option<String>,
}

/// Dense id → `{name, type}` symbol table shared by every block in an
/// [`SsaFunction`].
#[derive(Debug, Clone, Default)]
pub struct SsaSymbolTable {
    symbols: Vec<SsaSymbol>,
    by_name: BTreeMap<String, usize>,
}

impl SsaSymbolTable {
    /// Construct an empty symbol table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning its existing id if already interned or a
    /// fresh one otherwise.
    pub fn intern(&mut self, name: &str, type_name: Option<String>) -> usize {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.symbols.len();
        self.symbols.push(SsaSymbol {
            name: name.to_string(),
            type_name,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Allocate a fresh anonymous temporary symbol (`%tN`) with its own
    /// private id, never aliasing a source name.
    pub fn fresh_temp(&mut self) -> usize {
        let id = self.symbols.len();
        let name = format!("%t{id}");
        self.symbols.push(SsaSymbol {
            name,
            type_name: None,
        });
        id
    }

    /// Look up a symbol's id by source name without interning.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Look up a symbol's record by id.
    #[must_use]
    pub fn symbol(&self, id: usize) -> &SsaSymbol {
        &self.symbols[id]
    }

    /// Number of interned symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table has no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A three-address SSA instruction (spec §3 "SSA instruction").
///
/// Opcode is a uniform record with an opcode tag and two slices (SSA
/// arguments, immediate strings), as recommended for bounded-arity IR nodes
/// (spec §9 "Variant IR nodes").
#[derive(Debug, Clone)]
pub struct SsaInstruction {
    /// Opcode name, one of the strings listed in spec §3's "SSA instruction".
    pub opcode: String,
    /// Ordered SSA-value arguments.
    pub args: Vec<SsaValue>,
    /// Ordered immediate strings (operator symbol, branch target, callee
    /// name, or stringified argc, depending on opcode).
    pub immediates: Vec<String>,
    /// The SSA value this instruction defines, if any.
    pub result: Option<SsaValue>,
}

impl SsaInstruction {
    /// Construct an instruction with no result.
    #[must_use]
    pub fn effect(opcode: impl Into<String>, args: Vec<SsaValue>, immediates: Vec<String>) -> Self {
        Self {
            opcode: opcode.into(),
            args,
            immediates,
            result: None,
        }
    }

    /// Construct an instruction that defines `result`.
    #[must_use]
    pub fn with_result(
        opcode: impl Into<String>,
        args: Vec<SsaValue>,
        immediates: Vec<String>,
        result: SsaValue,
    ) -> Self {
        Self {
            opcode: opcode.into(),
            args,
            immediates,
            result: Some(result),
        }
    }
}

/// One block of an [`SsaFunction`]: φ-nodes followed by three-address
/// instructions, plus the dominance metadata spec §3 says each block
/// carries.
#[derive(Debug, Clone)]
pub struct SsaBlock {
    /// This block's id, matching the originating [`crate::cfg::Cfg`] index.
    pub id: BlockId,
    /// This block's label.
    pub label: String,
    /// Predecessor block ids.
    pub predecessors: Vec<BlockId>,
    /// Successor block ids.
    pub successors: Vec<BlockId>,
    /// φ-nodes at the head of the block, in symbol-interning order.
    pub phi_nodes: Vec<PhiNode>,
    /// Three-address instructions following the φ-nodes.
    pub instructions: Vec<SsaInstruction>,
}

/// A whole function in SSA form: symbol table plus dense block array
/// (spec §3 "SSA function").
#[derive(Debug, Clone)]
pub struct SsaFunction {
    /// Originating IR function's name.
    pub name: String,
    /// Dense id → `{name, type}` table.
    pub symbols: SsaSymbolTable,
    /// Blocks in the same order as the originating CFG.
    pub blocks: Vec<SsaBlock>,
}

impl SsaFunction {
    /// The entry block, always index 0.
    #[must_use]
    pub fn entry(&self) -> &SsaBlock {
        &self.blocks[0]
    }

    /// Look up a block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &SsaBlock {
        &self.blocks[id.0]
    }
}
