//! Pruned-SSA construction: φ-placement via iterated dominance frontiers,
//! followed by dominator-tree-order renaming (spec §4.D).

use std::collections::{BTreeMap, BTreeSet};

use crate::cfg::{BlockId, Cfg};
use crate::ir::{Function, Instruction, Literal};

use super::dominance::DominanceInfo;
use super::function::{SsaBlock, SsaFunction, SsaInstruction, SsaSymbolTable};
use super::value::{PhiNode, SsaValue};

/// Builds an [`SsaFunction`] from an IR function, its [`Cfg`], and that
/// CFG's [`DominanceInfo`].
pub struct SsaBuilder;

impl SsaBuilder {
    /// Build pruned SSA form with all versions already assigned.
    #[must_use]
    pub fn build(function: &Function, cfg: &Cfg, dominance: &DominanceInfo) -> SsaFunction {
        let mut symbols = SsaSymbolTable::new();
        for param in &function.parameters {
            symbols.intern(&param.name, Some(param.type_name.clone()));
        }

        let def_sites = Self::find_def_sites(cfg, &mut symbols, function.parameters.len());
        let phi_symbols = Self::place_phis(dominance, cfg.blocks.len(), &def_sites);

        let mut blocks: Vec<SsaBlock> = cfg
            .blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let id = BlockId(i);
                let phi_nodes = phi_symbols
                    .get(&id)
                    .into_iter()
                    .flatten()
                    .map(|&symbol| PhiNode::new(symbol, SsaValue::new(symbol, 0), &block.predecessors))
                    .collect();
                SsaBlock {
                    id,
                    label: block.label.clone(),
                    predecessors: block.predecessors.clone(),
                    successors: block.successors.clone(),
                    phi_nodes,
                    instructions: Vec::new(),
                }
            })
            .collect();

        let mut state = RenameState::new();
        let entry = cfg.entry();
        let mut param_instructions = Vec::with_capacity(function.parameters.len());
        for (param_index, param) in function.parameters.iter().enumerate() {
            // Parameters are reserved version 1 (spec §4.D) and need a real
            // definition site, not just a seeded version counter, so that
            // every read of a parameter dominates per spec §8 property 3 the
            // same way any other instruction result would.
            let value = state.new_version(param_index);
            param_instructions.push(SsaInstruction::with_result(
                "param",
                vec![],
                vec![param.name.clone()],
                value,
            ));
        }
        Self::rename_block(entry, cfg, dominance, &mut symbols, &mut state, &mut blocks);
        blocks[entry.0].instructions.splice(0..0, param_instructions);

        SsaFunction {
            name: function.name.clone(),
            symbols,
            blocks,
        }
    }

    /// For each symbol, the set of blocks containing a `Store` of it, plus
    /// block 0 for every parameter (spec §4.D "Symbol table").
    fn find_def_sites(
        cfg: &Cfg,
        symbols: &mut SsaSymbolTable,
        parameter_count: usize,
    ) -> BTreeMap<usize, BTreeSet<BlockId>> {
        let mut sites: BTreeMap<usize, BTreeSet<BlockId>> = BTreeMap::new();
        for symbol in 0..parameter_count {
            sites.entry(symbol).or_default().insert(BlockId(0));
        }
        for (i, block) in cfg.blocks.iter().enumerate() {
            for instr in &cfg.instructions[block.start..block.end] {
                if let Instruction::Store(name) = instr {
                    let symbol = symbols.intern(name, None);
                    sites.entry(symbol).or_default().insert(BlockId(i));
                }
            }
        }
        sites
    }

    /// Iterated dominance frontier worklist: seed with each symbol's def
    /// sites, repeatedly add a φ at every not-yet-φ'd block in a popped
    /// block's frontier, enqueueing newly φ'd blocks (spec §4.D "φ
    /// placement").
    fn place_phis(
        dominance: &DominanceInfo,
        block_count: usize,
        def_sites: &BTreeMap<usize, BTreeSet<BlockId>>,
    ) -> BTreeMap<BlockId, Vec<usize>> {
        let mut phi_blocks: BTreeMap<BlockId, Vec<usize>> = BTreeMap::new();
        for (&symbol, sites) in def_sites {
            let mut has_phi = vec![false; block_count];
            let mut in_worklist = vec![false; block_count];
            let mut worklist: Vec<BlockId> = Vec::new();
            for &site in sites {
                in_worklist[site.0] = true;
                worklist.push(site);
            }
            while let Some(block) = worklist.pop() {
                for &frontier_block in dominance.dominance_frontier(block) {
                    if !has_phi[frontier_block.0] {
                        has_phi[frontier_block.0] = true;
                        phi_blocks.entry(frontier_block).or_default().push(symbol);
                        if !in_worklist[frontier_block.0] {
                            in_worklist[frontier_block.0] = true;
                            worklist.push(frontier_block);
                        }
                    }
                }
            }
        }
        phi_blocks
    }

    fn rename_block(
        block: BlockId,
        cfg: &Cfg,
        dominance: &DominanceInfo,
        symbols: &mut SsaSymbolTable,
        state: &mut RenameState,
        blocks: &mut [SsaBlock],
    ) {
        let mut defined_here = Vec::new();

        for phi in &mut blocks[block.0].phi_nodes {
            let value = state.new_version(phi.symbol);
            phi.result = value;
            defined_here.push(phi.symbol);
        }

        let mut eval_stack: Vec<SsaValue> = Vec::new();
        let (start, end) = {
            let raw = &cfg.blocks[block.0];
            (raw.start, raw.end)
        };
        let mut emitted = Vec::new();

        for instr in &cfg.instructions[start..end] {
            match instr {
                Instruction::Comment(_) | Instruction::Label(_) => {}
                Instruction::Literal(lit) => {
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    let text = lit.as_f64().to_string();
                    emitted.push(SsaInstruction::with_result("literal", vec![], vec![text], result));
                    eval_stack.push(result);
                }
                Instruction::StringLiteral(text) => {
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "literal_string",
                        vec![],
                        vec![text.clone()],
                        result,
                    ));
                    eval_stack.push(result);
                }
                Instruction::Reference(name) => {
                    let symbol = symbols.intern(name, None);
                    eval_stack.push(state.current_value(symbol));
                }
                Instruction::Unary(op) => {
                    let operand = eval_stack.pop().expect("stack underflow on unary op");
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "unary",
                        vec![operand],
                        vec![op.clone()],
                        result,
                    ));
                    eval_stack.push(result);
                }
                Instruction::Binary(op) => {
                    let rhs = eval_stack.pop().expect("stack underflow on binary rhs");
                    let lhs = eval_stack.pop().expect("stack underflow on binary lhs");
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "binary",
                        vec![lhs, rhs],
                        vec![op.clone()],
                        result,
                    ));
                    eval_stack.push(result);
                }
                Instruction::Store(name) => {
                    let value = eval_stack.pop().expect("stack underflow on store");
                    let symbol = symbols.intern(name, None);
                    let new_value = state.new_version(symbol);
                    defined_here.push(symbol);
                    emitted.push(SsaInstruction::with_result(
                        "assign",
                        vec![value],
                        vec![],
                        new_value,
                    ));
                }
                Instruction::Drop => {
                    let value = eval_stack.pop().expect("stack underflow on drop");
                    emitted.push(SsaInstruction::effect("drop", vec![value], vec![]));
                }
                Instruction::Branch(label) => {
                    emitted.push(SsaInstruction::effect("branch", vec![], vec![label.clone()]));
                }
                Instruction::BranchIf { label, value } => {
                    let cond = eval_stack.pop().expect("stack underflow on branch_if");
                    emitted.push(SsaInstruction::effect(
                        "branch_if",
                        vec![cond],
                        vec![label.clone(), value.to_string()],
                    ));
                }
                Instruction::Return => {
                    let value = eval_stack.pop();
                    let args = value.into_iter().collect();
                    emitted.push(SsaInstruction::effect("return", args, vec![]));
                }
                Instruction::Call { callee, argc } => {
                    let mut args = Vec::with_capacity(*argc);
                    for _ in 0..*argc {
                        args.push(eval_stack.pop().expect("stack underflow on call arg"));
                    }
                    args.reverse();
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "call",
                        args,
                        vec![callee.clone(), argc.to_string()],
                        result,
                    ));
                    eval_stack.push(result);
                }
                Instruction::MakeArray => {
                    let length = eval_stack.pop().expect("stack underflow on array_make length");
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "array_make",
                        vec![length],
                        vec![],
                        result,
                    ));
                    eval_stack.push(result);
                }
                Instruction::ArrayGet => {
                    let index = eval_stack.pop().expect("stack underflow on array_get index");
                    let array = eval_stack.pop().expect("stack underflow on array_get array");
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "array_get",
                        vec![array, index],
                        vec![],
                        result,
                    ));
                    eval_stack.push(result);
                }
                Instruction::ArraySet => {
                    let value = eval_stack.pop().expect("stack underflow on array_set value");
                    let index = eval_stack.pop().expect("stack underflow on array_set index");
                    let array = eval_stack.pop().expect("stack underflow on array_set array");
                    emitted.push(SsaInstruction::effect(
                        "array_set",
                        vec![array, index, value],
                        vec![],
                    ));
                }
                Instruction::ArrayLength => {
                    let array = eval_stack.pop().expect("stack underflow on array_length");
                    let temp = symbols.fresh_temp();
                    let result = SsaValue::new(temp, 1);
                    emitted.push(SsaInstruction::with_result(
                        "array_length",
                        vec![array],
                        vec![],
                        result,
                    ));
                    eval_stack.push(result);
                }
            }
        }

        blocks[block.0].instructions = emitted;

        let successors = blocks[block.0].successors.clone();
        for succ in successors {
            for phi in &mut blocks[succ.0].phi_nodes {
                let value = state.current_value(phi.symbol);
                phi.set_operand(block, value);
            }
        }

        let children: Vec<BlockId> = dominance.children(block).to_vec();
        for child in children {
            Self::rename_block(child, cfg, dominance, symbols, state, blocks);
        }

        for symbol in defined_here {
            state.pop(symbol);
        }
    }
}

/// Per-symbol version counters and version stacks used during rename.
struct RenameState {
    counters: Vec<usize>,
    stacks: Vec<Vec<SsaValue>>,
}

impl RenameState {
    fn new() -> Self {
        Self {
            counters: Vec::new(),
            stacks: Vec::new(),
        }
    }

    fn ensure(&mut self, symbol: usize) {
        if self.counters.len() <= symbol {
            self.counters.resize(symbol + 1, 0);
            self.stacks.resize_with(symbol + 1, Vec::new);
        }
    }

    fn new_version(&mut self, symbol: usize) -> SsaValue {
        self.ensure(symbol);
        self.counters[symbol] += 1;
        let value = SsaValue::new(symbol, self.counters[symbol]);
        self.stacks[symbol].push(value);
        value
    }

    fn current_value(&mut self, symbol: usize) -> SsaValue {
        self.ensure(symbol);
        self.stacks[symbol]
            .last()
            .copied()
            .unwrap_or_else(|| SsaValue::environment(symbol))
    }

    fn pop(&mut self, symbol: usize) {
        self.stacks[symbol].pop();
    }
}
