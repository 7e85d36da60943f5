//! Leader-based CFG construction from a flattened IR instruction stream
//! (spec §4.B).

use crate::error::{CfgError, Result};
use crate::ir::{Function, Instruction};

use super::block::{BlockId, CfgBlock};
use super::Cfg;

/// Builds a [`Cfg`] from an IR function's basic blocks.
pub struct CfgBuilder;

impl CfgBuilder {
    /// Flatten `function`'s blocks, compute leaders, and wire up successor
    /// and predecessor lists.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::EmptyFunction`] if `function` declares no basic
    /// blocks at all.
    pub fn build(function: &Function) -> Result<Cfg> {
        if function.blocks.is_empty() {
            return Err(CfgError::EmptyFunction {
                function: function.name.clone(),
            }
            .into());
        }

        // Flatten, remembering which original block each offset came from.
        let mut instructions = Vec::new();
        let mut origin_starts: Vec<(usize, &str)> = Vec::new();
        for block in &function.blocks {
            origin_starts.push((instructions.len(), block.label.as_str()));
            instructions.extend(block.instructions.iter().cloned());
        }

        if instructions.is_empty() {
            let label = function
                .blocks
                .iter()
                .find(|b| !b.label.is_empty())
                .map(|b| b.label.clone())
                .unwrap_or_else(|| "entry".to_string());
            return Ok(Cfg {
                instructions,
                blocks: vec![CfgBlock {
                    label,
                    start: 0,
                    end: 0,
                    successors: Vec::new(),
                    predecessors: Vec::new(),
                }],
            });
        }

        let leaders = Self::find_leaders(&instructions);
        let mut blocks = Self::form_blocks(&instructions, &leaders, &origin_starts);
        Self::compute_successors(&instructions, &mut blocks);
        Self::compute_predecessors(&mut blocks);

        Ok(Cfg {
            instructions,
            blocks,
        })
    }

    fn find_leaders(instructions: &[Instruction]) -> Vec<usize> {
        let mut leaders = std::collections::BTreeSet::new();
        leaders.insert(0);
        for (i, instr) in instructions.iter().enumerate() {
            match instr {
                Instruction::Label(_) => {
                    leaders.insert(i);
                }
                Instruction::Branch(_) | Instruction::BranchIf { .. } | Instruction::Return => {
                    if i + 1 < instructions.len() {
                        leaders.insert(i + 1);
                    }
                }
                _ => {}
            }
        }
        leaders.into_iter().collect()
    }

    fn form_blocks(
        instructions: &[Instruction],
        leaders: &[usize],
        origin_starts: &[(usize, &str)],
    ) -> Vec<CfgBlock> {
        let mut blocks = Vec::with_capacity(leaders.len());
        for (idx, &start) in leaders.iter().enumerate() {
            let end = leaders.get(idx + 1).copied().unwrap_or(instructions.len());
            let label = match instructions.get(start) {
                Some(Instruction::Label(name)) => name.clone(),
                _ => origin_starts
                    .iter()
                    .rev()
                    .find(|(origin, _)| *origin <= start)
                    .map(|(_, label)| label.to_string())
                    .unwrap_or_else(|| format!("block{idx}")),
            };
            blocks.push(CfgBlock {
                label,
                start,
                end,
                successors: Vec::new(),
                predecessors: Vec::new(),
            });
        }
        blocks
    }

    /// The last instruction in `instructions[start..end]` that is neither a
    /// `Comment` nor a `Label` (spec §4.B step 4).
    fn terminator(instructions: &[Instruction], start: usize, end: usize) -> Option<&Instruction> {
        instructions[start..end]
            .iter()
            .rev()
            .find(|i| !i.is_structural())
    }

    fn compute_successors(instructions: &[Instruction], blocks: &mut [CfgBlock]) {
        let label_lookup: std::collections::HashMap<&str, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.label.as_str(), i))
            .collect();

        for i in 0..blocks.len() {
            let (start, end) = (blocks[i].start, blocks[i].end);
            let next = if i + 1 < blocks.len() {
                Some(BlockId(i + 1))
            } else {
                None
            };
            let successors = match Self::terminator(instructions, start, end) {
                Some(Instruction::Branch(label)) => label_lookup
                    .get(label.as_str())
                    .map(|&idx| vec![BlockId(idx)])
                    .unwrap_or_default(),
                Some(Instruction::BranchIf { label, .. }) => {
                    let mut out = Vec::new();
                    if let Some(&idx) = label_lookup.get(label.as_str()) {
                        out.push(BlockId(idx));
                    }
                    if let Some(fallthrough) = next {
                        out.push(fallthrough);
                    }
                    out
                }
                Some(Instruction::Return) => Vec::new(),
                _ => next.into_iter().collect(),
            };
            blocks[i].successors = successors;
        }
    }

    fn compute_predecessors(blocks: &mut [CfgBlock]) {
        let mut predecessors: Vec<Vec<BlockId>> = vec![Vec::new(); blocks.len()];
        for (i, block) in blocks.iter().enumerate() {
            for &succ in &block.successors {
                predecessors[succ.0].push(BlockId(i));
            }
        }
        for (block, preds) in blocks.iter_mut().zip(predecessors) {
            block.predecessors = preds;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, Function};

    fn func_with_blocks(blocks: Vec<BasicBlock>) -> Function {
        let mut f = Function::new("f");
        f.blocks = blocks;
        f
    }

    #[test]
    fn empty_function_errors() {
        let f = Function::new("f");
        assert!(CfgBuilder::build(&f).is_err());
    }

    #[test]
    fn single_empty_block_uses_its_label() {
        let f = func_with_blocks(vec![BasicBlock::new("entry")]);
        let cfg = CfgBuilder::build(&f).unwrap();
        assert_eq!(cfg.blocks.len(), 1);
        assert_eq!(cfg.blocks[0].label, "entry");
        assert!(cfg.blocks[0].is_empty());
    }

    #[test]
    fn straight_line_falls_through() {
        let f = func_with_blocks(vec![BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(crate::ir::Literal::Number(1.0)),
                Instruction::Return,
            ],
        )]);
        let cfg = CfgBuilder::build(&f).unwrap();
        assert_eq!(cfg.blocks.len(), 1);
        assert!(cfg.blocks[0].successors.is_empty());
    }

    #[test]
    fn branch_if_has_two_successors_in_order() {
        let f = func_with_blocks(vec![BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(crate::ir::Literal::Number(0.0)),
                Instruction::BranchIf {
                    label: "alt".to_string(),
                    value: 1.0,
                },
                Instruction::Return,
                Instruction::Label("alt".to_string()),
                Instruction::Return,
            ],
        )]);
        let cfg = CfgBuilder::build(&f).unwrap();
        assert_eq!(cfg.blocks.len(), 2);
        assert_eq!(cfg.blocks[0].successors.len(), 2);
        assert_eq!(cfg.blocks[0].successors[0], BlockId(1));
        assert_eq!(cfg.blocks[1].predecessors, vec![BlockId(0), BlockId(0)]);
    }

    #[test]
    fn branch_to_unknown_label_is_dropped() {
        let f = func_with_blocks(vec![BasicBlock::with_instructions(
            "entry",
            vec![Instruction::Branch("nowhere".to_string())],
        )]);
        let cfg = CfgBuilder::build(&f).unwrap();
        assert!(cfg.blocks[0].successors.is_empty());
    }
}
