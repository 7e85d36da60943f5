//! Dead code elimination over pure SSA values (spec §4.E "Dead code
//! elimination").

use std::collections::BTreeMap;

use crate::ssa::{SsaFunction, SsaValue};

const REMOVABLE_OPCODES: [&str; 4] = ["literal", "literal_string", "unary", "binary"];

/// Erases unused φs and unused pure instructions until no change. Side
/// effecting opcodes (`call`, `array_set`, `drop`, `return`, `branch`,
/// `branch_if`, array allocations) are never removed. Returns whether
/// anything was erased.
pub fn run(function: &mut SsaFunction) -> bool {
    let mut mutated_overall = false;
    loop {
        let uses = count_uses(function);
        let mut changed = false;
        for block in &mut function.blocks {
            block.phi_nodes.retain(|phi| {
                let keep = uses.get(&phi.result).copied().unwrap_or(0) > 0;
                changed |= !keep;
                keep
            });
            block.instructions.retain(|instr| {
                if !is_removable(&instr.opcode) {
                    return true;
                }
                let Some(result) = instr.result else {
                    return true;
                };
                let keep = uses.get(&result).copied().unwrap_or(0) > 0;
                changed |= !keep;
                keep
            });
        }
        if !changed {
            break;
        }
        mutated_overall = true;
    }
    mutated_overall
}

fn is_removable(opcode: &str) -> bool {
    REMOVABLE_OPCODES.contains(&opcode) || opcode == "assign"
}

fn count_uses(function: &SsaFunction) -> BTreeMap<SsaValue, usize> {
    let mut uses = BTreeMap::new();
    for block in &function.blocks {
        for phi in &block.phi_nodes {
            for input in phi.operands.values().flatten() {
                *uses.entry(*input).or_insert(0) += 1;
            }
        }
        for instr in &block.instructions {
            for arg in &instr.args {
                *uses.entry(*arg).or_insert(0) += 1;
            }
        }
    }
    uses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::ir::{BasicBlock, Function, Instruction, Literal};
    use crate::ssa::{DominanceInfo, SsaBuilder};

    #[test]
    fn removes_unused_literal() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(1.0)),
                Instruction::Drop,
                Instruction::Literal(Literal::Number(2.0)),
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let mut ssa = SsaBuilder::build(&f, &cfg, &dominance);

        // Nothing is dead yet: both literals feed a `drop`/`return`.
        assert!(!run(&mut ssa));
        assert_eq!(ssa.entry().instructions.len(), 4);
    }

    #[test]
    fn never_removes_side_effecting_opcodes() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(1.0)),
                Instruction::Call {
                    callee: "print".to_string(),
                    argc: 1,
                },
                Instruction::Drop,
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let mut ssa = SsaBuilder::build(&f, &cfg, &dominance);

        run(&mut ssa);
        assert!(ssa.entry().instructions.iter().any(|i| i.opcode == "call"));
    }
}
