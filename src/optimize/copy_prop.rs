//! Copy and φ forwarding (spec §4.E "Copy propagation").

use std::collections::{BTreeMap, BTreeSet};

use crate::ssa::{SsaFunction, SsaValue};

/// Builds a `{ssa-value -> ssa-value}` mapping from `assign` instructions and
/// agreeing φ-nodes, closes it under path compression, and rewrites every
/// use through it once. Returns whether anything changed.
pub fn run(function: &mut SsaFunction) -> bool {
    let mapping = build_mapping(function);
    if mapping.is_empty() {
        return false;
    }
    rewrite(function, &mapping)
}

fn build_mapping(function: &SsaFunction) -> BTreeMap<SsaValue, SsaValue> {
    let mut mapping: BTreeMap<SsaValue, SsaValue> = BTreeMap::new();

    for block in &function.blocks {
        for phi in &block.phi_nodes {
            let mut resolved: Option<SsaValue> = None;
            let mut agree = true;
            for input in phi.operands.values() {
                if let Some(value) = input {
                    match resolved {
                        None => resolved = Some(*value),
                        Some(r) if r != *value => agree = false,
                        Some(_) => {}
                    }
                }
            }
            if agree {
                if let Some(value) = resolved {
                    if value != phi.result {
                        mapping.insert(phi.result, value);
                    }
                }
            }
        }
        for instr in &block.instructions {
            if instr.opcode == "assign" {
                if let (Some(dst), Some(&src)) = (instr.result, instr.args.first()) {
                    if dst != src {
                        mapping.insert(dst, src);
                    }
                }
            }
        }
    }

    close_under_path_compression(mapping)
}

fn close_under_path_compression(
    mut mapping: BTreeMap<SsaValue, SsaValue>,
) -> BTreeMap<SsaValue, SsaValue> {
    let keys: Vec<SsaValue> = mapping.keys().copied().collect();
    for key in keys {
        let mut target = mapping[&key];
        let mut visited: BTreeSet<SsaValue> = BTreeSet::from([key]);
        while let Some(&next) = mapping.get(&target) {
            if !visited.insert(target) {
                break;
            }
            target = next;
        }
        mapping.insert(key, target);
    }
    mapping
}

fn resolve(mapping: &BTreeMap<SsaValue, SsaValue>, value: SsaValue) -> SsaValue {
    mapping.get(&value).copied().unwrap_or(value)
}

fn rewrite(function: &mut SsaFunction, mapping: &BTreeMap<SsaValue, SsaValue>) -> bool {
    let mut mutated = false;
    for block in &mut function.blocks {
        for phi in &mut block.phi_nodes {
            for slot in phi.operands.values_mut() {
                if let Some(value) = slot {
                    let resolved = resolve(mapping, *value);
                    if resolved != *value {
                        *value = resolved;
                        mutated = true;
                    }
                }
            }
        }
        for instr in &mut block.instructions {
            for arg in &mut instr.args {
                let resolved = resolve(mapping, *arg);
                if resolved != *arg {
                    *arg = resolved;
                    mutated = true;
                }
            }
        }
    }
    mutated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::ir::{BasicBlock, Function, Instruction, Literal};
    use crate::ssa::{DominanceInfo, SsaBuilder};

    #[test]
    fn forwards_through_an_assign_chain() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(7.0)),
                Instruction::Store("x".to_string()),
                Instruction::Reference("x".to_string()),
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let mut ssa = SsaBuilder::build(&f, &cfg, &dominance);

        let mutated = run(&mut ssa);
        assert!(mutated);
        let ret = ssa.entry().instructions.last().unwrap();
        // The return argument should now point directly at the literal's
        // result rather than the `assign`'s result.
        let literal = ssa
            .entry()
            .instructions
            .iter()
            .find(|i| i.opcode == "literal")
            .unwrap();
        assert_eq!(ret.args[0], literal.result.unwrap());
    }
}
