//! Sparse constant propagation (spec §4.E "Constant propagation").

use std::collections::BTreeMap;

use crate::ssa::{SsaFunction, SsaValue};

use super::lattice::{eval_binary, eval_unary, ConstLattice};

/// Runs constant propagation over `function` in place, returning whether any
/// instruction was rewritten to a `literal`.
pub fn run(function: &mut SsaFunction) -> bool {
    let lattice = solve(function);
    rewrite(function, &lattice)
}

fn lattice_of(value: SsaValue, lattice: &BTreeMap<SsaValue, ConstLattice>) -> ConstLattice {
    if value.is_environment() {
        return ConstLattice::NonConstant;
    }
    lattice.get(&value).copied().unwrap_or(ConstLattice::Unknown)
}

fn combine_unary(op: &str, x: ConstLattice) -> ConstLattice {
    match x {
        ConstLattice::Unknown => ConstLattice::Unknown,
        ConstLattice::NonConstant => ConstLattice::NonConstant,
        ConstLattice::Constant(v) => eval_unary(op, v)
            .map(ConstLattice::Constant)
            .unwrap_or(ConstLattice::NonConstant),
    }
}

fn combine_binary(op: &str, lhs: ConstLattice, rhs: ConstLattice) -> ConstLattice {
    match (lhs, rhs) {
        (ConstLattice::Unknown, _) | (_, ConstLattice::Unknown) => ConstLattice::Unknown,
        (ConstLattice::NonConstant, _) | (_, ConstLattice::NonConstant) => ConstLattice::NonConstant,
        (ConstLattice::Constant(a), ConstLattice::Constant(b)) => eval_binary(op, a, b)
            .map(ConstLattice::Constant)
            .unwrap_or(ConstLattice::NonConstant),
    }
}

fn set(lattice: &mut BTreeMap<SsaValue, ConstLattice>, value: SsaValue, point: ConstLattice) -> bool {
    let previous = lattice.insert(value, point);
    previous != Some(point)
}

fn solve(function: &SsaFunction) -> BTreeMap<SsaValue, ConstLattice> {
    let mut lattice: BTreeMap<SsaValue, ConstLattice> = BTreeMap::new();
    loop {
        let mut changed = false;
        for block in &function.blocks {
            for phi in &block.phi_nodes {
                let mut point = ConstLattice::Unknown;
                for input in phi.operands.values().flatten() {
                    point = point.meet(lattice_of(*input, &lattice));
                }
                changed |= set(&mut lattice, phi.result, point);
            }
            for instr in &block.instructions {
                let Some(result) = instr.result else { continue };
                let point = match instr.opcode.as_str() {
                    "literal" => instr
                        .immediates
                        .first()
                        .and_then(|s| s.parse::<f64>().ok())
                        .map(ConstLattice::Constant)
                        .unwrap_or(ConstLattice::NonConstant),
                    "unary" => combine_unary(&instr.immediates[0], lattice_of(instr.args[0], &lattice)),
                    "binary" => combine_binary(
                        &instr.immediates[0],
                        lattice_of(instr.args[0], &lattice),
                        lattice_of(instr.args[1], &lattice),
                    ),
                    "assign" => lattice_of(instr.args[0], &lattice),
                    _ => ConstLattice::NonConstant,
                };
                changed |= set(&mut lattice, result, point);
            }
        }
        if !changed {
            break;
        }
    }
    lattice
}

fn rewrite(function: &mut SsaFunction, lattice: &BTreeMap<SsaValue, ConstLattice>) -> bool {
    let mut mutated = false;
    for block in &mut function.blocks {
        for instr in &mut block.instructions {
            if instr.opcode == "literal" {
                continue;
            }
            let Some(result) = instr.result else { continue };
            if let Some(ConstLattice::Constant(value)) = lattice.get(&result).copied() {
                instr.opcode = "literal".to_string();
                instr.args.clear();
                instr.immediates = vec![value.to_string()];
                mutated = true;
            }
        }
    }
    mutated
}
