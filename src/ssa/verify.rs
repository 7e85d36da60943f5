//! SSA well-formedness verification (spec §4.F).

use std::collections::BTreeSet;

use crate::cfg::BlockId;

use super::dominance::DominanceInfo;
use super::function::SsaFunction;
use super::value::SsaValue;

/// A single verification issue: which block (and, where applicable,
/// instruction) it was found at, plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaIssue {
    /// Block the issue was found in.
    pub block: BlockId,
    /// Instruction index within the block, if the issue is instruction-level.
    pub instruction: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl SsaIssue {
    fn new(block: BlockId, instruction: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            block,
            instruction,
            message: message.into(),
        }
    }
}

/// Checks an [`SsaFunction`] against the invariants of spec §4.F. Succeeds
/// iff [`SsaVerifier::verify`] returns an empty list.
pub struct SsaVerifier;

impl SsaVerifier {
    /// Run every check and return the ordered list of issues found.
    #[must_use]
    pub fn verify(function: &SsaFunction, dominance: &DominanceInfo) -> Vec<SsaIssue> {
        let mut issues = Vec::new();
        Self::check_successor_ranges(function, &mut issues);
        Self::check_reachability(function, dominance, &mut issues);
        Self::check_unique_definitions(function, &mut issues);
        Self::check_phi_arity(function, &mut issues);
        Self::check_dominance(function, dominance, &mut issues);
        issues
    }

    fn check_successor_ranges(function: &SsaFunction, issues: &mut Vec<SsaIssue>) {
        let len = function.blocks.len();
        for block in &function.blocks {
            for &succ in &block.successors {
                if succ.0 >= len {
                    issues.push(SsaIssue::new(
                        block.id,
                        None,
                        format!("successor {succ} is out of range"),
                    ));
                }
            }
        }
    }

    fn check_reachability(
        function: &SsaFunction,
        dominance: &DominanceInfo,
        issues: &mut Vec<SsaIssue>,
    ) {
        for block in &function.blocks {
            if block.id != BlockId(0) && !dominance.is_reachable(block.id) {
                issues.push(SsaIssue::new(block.id, None, "block is unreachable from block 0"));
            }
        }
    }

    fn check_unique_definitions(function: &SsaFunction, issues: &mut Vec<SsaIssue>) {
        let mut seen: BTreeSet<SsaValue> = BTreeSet::new();
        for block in &function.blocks {
            for phi in &block.phi_nodes {
                if !seen.insert(phi.result) {
                    issues.push(SsaIssue::new(
                        block.id,
                        None,
                        format!("duplicate definition of {}", phi.result),
                    ));
                }
            }
            for (i, instr) in block.instructions.iter().enumerate() {
                if let Some(result) = instr.result {
                    if !seen.insert(result) {
                        issues.push(SsaIssue::new(
                            block.id,
                            Some(i),
                            format!("duplicate definition of {result}"),
                        ));
                    }
                }
            }
        }
    }

    fn check_phi_arity(function: &SsaFunction, issues: &mut Vec<SsaIssue>) {
        for block in &function.blocks {
            let expected: BTreeSet<BlockId> = block.predecessors.iter().copied().collect();
            for phi in &block.phi_nodes {
                if phi.operand_count() != block.predecessors.len() {
                    issues.push(SsaIssue::new(
                        block.id,
                        None,
                        format!(
                            "phi for symbol {} has {} operand(s), expected {}",
                            phi.symbol,
                            phi.operand_count(),
                            block.predecessors.len()
                        ),
                    ));
                    continue;
                }
                let actual: BTreeSet<BlockId> = phi.operands.keys().copied().collect();
                if actual != expected {
                    issues.push(SsaIssue::new(
                        block.id,
                        None,
                        format!("phi for symbol {} predecessor set mismatch", phi.symbol),
                    ));
                }
                for (&pred, value) in &phi.operands {
                    if value.is_none() && !expected.contains(&pred) {
                        issues.push(SsaIssue::new(
                            block.id,
                            None,
                            format!("phi for symbol {} has unset operand from {pred}", phi.symbol),
                        ));
                    }
                }
            }
        }
    }

    /// Find the definition site (block, optional instruction index) of
    /// `value`, or `None` if it is an environment read (version 0) or never
    /// defined.
    fn find_definition(function: &SsaFunction, value: SsaValue) -> Option<(BlockId, Option<usize>)> {
        if value.is_environment() {
            return None;
        }
        for block in &function.blocks {
            for phi in &block.phi_nodes {
                if phi.result == value {
                    return Some((block.id, None));
                }
            }
            for (i, instr) in block.instructions.iter().enumerate() {
                if instr.result == Some(value) {
                    return Some((block.id, Some(i)));
                }
            }
        }
        None
    }

    fn check_dominance(
        function: &SsaFunction,
        dominance: &DominanceInfo,
        issues: &mut Vec<SsaIssue>,
    ) {
        for block in &function.blocks {
            for phi in &block.phi_nodes {
                for (&pred, value) in &phi.operands {
                    let Some(value) = value else { continue };
                    if value.is_environment() {
                        continue;
                    }
                    let Some((def_block, _)) = Self::find_definition(function, *value) else {
                        issues.push(SsaIssue::new(
                            block.id,
                            None,
                            format!("use of {value} in phi has no definition"),
                        ));
                        continue;
                    };
                    if !dominance.dominates(def_block, pred) {
                        issues.push(SsaIssue::new(
                            block.id,
                            None,
                            format!("definition of {value} does not dominate predecessor {pred}"),
                        ));
                    }
                }
            }
            for (i, instr) in block.instructions.iter().enumerate() {
                for &arg in &instr.args {
                    if arg.is_environment() {
                        continue;
                    }
                    let Some((def_block, def_index)) = Self::find_definition(function, arg) else {
                        issues.push(SsaIssue::new(
                            block.id,
                            Some(i),
                            format!("use of {arg} has no definition"),
                        ));
                        continue;
                    };
                    let ok = if def_block == block.id {
                        match def_index {
                            Some(def_index) => def_index < i,
                            None => true, // phi result, defined at block head
                        }
                    } else {
                        dominance.dominates(def_block, block.id)
                    };
                    if !ok {
                        issues.push(SsaIssue::new(
                            block.id,
                            Some(i),
                            format!("use of {arg} is not dominated by its definition"),
                        ));
                    }
                }
            }
        }
    }
}
