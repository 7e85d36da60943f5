//! SSA values and φ-nodes (spec §3 "SSA value", "φ-node").

use std::collections::BTreeMap;
use std::fmt;

use crate::cfg::BlockId;

/// A single SSA value: a symbol plus the version of that symbol being
/// referenced. Version 0 denotes "live-in from environment" — parameters
/// and module globals read without an intervening definition (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaValue {
    /// Dense id of the symbol in the owning function's symbol table.
    pub symbol: usize,
    /// Version number; 0 means environment-supplied.
    pub version: usize,
}

impl SsaValue {
    /// Construct an SSA value.
    #[must_use]
    pub fn new(symbol: usize, version: usize) -> Self {
        Self { symbol, version }
    }

    /// An environment-supplied (version 0) reference to `symbol`.
    #[must_use]
    pub fn environment(symbol: usize) -> Self {
        Self { symbol, version: 0 }
    }

    /// Whether this value is an environment read rather than a def.
    #[must_use]
    pub fn is_environment(&self) -> bool {
        self.version == 0
    }
}

impl fmt::Display for SsaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}_{}", self.symbol, self.version)
    }
}

/// A φ-node: chooses among per-predecessor reaching values for one symbol
/// (spec §3 "φ-node").
#[derive(Debug, Clone)]
pub struct PhiNode {
    /// The SSA value this φ defines.
    pub result: SsaValue,
    /// Symbol this φ is for (redundant with `result.symbol`, kept for
    /// readability at call sites that only have the symbol).
    pub symbol: usize,
    /// One input per predecessor block, keyed by that predecessor's
    /// [`BlockId`]. Absent entries are "undefined", resolved to numeric 0 at
    /// interpretation time (spec §3, §4.H).
    pub operands: BTreeMap<BlockId, Option<SsaValue>>,
}

impl PhiNode {
    /// Construct a φ with `result` unset-pre-rename operand slots for each
    /// of `predecessors`.
    #[must_use]
    pub fn new(symbol: usize, result: SsaValue, predecessors: &[BlockId]) -> Self {
        let operands = predecessors.iter().map(|&p| (p, None)).collect();
        Self {
            result,
            symbol,
            operands,
        }
    }

    /// Number of operand slots (should equal the owning block's predecessor
    /// count, spec §8 property 4).
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Set the reaching value for `predecessor`.
    pub fn set_operand(&mut self, predecessor: BlockId, value: SsaValue) {
        self.operands.insert(predecessor, Some(value));
    }
}

impl fmt::Display for PhiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = phi(", self.result)?;
        for (i, (block, value)) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Some(v) => write!(f, "{block}: {v}")?,
                None => write!(f, "{block}: undef")?,
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_value_has_version_zero() {
        let v = SsaValue::environment(3);
        assert!(v.is_environment());
        assert_eq!(v.version, 0);
    }

    #[test]
    fn phi_operand_count_matches_predecessors() {
        let preds = vec![BlockId(0), BlockId(1)];
        let phi = PhiNode::new(1, SsaValue::new(1, 2), &preds);
        assert_eq!(phi.operand_count(), 2);
    }
}
