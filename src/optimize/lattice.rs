//! The constant-propagation lattice and the shared operator table it and the
//! interpreter both evaluate against (spec §4.E).

/// Per-SSA-value abstract state tracked by constant propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstLattice {
    /// No information yet (not visited, or genuinely undetermined).
    Unknown,
    /// Provably equal to this literal value on every reachable path.
    Constant(f64),
    /// Provably not a single constant.
    NonConstant,
}

impl ConstLattice {
    /// Meet of two lattice points (used for φ inputs): `Unknown` yields to
    /// the other side, `NonConstant` dominates, and two different constants
    /// meet to `NonConstant` (spec §4.E "φ meet").
    #[must_use]
    pub fn meet(self, other: ConstLattice) -> ConstLattice {
        match (self, other) {
            (ConstLattice::Unknown, x) | (x, ConstLattice::Unknown) => x,
            (ConstLattice::NonConstant, _) | (_, ConstLattice::NonConstant) => {
                ConstLattice::NonConstant
            }
            (ConstLattice::Constant(a), ConstLattice::Constant(b)) => {
                if a == b {
                    ConstLattice::Constant(a)
                } else {
                    ConstLattice::NonConstant
                }
            }
        }
    }

    /// The constant value, if this point is `Constant`.
    #[must_use]
    pub fn as_constant(self) -> Option<f64> {
        match self {
            ConstLattice::Constant(v) => Some(v),
            _ => None,
        }
    }
}

/// Threshold below which a divisor's magnitude is treated as division by
/// zero (spec §4.E "Division by a value whose magnitude is below `1e-12`").
pub const DIVISION_EPSILON: f64 = 1e-12;

/// Evaluate a unary operator over a constant operand (spec §4.E operator
/// table).
#[must_use]
pub fn eval_unary(op: &str, x: f64) -> Option<f64> {
    match op {
        "!" => Some(if x == 0.0 { 1.0 } else { 0.0 }),
        "-" => Some(-x),
        _ => None,
    }
}

/// Evaluate a binary operator over two constant operands (spec §4.E operator
/// table). Returns `None` for an unrecognised operator or a division by a
/// near-zero divisor.
#[must_use]
pub fn eval_binary(op: &str, lhs: f64, rhs: f64) -> Option<f64> {
    let as_bool = |v: f64| v != 0.0;
    match op {
        "+" => Some(lhs + rhs),
        "-" => Some(lhs - rhs),
        "*" => Some(lhs * rhs),
        "/" => {
            if rhs.abs() < DIVISION_EPSILON {
                None
            } else {
                Some(lhs / rhs)
            }
        }
        "%" => {
            if rhs.abs() < DIVISION_EPSILON || lhs < 0.0 || rhs < 0.0 {
                None
            } else {
                Some((lhs as i64 % rhs as i64) as f64)
            }
        }
        "==" => Some(bool_to_f64(lhs == rhs)),
        "!=" => Some(bool_to_f64(lhs != rhs)),
        "<" => Some(bool_to_f64(lhs < rhs)),
        "<=" => Some(bool_to_f64(lhs <= rhs)),
        ">" => Some(bool_to_f64(lhs > rhs)),
        ">=" => Some(bool_to_f64(lhs >= rhs)),
        "&&" => Some(bool_to_f64(as_bool(lhs) && as_bool(rhs))),
        "||" => Some(bool_to_f64(as_bool(lhs) || as_bool(rhs))),
        _ => None,
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
