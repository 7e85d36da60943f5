//! Error types returned by the library.
//!
//! Most public APIs return [`crate::Result`], which uses [`Error`] as the error
//! type. The variants provide access to more specific error categories when
//! needed; see §7 of the design notes for the tier each variant belongs to.

use thiserror::Error;

/// Convenient result alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top level error surfaced by the library's internal APIs.
///
/// `Vm::load` and `Vm::run` never return this directly — they catch it and
/// translate it into a [`crate::vm::VmLoadResult`] or [`crate::vm::VmResult`]
/// so a single failing function never unwinds the host process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Errors encountered while building a control-flow graph.
    #[error(transparent)]
    Cfg(#[from] CfgError),

    /// Errors encountered while constructing or verifying SSA form.
    #[error(transparent)]
    Ssa(#[from] SsaError),

    /// Errors encountered while interpreting SSA instructions.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Module-level binding evaluation failures.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// I/O failures when reading configuration or module dumps.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned while building a CFG from an IR function (spec §4.B).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CfgError {
    /// A function had no basic blocks at all.
    #[error("function {function:?} has no basic blocks")]
    EmptyFunction {
        /// Name of the offending function.
        function: String,
    },
}

/// Errors returned while constructing or verifying SSA form (spec §4.D, §4.F).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SsaError {
    /// The SSA verifier found one or more well-formedness violations.
    #[error("SSA verification failed for {function:?}: {issues} issue(s)")]
    VerificationFailed {
        /// Name of the function that failed verification.
        function: String,
        /// Number of issues reported.
        issues: usize,
    },
}

/// Errors surfaced while interpreting SSA (spec §7, "Runtime" tier).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Division (or modulo) by a value too close to zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A binary/unary operator was applied to operands of the wrong kind.
    #[error("non-numeric operand to operator {op:?}")]
    NonNumericOperand {
        /// The operator that rejected its operand.
        op: String,
    },

    /// An array index was outside `0..length`.
    #[error("array index {index} out of bounds (length {length})")]
    IndexOutOfBounds {
        /// The requested index.
        index: i64,
        /// The array's current length.
        length: usize,
    },

    /// A `call` referenced a name that is neither a builtin nor a known function.
    #[error("unknown function or builtin {name:?}")]
    UnknownCallee {
        /// The name that failed to resolve.
        name: String,
    },

    /// A called function's declared parameter count did not match the call site's argc.
    #[error("function {name:?} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// The callee's name.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// Execution fell off the end of a function without hitting a `Return`.
    #[error("control flow terminated without return")]
    NoReturn,

    /// `return` produced a value that was not numeric.
    #[error("function must return a numeric value")]
    NonNumericReturn,
}

/// Errors returned while evaluating module-level bindings (spec §7, "Load" tier).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// A `const`/`let` binding's initializer could not be evaluated to a constant.
    #[error("binding {name:?} is not a compile-time constant: {reason}")]
    NotConstant {
        /// Name of the offending binding.
        name: String,
        /// Human-readable reason the evaluator gave up.
        reason: String,
    },

    /// A binding's initializer divided by (near-)zero.
    #[error("binding {name:?} divides by zero")]
    DivisionByZero {
        /// Name of the offending binding.
        name: String,
    },
}
