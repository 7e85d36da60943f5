//! The VM's public result types (spec §6 "VM interface exposed to callers").

use std::fmt;

/// Outcome of [`crate::vm::Vm::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    /// The function ran to completion.
    Success,
    /// The module failed to build/verify (malformed SSA).
    ModuleError,
    /// The named module or function does not exist.
    MissingSymbol,
    /// Execution raised a runtime error (division by zero, bad operand,
    /// out-of-bounds index, unresolved callee, fell off without return).
    RuntimeError,
}

impl VmStatus {
    /// The integer code used by the stable textual runtime summary (spec §6
    /// "Runtime summary textual form").
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            VmStatus::Success => 0,
            VmStatus::ModuleError => 1,
            VmStatus::MissingSymbol => 2,
            VmStatus::RuntimeError => 3,
        }
    }
}

/// Result of [`crate::vm::Vm::run`] (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct VmResult {
    /// Outcome category.
    pub status: VmStatus,
    /// Whether `value` carries a meaningful numeric result.
    pub has_value: bool,
    /// The function's numeric return value, if any.
    pub value: f64,
    /// Captured stdout (from `print`/`println`) when non-empty, or an error
    /// description when `status != Success`.
    pub message: Option<String>,
}

impl VmResult {
    /// A successful run with no return value and no captured output.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: VmStatus::Success,
            has_value: false,
            value: 0.0,
            message: None,
        }
    }

    /// A successful run with a numeric return value.
    #[must_use]
    pub fn success_with_value(value: f64) -> Self {
        Self {
            status: VmStatus::Success,
            has_value: true,
            value,
            message: None,
        }
    }

    /// A failed run of the given status, carrying a human-readable message.
    #[must_use]
    pub fn failure(status: VmStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            has_value: false,
            value: 0.0,
            message: Some(message.into()),
        }
    }

    /// Attach `message` only if no message is already set (spec §4.I "On
    /// return, if an output buffer was accumulated and the result carries no
    /// explicit message, attach the buffer as the result's message").
    #[must_use]
    pub fn with_output_if_unset(mut self, output: String) -> Self {
        if self.message.is_none() && !output.is_empty() {
            self.message = Some(output);
        }
        self
    }
}

impl fmt::Display for VmResult {
    /// The stable textual runtime summary (spec §6): `status=<int>
    /// value=<double>? message='<string>'?`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={}", self.status.code())?;
        if self.has_value {
            write!(f, " value={}", self.value)?;
        }
        if let Some(message) = &self.message {
            write!(f, " message='{message}'")?;
        }
        Ok(())
    }
}

/// Result of [`crate::vm::Vm::load`] (spec §6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmLoadResult {
    /// Whether every binding in the module evaluated successfully.
    pub success: bool,
    /// One diagnostic per failing binding, in declaration order.
    pub diagnostics: Vec<String>,
}

impl VmLoadResult {
    /// A load with no diagnostics.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostics: Vec::new(),
        }
    }
}
