//! Configuration for the GC, optimiser, and trace output.
//!
//! Mirrors the shape of a typical decompiler/compiler configuration file:
//! a serde-derived struct with sane defaults, loadable from TOML, with a
//! handful of environment-variable overrides for quick experimentation.

use serde::{Deserialize, Serialize};

/// Top level configuration for an [`crate::vm::Vm`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Garbage collector tuning.
    pub gc: GcConfig,

    /// Which SSA optimiser passes run before interpretation.
    pub optimizer: OptimizerConfig,

    /// Trace/log verbosity knobs.
    pub trace: TraceConfig,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            gc: GcConfig::default(),
            optimizer: OptimizerConfig::default(),
            trace: TraceConfig::default(),
        }
    }
}

impl InterpreterConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits (serde fills missing fields via `#[serde(default)]`
    /// on each sub-struct's `Default` impl when deserializing a partial document).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse as TOML.
    pub fn load_from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Apply `IMPULSE_*` environment variable overrides on top of a loaded config.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("IMPULSE_GC_THRESHOLD_BYTES") {
            if let Ok(parsed) = value.parse() {
                self.gc.initial_threshold_bytes = parsed;
            }
        }
        if let Ok(value) = std::env::var("IMPULSE_DISABLE_OPTIMIZER") {
            if value == "1" || value.eq_ignore_ascii_case("true") {
                self.optimizer.constant_propagation = false;
                self.optimizer.copy_propagation = false;
                self.optimizer.dead_code_elimination = false;
            }
        }
        self
    }
}

/// Tuning knobs for [`crate::gc::GcHeap`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Starting collection threshold in bytes (spec §4.G: 1 MiB).
    pub initial_threshold_bytes: usize,

    /// Multiplier applied to bytes-live-after-sweep to compute the next
    /// threshold (spec §4.G: `max(2 * live, 1 MiB)`).
    pub growth_factor: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold_bytes: 1024 * 1024,
            growth_factor: 2,
        }
    }
}

/// Enables/disables individual SSA optimiser passes.
///
/// All three default to enabled; turning a pass off is intended for tests
/// that want to observe pre-optimisation SSA, not for production use — the
/// optimiser is always semantics-preserving (spec §8 property 6), so there
/// is no correctness reason to disable any of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Sparse conditional constant propagation.
    pub constant_propagation: bool,
    /// Copy/φ forwarding.
    pub copy_propagation: bool,
    /// Dead code elimination.
    pub dead_code_elimination: bool,
    /// Maximum number of (const-prop, copy-prop, dce) triplet iterations
    /// before the fixpoint driver gives up and returns the current state.
    /// Guards against a pathological non-terminating rewrite; the
    /// documented passes always converge, so this is a defensive bound.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            constant_propagation: true,
            copy_propagation: true,
            dead_code_elimination: true,
            max_iterations: 64,
        }
    }
}

/// Controls how much the interpreter logs via `tracing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Emit a `tracing::debug!` per optimiser pass that mutates the SSA.
    pub log_optimizer_passes: bool,
    /// Emit a `tracing::trace!` per SSA instruction executed.
    pub log_instructions: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            log_optimizer_passes: true,
            log_instructions: false,
        }
    }
}
