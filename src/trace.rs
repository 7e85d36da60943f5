//! Stable textual dump helpers (spec §6 "Persisted state") and the
//! `set_trace_stream` writer plumbing.
//!
//! None of this state is actually persisted by the core; the dumps exist so
//! an acceptance harness can diff `expected.ir.txt`/`expected.cfg.txt`/
//! `expected.ssa.txt`/`expected.optimisation.txt` against a deterministic
//! rendering of the same pipeline stage. Iteration order here must match the
//! structures' own canonical order (declaration order for IR, block-id order
//! for CFG/SSA) — never a `HashMap`-derived order.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use crate::cfg::Cfg;
use crate::ir::{Instruction, Module};
use crate::ssa::SsaFunction;

/// Render an IR module's functions and bindings in declaration order.
#[must_use]
pub fn dump_ir(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {}", module.dotted_name());
    for binding in &module.bindings {
        let _ = writeln!(out, "  binding {} : {}", binding.name, binding.type_name);
    }
    for function in &module.functions {
        let _ = writeln!(out, "  function {}", function.name);
        for block in &function.blocks {
            let _ = writeln!(out, "    {}:", block.label);
            for instruction in &block.instructions {
                let _ = writeln!(out, "      {}", dump_instruction(instruction));
            }
        }
    }
    out
}

fn dump_instruction(instruction: &Instruction) -> String {
    match instruction {
        Instruction::Literal(lit) => format!("literal {}", lit.as_f64()),
        Instruction::StringLiteral(s) => format!("literal_string {s:?}"),
        Instruction::Reference(name) => format!("reference {name}"),
        Instruction::Unary(op) => format!("unary {op}"),
        Instruction::Binary(op) => format!("binary {op}"),
        Instruction::Store(name) => format!("store {name}"),
        Instruction::Drop => "drop".to_string(),
        Instruction::Branch(label) => format!("branch {label}"),
        Instruction::BranchIf { label, value } => format!("branch_if {label} {value}"),
        Instruction::Return => "return".to_string(),
        Instruction::Call { callee, argc } => format!("call {callee} {argc}"),
        Instruction::MakeArray => "array_make".to_string(),
        Instruction::ArrayGet => "array_get".to_string(),
        Instruction::ArraySet => "array_set".to_string(),
        Instruction::ArrayLength => "array_length".to_string(),
        Instruction::Label(label) => format!("label {label}"),
        Instruction::Comment(text) => format!("comment {text:?}"),
    }
}

/// Render a built CFG's blocks, in `BlockId` order, with their successor and
/// predecessor lists.
#[must_use]
pub fn dump_cfg(cfg: &Cfg) -> String {
    let mut out = String::new();
    for block in &cfg.blocks {
        let successors: Vec<String> = block.successors.iter().map(ToString::to_string).collect();
        let predecessors: Vec<String> =
            block.predecessors.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "{} [{}..{}) succ=[{}] pred=[{}]",
            block.label,
            block.start,
            block.end,
            successors.join(", "),
            predecessors.join(", ")
        );
    }
    out
}

/// Render a built SSA function's blocks in `BlockId` order: φ-nodes first,
/// then three-address instructions.
#[must_use]
pub fn dump_ssa(function: &SsaFunction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "function {}", function.name);
    for block in &function.blocks {
        let _ = writeln!(out, "  {}:", block.label);
        for phi in &block.phi_nodes {
            let _ = writeln!(out, "    {phi}");
        }
        for instruction in &block.instructions {
            let args: Vec<String> = instruction.args.iter().map(ToString::to_string).collect();
            let result = instruction
                .result
                .map_or_else(String::new, |r| format!("{r} = "));
            let _ = writeln!(
                out,
                "    {result}{}({}){}",
                instruction.opcode,
                args.join(", "),
                if instruction.immediates.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", instruction.immediates.join(", "))
                }
            );
        }
    }
    out
}

/// A `tracing_subscriber` writer that forwards to a shared, caller-supplied
/// `Write` (spec §6 `set_trace_stream`). Cloning yields a fresh handle onto
/// the same underlying writer, as `MakeWriter` requires.
#[derive(Clone)]
pub struct SharedTraceWriter(Arc<Mutex<dyn Write + Send>>);

impl SharedTraceWriter {
    /// Wrap `writer` so it can be installed as a `tracing_subscriber`
    /// destination.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }
}

impl Write for SharedTraceWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("trace writer mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().expect("trace writer mutex poisoned").flush()
    }
}

impl<'a> MakeWriter<'a> for SharedTraceWriter {
    type Writer = SharedTraceWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install a global `tracing_subscriber` that writes to `writer`, enabling
/// SSA-level tracing (spec §6 `set_trace_stream`). A no-op if a global
/// subscriber is already installed (tests may call this more than once).
pub fn install_trace_writer(writer: impl Write + Send + 'static) {
    let _ = tracing_subscriber::fmt()
        .with_writer(SharedTraceWriter::new(writer))
        .with_ansi(false)
        .with_target(false)
        .try_init();
}
