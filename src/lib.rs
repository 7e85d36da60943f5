//! # Impulse core
//!
//! The middle and back end for the Impulse language: a control-flow-graph
//! builder, pruned-SSA construction with φ-placement, a constant/copy
//! propagation and dead-code-elimination optimiser, an SSA verifier, a
//! tree-walking SSA interpreter, and a tracing mark-and-sweep heap.
//!
//! ## Architecture
//!
//! ```text
//! ir::Module → cfg::Cfg → ssa::SsaFunction → optimize::Optimizer → interp::SsaInterpreter
//!                                                                         ↓
//!                                                                    gc::GcHeap
//! ```
//!
//! The crate does not parse source text and does not schedule threads; it
//! accepts an already-built [`ir::Module`] and runs it. See [`vm::Vm`] for
//! the entry point callers actually use.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use impulse_core::ir::{BasicBlock, Function, Instruction, Literal, Module};
//! use impulse_core::vm::Vm;
//! use impulse_core::common::InterpreterConfig;
//!
//! let mut module = Module::new(vec!["demo".to_string()]);
//! let mut main = Function::new("main");
//! main.blocks.push(BasicBlock::with_instructions(
//!     "entry",
//!     vec![Instruction::Literal(Literal::Number(42.0)), Instruction::Return],
//! ));
//! module.functions.push(main);
//!
//! let mut vm = Vm::new(InterpreterConfig::default());
//! vm.load(module);
//! let result = vm.run("demo", "main");
//! println!("{result}");
//! ```

pub mod cfg;
pub mod common;
pub mod error;
pub mod gc;
pub mod interp;
pub mod ir;
pub mod optimize;
pub mod ssa;
pub mod trace;
pub mod vm;

pub use error::{Error, Result};
pub use vm::{Vm, VmLoadResult, VmResult, VmStatus};
