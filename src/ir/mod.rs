//! The IR data model (spec §3): modules, functions, basic blocks, and the
//! stack-oriented instruction set that the CFG builder and SSA builder
//! consume.

pub mod instruction;
pub mod module;

pub use instruction::{Instruction, Literal};
pub use module::{
    Binding, Function, FunctionParameter, Interface, InterfaceMethod, Module, StorageClass,
    Struct, StructField,
};
