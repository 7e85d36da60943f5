//! IR module, function, and basic block types (spec §3 "IR module", "IR
//! function", "IR basic block").

use serde::{Deserialize, Serialize};

use super::instruction::Instruction;

/// An ordered sequence of instructions with a non-empty label; the unit the
/// CFG builder flattens and re-segments into [`crate::cfg::CfgBlock`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Source-level label for this block, used to resolve branch targets.
    pub label: String,
    /// Instructions in program order.
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Create a new basic block with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    /// Create a basic block from an explicit instruction list.
    #[must_use]
    pub fn with_instructions(label: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            label: label.into(),
            instructions,
        }
    }
}

/// A parameter declaration: name plus a type name (opaque to the core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameter {
    /// Parameter name as written in source.
    pub name: String,
    /// Declared type name; the core never inspects this beyond passing it
    /// along for diagnostics.
    pub type_name: String,
}

impl FunctionParameter {
    /// Construct a parameter declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// An IR function: name, parameters, optional return type, and basic blocks.
///
/// The frontend guarantees (spec §6) that `blocks[0]` is named and
/// reachable, and that every branch target resolves within the same
/// function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name, used for call dispatch and diagnostics.
    pub name: String,
    /// Ordered parameter list.
    pub parameters: Vec<FunctionParameter>,
    /// Declared return type name, if any.
    pub return_type: Option<String>,
    /// Basic blocks; the first is the entry block.
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// Construct an empty function with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            blocks: Vec::new(),
        }
    }

    /// The function's entry block, if it has any blocks at all.
    #[must_use]
    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }
}

/// Storage class of a module-level binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    /// `let` binding: may be reassigned within its scope.
    Let,
    /// `const` binding: must reduce to a compile-time constant at load time.
    Const,
    /// `var` binding: mutable module-level storage.
    Var,
}

/// A module-level binding (global).
///
/// Load-time evaluation (spec §4.I, §7 "Load-time" tier) attempts to reduce
/// `initializer_instructions` to a single constant value; failures surface
/// as a per-binding diagnostic rather than aborting the whole module load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    /// Binding's storage class.
    pub storage: StorageClass,
    /// Binding name, used as the global's key in `Vm` globals.
    pub name: String,
    /// Declared type name.
    pub type_name: String,
    /// Stack-oriented instructions that compute the initializer value.
    pub initializer_instructions: Vec<Instruction>,
    /// Whether this binding is visible outside its module.
    pub exported: bool,
}

impl Binding {
    /// Construct a binding with the given name, storage class, and
    /// initializer instruction sequence.
    #[must_use]
    pub fn new(
        storage: StorageClass,
        name: impl Into<String>,
        type_name: impl Into<String>,
        initializer_instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            storage,
            name: name.into(),
            type_name: type_name.into(),
            initializer_instructions,
            exported: false,
        }
    }
}

/// A field of a [`Struct`]; opaque to the core beyond name resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructField {
    /// Field name.
    pub name: String,
    /// Field type name.
    pub type_name: String,
}

/// A record type; the core never inspects fields beyond carrying them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Struct {
    /// Record name.
    pub name: String,
    /// Ordered field list.
    pub fields: Vec<StructField>,
    /// Whether this record is visible outside its module.
    pub exported: bool,
}

/// A single method signature declared by an [`Interface`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceMethod {
    /// Method name.
    pub name: String,
    /// Ordered parameter list.
    pub parameters: Vec<FunctionParameter>,
    /// Declared return type name, if any.
    pub return_type: Option<String>,
}

/// An interface type; opaque to the core beyond name resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    /// Interface name.
    pub name: String,
    /// Declared methods.
    pub methods: Vec<InterfaceMethod>,
    /// Whether this interface is visible outside its module.
    pub exported: bool,
}

/// An IR module: an ordered path plus the four ordered entity lists (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Dotted path segments identifying this module (e.g. `["app", "math"]`).
    pub path: Vec<String>,
    /// Module-level global bindings.
    pub bindings: Vec<Binding>,
    /// Functions declared in this module.
    pub functions: Vec<Function>,
    /// Record types declared in this module.
    pub structs: Vec<Struct>,
    /// Interface types declared in this module.
    pub interfaces: Vec<Interface>,
}

impl Module {
    /// Construct an empty module with the given path.
    #[must_use]
    pub fn new(path: Vec<String>) -> Self {
        Self {
            path,
            bindings: Vec::new(),
            functions: Vec::new(),
            structs: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    /// The module's dotted name (e.g. `"app.math"`), used as its key in the `Vm`.
    #[must_use]
    pub fn dotted_name(&self) -> String {
        self.path.join(".")
    }

    /// Look up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
