//! The `Vm`: owns the module set, the heap, and the execution frame stack
//! (spec §4.I).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::cfg::CfgBuilder;
use crate::common::InterpreterConfig;
use crate::error::{Error, LoadError, Result, RuntimeError, SsaError};
use crate::gc::{GcHeap, Value};
use crate::interp::SsaInterpreter;
use crate::ir::{Function, Instruction, Module};
use crate::optimize::Optimizer;
use crate::optimize::lattice::{eval_binary, eval_unary};
use crate::ssa::{DominanceInfo, SsaBuilder, SsaVerifier};

use super::result::{VmLoadResult, VmResult, VmStatus};

/// Evaluates and executes Impulse modules.
///
/// A `Vm` is cheap to construct and holds all state a running program can
/// touch: the loaded modules, their evaluated globals, and the tracing heap.
/// `load` and `run` never unwind; failures come back as [`VmLoadResult`]/
/// [`VmResult`] values.
pub struct Vm {
    modules: BTreeMap<String, Module>,
    globals: BTreeMap<String, BTreeMap<String, Value>>,
    heap: GcHeap,
    config: InterpreterConfig,
    read_line_provider: Option<Box<dyn FnMut() -> String>>,
    input_stream: Option<Box<dyn BufRead>>,
}

impl Vm {
    /// Construct a `Vm` with the given configuration.
    #[must_use]
    pub fn new(config: InterpreterConfig) -> Self {
        let heap = GcHeap::new(config.gc.initial_threshold_bytes, config.gc.growth_factor);
        Self {
            modules: BTreeMap::new(),
            globals: BTreeMap::new(),
            heap,
            config,
            read_line_provider: None,
            input_stream: None,
        }
    }

    /// Load (or reload) a module. Module-level bindings are pre-evaluated
    /// with a small stack interpreter sufficient for literals, references to
    /// already-evaluated globals, binary/unary arithmetic, and `store`
    /// (spec §4.I). A binding whose initializer needs anything richer — a
    /// call, a branch, an array op — is reported as a diagnostic rather than
    /// failing the whole load.
    pub fn load(&mut self, module: Module) -> VmLoadResult {
        let mut diagnostics = Vec::new();
        let mut globals = BTreeMap::new();

        for binding in &module.bindings {
            match evaluate_constant(&binding.name, &binding.initializer_instructions, &globals) {
                Ok(value) => {
                    globals.insert(binding.name.clone(), value);
                }
                Err(err) => diagnostics.push(err.to_string()),
            }
        }

        let success = diagnostics.is_empty();
        debug!(
            module = %module.dotted_name(),
            bindings = module.bindings.len(),
            failures = diagnostics.len(),
            "module loaded"
        );
        self.globals.insert(module.dotted_name(), globals);
        self.modules.insert(module.dotted_name(), module);
        VmLoadResult {
            success,
            diagnostics,
        }
    }

    /// Run `entry_name` in `module_name` to completion.
    ///
    /// Builds the CFG, dominance tree, and pruned SSA for the function,
    /// verifies it, runs the configured optimiser passes, re-verifies, and
    /// interprets it. Every declared parameter defaults to numeric `0` —
    /// this entry point is a smoke-test harness, not a general caller
    /// convention.
    pub fn run(&mut self, module_name: &str, entry_name: &str) -> VmResult {
        let Some(module) = self.modules.get(module_name) else {
            return VmResult::failure(
                VmStatus::MissingSymbol,
                format!("module {module_name:?} is not loaded"),
            );
        };
        let Some(function) = module.function(entry_name) else {
            return VmResult::failure(
                VmStatus::MissingSymbol,
                format!("function {entry_name:?} not found in module {module_name:?}"),
            );
        };

        let functions: BTreeMap<String, Function> = module
            .functions
            .iter()
            .map(|f| (f.name.clone(), f.clone()))
            .collect();
        let args = vec![Value::Number(0.0); function.parameters.len()];
        let globals = self.globals.get(module_name).cloned().unwrap_or_default();
        let config = self.config.clone();

        let mut output = String::new();
        let root_frames = Rc::new(RefCell::new(Vec::new()));

        let heap = &mut self.heap;
        let mut read_line = |provider: &mut Option<Box<dyn FnMut() -> String>>,
                              stream: &mut Option<Box<dyn BufRead>>|
         -> String {
            if let Some(provider) = provider {
                return provider();
            }
            if let Some(stream) = stream {
                let mut line = String::new();
                if stream.read_line(&mut line).unwrap_or(0) == 0 {
                    return String::new();
                }
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                return line;
            }
            String::new()
        };
        let read_line_provider = &mut self.read_line_provider;
        let input_stream = &mut self.input_stream;
        let mut read_line_fn =
            move || -> String { read_line(read_line_provider, input_stream) };

        let result = invoke(
            &functions,
            &globals,
            entry_name,
            args,
            heap,
            &mut output,
            &mut read_line_fn,
            root_frames,
            &config,
        );

        match result {
            Ok(Some(value)) => VmResult::success_with_value(value),
            Ok(None) => VmResult::success(),
            Err(err) => classify_error(&err),
        }
        .with_output_if_unset(output)
    }

    /// Supply input for the `read_line` builtin by reading lines from
    /// `stream` (spec §4.I "Reads may be backed by..."). Overridden by a
    /// provider installed with [`Vm::set_read_line_provider`].
    pub fn set_input_stream(&mut self, stream: impl BufRead + 'static) {
        self.input_stream = Some(Box::new(stream));
    }

    /// Supply input for the `read_line` builtin via an explicit callback,
    /// taking precedence over any stream installed with
    /// [`Vm::set_input_stream`].
    pub fn set_read_line_provider(&mut self, provider: impl FnMut() -> String + 'static) {
        self.read_line_provider = Some(Box::new(provider));
    }

    /// Force a garbage collection pass over the current globals (used by
    /// tests; no live frames exist between calls to [`Vm::run`]).
    pub fn collect_garbage(&mut self) {
        let roots: Vec<Value> = self
            .globals
            .values()
            .flat_map(BTreeMap::values)
            .cloned()
            .collect();
        self.heap.collect(roots.iter());
    }

    /// Number of objects currently live on the heap.
    #[must_use]
    pub fn heap_object_count(&self) -> usize {
        self.heap.object_count()
    }

    /// Enable SSA-level tracing by installing a global `tracing_subscriber`
    /// that writes to `writer` (spec §6 `set_trace_stream`).
    pub fn set_trace_stream(&mut self, writer: impl std::io::Write + Send + 'static) {
        crate::trace::install_trace_writer(writer);
    }

    /// Build, and optionally optimise, `function_name`'s CFG and SSA without
    /// interpreting it, returning stable textual dumps of each stage.
    /// Supplements the original runtime's `analyse_module` (not named by the
    /// load/run surface above) for tooling that wants a before/after
    /// optimisation diff. Returns `None` if the module or function is unknown.
    #[must_use]
    pub fn analyze_function(
        &self,
        module_name: &str,
        function_name: &str,
    ) -> Option<FunctionAnalysis> {
        let module = self.modules.get(module_name)?;
        let function = module.function(function_name)?;
        let cfg = CfgBuilder::build(function).ok()?;
        let dominance = DominanceInfo::compute(&cfg);
        let mut ssa = SsaBuilder::build(function, &cfg, &dominance);
        let ssa_before = crate::trace::dump_ssa(&ssa);
        Optimizer::run(&mut ssa, &self.config.optimizer);
        let ssa_after = crate::trace::dump_ssa(&ssa);
        Some(FunctionAnalysis {
            cfg: crate::trace::dump_cfg(&cfg),
            ssa_before,
            ssa_after,
        })
    }
}

/// Stable textual dumps of one function's CFG and SSA, before and after
/// optimisation (spec.md's "expected.optimisation.txt" fixture implies a
/// before/after diff).
#[derive(Debug, Clone)]
pub struct FunctionAnalysis {
    /// CFG dump (spec §6 "expected.cfg.txt").
    pub cfg: String,
    /// SSA dump before the optimiser runs (spec §6 "expected.ssa.txt").
    pub ssa_before: String,
    /// SSA dump after the optimiser runs (spec §6 "expected.optimisation.txt").
    pub ssa_after: String,
}

fn classify_error(err: &Error) -> VmResult {
    match err {
        Error::Cfg(_) | Error::Ssa(_) | Error::Load(_) => {
            VmResult::failure(VmStatus::ModuleError, err.to_string())
        }
        Error::Runtime(RuntimeError::UnknownCallee { .. }) => {
            VmResult::failure(VmStatus::MissingSymbol, err.to_string())
        }
        Error::Runtime(_) => VmResult::failure(VmStatus::RuntimeError, err.to_string()),
        Error::Io(_) => VmResult::failure(VmStatus::RuntimeError, err.to_string()),
    }
}

/// Build, verify, optimise, and interpret `name` recursively.
///
/// A free function rather than a `Vm` method: the interpreter's call
/// dispatch re-enters this same function for every nested user call, and a
/// method taking `&mut self` cannot be re-invoked while a borrow from an
/// earlier frame is still live. Each frame instead receives the pieces of
/// `Vm` state it needs as plain parameters, reborrowed fresh at every call
/// site. `root_frames` is the one piece of state two sibling closures below
/// (`call_user`, `safepoint`) must share; `Rc<RefCell<_>>` lets each hold an
/// independent handle since execution is single-threaded and never holds two
/// borrows at once.
#[allow(clippy::too_many_arguments)]
fn invoke<'f>(
    functions: &'f BTreeMap<String, Function>,
    globals: &'f BTreeMap<String, Value>,
    name: &str,
    args: Vec<Value>,
    heap: &mut GcHeap,
    output: &mut String,
    read_line: &mut dyn FnMut() -> String,
    root_frames: Rc<RefCell<Vec<Vec<Value>>>>,
    config: &'f InterpreterConfig,
) -> Result<Option<f64>> {
    let function = functions
        .get(name)
        .ok_or_else(|| RuntimeError::UnknownCallee {
            name: name.to_string(),
        })?;

    let cfg = CfgBuilder::build(function)?;
    let dominance = DominanceInfo::compute(&cfg);
    let mut ssa = SsaBuilder::build(function, &cfg, &dominance);

    verify(&ssa, &dominance, name)?;
    Optimizer::run(&mut ssa, &config.optimizer);
    verify(&ssa, &dominance, name)?;

    let params: BTreeMap<String, Value> = function
        .parameters
        .iter()
        .zip(args)
        .map(|(p, a)| (p.name.clone(), a))
        .collect();

    let frame_index = {
        let mut frames = root_frames.borrow_mut();
        frames.push(Vec::new());
        frames.len() - 1
    };

    let call_user_frames = Rc::clone(&root_frames);
    let mut call_user = move |callee: &str,
                               call_args: Vec<Value>,
                               heap: &mut GcHeap,
                               output: &mut String,
                               read_line: &mut dyn FnMut() -> String|
          -> Result<Value> {
        let returned = invoke(
            functions,
            globals,
            callee,
            call_args,
            heap,
            output,
            read_line,
            Rc::clone(&call_user_frames),
            config,
        )?;
        Ok(returned.map_or(Value::Nil, Value::Number))
    };

    let safepoint_frames = Rc::clone(&root_frames);
    let mut safepoint = move |heap: &mut GcHeap, live: &[Value]| {
        let roots: Vec<Value> = {
            let mut frames = safepoint_frames.borrow_mut();
            if let Some(slot) = frames.get_mut(frame_index) {
                *slot = live.to_vec();
            }
            globals
                .values()
                .cloned()
                .chain(frames.iter().flatten().cloned())
                .collect()
        };
        heap.maybe_collect(roots.iter());
    };

    let result = {
        let mut interp = SsaInterpreter::new(
            &ssa,
            functions,
            heap,
            output,
            read_line,
            &mut call_user,
            &mut safepoint,
        );
        interp.run(&params)
    };

    root_frames.borrow_mut().pop();
    trace!(function = name, "call returned");
    result
}

fn verify(
    ssa: &crate::ssa::SsaFunction,
    dominance: &DominanceInfo,
    name: &str,
) -> Result<()> {
    let issues = SsaVerifier::verify(ssa, dominance);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(SsaError::VerificationFailed {
            function: name.to_string(),
            issues: issues.len(),
        }
        .into())
    }
}

/// Evaluate a module binding's initializer with a tiny stack interpreter:
/// literal, string literal, reference (to an already-evaluated global),
/// unary/binary arithmetic, and store. Anything else bails out with
/// [`LoadError::NotConstant`].
fn evaluate_constant(
    name: &str,
    instructions: &[Instruction],
    globals: &BTreeMap<String, Value>,
) -> std::result::Result<Value, LoadError> {
    let not_constant = |reason: String| LoadError::NotConstant {
        name: name.to_string(),
        reason,
    };

    let mut stack: Vec<Value> = Vec::new();
    let mut stored: Option<Value> = None;

    for instruction in instructions {
        match instruction {
            Instruction::Literal(literal) => stack.push(Value::Number(literal.as_f64())),
            Instruction::StringLiteral(s) => stack.push(Value::Str(s.clone())),
            Instruction::Reference(reference) => {
                let value = globals.get(reference).cloned().ok_or_else(|| {
                    not_constant(format!("reference to undefined binding {reference:?}"))
                })?;
                stack.push(value);
            }
            Instruction::Unary(op) => {
                let operand = stack
                    .pop()
                    .ok_or_else(|| not_constant("stack underflow".to_string()))?;
                let x = operand
                    .as_number()
                    .ok_or_else(|| not_constant(format!("non-numeric operand to {op:?}")))?;
                let result = eval_unary(op, x)
                    .ok_or_else(|| not_constant(format!("unsupported unary operator {op:?}")))?;
                stack.push(Value::Number(result));
            }
            Instruction::Binary(op) => {
                let rhs = stack
                    .pop()
                    .ok_or_else(|| not_constant("stack underflow".to_string()))?;
                let lhs = stack
                    .pop()
                    .ok_or_else(|| not_constant("stack underflow".to_string()))?;
                let x = lhs
                    .as_number()
                    .ok_or_else(|| not_constant(format!("non-numeric operand to {op:?}")))?;
                let y = rhs
                    .as_number()
                    .ok_or_else(|| not_constant(format!("non-numeric operand to {op:?}")))?;
                match eval_binary(op, x, y) {
                    Some(result) => stack.push(Value::Number(result)),
                    None if op == "/" || op == "%" => {
                        return Err(LoadError::DivisionByZero {
                            name: name.to_string(),
                        });
                    }
                    None => return Err(not_constant(format!("unsupported binary operator {op:?}"))),
                }
            }
            Instruction::Store(_) => {
                stored = stack.pop();
            }
            Instruction::Drop => {
                stack.pop();
            }
            Instruction::Label(_) | Instruction::Comment(_) => {}
            other => return Err(not_constant(format!("{other:?} is not a constant operation"))),
        }
    }

    stored
        .or_else(|| stack.pop())
        .ok_or_else(|| not_constant("initializer produced no value".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, Binding, FunctionParameter, StorageClass};

    fn literal_module() -> Module {
        let mut module = Module::new(vec!["demo".to_string()]);
        module.bindings.push(Binding::new(
            StorageClass::Const,
            "answer",
            "number",
            vec![
                Instruction::Literal(crate::ir::Literal::Number(40.0)),
                Instruction::Literal(crate::ir::Literal::Number(2.0)),
                Instruction::Binary("+".to_string()),
                Instruction::Store("answer".to_string()),
            ],
        ));

        let mut function = Function::new("main");
        function.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Reference("answer".to_string()),
                Instruction::Return,
            ],
        ));
        module.functions.push(function);
        module
    }

    #[test]
    fn load_evaluates_constant_bindings() {
        let mut vm = Vm::new(InterpreterConfig::default());
        let result = vm.load(literal_module());
        assert!(result.success);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn run_resolves_global_and_returns_value() {
        let mut vm = Vm::new(InterpreterConfig::default());
        vm.load(literal_module());
        let result = vm.run("demo", "main");
        assert_eq!(result.status, VmStatus::Success);
        assert!(result.has_value);
        assert_eq!(result.value, 42.0);
    }

    #[test]
    fn run_reports_missing_module() {
        let mut vm = Vm::new(InterpreterConfig::default());
        let result = vm.run("nowhere", "main");
        assert_eq!(result.status, VmStatus::MissingSymbol);
    }

    #[test]
    fn run_reports_missing_function() {
        let mut vm = Vm::new(InterpreterConfig::default());
        vm.load(literal_module());
        let result = vm.run("demo", "missing");
        assert_eq!(result.status, VmStatus::MissingSymbol);
    }

    #[test]
    fn load_reports_diagnostic_for_non_constant_binding() {
        let mut module = Module::new(vec!["demo".to_string()]);
        module.bindings.push(Binding::new(
            StorageClass::Const,
            "bad",
            "number",
            vec![Instruction::Call {
                callee: "something".to_string(),
                argc: 0,
            }],
        ));
        let mut vm = Vm::new(InterpreterConfig::default());
        let result = vm.load(module);
        assert!(!result.success);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn recursive_calls_interpret_through_invoke() {
        let mut module = Module::new(vec!["rec".to_string()]);
        let mut countdown = Function::new("countdown");
        countdown
            .parameters
            .push(FunctionParameter::new("n", "number"));
        countdown.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Reference("n".to_string()),
                Instruction::Literal(crate::ir::Literal::Number(0.0)),
                Instruction::Binary("==".to_string()),
                Instruction::BranchIf {
                    label: "base".to_string(),
                    value: 1.0,
                },
            ],
        ));
        countdown.blocks.push(BasicBlock::with_instructions(
            "recurse",
            vec![
                Instruction::Reference("n".to_string()),
                Instruction::Literal(crate::ir::Literal::Number(1.0)),
                Instruction::Binary("-".to_string()),
                Instruction::Call {
                    callee: "countdown".to_string(),
                    argc: 1,
                },
                Instruction::Return,
            ],
        ));
        countdown.blocks.push(BasicBlock::with_instructions(
            "base",
            vec![
                Instruction::Literal(crate::ir::Literal::Number(0.0)),
                Instruction::Return,
            ],
        ));
        module.functions.push(countdown);

        let mut vm = Vm::new(InterpreterConfig::default());
        vm.load(module);
        let result = vm.run("rec", "countdown");
        assert_eq!(result.status, VmStatus::Success);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn analyze_function_dumps_cfg_and_both_ssa_stages() {
        let mut vm = Vm::new(InterpreterConfig::default());
        vm.load(literal_module());
        let analysis = vm.analyze_function("demo", "main").unwrap();
        assert!(analysis.cfg.contains("entry"));
        assert!(analysis.ssa_before.contains("function main"));
        assert!(analysis.ssa_after.contains("function main"));
    }

    #[test]
    fn analyze_function_is_none_for_unknown_function() {
        let mut vm = Vm::new(InterpreterConfig::default());
        vm.load(literal_module());
        assert!(vm.analyze_function("demo", "missing").is_none());
    }
}
