//! The SSA execution loop: φ materialisation on block entry, per-opcode
//! dispatch, and builtin/user call resolution (spec §4.H).

use std::collections::BTreeMap;

use crate::cfg::BlockId;
use crate::error::{Result, RuntimeError};
use crate::gc::{GcHeap, Value};
use crate::ir::Function;
use crate::optimize::lattice::{eval_binary, eval_unary};
use crate::ssa::{SsaBlock, SsaFunction, SsaValue};

use super::builtins;
use super::value::stringify;

/// Signature of the callback the VM driver supplies for calling a
/// non-builtin function, so frame-guard discipline (push/pop onto the root
/// set) stays with the driver rather than the interpreter (spec §4.H "Call
/// dispatch").
pub type CallUserFunction<'a> = dyn FnMut(
        &str,
        Vec<Value>,
        &mut GcHeap,
        &mut String,
        &mut dyn FnMut() -> String,
    ) -> Result<Value>
    + 'a;

/// Outcome of executing one block's instruction range.
enum BlockOutcome {
    /// Control transferred to another block.
    Jump(BlockId),
    /// The block fell off its end with no jump instruction.
    Fallthrough,
    /// A `return` instruction fired.
    Return(Option<f64>),
}

/// Executes a single [`SsaFunction`] to completion against a parameter map
/// (spec §4.H).
pub struct SsaInterpreter<'a> {
    function: &'a SsaFunction,
    function_lookup: &'a BTreeMap<String, Function>,
    heap: &'a mut GcHeap,
    output: &'a mut String,
    read_line: &'a mut dyn FnMut() -> String,
    call_user: &'a mut CallUserFunction<'a>,
    safepoint: &'a mut dyn FnMut(&mut GcHeap, &[Value]),
    value_cache: BTreeMap<SsaValue, Value>,
    locals: BTreeMap<String, Value>,
    block_lookup: BTreeMap<String, BlockId>,
}

impl<'a> SsaInterpreter<'a> {
    /// Construct an interpreter for `function`. `function_lookup` resolves
    /// call targets that aren't builtins; `call_user` recursively executes
    /// them (built, optimised, and interpreted by the driver, not here).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        function: &'a SsaFunction,
        function_lookup: &'a BTreeMap<String, Function>,
        heap: &'a mut GcHeap,
        output: &'a mut String,
        read_line: &'a mut dyn FnMut() -> String,
        call_user: &'a mut CallUserFunction<'a>,
        safepoint: &'a mut dyn FnMut(&mut GcHeap, &[Value]),
    ) -> Self {
        let block_lookup = function
            .blocks
            .iter()
            .map(|b| (b.label.clone(), b.id))
            .collect();
        Self {
            function,
            function_lookup,
            heap,
            output,
            read_line,
            call_user,
            safepoint,
            value_cache: BTreeMap::new(),
            locals: BTreeMap::new(),
            block_lookup,
        }
    }

    /// Run to completion, returning the function's numeric return value (or
    /// `None` if it returned without a value).
    pub fn run(&mut self, params: &BTreeMap<String, Value>) -> Result<Option<f64>> {
        for (name, value) in params {
            if let Some(symbol) = self.function.symbols.find(name) {
                let result = SsaValue::new(symbol, 1);
                self.value_cache.insert(result, value.clone());
                self.locals.insert(format!("$ssa:{result}"), value.clone());
                self.locals.insert(name.clone(), value.clone());
            }
        }

        let mut previous: Option<BlockId> = None;
        let mut current = BlockId::ENTRY;
        loop {
            let block = self.function.block(current);
            self.materialize_phis(block, previous);
            match self.execute_block(block)? {
                BlockOutcome::Return(value) => return Ok(value),
                BlockOutcome::Jump(next) => {
                    previous = Some(current);
                    current = next;
                }
                BlockOutcome::Fallthrough => match block.successors.as_slice() {
                    [only] => {
                        previous = Some(current);
                        current = *only;
                    }
                    _ => return Err(RuntimeError::NoReturn.into()),
                },
            }
        }
    }

    /// Source-level names and `$ssa:`-prefixed SSA value names mapped to
    /// their current runtime value, as they stand at whatever point
    /// execution is inspected from (spec §4.H "locals"). Exposed for
    /// tooling built on top of the interpreter (e.g. a future debugger or
    /// trace dumper), not consulted by the interpreter itself.
    #[must_use]
    pub fn locals(&self) -> &BTreeMap<String, Value> {
        &self.locals
    }

    fn materialize_phis(&mut self, block: &SsaBlock, previous: Option<BlockId>) {
        for phi in &block.phi_nodes {
            let reaching = previous
                .and_then(|p| phi.operands.get(&p).copied().flatten())
                .or_else(|| phi.operands.values().find_map(|v| *v));
            let value = reaching.map(|ssa| self.read(ssa)).unwrap_or(Value::Number(0.0));
            self.store(phi.result, value);
        }
    }

    fn execute_block(&mut self, block: &SsaBlock) -> Result<BlockOutcome> {
        for instr in &block.instructions {
            match instr.opcode.as_str() {
                "literal" => {
                    let n: f64 = instr.immediates[0].parse().unwrap_or(0.0);
                    self.store(instr.result.expect("literal defines a result"), Value::Number(n));
                }
                "literal_string" => {
                    let s = instr.immediates[0].clone();
                    self.store(instr.result.expect("literal_string defines a result"), Value::Str(s));
                }
                "unary" => {
                    let operand = self.read(instr.args[0]);
                    let op = instr.immediates[0].as_str();
                    let x = self.expect_number(&operand, op)?;
                    let n = eval_unary(op, x)
                        .ok_or_else(|| RuntimeError::NonNumericOperand { op: op.to_string() })?;
                    self.store(instr.result.expect("unary defines a result"), Value::Number(n));
                }
                "binary" => {
                    let lhs = self.read(instr.args[0]);
                    let rhs = self.read(instr.args[1]);
                    let op = instr.immediates[0].as_str();
                    let value = self.eval_binary_value(op, &lhs, &rhs)?;
                    self.store(instr.result.expect("binary defines a result"), value);
                }
                "assign" => {
                    let value = self.read(instr.args[0]);
                    self.store(instr.result.expect("assign defines a result"), value);
                }
                "param" => {
                    // The value was already seeded into `value_cache`/`locals`
                    // by `run()` before this block executed; the instruction
                    // exists purely to give the parameter's version-1 value a
                    // real definition site for the verifier.
                }
                "drop" => {}
                "branch" => {
                    let target = self.branch_target(block, &instr.immediates[0], 0)?;
                    return Ok(BlockOutcome::Jump(target));
                }
                "branch_if" => {
                    let cond = self.read(instr.args[0]);
                    let k: f64 = instr.immediates[1].parse().unwrap_or(0.0);
                    let taken = cond.as_number().unwrap_or(0.0) == k;
                    let target = if taken {
                        self.branch_target(block, &instr.immediates[0], 0)?
                    } else {
                        self.fallthrough_target(block)?
                    };
                    return Ok(BlockOutcome::Jump(target));
                }
                "return" => {
                    let value = match instr.args.first() {
                        Some(v) => {
                            let value = self.read(*v);
                            let n = value
                                .as_number()
                                .ok_or(RuntimeError::NonNumericReturn)?;
                            Some(n)
                        }
                        None => None,
                    };
                    return Ok(BlockOutcome::Return(value));
                }
                "call" => {
                    let args: Vec<Value> = instr.args.iter().map(|a| self.read(*a)).collect();
                    let callee = instr.immediates[0].clone();
                    let value = self.dispatch_call(&callee, args)?;
                    if let Some(result) = instr.result {
                        self.store(result, value);
                    }
                }
                "array_make" => {
                    let length_value = self.read(instr.args[0]);
                    let length = self.expect_non_negative(&length_value, "array_make")?;
                    let value = self.heap.allocate_array(length, Value::Number(0.0));
                    self.store(instr.result.expect("array_make defines a result"), value);
                    self.run_safepoint();
                }
                "array_get" => {
                    let array = self.read(instr.args[0]);
                    let index = self.read(instr.args[1]);
                    let id = self.expect_object(&array, "array_get")?;
                    let idx = self.expect_number(&index, "array_get")? as i64;
                    let elements_len = self.heap.object(id).map(|o| o.elements.len()).unwrap_or(0);
                    if idx < 0 || idx as usize >= elements_len {
                        return Err(RuntimeError::IndexOutOfBounds {
                            index: idx,
                            length: elements_len,
                        }
                        .into());
                    }
                    let value = self
                        .heap
                        .object(id)
                        .map(|o| o.elements[idx as usize].clone())
                        .unwrap_or(Value::Nil);
                    self.store(instr.result.expect("array_get defines a result"), value);
                }
                "array_set" => {
                    let array = self.read(instr.args[0]);
                    let index = self.read(instr.args[1]);
                    let value = self.read(instr.args[2]);
                    let id = self.expect_object(&array, "array_set")?;
                    let idx = self.expect_number(&index, "array_set")? as i64;
                    let elements_len = self.heap.object(id).map(|o| o.elements.len()).unwrap_or(0);
                    if idx < 0 || idx as usize >= elements_len {
                        return Err(RuntimeError::IndexOutOfBounds {
                            index: idx,
                            length: elements_len,
                        }
                        .into());
                    }
                    if let Some(object) = self.heap.object_mut(id) {
                        object.elements[idx as usize] = value;
                    }
                }
                "array_length" => {
                    let array = self.read(instr.args[0]);
                    let id = self.expect_object(&array, "array_length")?;
                    let len = self.heap.object(id).map(|o| o.elements.len()).unwrap_or(0);
                    self.store(
                        instr.result.expect("array_length defines a result"),
                        Value::Number(len as f64),
                    );
                }
                other => unreachable!("unknown ssa opcode {other:?}"),
            }
        }
        Ok(BlockOutcome::Fallthrough)
    }

    fn eval_binary_value(&mut self, op: &str, lhs: &Value, rhs: &Value) -> Result<Value> {
        if op == "+" && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_))) {
            return Ok(Value::Str(format!(
                "{}{}",
                stringify(lhs, self.heap),
                stringify(rhs, self.heap)
            )));
        }
        if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
            if op == "==" {
                return Ok(bool_value(a == b));
            }
            if op == "!=" {
                return Ok(bool_value(a != b));
            }
        }
        let x = self.expect_number(lhs, op)?;
        let y = self.expect_number(rhs, op)?;
        match eval_binary(op, x, y) {
            Some(n) => Ok(Value::Number(n)),
            None if op == "/" || op == "%" => Err(RuntimeError::DivisionByZero.into()),
            None => Err(RuntimeError::NonNumericOperand { op: op.to_string() }.into()),
        }
    }

    fn dispatch_call(&mut self, callee: &str, args: Vec<Value>) -> Result<Value> {
        if builtins::is_builtin(callee) {
            let result = builtins::call(callee, &args, self.heap, self.output, self.read_line)?;
            if callee.trim_start_matches("std::math::") == "array_push" {
                self.run_safepoint();
            }
            Ok(result)
        } else {
            let function = self
                .function_lookup
                .get(callee)
                .ok_or_else(|| RuntimeError::UnknownCallee {
                    name: callee.to_string(),
                })?;
            if function.parameters.len() != args.len() {
                return Err(RuntimeError::ArityMismatch {
                    name: callee.to_string(),
                    expected: function.parameters.len(),
                    actual: args.len(),
                }
                .into());
            }
            (self.call_user)(callee, args, self.heap, self.output, self.read_line)
        }
    }

    /// Snapshot this function's current live values and offer them to the
    /// driver-supplied safepoint, which decides (via `GcHeap::maybe_collect`)
    /// whether to actually collect.
    fn run_safepoint(&mut self) {
        let snapshot: Vec<Value> = self.value_cache.values().cloned().collect();
        (self.safepoint)(self.heap, &snapshot);
    }

    fn branch_target(&self, block: &SsaBlock, label: &str, fallback_index: usize) -> Result<BlockId> {
        self.block_lookup
            .get(label)
            .copied()
            .or_else(|| block.successors.get(fallback_index).copied())
            .ok_or_else(|| RuntimeError::NoReturn.into())
    }

    fn fallthrough_target(&self, block: &SsaBlock) -> Result<BlockId> {
        block
            .successors
            .get(1)
            .or_else(|| block.successors.first())
            .copied()
            .ok_or_else(|| RuntimeError::NoReturn.into())
    }

    fn read(&self, value: SsaValue) -> Value {
        if value.is_environment() {
            return Value::Number(0.0);
        }
        self.value_cache
            .get(&value)
            .cloned()
            .unwrap_or(Value::Number(0.0))
    }

    fn store(&mut self, result: SsaValue, value: Value) {
        self.value_cache.insert(result, value.clone());
        // Every write gets a `$ssa:`-keyed shadow entry so tooling can look
        // a value up by its SSA name even when its symbol has no
        // source-level name (spec §4.H "locals").
        self.locals.insert(format!("$ssa:{result}"), value.clone());
        let name = self.function.symbols.symbol(result.symbol).name.clone();
        if !name.starts_with('%') {
            self.locals.insert(name, value);
        }
    }

    fn expect_number(&self, value: &Value, op: &str) -> Result<f64> {
        value
            .as_number()
            .ok_or_else(|| RuntimeError::NonNumericOperand { op: op.to_string() }.into())
    }

    fn expect_non_negative(&self, value: &Value, op: &str) -> Result<usize> {
        let n = self.expect_number(value, op)?;
        if n < 0.0 {
            return Err(RuntimeError::NonNumericOperand { op: op.to_string() }.into());
        }
        Ok(n as usize)
    }

    fn expect_object(&self, value: &Value, op: &str) -> Result<crate::gc::ObjectId> {
        match value {
            Value::Object(id) => Ok(*id),
            _ => Err(RuntimeError::NonNumericOperand { op: op.to_string() }.into()),
        }
    }
}

fn bool_value(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::ir::{BasicBlock, Instruction, Literal};
    use crate::ssa::{DominanceInfo, SsaBuilder};

    fn interpret(function: &SsaFunction, params: BTreeMap<String, Value>) -> Option<f64> {
        let lookup: BTreeMap<String, Function> = BTreeMap::new();
        let mut heap = GcHeap::new(1024 * 1024, 2);
        let mut output = String::new();
        let mut read_line = || String::new();
        let mut call_user = |_: &str,
                              _: Vec<Value>,
                              _: &mut GcHeap,
                              _: &mut String,
                              _: &mut dyn FnMut() -> String|
         -> Result<Value> { unreachable!("test fixtures never call user functions") };
        let mut safepoint = |_: &mut GcHeap, _: &[Value]| {};
        let mut interp = SsaInterpreter::new(
            function,
            &lookup,
            &mut heap,
            &mut output,
            &mut read_line,
            &mut call_user,
            &mut safepoint,
        );
        interp.run(&params).unwrap()
    }

    #[test]
    fn adds_two_literals_and_returns() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(2.0)),
                Instruction::Literal(Literal::Number(3.0)),
                Instruction::Binary("+".to_string()),
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let ssa = SsaBuilder::build(&f, &cfg, &dominance);

        assert_eq!(interpret(&ssa, BTreeMap::new()), Some(5.0));
    }

    #[test]
    fn branch_if_chooses_the_taken_path() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(1.0)),
                Instruction::BranchIf {
                    label: "then".to_string(),
                    value: 1.0,
                },
                Instruction::Literal(Literal::Number(0.0)),
                Instruction::Return,
            ],
        ));
        f.blocks.push(BasicBlock::with_instructions(
            "then",
            vec![
                Instruction::Label("then".to_string()),
                Instruction::Literal(Literal::Number(99.0)),
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let ssa = SsaBuilder::build(&f, &cfg, &dominance);

        assert_eq!(interpret(&ssa, BTreeMap::new()), Some(99.0));
    }

    #[test]
    fn division_by_near_zero_is_a_runtime_error() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(1.0)),
                Instruction::Literal(Literal::Number(0.0)),
                Instruction::Binary("/".to_string()),
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let ssa = SsaBuilder::build(&f, &cfg, &dominance);

        let lookup: BTreeMap<String, Function> = BTreeMap::new();
        let mut heap = GcHeap::new(1024 * 1024, 2);
        let mut output = String::new();
        let mut read_line = || String::new();
        let mut call_user = |_: &str,
                              _: Vec<Value>,
                              _: &mut GcHeap,
                              _: &mut String,
                              _: &mut dyn FnMut() -> String|
         -> Result<Value> { unreachable!() };
        let mut safepoint = |_: &mut GcHeap, _: &[Value]| {};
        let mut interp = SsaInterpreter::new(
            &ssa,
            &lookup,
            &mut heap,
            &mut output,
            &mut read_line,
            &mut call_user,
            &mut safepoint,
        );
        assert!(interp.run(&BTreeMap::new()).is_err());
    }
}
