//! End-to-end scenarios S1-S6 (spec §8 "End-to-end scenarios"), each
//! IR module hand-built the way a frontend would emit it.

use impulse_core::common::InterpreterConfig;
use impulse_core::ir::{
    BasicBlock, Binding, Function, FunctionParameter, Instruction, Literal, Module, StorageClass,
};
use impulse_core::vm::{Vm, VmStatus};

fn single_function_module(name: &str, function: Function) -> Module {
    let mut module = Module::new(vec![name.to_string()]);
    module.functions.push(function);
    module
}

/// S1: `func main() -> int { return 1 + 2 * 3; }` → `Success, value=7`.
#[test]
fn s1_constant_arithmetic_returns_seven() {
    let mut main = Function::new("main");
    main.blocks.push(BasicBlock::with_instructions(
        "entry",
        vec![
            Instruction::Literal(Literal::Number(1.0)),
            Instruction::Literal(Literal::Number(2.0)),
            Instruction::Literal(Literal::Number(3.0)),
            Instruction::Binary("*".to_string()),
            Instruction::Binary("+".to_string()),
            Instruction::Return,
        ],
    ));

    let mut vm = Vm::new(InterpreterConfig::default());
    vm.load(single_function_module("d", main));
    let result = vm.run("d", "main");
    assert_eq!(result.status, VmStatus::Success);
    assert!(result.has_value);
    assert_eq!(result.value, 7.0);
}

/// S2: recursive factorial-like `f`, `main` returns `f(5)` → `Success, value=120`.
#[test]
fn s2_recursive_call_returns_factorial() {
    let mut module = Module::new(vec!["d".to_string()]);

    let mut f = Function::new("f");
    f.parameters.push(FunctionParameter::new("n", "int"));
    f.blocks.push(BasicBlock::with_instructions(
        "entry",
        vec![
            Instruction::Reference("n".to_string()),
            Instruction::Literal(Literal::Number(1.0)),
            Instruction::Binary("<=".to_string()),
            Instruction::BranchIf {
                label: "base".to_string(),
                value: 1.0,
            },
        ],
    ));
    f.blocks.push(BasicBlock::with_instructions(
        "recurse",
        vec![
            Instruction::Reference("n".to_string()),
            Instruction::Reference("n".to_string()),
            Instruction::Literal(Literal::Number(1.0)),
            Instruction::Binary("-".to_string()),
            Instruction::Call {
                callee: "f".to_string(),
                argc: 1,
            },
            Instruction::Binary("*".to_string()),
            Instruction::Return,
        ],
    ));
    f.blocks.push(BasicBlock::with_instructions(
        "base",
        vec![Instruction::Literal(Literal::Number(1.0)), Instruction::Return],
    ));
    module.functions.push(f);

    let mut main = Function::new("main");
    main.blocks.push(BasicBlock::with_instructions(
        "entry",
        vec![
            Instruction::Literal(Literal::Number(5.0)),
            Instruction::Call {
                callee: "f".to_string(),
                argc: 1,
            },
            Instruction::Return,
        ],
    ));
    module.functions.push(main);

    let mut vm = Vm::new(InterpreterConfig::default());
    vm.load(module);
    let result = vm.run("d", "main");
    assert_eq!(result.status, VmStatus::Success);
    assert_eq!(result.value, 120.0);
}

/// S3: `while x < 5 { x = x + 1; } return x;` → `Success, value=5`.
#[test]
fn s3_while_loop_counts_to_five() {
    let mut main = Function::new("main");
    main.blocks.push(BasicBlock::with_instructions(
        "entry",
        vec![
            Instruction::Literal(Literal::Number(0.0)),
            Instruction::Store("x".to_string()),
            Instruction::Branch("check".to_string()),
        ],
    ));
    main.blocks.push(BasicBlock::with_instructions(
        "check",
        vec![
            Instruction::Reference("x".to_string()),
            Instruction::Literal(Literal::Number(5.0)),
            Instruction::Binary("<".to_string()),
            Instruction::BranchIf {
                label: "body".to_string(),
                value: 1.0,
            },
        ],
    ));
    // "exit" sits right after "check" so it is the untaken fallthrough;
    // "body" jumps back to "check" explicitly.
    main.blocks.push(BasicBlock::with_instructions(
        "exit",
        vec![Instruction::Reference("x".to_string()), Instruction::Return],
    ));
    main.blocks.push(BasicBlock::with_instructions(
        "body",
        vec![
            Instruction::Reference("x".to_string()),
            Instruction::Literal(Literal::Number(1.0)),
            Instruction::Binary("+".to_string()),
            Instruction::Store("x".to_string()),
            Instruction::Branch("check".to_string()),
        ],
    ));

    let mut vm = Vm::new(InterpreterConfig::default());
    vm.load(single_function_module("d", main));
    let result = vm.run("d", "main");
    assert_eq!(result.status, VmStatus::Success);
    assert_eq!(result.value, 5.0);
}

/// S4: allocate a 3-element array, fill it, sum it → `Success, value=60`.
#[test]
fn s4_array_set_and_get_round_trip() {
    let mut main = Function::new("main");
    let mut instructions = vec![
        Instruction::Literal(Literal::Number(3.0)),
        Instruction::MakeArray,
        Instruction::Store("a".to_string()),
    ];
    for (index, value) in [(0.0, 10.0), (1.0, 20.0), (2.0, 30.0)] {
        instructions.push(Instruction::Reference("a".to_string()));
        instructions.push(Instruction::Literal(Literal::Number(index)));
        instructions.push(Instruction::Literal(Literal::Number(value)));
        instructions.push(Instruction::ArraySet);
    }
    instructions.push(Instruction::Reference("a".to_string()));
    instructions.push(Instruction::Literal(Literal::Number(0.0)));
    instructions.push(Instruction::ArrayGet);
    instructions.push(Instruction::Reference("a".to_string()));
    instructions.push(Instruction::Literal(Literal::Number(1.0)));
    instructions.push(Instruction::ArrayGet);
    instructions.push(Instruction::Binary("+".to_string()));
    instructions.push(Instruction::Reference("a".to_string()));
    instructions.push(Instruction::Literal(Literal::Number(2.0)));
    instructions.push(Instruction::ArrayGet);
    instructions.push(Instruction::Binary("+".to_string()));
    instructions.push(Instruction::Return);

    main.blocks.push(BasicBlock::with_instructions("entry", instructions));

    let mut vm = Vm::new(InterpreterConfig::default());
    vm.load(single_function_module("d", main));
    let result = vm.run("d", "main");
    assert_eq!(result.status, VmStatus::Success);
    assert_eq!(result.value, 60.0);
}

/// S5: `return 1 / 0;` → `RuntimeError`, message mentions division by zero.
#[test]
fn s5_division_by_zero_is_a_runtime_error() {
    let mut main = Function::new("main");
    main.blocks.push(BasicBlock::with_instructions(
        "entry",
        vec![
            Instruction::Literal(Literal::Number(1.0)),
            Instruction::Literal(Literal::Number(0.0)),
            Instruction::Binary("/".to_string()),
            Instruction::Return,
        ],
    ));

    let mut vm = Vm::new(InterpreterConfig::default());
    vm.load(single_function_module("d", main));
    let result = vm.run("d", "main");
    assert_eq!(result.status, VmStatus::RuntimeError);
    let message = result.message.expect("runtime error carries a message");
    assert!(message.to_lowercase().contains("division"));
}

/// S6: `const broken: int = 10 % 0;` → `load.success = false`, diagnostic
/// mentions `broken`.
#[test]
fn s6_constant_modulo_by_zero_fails_load_with_diagnostic() {
    let mut module = Module::new(vec!["d".to_string()]);
    module.bindings.push(Binding::new(
        StorageClass::Const,
        "broken",
        "int",
        vec![
            Instruction::Literal(Literal::Number(10.0)),
            Instruction::Literal(Literal::Number(0.0)),
            Instruction::Binary("%".to_string()),
            Instruction::Store("broken".to_string()),
        ],
    ));

    let mut vm = Vm::new(InterpreterConfig::default());
    let load_result = vm.load(module);
    assert!(!load_result.success);
    assert_eq!(load_result.diagnostics.len(), 1);
    assert!(load_result.diagnostics[0].contains("broken"));
}
