//! Fixpoint driver over constant propagation, copy propagation, and dead
//! code elimination (spec §4.E).

use tracing::debug;

use crate::common::config::OptimizerConfig;
use crate::ssa::SsaFunction;

use super::{const_prop, copy_prop, dce};

/// Runs the optimiser's three passes, in order, repeating the triplet while
/// any pass reports a mutation.
pub struct Optimizer;

impl Optimizer {
    /// Optimise `function` in place according to `config`.
    pub fn run(function: &mut SsaFunction, config: &OptimizerConfig) {
        for iteration in 0..config.max_iterations {
            let mut mutated = false;

            if config.constant_propagation {
                let pass_mutated = const_prop::run(function);
                mutated |= pass_mutated;
                debug!(
                    function = %function.name,
                    iteration,
                    mutated = pass_mutated,
                    "constant propagation"
                );
            }
            if config.copy_propagation {
                let pass_mutated = copy_prop::run(function);
                mutated |= pass_mutated;
                debug!(
                    function = %function.name,
                    iteration,
                    mutated = pass_mutated,
                    "copy propagation"
                );
            }
            if config.dead_code_elimination {
                let pass_mutated = dce::run(function);
                mutated |= pass_mutated;
                debug!(
                    function = %function.name,
                    iteration,
                    mutated = pass_mutated,
                    "dead code elimination"
                );
            }

            if !mutated {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::ir::{BasicBlock, Function, Instruction, Literal};
    use crate::ssa::{DominanceInfo, SsaBuilder};

    #[test]
    fn folds_and_then_drops_the_dead_operands() {
        let mut f = Function::new("f");
        f.blocks.push(BasicBlock::with_instructions(
            "entry",
            vec![
                Instruction::Literal(Literal::Number(2.0)),
                Instruction::Literal(Literal::Number(3.0)),
                Instruction::Binary("+".to_string()),
                Instruction::Store("x".to_string()),
                Instruction::Reference("x".to_string()),
                Instruction::Return,
            ],
        ));
        let cfg = CfgBuilder::build(&f).unwrap();
        let dominance = DominanceInfo::compute(&cfg);
        let mut ssa = SsaBuilder::build(&f, &cfg, &dominance);

        Optimizer::run(&mut ssa, &OptimizerConfig::default());

        let ret = ssa.entry().instructions.last().unwrap();
        assert_eq!(ret.opcode, "return");
        let defining = ssa
            .entry()
            .instructions
            .iter()
            .find(|i| i.result == Some(ret.args[0]))
            .expect("return value should still be defined");
        assert_eq!(defining.opcode, "literal");
        assert_eq!(defining.immediates[0], "5");
    }
}
