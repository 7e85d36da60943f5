//! The SSA optimiser: constant propagation, copy propagation, and dead-code
//! elimination, driven to a fixpoint (spec §4.E).

pub mod const_prop;
pub mod copy_prop;
pub mod dce;
pub mod driver;
pub mod lattice;

pub use driver::Optimizer;
pub use lattice::ConstLattice;
