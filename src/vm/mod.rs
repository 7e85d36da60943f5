//! The virtual machine: module loading, global evaluation, and the
//! recursive call driver that builds, optimises, and interprets SSA on
//! demand (spec §4.I).

pub mod driver;
pub mod result;

pub use driver::Vm;
pub use result::{VmLoadResult, VmResult, VmStatus};
