//! Statistical Kernel (C2) and its seeded RNG plumbing.

pub mod kernel;
pub mod rng;

pub use kernel::*;
pub use rng::BootstrapRng;
