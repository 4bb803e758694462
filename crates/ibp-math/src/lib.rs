//! IBP-HMM math utilities.

pub mod math;

pub use math::categorical::*;
pub use math::dirichlet;
pub use math::gamma::*;
pub use math::normal::*;
pub use math::stable::*;
