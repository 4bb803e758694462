//! Core math modules.

pub mod categorical;
pub mod dirichlet;
pub mod gamma;
pub mod normal;
pub mod stable;
