//! Utility modules

pub mod archive;
pub mod memory;
pub mod validation;

pub use archive::*;
pub use memory::*;
pub use validation::*;
