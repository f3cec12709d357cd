//! Configuration module.

mod loader;
mod overrides;
mod types;

pub use loader::*;
pub use overrides::*;
pub use types::*;
