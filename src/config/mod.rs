//! Configuration system
//!
//! TOML-backed settings declared once with embedded defaults (`config_struct!`)
//! and held in a global `CONFIG` for read access from any module.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::*;
