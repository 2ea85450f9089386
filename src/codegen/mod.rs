//! Code generation: VM commands to target assembly.
//!
//! [`CodeWriter`] is driven one command at a time and appends to a single
//! output. How each command kind is lowered is fixed up front by
//! [`GenConfig`].

pub mod codegen_error;
pub mod library;
pub mod lowering;
pub mod sink;
pub mod state;
pub mod writer;

#[cfg(test)]
mod tests;

pub use codegen_error::CodegenError;
pub use lowering::{GenConfig, Lowering, LoweringPolicy, Routine, StackForm};
pub use writer::CodeWriter;
