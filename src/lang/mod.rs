//! # VM Language Model
//!
//! Types describing the stack-machine instruction set consumed by the
//! translator. The reader produces these and the code generator lowers them.
//!
//! ## Documentation conventions
//!
//! - Stack effects are written as `( before -- after )`.
//! - `true` is the all-ones word (`-1`), `false` is `0`.

pub mod command;
pub mod segment;
