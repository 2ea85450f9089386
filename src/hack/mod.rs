//! Reference implementation of the 16-bit target machine.
//!
//! Assembles the generated text into machine words and executes them, so the
//! translator's output can be checked by running it rather than by reading it.

pub mod assembler;
pub mod cpu;
pub mod hack_error;
pub mod rom;

pub use assembler::assemble;
pub use cpu::{Cpu, CpuConfig};
pub use hack_error::HackError;

/// RAM cells of the virtual registers.
pub const SP: u16 = 0;
pub const LCL: u16 = 1;
pub const ARG: u16 = 2;
pub const THIS: u16 = 3;
pub const THAT: u16 = 4;
