use serde::{Deserialize, Serialize};

/// First RAM cell of the `pointer` segment (aliases THIS/THAT).
pub const POINTER_BASE: u16 = 3;

/// First RAM cell of the `temp` segment (R5-R12).
pub const TEMP_BASE: u16 = 5;

/// Largest value an address instruction can load (15 bits).
pub const MAX_OPERAND: u16 = 0x7fff;

/// A named virtual memory region addressable by `push` / `pop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    /// Literal values. Push-only in meaning; `pop constant` discards.
    Constant,

    /// Function locals, based at `LCL`.
    Local,

    /// Function arguments, based at `ARG`.
    Argument,

    /// Object fields, based at `THIS`.
    This,

    /// Array cells, based at `THAT`.
    That,

    /// Fixed alias of the THIS/THAT base registers.
    Pointer,

    /// Eight fixed scratch cells.
    Temp,

    /// Per-module variables, one assembler symbol each.
    Static,
}

impl Segment {
    pub fn parse(name: &str) -> Option<Segment> {
        Some(match name {
            "constant" => Segment::Constant,
            "local" => Segment::Local,
            "argument" => Segment::Argument,
            "this" => Segment::This,
            "that" => Segment::That,
            "pointer" => Segment::Pointer,
            "temp" => Segment::Temp,
            "static" => Segment::Static,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
            Segment::Static => "static",
        }
    }

    /// Highest index the segment accepts.
    pub fn max_index(self) -> u16 {
        match self {
            Segment::Pointer => 1,
            Segment::Temp => 7,
            _ => MAX_OPERAND,
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
