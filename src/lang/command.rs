use super::segment::Segment;
use serde::{Deserialize, Serialize};

// =============================================================================
// ARITHMETIC - the nine ALU commands
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    // ( x y -- x+y )
    Add,
    // ( x y -- x-y )
    Sub,
    // ( x -- -x )
    Neg,
    // ( x y -- x==y )
    Eq,
    // ( x y -- x<y )
    Lt,
    // ( x y -- x>y )
    Gt,
    // ( x y -- x&y )
    And,
    // ( x y -- x|y )
    Or,
    // ( x -- !x )
    Not,
}

impl ArithOp {
    pub const ALL: [ArithOp; 9] = [
        ArithOp::Add,
        ArithOp::Sub,
        ArithOp::Neg,
        ArithOp::Eq,
        ArithOp::Lt,
        ArithOp::Gt,
        ArithOp::And,
        ArithOp::Or,
        ArithOp::Not,
    ];

    pub fn parse(word: &str) -> Option<ArithOp> {
        ArithOp::ALL.into_iter().find(|op| op.name() == word)
    }

    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Neg => "neg",
            ArithOp::Eq => "eq",
            ArithOp::Lt => "lt",
            ArithOp::Gt => "gt",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Not => "not",
        }
    }

    #[cfg(test)]
    pub fn is_unary(self) -> bool {
        matches!(self, ArithOp::Neg | ArithOp::Not)
    }
}

// =============================================================================
// COMMAND - one classified source line
// =============================================================================

/// A classified VM instruction.
///
/// Produced once by the reader and consumed once by the code generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `push <segment> <index>` ( -- value )
    Push { segment: Segment, index: u16 },

    /// `pop <segment> <index>` ( value -- )
    Pop { segment: Segment, index: u16 },

    Arithmetic(ArithOp),

    /// `label <name>`, scoped to the enclosing function.
    Label(String),

    /// `goto <name>`
    Goto(String),

    /// `if-goto <name>` ( cond -- ), jumps when `cond` is non-zero.
    IfGoto(String),

    /// `function <name> <locals>`
    Function { name: String, locals: u16 },

    /// `call <name> <args>` ( args.. -- result )
    Call { name: String, args: u16 },

    /// `return` ( result -- )
    Return,

    /// Unrecognized keyword. Accepted and lowered to nothing.
    Unknown(String),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Push { segment, index } => write!(f, "push {} {}", segment, index),
            Command::Pop { segment, index } => write!(f, "pop {} {}", segment, index),
            Command::Arithmetic(op) => f.write_str(op.name()),
            Command::Label(name) => write!(f, "label {}", name),
            Command::Goto(name) => write!(f, "goto {}", name),
            Command::IfGoto(name) => write!(f, "if-goto {}", name),
            Command::Function { name, locals } => write!(f, "function {} {}", name, locals),
            Command::Call { name, args } => write!(f, "call {} {}", name, args),
            Command::Return => f.write_str("return"),
            Command::Unknown(word) => write!(f, "{} (unknown)", word),
        }
    }
}
