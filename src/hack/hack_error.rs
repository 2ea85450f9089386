use thiserror::Error;

#[derive(Debug, Error)]
pub enum HackError {
    /// A line the assembler cannot encode
    #[error("assembly error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// The program does not fit in instruction memory
    #[error("program has {0} instructions, instruction memory holds 32768")]
    RomOverflow(usize),

    /// Execution jumped outside the loaded program
    #[error("pc {pc} is outside the program ({len} instructions)")]
    PcOutOfRange { pc: u16, len: usize },

    /// The execution budget ran out
    #[error("execution step limit exceeded ({0})")]
    StepLimit(usize),

    /// A ROM image that does not decode
    #[error("invalid rom image: {0}")]
    Image(#[from] postcard::Error),
}

impl HackError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        HackError::Syntax {
            line,
            message: message.into(),
        }
    }
}
