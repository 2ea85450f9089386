use std::io::Write;

use log::debug;

use crate::codegen::codegen_error::CodegenError;
use crate::codegen::lowering::Routine;
use crate::codegen::writer::CodeWriter;
use crate::lang::command::ArithOp;

// =============================================================================
// Shared routines
//
// Call site:   R15 = return label; jump to routine; (return label)
// Routine:     body; jump to *R15
//
// Push/pop routines take the segment index in R13, `$call` takes the argument
// count in R13 with the return address already pushed. `$return` never comes
// back: it ends by jumping to the VM-level return address.
// =============================================================================

impl<W: Write> CodeWriter<W> {
    pub(super) fn call_routine(&mut self, routine: Routine) -> Result<(), CodegenError> {
        let return_label = self.state.next_local_label();

        self.at(&return_label)?;
        self.emit(&["D=A", "@R15", "M=D"])?;
        self.at(routine.label())?;
        self.emit(&["0;JMP"])?;
        self.sink.label(&return_label)?;
        Ok(())
    }

    pub(super) fn write_routine(&mut self, routine: Routine) -> Result<(), CodegenError> {
        debug!("routine {}", routine.label());
        self.sink.comment(&format!("routine {}", routine.label()))?;

        // labels the body invents are scoped to the routine
        self.state.enter_function(routine.label());
        self.sink.label(routine.label())?;

        match routine {
            Routine::PushLocal => self.routine_push("LCL")?,
            Routine::PushArgument => self.routine_push("ARG")?,
            Routine::PushThis => self.routine_push("THIS")?,
            Routine::PushThat => self.routine_push("THAT")?,
            Routine::PopLocal => self.routine_pop("LCL")?,
            Routine::PopArgument => self.routine_pop("ARG")?,
            Routine::PopThis => self.routine_pop("THIS")?,
            Routine::PopThat => self.routine_pop("THAT")?,
            Routine::Add => self.inline_arithmetic(ArithOp::Add)?,
            Routine::Sub => self.inline_arithmetic(ArithOp::Sub)?,
            Routine::Eq => self.inline_arithmetic(ArithOp::Eq)?,
            Routine::Lt => self.inline_arithmetic(ArithOp::Lt)?,
            Routine::Gt => self.inline_arithmetic(ArithOp::Gt)?,
            Routine::And => self.inline_arithmetic(ArithOp::And)?,
            Routine::Or => self.inline_arithmetic(ArithOp::Or)?,
            Routine::Call => {
                self.save_frame()?;
                self.emit(&["@SP", "D=M", "@R13", "D=D-M"])?;
                self.enter_frame()?;
            }
            Routine::Return => return self.return_body(),
        }

        self.emit(&["@R15", "A=M", "0;JMP"])
    }

    fn routine_push(&mut self, base: &'static str) -> Result<(), CodegenError> {
        self.emit(&["@R13", "D=M"])?;
        self.indirect_push(base)
    }

    fn routine_pop(&mut self, base: &'static str) -> Result<(), CodegenError> {
        self.emit(&["@R13", "D=M"])?;
        self.indirect_pop(base)
    }
}
