use std::io::Write;

use log::{debug, warn};

use crate::codegen::codegen_error::CodegenError;
use crate::codegen::lowering::{GenConfig, Lowering, Routine, StackForm};
use crate::codegen::sink::AsmSink;
use crate::codegen::state::{BOOTSTRAP_CONTEXT, GenState};
use crate::lang::command::{ArithOp, Command};
use crate::lang::segment::{POINTER_BASE, Segment, TEMP_BASE};

/// First cell of the stack region.
pub const STACK_BASE: u16 = 256;

/// Function called by the bootstrap code.
pub const ENTRY_FUNCTION: &str = "Sys.init";

/// Saved frame: return address, LCL, ARG, THIS, THAT.
const FRAME_SIZE: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Push,
    Pop,
}

/// Translates VM commands into target code.
///
/// Scratch registers:
/// - `R13` implicit routine argument (segment index or argument count);
///   effective address of an indirect access; return address during `return`
/// - `R14` right-hand operand of binary ops; saved frame during `return`
/// - `R15` return address of a shared routine
pub struct CodeWriter<W: Write> {
    pub(super) sink: AsmSink<W>,
    pub(super) config: GenConfig,
    pub(super) state: GenState,
    finished: bool,
}

impl<W: Write> CodeWriter<W> {
    pub fn new(out: W, config: GenConfig) -> Self {
        let sink = AsmSink::new(out, config.annotate);
        Self {
            sink,
            config,
            state: GenState {
                function: BOOTSTRAP_CONTEXT.to_string(),
                ..GenState::default()
            },
            finished: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &GenState {
        &self.state
    }

    /// Instructions emitted so far.
    pub fn instruction_count(&self) -> usize {
        self.sink.address()
    }

    // =========================================================================
    // Program and module boundaries
    // =========================================================================

    /// Sets up the stack and calls [`ENTRY_FUNCTION`]. Runs once, first.
    pub fn begin_program(&mut self) -> Result<(), CodegenError> {
        self.sink.comment("bootstrap")?;
        self.state.enter_function(BOOTSTRAP_CONTEXT);

        self.at(STACK_BASE)?;
        self.emit(&["D=A", "@SP", "M=D"])?;
        self.write_call(ENTRY_FUNCTION, 0)
    }

    /// Starts a module. `name` may carry a directory and extension.
    pub fn begin_module(&mut self, name: &str) -> Result<(), CodegenError> {
        self.state.enter_module(name);
        debug!("module {}", self.state.module);
        self.sink.comment(&format!("module {}", self.state.module))?;
        Ok(())
    }

    /// Emits the shared routine library. Runs once, after the last module;
    /// later calls do nothing.
    pub fn end_program(&mut self) -> Result<(), CodegenError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let routines: Vec<Routine> = self.config.lowering.shared_routines().collect();
        for routine in routines {
            self.write_routine(routine)?;
        }
        debug!("finished at {} instructions", self.sink.address());
        Ok(())
    }

    /// Flushes and releases the output.
    pub fn into_inner(self) -> Result<W, CodegenError> {
        Ok(self.sink.into_inner()?)
    }

    /// [`end_program`](Self::end_program) followed by
    /// [`into_inner`](Self::into_inner).
    #[cfg(test)]
    pub fn finish(mut self) -> Result<W, CodegenError> {
        self.end_program()?;
        self.into_inner()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn write_command(&mut self, command: &Command) -> Result<(), CodegenError> {
        self.sink.comment(&command.to_string())?;

        match command {
            Command::Push { segment, index } => {
                self.write_push_pop(Transfer::Push, *segment, *index)
            }
            Command::Pop { segment, index } => self.write_push_pop(Transfer::Pop, *segment, *index),
            Command::Arithmetic(op) => self.write_arithmetic(*op),
            Command::Label(name) => self.write_label(name),
            Command::Goto(name) => self.write_goto(name),
            Command::IfGoto(name) => self.write_if_goto(name),
            Command::Function { name, locals } => self.write_function(name, *locals),
            Command::Call { name, args } => self.write_call(name, *args),
            Command::Return => self.write_return(),
            Command::Unknown(word) => {
                warn!(
                    "ignoring unknown command '{}' in {}",
                    word, self.state.function
                );
                Ok(())
            }
        }
    }

    pub fn write_push_pop(
        &mut self,
        transfer: Transfer,
        segment: Segment,
        index: u16,
    ) -> Result<(), CodegenError> {
        if index > segment.max_index() {
            return Err(CodegenError::IndexOutOfRange { segment, index });
        }

        let routine = match transfer {
            Transfer::Push => Routine::for_push(segment),
            Transfer::Pop => Routine::for_pop(segment),
        };

        match routine {
            Some(routine) if self.config.lowering.lowering(routine) == Lowering::Subroutine => {
                self.sink.step("R13 = index")?;
                self.at(index)?;
                self.emit(&["D=A", "@R13", "M=D"])?;
                self.call_routine(routine)
            }
            _ => match transfer {
                Transfer::Push => self.inline_push(segment, index),
                Transfer::Pop => self.inline_pop(segment, index),
            },
        }
    }

    pub fn write_arithmetic(&mut self, op: ArithOp) -> Result<(), CodegenError> {
        match Routine::for_arithmetic(op) {
            Some(routine) if self.config.lowering.lowering(routine) == Lowering::Subroutine => {
                self.call_routine(routine)
            }
            _ => self.inline_arithmetic(op),
        }
    }

    pub fn write_label(&mut self, name: &str) -> Result<(), CodegenError> {
        let label = self.state.scoped_label(name);
        self.sink.label(&label)?;
        Ok(())
    }

    pub fn write_goto(&mut self, name: &str) -> Result<(), CodegenError> {
        let label = self.state.scoped_label(name);
        self.at(label)?;
        self.emit(&["0;JMP"])
    }

    /// Pops the condition; jumps when it is non-zero.
    pub fn write_if_goto(&mut self, name: &str) -> Result<(), CodegenError> {
        let label = self.state.scoped_label(name);
        self.pop_d()?;
        self.at(label)?;
        self.emit(&["D;JNE"])
    }

    /// Declares `name` and pushes `locals` zeroes.
    pub fn write_function(&mut self, name: &str, locals: u16) -> Result<(), CodegenError> {
        debug!("function {} ({} locals)", name, locals);
        self.state.enter_function(name);
        self.sink.label(name)?;

        if locals > 0 {
            self.sink.step("clear local segment")?;
            self.emit(&["D=0"])?;
            for _ in 0..locals {
                self.push_d()?;
            }
        }
        Ok(())
    }

    /// Saves the caller's frame, repositions ARG and LCL and jumps to `name`.
    pub fn write_call(&mut self, name: &str, args: u16) -> Result<(), CodegenError> {
        let return_label = self.state.next_local_label();

        match self.config.lowering.lowering(Routine::Call) {
            Lowering::Subroutine => {
                self.sink.step("R13 = args")?;
                self.at(args)?;
                self.emit(&["D=A", "@R13", "M=D"])?;
                self.push_label_address(&return_label)?;
                self.call_routine(Routine::Call)?;
            }
            Lowering::Inline => {
                self.push_label_address(&return_label)?;
                self.save_frame()?;
                self.sink.step("ARG = SP - args - 5, LCL = SP")?;
                self.emit(&["@SP", "D=M"])?;
                self.at(args)?;
                self.emit(&["D=D-A"])?;
                self.enter_frame()?;
            }
        }

        self.sink.step(&format!("goto {}", name))?;
        self.at(name)?;
        self.emit(&["0;JMP"])?;
        self.sink.label(&return_label)?;
        Ok(())
    }

    /// Returns the top of the stack to the caller and restores its frame.
    pub fn write_return(&mut self) -> Result<(), CodegenError> {
        match self.config.lowering.lowering(Routine::Return) {
            // the routine jumps straight back to the caller
            Lowering::Subroutine => {
                self.at(Routine::Return.label())?;
                self.emit(&["0;JMP"])
            }
            Lowering::Inline => self.return_body(),
        }
    }

    // =========================================================================
    // Inline bodies
    // =========================================================================

    fn inline_push(&mut self, segment: Segment, index: u16) -> Result<(), CodegenError> {
        match segment {
            Segment::Constant => {
                self.at(index)?;
                self.emit(&["D=A"])?;
                self.push_d()
            }
            Segment::Pointer | Segment::Temp => {
                self.at(fixed_address(segment, index)?)?;
                self.emit(&["D=M"])?;
                self.push_d()
            }
            Segment::Static => {
                let symbol = self.state.static_symbol(index);
                self.at(symbol)?;
                self.emit(&["D=M"])?;
                self.push_d()
            }
            Segment::Local => self.indexed_push("LCL", index),
            Segment::Argument => self.indexed_push("ARG", index),
            Segment::This => self.indexed_push("THIS", index),
            Segment::That => self.indexed_push("THAT", index),
        }
    }

    fn inline_pop(&mut self, segment: Segment, index: u16) -> Result<(), CodegenError> {
        match segment {
            Segment::Constant => {
                debug!("pop constant {} discards the top of the stack", index);
                self.pop_d()
            }
            Segment::Pointer | Segment::Temp => {
                let address = fixed_address(segment, index)?;
                self.pop_d()?;
                self.at(address)?;
                self.emit(&["M=D"])
            }
            Segment::Static => {
                let symbol = self.state.static_symbol(index);
                self.pop_d()?;
                self.at(symbol)?;
                self.emit(&["M=D"])
            }
            Segment::Local => self.indexed_pop("LCL", index),
            Segment::Argument => self.indexed_pop("ARG", index),
            Segment::This => self.indexed_pop("THIS", index),
            Segment::That => self.indexed_pop("THAT", index),
        }
    }

    fn indexed_push(&mut self, base: &'static str, index: u16) -> Result<(), CodegenError> {
        self.at(index)?;
        self.emit(&["D=A"])?;
        self.indirect_push(base)
    }

    fn indexed_pop(&mut self, base: &'static str, index: u16) -> Result<(), CodegenError> {
        self.at(index)?;
        self.emit(&["D=A"])?;
        self.indirect_pop(base)
    }

    /// Expects the segment index in D. `base` names the register holding
    /// the segment's address.
    pub(super) fn indirect_push(&mut self, base: &'static str) -> Result<(), CodegenError> {
        self.effective_address(base)?;
        self.emit(&["A=D", "D=M"])?;
        self.push_d()
    }

    /// Expects the segment index in D.
    pub(super) fn indirect_pop(&mut self, base: &'static str) -> Result<(), CodegenError> {
        self.effective_address(base)?;
        self.pop_d()?;
        self.emit(&["@R13", "A=M", "M=D"])
    }

    /// R13 = D = base + D
    fn effective_address(&mut self, base: &'static str) -> Result<(), CodegenError> {
        self.at(base)?;
        self.emit(&["D=D+M", "@R13", "M=D"])
    }

    pub(super) fn inline_arithmetic(&mut self, op: ArithOp) -> Result<(), CodegenError> {
        match op {
            ArithOp::Neg => self.unary("-"),
            ArithOp::Not => self.unary("!"),
            ArithOp::Add => self.binary("D=D+M"),
            ArithOp::Sub => self.binary("D=D-M"),
            ArithOp::And => self.binary("D=D&M"),
            ArithOp::Or => self.binary("D=D|M"),
            ArithOp::Eq => self.relational("JEQ"),
            ArithOp::Lt => self.relational("JLT"),
            ArithOp::Gt => self.relational("JGT"),
        }
    }

    fn unary(&mut self, operator: &str) -> Result<(), CodegenError> {
        match self.config.stack_form {
            StackForm::Combined => {
                self.emit(&["@SP", "A=M-1"])?;
                self.emit(&[format!("M={}M", operator).as_str()])
            }
            StackForm::Split => {
                self.pop_d()?;
                self.emit(&[format!("D={}D", operator).as_str()])?;
                self.push_d()
            }
        }
    }

    /// Leaves `x` in D and `y` in R14 for `( x y -- )`.
    fn pop_operands(&mut self) -> Result<(), CodegenError> {
        self.pop_d()?;
        self.emit(&["@R14", "M=D"])?;
        self.pop_d()?;
        self.emit(&["@R14"])
    }

    fn binary(&mut self, compute: &str) -> Result<(), CodegenError> {
        self.pop_operands()?;
        self.emit(&[compute])?;
        self.push_d()
    }

    /// `x - y` tested against zero; pushes -1 when `jump` is taken, else 0.
    fn relational(&mut self, jump: &str) -> Result<(), CodegenError> {
        let when_true = self.state.next_local_label();
        let end = self.state.next_local_label();

        self.pop_operands()?;
        self.emit(&["D=D-M"])?;
        self.at(&when_true)?;
        self.emit(&[format!("D;{}", jump).as_str()])?;
        self.emit(&["D=0"])?;
        self.at(&end)?;
        self.emit(&["0;JMP"])?;
        self.sink.label(&when_true)?;
        self.emit(&["D=-1"])?;
        self.sink.label(&end)?;
        self.push_d()
    }

    fn push_label_address(&mut self, label: &str) -> Result<(), CodegenError> {
        self.sink.step("push return address")?;
        self.at(label)?;
        self.emit(&["D=A"])?;
        self.push_d()
    }

    /// Pushes LCL, ARG, THIS and THAT.
    pub(super) fn save_frame(&mut self) -> Result<(), CodegenError> {
        self.sink.step("save caller frame")?;
        for register in ["@LCL", "@ARG", "@THIS", "@THAT"] {
            self.emit(&[register, "D=M"])?;
            self.push_d()?;
        }
        Ok(())
    }

    /// Expects `SP - args` in D. ARG = D - 5, LCL = SP.
    pub(super) fn enter_frame(&mut self) -> Result<(), CodegenError> {
        self.at(FRAME_SIZE)?;
        self.emit(&["D=D-A", "@ARG", "M=D", "@SP", "D=M", "@LCL", "M=D"])
    }

    pub(super) fn return_body(&mut self) -> Result<(), CodegenError> {
        self.sink.step("R14 = frame, R13 = *(frame - 5)")?;
        self.emit(&["@LCL", "D=M", "@R14", "M=D"])?;
        self.at(FRAME_SIZE)?;
        self.emit(&["A=D-A", "D=M", "@R13", "M=D"])?;

        self.sink.step("*ARG = pop()")?;
        self.pop_d()?;
        self.emit(&["@ARG", "A=M", "M=D"])?;

        self.sink.step("SP = ARG + 1")?;
        self.emit(&["@ARG", "D=M+1", "@SP", "M=D"])?;

        self.sink.step("restore caller frame")?;
        for register in ["@THAT", "@THIS", "@ARG", "@LCL"] {
            self.emit(&["@R14", "AM=M-1", "D=M", register, "M=D"])?;
        }

        self.sink.step("goto return address")?;
        self.emit(&["@R13", "A=M", "0;JMP"])
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Pushes D. Clobbers A.
    pub(super) fn push_d(&mut self) -> Result<(), CodegenError> {
        match self.config.stack_form {
            StackForm::Combined => self.emit(&["@SP", "AM=M+1", "A=A-1", "M=D"]),
            StackForm::Split => self.emit(&["@SP", "A=M", "M=D", "@SP", "M=M+1"]),
        }
    }

    /// Pops into D. Clobbers A.
    pub(super) fn pop_d(&mut self) -> Result<(), CodegenError> {
        match self.config.stack_form {
            StackForm::Combined => self.emit(&["@SP", "AM=M-1", "D=M"]),
            StackForm::Split => self.emit(&["@SP", "A=M", "A=A-1", "D=M", "@SP", "M=M-1"]),
        }
    }

    pub(super) fn at(&mut self, value: impl std::fmt::Display) -> Result<(), CodegenError> {
        self.sink.instruction(&format!("@{}", value))?;
        Ok(())
    }

    pub(super) fn emit(&mut self, instructions: &[&str]) -> Result<(), CodegenError> {
        for instruction in instructions {
            self.sink.instruction(instruction)?;
        }
        Ok(())
    }
}

fn fixed_address(segment: Segment, index: u16) -> Result<u16, CodegenError> {
    let base = match segment {
        Segment::Pointer => POINTER_BASE,
        _ => TEMP_BASE,
    };
    if index > segment.max_index() {
        return Err(CodegenError::IndexOutOfRange { segment, index });
    }
    Ok(base + index)
}
