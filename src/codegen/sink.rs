use std::io::{self, Write};

/// Column where ROM address annotations start.
const ANNOTATION_COLUMN: usize = 40;

/// Width of the rule that opens a step note.
const STEP_RULE_WIDTH: usize = 30;

/// Line-oriented output for generated code.
///
/// Counts instructions as they are written, so the count is also the ROM
/// address of the next instruction. Labels and comments occupy no address.
pub struct AsmSink<W: Write> {
    out: W,
    address: usize,
    annotate: bool,
}

impl<W: Write> AsmSink<W> {
    pub fn new(out: W, annotate: bool) -> Self {
        Self {
            out,
            address: 0,
            annotate,
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn instruction(&mut self, text: &str) -> io::Result<()> {
        if self.annotate {
            writeln!(
                self.out,
                "{:<width$}// ROM[{:05}]",
                text,
                self.address,
                width = ANNOTATION_COLUMN
            )?;
        } else {
            writeln!(self.out, "{}", text)?;
        }
        self.address += 1;
        Ok(())
    }

    pub fn label(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "({})", name)
    }

    /// Written only when annotating.
    pub fn comment(&mut self, text: &str) -> io::Result<()> {
        if self.annotate {
            writeln!(self.out, "// {}", text)?;
        }
        Ok(())
    }

    /// Marks a step inside one command's expansion. Written only when
    /// annotating.
    pub fn step(&mut self, text: &str) -> io::Result<()> {
        if self.annotate {
            writeln!(self.out, "// {}", "-".repeat(STEP_RULE_WIDTH - 3))?;
            writeln!(self.out, "// {}", text)?;
        }
        Ok(())
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
