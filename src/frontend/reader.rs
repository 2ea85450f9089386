use std::str::Lines;

use crate::frontend::reader_error::ReaderError;
use crate::lang::command::{ArithOp, Command};
use crate::lang::segment::{MAX_OPERAND, Segment};

/// A classified instruction together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    /// 1-based line number in the module.
    pub line: usize,
    pub command: Command,
}

/// Lazy line-oriented reader over one module's source text.
///
/// Build a fresh reader per module. Blank lines and `//` comments are
/// skipped; every other line yields exactly one item.
pub struct Reader<'a> {
    lines: Lines<'a>,
    line: usize,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str) -> Self {
        Reader {
            lines: source.lines(),
            line: 0,
        }
    }

    fn classify(&self, text: &str) -> Result<Command, ReaderError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let keyword = tokens[0].to_lowercase();

        let command = match keyword.as_str() {
            "push" | "pop" => {
                self.expect_operands(&keyword, &tokens, 2)?;
                let segment = Segment::parse(tokens[1]).ok_or_else(|| {
                    ReaderError::new(self.line, format!("unknown segment '{}'", tokens[1]))
                })?;
                let index = self.number(tokens[2])?;
                if index > segment.max_index() {
                    return Err(ReaderError::new(
                        self.line,
                        format!(
                            "{} index {} is out of range (0..={})",
                            segment,
                            index,
                            segment.max_index()
                        ),
                    ));
                }
                if keyword == "push" {
                    Command::Push { segment, index }
                } else {
                    Command::Pop { segment, index }
                }
            }

            "label" | "goto" | "if-goto" => {
                self.expect_operands(&keyword, &tokens, 1)?;
                let name = tokens[1].to_string();
                match keyword.as_str() {
                    "label" => Command::Label(name),
                    "goto" => Command::Goto(name),
                    _ => Command::IfGoto(name),
                }
            }

            "function" => {
                self.expect_operands(&keyword, &tokens, 2)?;
                Command::Function {
                    name: tokens[1].to_string(),
                    locals: self.number(tokens[2])?,
                }
            }

            "call" => {
                self.expect_operands(&keyword, &tokens, 2)?;
                Command::Call {
                    name: tokens[1].to_string(),
                    args: self.number(tokens[2])?,
                }
            }

            "return" => {
                self.expect_operands(&keyword, &tokens, 0)?;
                Command::Return
            }

            word => match ArithOp::parse(word) {
                Some(op) => {
                    self.expect_operands(&keyword, &tokens, 0)?;
                    Command::Arithmetic(op)
                }
                None => Command::Unknown(word.to_string()),
            },
        };

        Ok(command)
    }

    fn expect_operands(
        &self,
        keyword: &str,
        tokens: &[&str],
        count: usize,
    ) -> Result<(), ReaderError> {
        let got = tokens.len() - 1;
        if got == count {
            Ok(())
        } else {
            Err(ReaderError::new(
                self.line,
                format!("'{}' takes {} operand(s), got {}", keyword, count, got),
            ))
        }
    }

    /// A decimal operand small enough to load with one address instruction.
    fn number(&self, token: &str) -> Result<u16, ReaderError> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReaderError::new(
                self.line,
                format!("expected a number, got '{}'", token),
            ));
        }

        match token.parse::<u16>() {
            Ok(value) if value <= MAX_OPERAND => Ok(value),
            _ => Err(ReaderError::new(
                self.line,
                format!("{} is out of range (0..={})", token, MAX_OPERAND),
            )),
        }
    }
}

/// Strips a trailing `//` comment and surrounding whitespace.
fn strip_comment(raw: &str) -> &str {
    match raw.find("//") {
        Some(pos) => raw[..pos].trim(),
        None => raw.trim(),
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<SourceLine, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        for raw in self.lines.by_ref() {
            self.line += 1;

            let text = strip_comment(raw);
            if text.is_empty() {
                continue;
            }

            return Some(self.classify(text).map(|command| SourceLine {
                line: self.line,
                command,
            }));
        }
        None
    }
}
