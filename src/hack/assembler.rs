use std::collections::{BTreeMap, HashMap};

use crate::hack::hack_error::HackError;
use crate::hack::rom::Rom;

const ROM_SIZE: usize = 32768;
const FIRST_VARIABLE: u16 = 16;

/// One significant line: instruction text with whitespace removed.
struct Line {
    number: usize,
    text: String,
}

/// Assembles symbolic target code into a [`Rom`].
///
/// Two passes: the first binds `(LABEL)` declarations to instruction
/// addresses, the second encodes instructions and allocates variables from
/// RAM[16] upward in order of first use.
pub fn assemble(source: &str) -> Result<Rom, HackError> {
    let lines = significant_lines(source);

    let mut symbols = BTreeMap::new();
    let mut address = 0usize;

    for line in &lines {
        if let Some(label) = label_of(line)? {
            if symbols.insert(label.to_string(), address as u16).is_some() {
                return Err(HackError::syntax(
                    line.number,
                    format!("label '{}' defined twice", label),
                ));
            }
        } else {
            address += 1;
        }
    }

    if address > ROM_SIZE {
        return Err(HackError::RomOverflow(address));
    }

    let predefined = predefined_symbols();
    let mut next_variable = FIRST_VARIABLE;
    let mut words = Vec::with_capacity(address);

    for line in &lines {
        if line.text.starts_with('(') {
            continue;
        }

        let word = match line.text.strip_prefix('@') {
            Some(value) => {
                if value.is_empty() {
                    return Err(HackError::syntax(line.number, "missing value after '@'"));
                }
                if value.as_bytes()[0].is_ascii_digit() {
                    match value.parse::<u16>() {
                        Ok(v) if v < 0x8000 => v,
                        _ => {
                            return Err(HackError::syntax(
                                line.number,
                                format!("constant '{}' does not fit in 15 bits", value),
                            ));
                        }
                    }
                } else if let Some(v) = predefined.get(value) {
                    *v
                } else if let Some(v) = symbols.get(value) {
                    *v
                } else {
                    check_symbol(line.number, value)?;
                    let v = next_variable;
                    symbols.insert(value.to_string(), v);
                    next_variable += 1;
                    v
                }
            }
            None => encode_compute(line.number, &line.text)?,
        };

        words.push(word);
    }

    Ok(Rom { words, symbols })
}

fn significant_lines(source: &str) -> Vec<Line> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let code = match raw.find("//") {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let text: String = code.chars().filter(|c| !c.is_whitespace()).collect();
            if text.is_empty() {
                None
            } else {
                Some(Line {
                    number: i + 1,
                    text,
                })
            }
        })
        .collect()
}

fn label_of(line: &Line) -> Result<Option<&str>, HackError> {
    let Some(rest) = line.text.strip_prefix('(') else {
        return Ok(None);
    };
    let label = rest
        .strip_suffix(')')
        .ok_or_else(|| HackError::syntax(line.number, "unterminated label"))?;
    check_symbol(line.number, label)?;
    Ok(Some(label))
}

fn check_symbol(line: usize, symbol: &str) -> Result<(), HackError> {
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | ':'))
        && !symbol.starts_with(|c: char| c.is_ascii_digit())
        && !symbol.is_empty();

    if valid {
        Ok(())
    } else {
        Err(HackError::syntax(line, format!("invalid symbol '{}'", symbol)))
    }
}

fn predefined_symbols() -> HashMap<String, u16> {
    let mut table: HashMap<String, u16> = [
        ("SP", 0),
        ("LCL", 1),
        ("ARG", 2),
        ("THIS", 3),
        ("THAT", 4),
        ("SCREEN", 16384),
        ("KBD", 24576),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    for r in 0..16 {
        table.insert(format!("R{}", r), r);
    }
    table
}

// =============================================================================
// C-instruction encoding: 111a cccc ccdd djjj
// =============================================================================

fn encode_compute(line: usize, text: &str) -> Result<u16, HackError> {
    let (dest, rest) = match text.split_once('=') {
        Some((dest, rest)) => (dest, rest),
        None => ("", text),
    };
    let (comp, jump) = match rest.split_once(';') {
        Some((comp, jump)) => (comp, jump),
        None => (rest, ""),
    };

    let comp_bits = comp_bits(comp)
        .ok_or_else(|| HackError::syntax(line, format!("unknown computation '{}'", comp)))?;
    let dest_bits = dest_bits(dest)
        .ok_or_else(|| HackError::syntax(line, format!("unknown destination '{}'", dest)))?;
    let jump_bits = jump_bits(jump)
        .ok_or_else(|| HackError::syntax(line, format!("unknown jump '{}'", jump)))?;

    Ok(0b111 << 13 | comp_bits << 6 | dest_bits << 3 | jump_bits)
}

/// `a` bit followed by the six ALU control bits.
fn comp_bits(comp: &str) -> Option<u16> {
    let a = if comp.contains('M') { 0b100_0000 } else { 0 };
    let bits = match comp.replace('M', "A").as_str() {
        "0" => 0b101010,
        "1" => 0b111111,
        "-1" => 0b111010,
        "D" => 0b001100,
        "A" => 0b110000,
        "!D" => 0b001101,
        "!A" => 0b110001,
        "-D" => 0b001111,
        "-A" => 0b110011,
        "D+1" | "1+D" => 0b011111,
        "A+1" | "1+A" => 0b110111,
        "D-1" => 0b001110,
        "A-1" => 0b110010,
        "D+A" | "A+D" => 0b000010,
        "D-A" => 0b010011,
        "A-D" => 0b000111,
        "D&A" | "A&D" => 0b000000,
        "D|A" | "A|D" => 0b010101,
        _ => return None,
    };
    if a != 0 && comp.contains('A') {
        return None;
    }
    Some(a | bits)
}

fn dest_bits(dest: &str) -> Option<u16> {
    let mut bits = 0;
    for c in dest.chars() {
        let bit = match c {
            'A' => 0b100,
            'D' => 0b010,
            'M' => 0b001,
            _ => return None,
        };
        if bits & bit != 0 {
            return None;
        }
        bits |= bit;
    }
    Some(bits)
}

fn jump_bits(jump: &str) -> Option<u16> {
    Some(match jump {
        "" => 0,
        "JGT" => 1,
        "JEQ" => 2,
        "JGE" => 3,
        "JLT" => 4,
        "JNE" => 5,
        "JLE" => 6,
        "JMP" => 7,
        _ => return None,
    })
}
