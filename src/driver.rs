use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::codegen::{CodeWriter, CodegenError, GenConfig};
use crate::frontend::reader::Reader;
use crate::frontend::reader_error::ReaderError;
use crate::hack::HackError;
use crate::lang::command::Command;

const SOURCE_EXTENSION: &str = "vm";
const OUTPUT_EXTENSION: &str = "asm";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cannot read '{}': {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write '{}': {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("no .vm files in '{}'", .0.display())]
    NoModules(PathBuf),

    #[error("{module}:{error}")]
    Malformed { module: String, error: ReaderError },

    #[error("{module}:{line}: unknown command '{word}'")]
    UnknownCommand {
        module: String,
        line: usize,
        word: String,
    },

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Hack(#[from] HackError),
}

/// What to translate and where the result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub modules: Vec<PathBuf>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    pub config: GenConfig,
    /// Reject malformed lines and unknown commands instead of skipping them.
    pub strict: bool,
}

/// A finished translation, held in memory until it is written.
#[derive(Debug)]
pub struct Translation {
    pub asm: Vec<u8>,
    pub instructions: usize,
    /// Lines dropped as malformed.
    pub skipped: usize,
}

impl Translation {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.asm).into_owned()
    }
}

/// Resolves the command-line path argument.
///
/// - a file: that module alone, output beside it with an `.asm` extension
/// - a directory: every `.vm` file in it, by name, output `<dir>/<dir>.asm`
/// - nothing: the current directory
pub fn plan(input: Option<&Path>) -> Result<Plan, DriverError> {
    let dir = match input {
        Some(path) if !path.is_dir() => {
            return Ok(Plan {
                modules: vec![path.to_path_buf()],
                output: path.with_extension(OUTPUT_EXTENSION),
            });
        }
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().map_err(|source| DriverError::Read {
            path: PathBuf::from("."),
            source,
        })?,
    };

    let entries = fs::read_dir(&dir).map_err(|source| DriverError::Read {
        path: dir.clone(),
        source,
    })?;

    let mut modules = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| DriverError::Read {
                path: dir.clone(),
                source,
            })?
            .path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
        {
            modules.push(path);
        }
    }
    modules.sort();

    if modules.is_empty() {
        return Err(DriverError::NoModules(dir));
    }

    let name = dir
        .canonicalize()
        .ok()
        .and_then(|full| full.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "out".to_string());

    Ok(Plan {
        modules,
        output: dir.join(format!("{}.{}", name, OUTPUT_EXTENSION)),
    })
}

/// Reads every module up front, then translates. A module that cannot be
/// read aborts the run before any code is generated.
pub fn translate_files(
    modules: &[PathBuf],
    options: &TranslateOptions,
) -> Result<Translation, DriverError> {
    let mut sources = Vec::with_capacity(modules.len());
    for path in modules {
        let source = fs::read_to_string(path).map_err(|source| DriverError::Read {
            path: path.clone(),
            source,
        })?;
        sources.push((path.display().to_string(), source));
    }
    translate_sources(&sources, options)
}

/// Translates `(module name, source)` pairs, in order, into one program.
pub fn translate_sources(
    sources: &[(String, String)],
    options: &TranslateOptions,
) -> Result<Translation, DriverError> {
    let mut writer = CodeWriter::new(Vec::new(), options.config.clone());
    let mut skipped = 0;

    writer.begin_program()?;

    for (name, source) in sources {
        info!("translating {}", name);
        writer.begin_module(name)?;

        for item in Reader::new(source) {
            let line = match item {
                Ok(line) => line,
                Err(error) if options.strict => {
                    return Err(DriverError::Malformed {
                        module: name.clone(),
                        error,
                    });
                }
                Err(error) => {
                    warn!("{}:{}, line skipped", name, error);
                    skipped += 1;
                    continue;
                }
            };

            if let Command::Unknown(word) = &line.command {
                if options.strict {
                    return Err(DriverError::UnknownCommand {
                        module: name.clone(),
                        line: line.line,
                        word: word.clone(),
                    });
                }
            }

            writer.write_command(&line.command)?;
        }
    }

    writer.end_program()?;
    let instructions = writer.instruction_count();
    let asm = writer.into_inner()?;

    Ok(Translation {
        asm,
        instructions,
        skipped,
    })
}

pub fn write_output(path: &Path, bytes: &[u8]) -> Result<(), DriverError> {
    fs::write(path, bytes).map_err(|source| DriverError::Write {
        path: path.to_path_buf(),
        source,
    })
}
