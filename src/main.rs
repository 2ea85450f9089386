mod codegen;
mod driver;
mod frontend;
mod hack;
mod lang;
mod logger;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};

use crate::codegen::{GenConfig, Lowering, LoweringPolicy, Routine, StackForm};
use crate::driver::{DriverError, TranslateOptions};
use crate::hack::{Cpu, CpuConfig, HackError, assemble};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LoweringArg {
    /// Repeat every instruction sequence at each use
    Inline,
    /// Route eligible instructions through shared subroutines
    Shared,
}

/// Translate stack VM modules into a single Hack assembly program.
#[derive(Debug, Parser)]
#[command(name = "vmtranslator", version)]
struct Cli {
    /// A .vm file or a directory of .vm files [default: current directory]
    path: Option<PathBuf>,

    /// Output file [default: derived from PATH]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Starting lowering for every routine
    #[arg(long, value_enum, default_value_t = LoweringArg::Shared)]
    lowering: LoweringArg,

    /// Inline these routines regardless of --lowering (e.g. call,push.local)
    #[arg(long, value_name = "ROUTINE", value_delimiter = ',', value_parser = parse_routine)]
    inline: Vec<Routine>,

    /// Share these routines regardless of --lowering (e.g. add,return)
    #[arg(long, value_name = "ROUTINE", value_delimiter = ',', value_parser = parse_routine)]
    shared: Vec<Routine>,

    /// Use the separate address/update push and pop primitives
    #[arg(long)]
    split_stack: bool,

    /// Comment the output with VM commands and ROM addresses
    #[arg(long)]
    annotate: bool,

    /// Fail on malformed lines and unknown commands instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Also assemble the program and write a binary ROM image
    #[arg(long, value_name = "FILE")]
    rom: Option<PathBuf>,

    /// Execute the program on the reference CPU for at most STEPS instructions
    #[arg(long, value_name = "STEPS")]
    run: Option<usize>,

    /// With --run, stop once execution reaches this label (e.g. Sys.init$HALT)
    #[arg(long, value_name = "SYMBOL", requires = "run")]
    stop_at: Option<String>,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> TranslateOptions {
        let mut lowering = match self.lowering {
            LoweringArg::Inline => LoweringPolicy::inline(),
            LoweringArg::Shared => LoweringPolicy::shared(),
        };
        for routine in &self.shared {
            lowering = lowering.with(*routine, Lowering::Subroutine);
        }
        for routine in &self.inline {
            lowering = lowering.with(*routine, Lowering::Inline);
        }
        let stack_form = if self.split_stack {
            StackForm::Split
        } else {
            StackForm::Combined
        };

        TranslateOptions {
            config: GenConfig {
                lowering,
                stack_form,
                annotate: self.annotate,
            },
            strict: self.strict,
        }
    }
}

fn parse_routine(name: &str) -> Result<Routine, String> {
    Routine::parse(name).ok_or_else(|| {
        let known: Vec<&str> = Routine::ALL.iter().map(|r| r.name()).collect();
        format!("unknown routine '{}' (one of: {})", name, known.join(", "))
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(logger::level_for(cli.verbose, cli.quiet));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), DriverError> {
    let plan = driver::plan(cli.path.as_deref())?;
    let output = cli.output.clone().unwrap_or(plan.output);

    let translation = driver::translate_files(&plan.modules, &cli.options())?;
    if translation.skipped > 0 {
        warn!("{} malformed line(s) skipped", translation.skipped);
    }

    driver::write_output(&output, &translation.asm)?;
    info!(
        "wrote {} ({} instructions from {} module(s))",
        output.display(),
        translation.instructions,
        plan.modules.len()
    );

    if cli.rom.is_none() && cli.run.is_none() {
        return Ok(());
    }

    let rom = assemble(&translation.text())?;

    if let Some(path) = &cli.rom {
        driver::write_output(path, &rom.to_image()?)?;
        info!("wrote rom image {}", path.display());
    }

    if let Some(max_steps) = cli.run {
        let mut cpu = Cpu::with_config(CpuConfig { max_steps });
        let outcome = match &cli.stop_at {
            Some(symbol) => match rom.address_of(symbol) {
                Some(target) => cpu.run_until(&rom, target),
                None => {
                    warn!("no symbol '{}' in the program, running to the end", symbol);
                    cpu.run(&rom)
                }
            },
            None => cpu.run(&rom),
        };
        match outcome {
            Ok(()) => info!("program ended after {} steps", cpu.steps()),
            Err(HackError::StepLimit(_)) => info!("stopped after {} steps", cpu.steps()),
            Err(e) => warn!("execution failed at pc {}: {}", cpu.pc(), e),
        }
        println!("{}", cpu.frame_summary());
    }

    Ok(())
}
