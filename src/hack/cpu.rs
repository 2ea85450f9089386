use crate::hack::hack_error::HackError;
use crate::hack::rom::Rom;
use crate::hack::{ARG, LCL, SP, THAT, THIS};

const RAM_SIZE: usize = 32768;

#[derive(Debug, Clone)]
pub struct CpuConfig {
    pub max_steps: usize,
}

impl Default for CpuConfig {
    fn default() -> Self {
        CpuConfig {
            max_steps: 1_000_000,
        }
    }
}

/// Instruction-level emulator of the target machine.
///
/// Two registers (`A`, `D`), a program counter, and a flat word-addressed
/// RAM. `M` always means `RAM[A]` with the value `A` held *before* the
/// current instruction.
pub struct Cpu {
    ram: Vec<u16>,
    a: u16,
    d: u16,
    pc: u16,
    steps: usize,
    config: CpuConfig,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::with_config(CpuConfig::default())
    }
}

impl Cpu {
    pub fn with_config(config: CpuConfig) -> Self {
        Self {
            ram: vec![0; RAM_SIZE],
            a: 0,
            d: 0,
            pc: 0,
            steps: 0,
            config,
        }
    }

    pub fn ram(&self, address: u16) -> u16 {
        self.ram[address as usize % RAM_SIZE]
    }

    pub fn set_ram(&mut self, address: u16, value: u16) {
        self.ram[address as usize % RAM_SIZE] = value;
    }

    /// Signed view of a RAM cell.
    pub fn word(&self, address: u16) -> i16 {
        self.ram(address) as i16
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    #[cfg(test)]
    pub fn ram_slice(&self) -> &[u16] {
        &self.ram
    }

    pub fn sp(&self) -> u16 {
        self.ram(SP)
    }

    /// Value on top of the VM stack, if the stack is not empty.
    pub fn stack_top(&self) -> Option<i16> {
        let sp = self.sp();
        if sp == 0 {
            None
        } else {
            Some(self.word(sp - 1))
        }
    }

    /// Summary of the VM registers, for diagnostics.
    pub fn frame_summary(&self) -> String {
        format!(
            "SP={} LCL={} ARG={} THIS={} THAT={} top={}",
            self.sp(),
            self.ram(LCL),
            self.ram(ARG),
            self.ram(THIS),
            self.ram(THAT),
            self.stack_top()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    }

    // Execution

    /// Executes one instruction.
    pub fn step(&mut self, rom: &Rom) -> Result<(), HackError> {
        let word = *rom
            .words
            .get(self.pc as usize)
            .ok_or(HackError::PcOutOfRange {
                pc: self.pc,
                len: rom.len(),
            })?;

        self.steps += 1;

        if word & 0x8000 == 0 {
            self.a = word;
            self.pc += 1;
            return Ok(());
        }

        let uses_memory = word & 0x1000 != 0;
        let control = (word >> 6) & 0x3f;
        let dest = (word >> 3) & 0b111;
        let jump = word & 0b111;

        let address = self.a;
        let y = if uses_memory { self.ram(address) } else { address };
        let out = alu(self.d, y, control);

        if dest & 0b001 != 0 {
            self.set_ram(address, out);
        }
        if dest & 0b010 != 0 {
            self.d = out;
        }
        if dest & 0b100 != 0 {
            self.a = out;
        }

        let signed = out as i16;
        let taken = (jump & 0b100 != 0 && signed < 0)
            || (jump & 0b010 != 0 && signed == 0)
            || (jump & 0b001 != 0 && signed > 0);

        self.pc = if taken { address } else { self.pc + 1 };
        Ok(())
    }

    /// Runs until the program counter reaches `target`.
    pub fn run_until(&mut self, rom: &Rom, target: u16) -> Result<(), HackError> {
        while self.pc != target {
            self.check_limits()?;
            self.step(rom)?;
        }
        Ok(())
    }

    /// Runs until execution falls off the end of the program.
    pub fn run(&mut self, rom: &Rom) -> Result<(), HackError> {
        while (self.pc as usize) < rom.len() {
            self.check_limits()?;
            self.step(rom)?;
        }
        Ok(())
    }

    fn check_limits(&self) -> Result<(), HackError> {
        if self.steps >= self.config.max_steps {
            return Err(HackError::StepLimit(self.config.max_steps));
        }
        Ok(())
    }
}

/// The six control bits, high to low: zx nx zy ny f no.
fn alu(x: u16, y: u16, control: u16) -> u16 {
    let bit = |n: u16| control & (1 << n) != 0;

    let mut x = if bit(5) { 0 } else { x };
    if bit(4) {
        x = !x;
    }
    let mut y = if bit(3) { 0 } else { y };
    if bit(2) {
        y = !y;
    }

    let out = if bit(1) { x.wrapping_add(y) } else { x & y };
    if bit(0) { !out } else { out }
}
