//! The execution engine.
//!
//! `Cpu` owns all machine state and exposes "fetch one instruction,
//! execute it, advance the PC" as its single atomic mutating operation,
//! plus bulk-run helpers built on top of it. Mode decisions (when to
//! step, how fast) belong to the run controller, not here.

use crate::cpu::decode::{self, DecodeError, Instruction, JumpCond};
use crate::cpu::labels::LabelTable;
use crate::cpu::memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE};
use crate::cpu::registers::Registers;
use log::{debug, info, trace};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Default stack capacity in words.
pub const DEFAULT_STACK_SIZE: u16 = 10;

/// Sizing knobs fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Memory size in bytes. Must leave headroom above the stack head;
    /// practically at most 0xfffc.
    #[serde(default = "default_memory_size")]
    pub memory_size: u16,

    /// Stack capacity in 16-bit words.
    #[serde(default = "default_stack_size")]
    pub stack_size: u16,
}

fn default_memory_size() -> u16 {
    DEFAULT_MEMORY_SIZE
}

fn default_stack_size() -> u16 {
    DEFAULT_STACK_SIZE
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Processor status.
///
/// `Halted` and `Faulted` are terminal until a reset and reload; there
/// is no way back to `Running` from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// No program present (after construction or reset).
    Idle,
    /// A program is loaded and preprocessed; nothing executed yet.
    Loaded,
    /// Instructions are being issued.
    Running,
    /// Execution suspended; all state preserved, resumable.
    Paused,
    /// A HALT executed or the program ran off its end.
    Halted,
    /// An unrecoverable fault (bad opcode, bounds violation).
    Faulted,
}

/// Outcome of one successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// The instruction executed normally.
    Executed(Instruction),
    /// A HALT instruction executed; the CPU is now terminal.
    Halted,
}

/// Why a bulk run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The PC ran past the end of the loaded program.
    Completed { executed: u64 },
    /// A HALT instruction executed.
    Halted { executed: u64 },
    /// The cycle budget was exhausted first.
    CycleLimit { executed: u64 },
}

/// The virtual machine.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Register file, PC, SP, condition flag.
    pub regs: Registers,
    /// Flat byte memory shared by code, data and stack.
    pub mem: Memory,
    /// Jump targets recorded by the preprocessing pass.
    pub labels: LabelTable,
    /// Current processor status.
    pub state: CpuState,
    /// Instructions executed since the last reset.
    pub cycles: u64,
    code_len: u16,
    stack_head: u16,
    stack_size: u16,
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a machine sized per `config`, in the `Idle` state.
    pub fn new(config: MachineConfig) -> Self {
        // Highest even address; a stack slot is two bytes.
        let stack_head = (config.memory_size.saturating_sub(1)) & !1;
        let mut cpu = Self {
            regs: Registers::new(),
            mem: Memory::new(config.memory_size),
            labels: LabelTable::new(),
            state: CpuState::Idle,
            cycles: 0,
            code_len: 0,
            stack_head,
            stack_size: config.stack_size,
            last_instr: None,
        };
        cpu.regs.sp = cpu.stack_head + 2;
        cpu
    }

    /// Zero all machine state and return to `Idle`.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.regs.sp = self.stack_head + 2;
        self.labels.clear();
        self.mem.clear();
        self.state = CpuState::Idle;
        self.cycles = 0;
        self.code_len = 0;
        self.last_instr = None;
        info!("CPU reset");
    }

    /// Install a program: reset, copy the bytes to offset 0, run the
    /// label-resolution pass, and move to `Loaded`.
    pub fn load(&mut self, program: &[u8]) -> Result<(), CpuError> {
        self.reset();
        self.mem.load_program(program)?;
        self.labels.resolve(&self.mem.bytes()[..program.len()]);
        self.code_len = program.len() as u16;
        self.state = CpuState::Loaded;
        info!("program loaded, {} bytes", program.len());
        Ok(())
    }

    /// Heuristic probe that a program is present: the first two memory
    /// bytes are not both zero. Not a checksum.
    pub fn verify_program(&self) -> bool {
        let bytes = self.mem.bytes();
        bytes.len() >= 2 && !(bytes[0] == 0 && bytes[1] == 0)
    }

    /// Execute exactly one instruction.
    ///
    /// This is the only operation that mutates machine state. Any error
    /// leaves the CPU `Faulted`; registers are untouched when the fault
    /// is detected before execution (end of memory, bad decode).
    pub fn step(&mut self) -> Result<StepEvent, CpuError> {
        match self.state {
            CpuState::Loaded | CpuState::Running | CpuState::Paused => {}
            s => return Err(CpuError::NotRunnable(s)),
        }

        if self.regs.pc >= self.mem.len() {
            self.state = CpuState::Faulted;
            return Err(CpuError::EndOfMemory { pc: self.regs.pc });
        }

        let instr = match decode::decode(self.mem.bytes(), self.regs.pc) {
            Ok(instr) => instr,
            Err(e) => {
                self.state = CpuState::Faulted;
                return Err(e.into());
            }
        };
        trace!("PC={:04x} {:?}", self.regs.pc, instr);

        // Instructions own their PC advance; jumps override it below.
        self.regs.advance_pc(instr.width());

        if let Err(e) = self.execute(instr) {
            self.state = CpuState::Faulted;
            return Err(e);
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        if self.state == CpuState::Halted {
            return Ok(StepEvent::Halted);
        }
        // A single step from Loaded leaves the machine paused mid-program.
        if self.state == CpuState::Loaded {
            self.state = CpuState::Paused;
        }
        Ok(StepEvent::Executed(instr))
    }

    /// Run until HALT, fault, or the PC leaves the loaded program.
    pub fn run(&mut self) -> Result<RunOutcome, CpuError> {
        self.run_limited(u64::MAX)
    }

    /// Run with a cycle budget.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<RunOutcome, CpuError> {
        self.begin_run()?;
        let start = self.cycles;
        while self.state == CpuState::Running && self.regs.pc < self.code_len {
            if self.cycles - start >= max_cycles {
                return Ok(RunOutcome::CycleLimit { executed: self.cycles - start });
            }
            self.step()?;
        }
        let executed = self.cycles - start;
        if self.state == CpuState::Halted {
            Ok(RunOutcome::Halted { executed })
        } else {
            self.state = CpuState::Halted;
            Ok(RunOutcome::Completed { executed })
        }
    }

    /// Move to `Running` if the current state allows it.
    pub fn begin_run(&mut self) -> Result<(), CpuError> {
        match self.state {
            CpuState::Loaded | CpuState::Running | CpuState::Paused => {
                self.state = CpuState::Running;
                Ok(())
            }
            s => Err(CpuError::NotRunnable(s)),
        }
    }

    /// Suspend a running machine without touching any other state.
    pub fn pause(&mut self) {
        if self.state == CpuState::Running {
            self.state = CpuState::Paused;
        }
    }

    /// Force the terminal `Halted` state (external halt command).
    pub fn halt(&mut self) {
        self.state = CpuState::Halted;
    }

    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            // ==================== Base set ====================
            Instruction::Set { value } => {
                self.regs.r[0] = value as u16;
            }

            Instruction::Add { reg } => {
                self.regs.r[0] = self.regs.r[0].wrapping_add(self.regs.r[reg as usize]);
            }

            Instruction::Sub { reg } => {
                self.regs.r[0] = self.regs.r[0].wrapping_sub(self.regs.r[reg as usize]);
            }

            Instruction::Mul { reg } => {
                self.regs.r[0] = self.regs.r[0].wrapping_mul(self.regs.r[reg as usize]);
            }

            Instruction::Push { src } => {
                let value = self.regs.r[src.index()];
                self.push_word(value)?;
            }

            Instruction::Pop { dst } => {
                let value = self.pop_word()?;
                self.regs.r[dst.index()] = value;
            }

            Instruction::Goto { label, cond } => {
                let taken = match cond {
                    JumpCond::Zero => self.regs.r[0] == 0,
                    JumpCond::NotZero => self.regs.r[0] != 0,
                };
                if taken {
                    self.regs.jump(self.labels.get(label));
                }
            }

            Instruction::Label { .. } => {
                // Consumed by the resolver; nothing to do at runtime.
            }

            // ==================== Extended set ====================
            Instruction::Noop => {}

            Instruction::Halt => {
                debug!("HALT at PC {:04x}", self.regs.pc);
                self.state = CpuState::Halted;
            }

            Instruction::Store { addr } => {
                self.mem.write_word(addr, self.regs.r[0])?;
            }

            Instruction::Load { addr } => {
                self.regs.r[0] = self.mem.read_word(addr)?;
            }

            Instruction::Swap { a, b } => {
                self.regs.r.swap(a as usize, b as usize);
            }

            Instruction::Call { addr } => {
                // PC already points past the operand bytes.
                let ret = self.regs.pc;
                self.push_word(ret)?;
                self.regs.jump(addr);
            }

            Instruction::Ret => {
                let ret = self.pop_word()?;
                self.regs.jump(ret);
            }

            Instruction::Cmp => {
                self.regs.flag = self.regs.r[0] == self.regs.r[1];
            }

            Instruction::Xset { value } => {
                self.regs.r[0] = value;
            }
        }
        Ok(())
    }

    /// Push: decrement SP by 2, then write the word big-endian.
    fn push_word(&mut self, value: u16) -> Result<(), CpuError> {
        if self.regs.sp < self.stack_floor() + 2 {
            return Err(CpuError::StackOverflow { sp: self.regs.sp });
        }
        let new_sp = self.regs.sp - 2;
        self.mem.write_word(new_sp, value)?;
        self.regs.sp = new_sp;
        Ok(())
    }

    /// Pop: read the word at SP, then increment SP by 2.
    fn pop_word(&mut self) -> Result<u16, CpuError> {
        if self.regs.sp > self.stack_head {
            return Err(CpuError::StackUnderflow { sp: self.regs.sp });
        }
        let value = self.mem.read_word(self.regs.sp)?;
        self.regs.sp += 2;
        Ok(value)
    }

    /// Lowest address a stack slot may occupy.
    fn stack_floor(&self) -> u16 {
        (self.stack_head + 2).saturating_sub(self.stack_size * 2)
    }

    /// Length of the loaded program in bytes.
    pub fn code_len(&self) -> u16 {
        self.code_len
    }

    /// Address of the topmost stack slot.
    pub fn stack_head(&self) -> u16 {
        self.stack_head
    }

    /// The most recently executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Whether the PC has left the loaded program.
    pub fn at_end(&self) -> bool {
        self.regs.pc >= self.code_len
    }

    /// Memory as hex, 16 bytes per row.
    pub fn dump_memory(&self) -> String {
        self.mem.dump()
    }

    /// Registers as hex, one per line.
    pub fn dump_registers(&self) -> String {
        self.regs.dump()
    }

    /// Stack words from SP up to the stack head.
    pub fn dump_stack(&self) -> String {
        let mut out = String::new();
        let mut addr = self.regs.sp;
        while addr <= self.stack_head {
            if let Ok(word) = self.mem.read_word(addr) {
                out.push_str(&format!("{:04x}: x{:04x}\n", addr, word));
            }
            addr += 2;
        }
        out
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("pc", &self.regs.pc)
            .field("sp", &self.regs.sp)
            .finish()
    }
}

/// Errors surfaced by the engine.
///
/// The engine never panics on program-induced conditions; every fault
/// is reported here and leaves the CPU in the `Faulted` state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not runnable in state {0:?}")]
    NotRunnable(CpuState),

    #[error("end of memory reached at PC {pc:#06x}")]
    EndOfMemory { pc: u16 },

    #[error("memory fault: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode fault: {0}")]
    Decode(#[from] DecodeError),

    #[error("stack overflow at SP {sp:#06x}")]
    StackOverflow { sp: u16 },

    #[error("stack underflow at SP {sp:#06x}")]
    StackUnderflow { sp: u16 },
}
