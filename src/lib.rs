//! # bytevm
//!
//! An emulator of a small accumulator-based byte-code virtual machine:
//! 17 registers, a downward-growing stack inside flat byte memory, a
//! one-byte base instruction set (arithmetic, stack, labeled jumps) and
//! an extended set (memory transfer, subroutine call/return, compare)
//! reached through a reserved tag nibble.
//!
//! The [`cpu`] module is the synchronous engine; [`runner`] drives it
//! from a command channel (run / clocked run / single step / pause);
//! [`asm`] converts between mnemonics, machine bytes and image files.

pub mod cpu;
pub mod asm;
pub mod runner;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{
    Cpu, CpuError, CpuState, Instruction, JumpCond, LabelTable, MachineConfig, Memory,
    MemoryError, Registers, RunOutcome, StepEvent, Target,
};
pub use asm::{assemble, disassemble, load_image, save_image, AsmError, ImageError};
pub use runner::{spawn, Command, ControllerHandle, Event};

#[cfg(feature = "tui")]
pub use tui::run_dashboard;
