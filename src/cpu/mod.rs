//! CPU emulation for the byte-code virtual machine.
//!
//! This module implements the complete machine:
//! - flat byte memory with a downward-growing stack region
//! - 17 registers (R0 is the accumulator), PC, SP, condition flag
//! - the base and extended instruction sets
//! - the label-resolution preprocessing pass

pub mod memory;
pub mod registers;
pub mod labels;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE};
pub use registers::{Registers, NUM_REGISTERS};
pub use labels::{LabelTable, NUM_LABELS};
pub use decode::{decode, encode, encode_program, Instruction, JumpCond, Target, DecodeError};
pub use execute::{
    Cpu, CpuError, CpuState, MachineConfig, RunOutcome, StepEvent, DEFAULT_STACK_SIZE,
};
