//! The register file and processor bookkeeping registers.
//!
//! R0 is the accumulator: every arithmetic instruction reads and writes
//! it implicitly. R1-R16 are general-purpose operands.

use serde::{Serialize, Deserialize};

/// Number of registers, R0 through R16.
pub const NUM_REGISTERS: usize = 17;

/// The register file plus PC, SP and the condition flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// R0 (accumulator) and the sixteen general-purpose registers.
    pub r: [u16; NUM_REGISTERS],

    /// Program counter: always the address of the next byte to fetch.
    pub pc: u16,

    /// Stack pointer: the address of the most recently pushed word,
    /// or stack head + 2 when the stack is empty.
    pub sp: u16,

    /// Condition flag, set by CMP. No documented instruction reads it;
    /// reserved for conditional-jump extensions.
    pub flag: bool,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            r: [0; NUM_REGISTERS],
            pc: 0,
            sp: 0,
            flag: false,
        }
    }

    /// Zero every register, the PC and the flag. The SP is left for the
    /// owner to re-seat at its stack head.
    pub fn reset(&mut self) {
        self.r = [0; NUM_REGISTERS];
        self.pc = 0;
        self.sp = 0;
        self.flag = false;
    }

    /// Advance the PC by `n` bytes, returning the old value.
    pub fn advance_pc(&mut self, n: u16) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(n);
        old
    }

    /// Set the PC to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr;
    }

    /// Registers as hex, one per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, v) in self.r.iter().enumerate() {
            out.push_str(&format!("R{:02}: x{:04x}\n", i, v));
        }
        out
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();
        regs.pc = 10;
        let old = regs.advance_pc(3);
        assert_eq!(old, 10);
        assert_eq!(regs.pc, 13);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.r[5] = 99;
        regs.pc = 7;
        regs.flag = true;
        regs.reset();
        assert_eq!(regs.r[5], 0);
        assert_eq!(regs.pc, 0);
        assert!(!regs.flag);
    }

    #[test]
    fn test_dump_format() {
        let mut regs = Registers::new();
        regs.r[0] = 0xbeef;
        let dump = regs.dump();
        let mut lines = dump.lines();
        assert_eq!(lines.next().unwrap(), "R00: xbeef");
        assert_eq!(lines.next().unwrap(), "R01: x0000");
        assert_eq!(dump.lines().count(), NUM_REGISTERS);
    }
}
