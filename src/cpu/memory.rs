//! Flat byte-addressable memory.
//!
//! A single array holds program code (at low addresses), inline data and
//! the stack (growing downward from the high end). The split is by
//! convention only; nothing enforces segmentation.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Default memory size in bytes.
pub const DEFAULT_MEMORY_SIZE: u16 = 128;

/// Machine memory: a fixed-size byte array.
///
/// Multi-byte values (stack slots, extended-instruction operands) are
/// stored big-endian.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a new memory of `size` bytes, all zeroed.
    pub fn new(size: u16) -> Self {
        Self {
            bytes: vec![0; size as usize],
        }
    }

    /// Memory size in bytes.
    #[inline]
    pub fn len(&self) -> u16 {
        self.bytes.len() as u16
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read one byte.
    pub fn read(&self, addr: u16) -> Result<u8, MemoryError> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange(addr))
    }

    /// Write one byte.
    pub fn write(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        match self.bytes.get_mut(addr as usize) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(MemoryError::AddressOutOfRange(addr)),
        }
    }

    /// Read a 16-bit word stored big-endian at `addr`.
    pub fn read_word(&self, addr: u16) -> Result<u16, MemoryError> {
        let hi = self.read(addr)?;
        let lo = self.read(addr.wrapping_add(1))?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Write a 16-bit word big-endian at `addr`.
    pub fn write_word(&mut self, addr: u16, value: u16) -> Result<(), MemoryError> {
        let [hi, lo] = value.to_be_bytes();
        self.write(addr, hi)?;
        self.write(addr.wrapping_add(1), lo)
    }

    /// Raw view of the whole memory (used by the decoder and resolver).
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Zero every byte.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Copy a program into memory at offset 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        if program.len() > self.bytes.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes[..program.len()].copy_from_slice(program);
        Ok(())
    }

    /// One 16-byte row as hex, starting at `index`.
    pub fn dump_row(&self, index: u16) -> String {
        let start = index as usize;
        let end = (start + 16).min(self.bytes.len());
        let mut line = String::new();
        for b in &self.bytes[start..end] {
            line.push_str(&format!("{:02x} ", b));
        }
        line
    }

    /// The entire memory as hex, 16 bytes per row with a column header
    /// and row addresses.
    pub fn dump(&self) -> String {
        let mut out = String::from(
            "       00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f\n",
        );
        let mut k = 0usize;
        while k < self.bytes.len() {
            out.push_str(&format!("{:04x}:  ", k));
            out.push_str(&self.dump_row(k as u16));
            out.push('\n');
            k += 16;
        }
        out
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|b| **b != 0).count();
        f.debug_struct("Memory")
            .field("size", &self.bytes.len())
            .field("non_zero_bytes", &non_zero)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address {0:#06x} out of range")]
    AddressOutOfRange(u16),

    #[error("program size {size} exceeds memory capacity {capacity}")]
    ProgramTooLarge { size: usize, capacity: usize },
}
