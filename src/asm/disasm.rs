//! Disassembler.
//!
//! Converts machine bytes back to the mnemonic form the assembler
//! accepts. Used by trace output and the dashboard code listing.

use crate::cpu::decode::{decode, Instruction, JumpCond, Target};

/// Disassemble the instruction at `pc`, returning its text and width.
/// Undecodable bytes come back as `??` with a width of one.
pub fn disassemble_instruction(code: &[u8], pc: u16) -> (String, u16) {
    match decode(code, pc) {
        Ok(instr) => (format_instruction(&instr), instr.width()),
        Err(_) => (format!("?? {:#04x}", code[pc as usize]), 1),
    }
}

/// Disassemble a whole program into an address-annotated listing.
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    for (addr, text) in listing(code) {
        out.push_str(&format!("{:04x}: {}\n", addr, text));
    }
    out
}

/// The listing as (address, text) rows, one per instruction.
pub fn listing(code: &[u8]) -> Vec<(u16, String)> {
    let mut rows = Vec::new();
    let mut pc = 0u16;
    while (pc as usize) < code.len() {
        let (text, width) = disassemble_instruction(code, pc);
        rows.push((pc, text));
        pc += width;
    }
    rows
}

/// Format a decoded instruction in assembler syntax.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Set { value } => format!("set_{}", value),
        Instruction::Add { reg } => format!("add_{}", reg),
        Instruction::Sub { reg } => format!("sub_{}", reg),
        Instruction::Mul { reg } => format!("mul_{}", reg),
        Instruction::Push { src } => format!("push_{}", target_index(src)),
        Instruction::Pop { dst } => format!("pop_{}", target_index(dst)),
        Instruction::Goto { label, cond } => {
            let cond_bit = match cond {
                JumpCond::Zero => 0,
                JumpCond::NotZero => 1,
            };
            format!("goto_{}_{}", label, cond_bit)
        }
        Instruction::Label { id } => format!("label_{}", id),
        Instruction::Noop => "noop".to_string(),
        Instruction::Halt => "halt".to_string(),
        Instruction::Store { addr } => format!("store_{}", addr),
        Instruction::Load { addr } => format!("load_{}", addr),
        Instruction::Swap { a, b } => format!("swap_{}_{}", a, b),
        Instruction::Call { addr } => format!("call_{}", addr),
        Instruction::Ret => "ret".to_string(),
        Instruction::Cmp => "cmp".to_string(),
        Instruction::Xset { value } => format!("xset_{}", value),
    }
}

fn target_index(target: Target) -> usize {
    target.index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;

    #[test]
    fn test_disassemble_base_set() {
        let code = [0x0a, 0x22, 0x81, 0xa0, 0xc1, 0xe0];
        let listing = disassemble(&code);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "0000: set_10");
        assert_eq!(lines[1], "0001: add_2");
        assert_eq!(lines[2], "0002: push_0");
        assert_eq!(lines[3], "0003: pop_1");
        assert_eq!(lines[4], "0004: goto_0_1");
        assert_eq!(lines[5], "0005: label_0");
    }

    #[test]
    fn test_disassemble_extended_widths() {
        let code = [0x18, 0x01, 0xf4, 0x14, 0x21, 0x11];
        let lines = listing(&code);
        assert_eq!(lines[0], (0, "xset_500".to_string()));
        assert_eq!(lines[1], (3, "swap_2_1".to_string()));
        assert_eq!(lines[2], (5, "halt".to_string()));
    }

    #[test]
    fn test_unknown_byte_marked() {
        let (text, width) = disassemble_instruction(&[0x1f], 0);
        assert!(text.starts_with("??"));
        assert_eq!(width, 1);
    }

    #[test]
    fn test_roundtrip_through_assembler() {
        let source = "set_5 push_0 pop_3 xset_4660 store_64 call_12 ret halt";
        let bytes = assemble(source).unwrap();
        let text = disassemble(&bytes);
        let reassembled = assemble(
            &text
                .lines()
                .map(|l| l.split_once(": ").unwrap().1)
                .collect::<Vec<_>>()
                .join(" "),
        )
        .unwrap();
        assert_eq!(bytes, reassembled);
    }
}
