//! Mnemonic assembler.
//!
//! Syntax: one mnemonic per token, `;` starts a comment.
//!
//! ```text
//! ; sum 1..10
//! set_0  push_0  pop_1
//! set_10 push_0  pop_2
//! label_0
//!     push_1 pop_0 add_2 push_0 pop_1
//!     push_2 pop_0 sub_3 push_0 pop_2
//! goto_0_1
//! push_1 pop_0
//! ```
//!
//! A mnemonic is `<op>` or `<op>_<n>` or `<op>_<n>_<n2>`. Base-set
//! mnemonics encode to a single byte; extended mnemonics (`halt`,
//! `store_64`, `call_13`, `swap_0_1`, `xset_500`, ...) emit their
//! operand bytes too.

use crate::cpu::decode::{self, Instruction, JumpCond, Target};
use thiserror::Error;

/// Parse one mnemonic into a decoded instruction.
pub fn parse_mnemonic(s: &str) -> Result<Instruction, AsmError> {
    let mut parts = s.split('_');
    let op = parts.next().unwrap_or_default();
    let mut operands = parts.map(|p| parse_operand(s, p));

    let mut operand = |what: &'static str| -> Result<u16, AsmError> {
        operands
            .next()
            .ok_or_else(|| AsmError::MissingOperand { mnemonic: s.to_string(), what })?
    };

    let instr = match op {
        "set" => Instruction::Set {
            value: in_range(s, operand("immediate")?, 31)? as u8,
        },
        "add" => Instruction::Add { reg: register(s, operand("register")?)? },
        "sub" => Instruction::Sub { reg: register(s, operand("register")?)? },
        "mul" => Instruction::Mul { reg: register(s, operand("register")?)? },
        "push" => Instruction::Push { src: target(s, operand("register")?)? },
        "pop" => Instruction::Pop { dst: target(s, operand("register")?)? },
        "goto" => {
            let label = in_range(s, operand("label")?, 15)? as u8;
            let cond = match operand("condition")? {
                0 => JumpCond::Zero,
                1 => JumpCond::NotZero,
                n => {
                    return Err(AsmError::OperandOutOfRange {
                        mnemonic: s.to_string(),
                        value: n,
                        max: 1,
                    })
                }
            };
            Instruction::Goto { label, cond }
        }
        "label" => Instruction::Label {
            id: in_range(s, operand("label")?, 15)? as u8,
        },
        "noop" => Instruction::Noop,
        "halt" => Instruction::Halt,
        "store" => Instruction::Store { addr: operand("address")? },
        "load" => Instruction::Load { addr: operand("address")? },
        "swap" => Instruction::Swap {
            a: in_range(s, operand("register")?, 15)? as u8,
            b: in_range(s, operand("register")?, 15)? as u8,
        },
        "call" => Instruction::Call { addr: operand("address")? },
        "ret" => Instruction::Ret,
        "cmp" => Instruction::Cmp,
        "xset" => Instruction::Xset { value: operand("immediate")? },
        _ => return Err(AsmError::UnknownMnemonic(s.to_string())),
    };
    Ok(instr)
}

/// Assemble a whole source text, preserving token order. Byte offsets
/// of the output are the instruction addresses.
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut bytes = Vec::new();
    for line in source.lines() {
        let code = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        for token in code.split_whitespace() {
            let instr = parse_mnemonic(token)?;
            bytes.extend(decode::encode(&instr));
        }
    }
    Ok(bytes)
}

fn parse_operand(mnemonic: &str, part: &str) -> Result<u16, AsmError> {
    part.parse::<u16>().map_err(|_| AsmError::BadOperand {
        mnemonic: mnemonic.to_string(),
        operand: part.to_string(),
    })
}

fn in_range(mnemonic: &str, value: u16, max: u16) -> Result<u16, AsmError> {
    if value > max {
        return Err(AsmError::OperandOutOfRange {
            mnemonic: mnemonic.to_string(),
            value,
            max,
        });
    }
    Ok(value)
}

fn register(mnemonic: &str, value: u16) -> Result<u8, AsmError> {
    if !(1..=16).contains(&value) {
        return Err(AsmError::RegisterOutOfRange {
            mnemonic: mnemonic.to_string(),
            value,
        });
    }
    Ok(value as u8)
}

fn target(mnemonic: &str, value: u16) -> Result<Target, AsmError> {
    match value {
        0 => Ok(Target::Accumulator),
        1..=16 => Ok(Target::Register(value as u8)),
        _ => Err(AsmError::RegisterOutOfRange {
            mnemonic: mnemonic.to_string(),
            value,
        }),
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),

    #[error("{mnemonic}: missing {what} operand")]
    MissingOperand { mnemonic: String, what: &'static str },

    #[error("{mnemonic}: operand {operand} is not a number")]
    BadOperand { mnemonic: String, operand: String },

    #[error("{mnemonic}: operand {value} exceeds maximum {max}")]
    OperandOutOfRange { mnemonic: String, value: u16, max: u16 },

    #[error("{mnemonic}: register {value} out of range")]
    RegisterOutOfRange { mnemonic: String, value: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_set_encoding() {
        let cases = [
            ("set_0", 0x00),
            ("set_10", 0x0a),
            ("add_2", 0x22),
            ("sub_3", 0x44),
            ("mul_4", 0x66),
            ("push_0", 0x81),
            ("push_1", 0x80),
            ("pop_0", 0xa1),
            ("pop_2", 0xa2),
            ("goto_0_1", 0xc1),
            ("goto_3_0", 0xc6),
            ("label_0", 0xe0),
            ("label_5", 0xea),
        ];
        for (mnemonic, byte) in cases {
            assert_eq!(
                assemble(mnemonic).unwrap(),
                vec![byte],
                "{}",
                mnemonic
            );
        }
    }

    #[test]
    fn test_extended_encoding() {
        assert_eq!(assemble("halt").unwrap(), vec![0x11]);
        assert_eq!(assemble("store_64").unwrap(), vec![0x12, 0x00, 0x40]);
        assert_eq!(assemble("swap_0_1").unwrap(), vec![0x14, 0x01]);
        assert_eq!(assemble("xset_500").unwrap(), vec![0x18, 0x01, 0xf4]);
        assert_eq!(assemble("call_13 ret cmp").unwrap(), vec![0x15, 0x00, 0x0d, 0x16, 0x17]);
    }

    #[test]
    fn test_comments_and_layout_ignored() {
        let source = "
            ; init
            set_1 push_0 ; save
            pop_2
        ";
        assert_eq!(assemble(source).unwrap(), vec![0x01, 0x81, 0xa2]);
    }

    #[test]
    fn test_unknown_mnemonic() {
        assert_eq!(
            assemble("frobnicate_1"),
            Err(AsmError::UnknownMnemonic("frobnicate_1".to_string()))
        );
    }

    #[test]
    fn test_operand_validation() {
        assert!(matches!(
            parse_mnemonic("add_0"),
            Err(AsmError::RegisterOutOfRange { .. })
        ));
        assert!(matches!(
            parse_mnemonic("add_17"),
            Err(AsmError::RegisterOutOfRange { .. })
        ));
        assert!(matches!(
            parse_mnemonic("goto_16_0"),
            Err(AsmError::OperandOutOfRange { .. })
        ));
        assert!(matches!(
            parse_mnemonic("set_32"),
            Err(AsmError::OperandOutOfRange { .. })
        ));
        assert!(matches!(
            parse_mnemonic("push"),
            Err(AsmError::MissingOperand { .. })
        ));
        assert!(matches!(
            parse_mnemonic("set_x"),
            Err(AsmError::BadOperand { .. })
        ));
    }
}
