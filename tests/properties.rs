//! Property tests for the instruction encoding and the engine.

use bytevm::cpu::{
    decode, encode, encode_program, Cpu, Instruction, JumpCond, MachineConfig, Target,
};
use proptest::prelude::*;

fn any_target() -> impl Strategy<Value = Target> {
    prop_oneof![
        Just(Target::Accumulator),
        (1u8..=16).prop_map(Target::Register),
    ]
}

/// Every encodable instruction. SET immediates stop at 15: 16-31 are
/// shadowed by the extended tag and do not survive a round trip.
fn any_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (0u8..=15).prop_map(|value| Instruction::Set { value }),
        (1u8..=16).prop_map(|reg| Instruction::Add { reg }),
        (1u8..=16).prop_map(|reg| Instruction::Sub { reg }),
        (1u8..=16).prop_map(|reg| Instruction::Mul { reg }),
        any_target().prop_map(|src| Instruction::Push { src }),
        any_target().prop_map(|dst| Instruction::Pop { dst }),
        (0u8..=15, prop::bool::ANY).prop_map(|(label, nz)| Instruction::Goto {
            label,
            cond: if nz { JumpCond::NotZero } else { JumpCond::Zero },
        }),
        (0u8..=15).prop_map(|id| Instruction::Label { id }),
        Just(Instruction::Noop),
        Just(Instruction::Halt),
        any::<u16>().prop_map(|addr| Instruction::Store { addr }),
        any::<u16>().prop_map(|addr| Instruction::Load { addr }),
        (0u8..=15, 0u8..=15).prop_map(|(a, b)| Instruction::Swap { a, b }),
        any::<u16>().prop_map(|addr| Instruction::Call { addr }),
        Just(Instruction::Ret),
        Just(Instruction::Cmp),
        any::<u16>().prop_map(|value| Instruction::Xset { value }),
    ]
}

/// Straight-line instructions: no jumps, no stack, no halt. Any
/// sequence of these terminates by running off its own end.
fn straight_line_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (0u8..=15).prop_map(|value| Instruction::Set { value }),
        (1u8..=16).prop_map(|reg| Instruction::Add { reg }),
        (1u8..=16).prop_map(|reg| Instruction::Sub { reg }),
        (1u8..=16).prop_map(|reg| Instruction::Mul { reg }),
        (0u8..=15, 0u8..=15).prop_map(|(a, b)| Instruction::Swap { a, b }),
        any::<u16>().prop_map(|value| Instruction::Xset { value }),
        Just(Instruction::Cmp),
        Just(Instruction::Noop),
    ]
}

proptest! {
    #[test]
    fn encode_decode_roundtrip(instr in any_instruction()) {
        let bytes = encode(&instr);
        prop_assert_eq!(bytes.len() as u16, instr.width());
        prop_assert_eq!(decode(&bytes, 0).unwrap(), instr);
    }

    #[test]
    fn push_pop_restores_stack(values in prop::collection::vec(any::<u16>(), 1..=10)) {
        let mut instrs = Vec::new();
        for v in &values {
            instrs.push(Instruction::Xset { value: *v });
            instrs.push(Instruction::Push { src: Target::Accumulator });
        }
        // Pop back in LIFO order into R1, R2, ...
        for i in 0..values.len() {
            instrs.push(Instruction::Pop { dst: Target::Register(i as u8 + 1) });
        }
        instrs.push(Instruction::Halt);

        let mut cpu = Cpu::new(MachineConfig { memory_size: 256, stack_size: 10 });
        cpu.load(&encode_program(&instrs)).unwrap();
        let sp_before = cpu.regs.sp;
        cpu.run().unwrap();

        prop_assert_eq!(cpu.regs.sp, sp_before);
        for (i, v) in values.iter().rev().enumerate() {
            prop_assert_eq!(cpu.regs.r[i + 1], *v);
        }
    }

    #[test]
    fn straight_line_programs_are_deterministic(
        instrs in prop::collection::vec(straight_line_instruction(), 1..=30)
    ) {
        let program = encode_program(&instrs);
        let config = MachineConfig { memory_size: 256, stack_size: 10 };

        let mut first = Cpu::new(config);
        first.load(&program).unwrap();
        first.run().unwrap();

        let mut second = Cpu::new(config);
        second.load(&program).unwrap();
        second.run().unwrap();

        prop_assert_eq!(first.regs.r, second.regs.r);
        prop_assert_eq!(first.regs.pc, second.regs.pc);
        prop_assert_eq!(first.regs.sp, second.regs.sp);
        prop_assert_eq!(first.regs.flag, second.regs.flag);
        prop_assert_eq!(first.mem.bytes(), second.mem.bytes());
        prop_assert_eq!(first.cycles, second.cycles);
    }
}
