use crate::cpu::decoder::Decoder;
use crate::cpu::op::Op;
use crate::cpu::parameter::Parameter;
use crate::cpu::register::R;
use crate::machine::Fault;
use crate::memory::MMU;

fn decode_bytes(bytes: &[u8]) -> Result<crate::cpu::Instruction, Fault> {
    let mut mmu = MMU::new();
    mmu.write(0x100, bytes).unwrap();
    let mut decoder = Decoder::default();
    decoder.get_instruction(&mmu, 0x100)
}

#[test]
fn decodes_single_byte_ops() {
    let instr = decode_bytes(&[0x90]).unwrap();
    assert_eq!(Op::Nop, instr.command);
    assert_eq!(1, instr.length);

    let instr = decode_bytes(&[0xF4]).unwrap();
    assert_eq!(Op::Hlt, instr.command);

    let instr = decode_bytes(&[0xC3]).unwrap();
    assert_eq!(Op::Ret, instr.command);
}

#[test]
fn decodes_packed_register_pair() {
    let instr = decode_bytes(&[0x10, 0xB8]).unwrap();
    assert_eq!(Op::Mov, instr.command);
    assert_eq!(Parameter::Reg(R::BX), instr.dst);
    assert_eq!(Parameter::Reg(R::AX), instr.src);
    assert_eq!(2, instr.length);
}

#[test]
fn decodes_register_immediate() {
    let instr = decode_bytes(&[0x11, 0x08, 0x34, 0x12]).unwrap();
    assert_eq!(Op::Mov, instr.command);
    assert_eq!(Parameter::Reg(R::AX), instr.dst);
    assert_eq!(Parameter::Imm(0x1234), instr.src);
    assert_eq!(4, instr.length);
}

#[test]
fn decodes_indexed_operand() {
    let instr = decode_bytes(&[0x8A, 0x00, 0x0E, 0x00, 0x02]).unwrap();
    assert_eq!(Op::Mov, instr.command);
    assert_eq!(Parameter::Reg(R::AL), instr.dst);
    assert_eq!(Parameter::PtrIdx(0x200, R::SI), instr.src);
    assert_eq!(5, instr.length);
}

#[test]
fn decodes_memory_immediate() {
    let instr = decode_bytes(&[0xC6, 0x00, 0x02, 0x7F]).unwrap();
    assert_eq!(Op::Mov, instr.command);
    assert_eq!(Parameter::Ptr(0x200), instr.dst);
    assert_eq!(Parameter::Imm(0x7F), instr.src);
    assert_eq!(4, instr.length);
}

#[test]
fn decodes_relative_branches() {
    let instr = decode_bytes(&[0xE9, 0xFD, 0xFF]).unwrap();
    assert_eq!(Op::Jmp, instr.command);
    assert_eq!(3, instr.length);

    let instr = decode_bytes(&[0x74, 0xFE]).unwrap();
    assert_eq!(Op::Je, instr.command);
    assert_eq!(Parameter::ImmS8(-2), instr.dst);
    assert_eq!(2, instr.length);

    let instr = decode_bytes(&[0xE2, 0x05]).unwrap();
    assert_eq!(Op::Loop, instr.command);
    assert_eq!(Parameter::ImmS8(5), instr.dst);
}

#[test]
fn decodes_int_with_vector() {
    let instr = decode_bytes(&[0xCD, 0x21]).unwrap();
    assert_eq!(Op::Int, instr.command);
    assert_eq!(Parameter::Imm(0x21), instr.dst);
    assert_eq!(2, instr.length);
}

#[test]
fn decodes_memory_single_operand_forms() {
    let instr = decode_bytes(&[0xA4, 0x00, 0x02]).unwrap();
    assert_eq!(Op::Inc, instr.command);
    assert_eq!(Parameter::Ptr(0x200), instr.dst);
    assert_eq!(3, instr.length);

    let instr = decode_bytes(&[0xAD, 0x0E, 0x00, 0x02]).unwrap();
    assert_eq!(Op::Div, instr.command);
    assert_eq!(Parameter::PtrIdx(0x200, R::SI), instr.dst);
    assert_eq!(4, instr.length);
}

#[test]
fn unknown_opcode_is_a_fault() {
    assert_eq!(Err(Fault::UnknownOpcode(0xFF, 0x100)), decode_bytes(&[0xFF]));
}

#[test]
fn fetch_past_end_of_memory_is_an_ip_fault() {
    let mut mmu = MMU::new();
    // a register/immediate op starting at the last byte
    mmu.write_u8(0xFFFF, 0x11).unwrap();
    let mut decoder = Decoder::default();
    assert_eq!(
        Err(Fault::IpOutOfBounds(0x10000)),
        decoder.get_instruction(&mmu, 0xFFFF)
    );
    assert_eq!(
        Err(Fault::IpOutOfBounds(0x10000)),
        decoder.get_instruction(&mmu, 0x10000)
    );
}
