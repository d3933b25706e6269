use crate::asm::compile;
use crate::cpu::R;
use crate::machine::{Fault, Machine, Status, Step};

fn load_source(source: &str) -> Machine {
    let assembly = compile(source);
    assert_eq!(Vec::<String>::new(), assembly.errors);
    let mut machine = Machine::default();
    machine.load_image(&assembly.image, assembly.entry);
    machine
}

/// steps until HLT, collecting side-channel output; panics on faults and
/// runaway programs
fn run_to_halt(machine: &mut Machine) -> Vec<String> {
    let mut outputs = Vec::new();
    for _ in 0..10_000 {
        let step = machine.step().unwrap();
        if let Some(s) = step.output {
            outputs.push(s);
        }
        if step.halted {
            return outputs;
        }
    }
    panic!("program never halted");
}

#[test]
fn can_print_dollar_terminated_string() {
    let mut machine = load_source(
        "ORG 100h
MOV AH, 09h
MOV DX, msg
INT 21h
HLT
msg: DB \"Hi$\"",
    );
    let outputs = run_to_halt(&mut machine);
    assert_eq!(vec!["Hi".to_string()], outputs);
    assert_eq!(vec!["Hi".to_string()], machine.output);
    assert_eq!(Status::Idle, machine.status);
}

#[test]
fn can_print_single_character() {
    let mut machine = load_source(
        "MOV AH, 02h
MOV DL, 41h
INT 21h
HLT",
    );
    let outputs = run_to_halt(&mut machine);
    assert_eq!(vec!["A".to_string()], outputs);
}

#[test]
fn can_execute_cmp_and_signed_jump() {
    let mut machine = load_source(
        "MOV AX, 10
MOV BX, 20
CMP AX, BX
JL less
HLT
less: MOV CX, 1
HLT",
    );
    run_to_halt(&mut machine);
    assert_eq!(1, machine.cpu.get_r16(R::CX));
    assert_eq!(false, machine.cpu.regs.flags.zero);
    assert_eq!(true, machine.cpu.regs.flags.sign);
    assert_eq!(true, machine.cpu.regs.flags.carry);
}

#[test]
fn can_execute_loop_countdown() {
    let mut machine = load_source(
        "MOV CX, 3
MOV AX, 0
top: INC AX
LOOP top
HLT",
    );
    run_to_halt(&mut machine);
    assert_eq!(3, machine.cpu.get_r16(R::AX));
    assert_eq!(0, machine.cpu.get_r16(R::CX));
}

#[test]
fn can_execute_mul16() {
    let mut machine = load_source(
        "MOV AX, 0x1000
MOV BX, 0x0010
MUL BX
HLT",
    );
    run_to_halt(&mut machine);
    assert_eq!(0x0000, machine.cpu.get_r16(R::AX));
    assert_eq!(0x0001, machine.cpu.get_r16(R::DX));
}

#[test]
fn can_execute_indexed_load() {
    let mut machine = load_source(
        "MOV SI, 2
MOV AL, data[SI]
HLT
data: DB 11h, 22h, 33h, 44h",
    );
    run_to_halt(&mut machine);
    assert_eq!(0x33, machine.cpu.get_r8(R::AL));
    assert_eq!(0x00, machine.cpu.get_r8(R::AH));
}

#[test]
fn divide_by_zero_faults_with_ip_past_div() {
    let mut machine = load_source(
        "MOV AX, 10
MOV BL, 0
DIV BL
HLT",
    );
    machine.step().unwrap();
    machine.step().unwrap();
    let fault = machine.step().unwrap_err();
    assert_eq!(Fault::DivideByZero, fault);
    assert_eq!(Status::Error, machine.status);
    assert_eq!(Some("Divide by Zero".to_string()), machine.error);
    assert_eq!(0x10A, machine.cpu.regs.ip);
}

#[test]
fn divide_overflow_faults_distinctly() {
    let mut machine = load_source(
        "MOV AX, 0x1000
MOV BL, 0x10
DIV BL
HLT",
    );
    machine.step().unwrap();
    machine.step().unwrap();
    let fault = machine.step().unwrap_err();
    assert_eq!(Fault::DivideOverflow, fault);
    assert_eq!(Some("Divide Overflow".to_string()), machine.error);
}

#[test]
fn jmp_to_self_spins_without_faulting() {
    let mut machine = load_source("spin: JMP spin");
    for _ in 0..100 {
        let step = machine.step().unwrap();
        assert_eq!(false, step.halted);
        assert_eq!(0x100, machine.cpu.regs.ip);
    }
    assert_eq!(Status::Running, machine.status);
}

#[test]
fn jmp_dollar_spins_without_faulting() {
    let mut machine = load_source("JMP $");
    for _ in 0..10 {
        machine.step().unwrap();
        assert_eq!(0x100, machine.cpu.regs.ip);
    }
}

#[test]
fn word_access_at_last_byte_faults() {
    // mov ax, [0xFFFF] touches 0x10000
    let mut machine = Machine::default();
    machine.load_image(&[], 0x100);
    machine.mmu.write(0x100, &[0x8B, 0x08, 0xFF, 0xFF]).unwrap();
    let fault = machine.step().unwrap_err();
    assert_eq!(Fault::MemoryOutOfBounds(0x10000), fault);
    assert_eq!(Status::Error, machine.status);
}

#[test]
fn loop_with_cx_1_falls_through() {
    let mut machine = Machine::default();
    machine.mmu.write(0x100, &[0xE2, 0xFE]).unwrap(); // loop $
    machine.cpu.set_r16(R::CX, 1);
    machine.step().unwrap();
    assert_eq!(0, machine.cpu.get_r16(R::CX));
    assert_eq!(0x102, machine.cpu.regs.ip);
}

#[test]
fn loop_with_cx_0_wraps_and_jumps() {
    let mut machine = Machine::default();
    machine.mmu.write(0x100, &[0xE2, 0xFE]).unwrap(); // loop $
    machine.cpu.set_r16(R::CX, 0);
    machine.step().unwrap();
    assert_eq!(0xFFFF, machine.cpu.get_r16(R::CX));
    assert_eq!(0x100, machine.cpu.regs.ip);
}

#[test]
fn unknown_opcode_faults_by_default() {
    let mut machine = Machine::default();
    machine.mmu.write_u8(0x100, 0x00).unwrap();
    let fault = machine.step().unwrap_err();
    assert_eq!(Fault::UnknownOpcode(0x00, 0x100), fault);
}

#[test]
fn permissive_machine_treats_unknown_opcode_as_nop() {
    let mut machine = Machine::permissive();
    machine.mmu.write_u8(0x100, 0x00).unwrap();
    let step = machine.step().unwrap();
    assert_eq!(Step { output: None, halted: false }, step);
    assert_eq!(0x101, machine.cpu.regs.ip);
}

#[test]
fn ret_is_a_no_op() {
    let mut machine = Machine::default();
    machine.mmu.write(0x100, &[0xC3, 0xF4]).unwrap(); // ret, hlt
    let before = machine.cpu.regs.clone();
    machine.step().unwrap();
    assert_eq!(0x101, machine.cpu.regs.ip);
    assert_eq!(before.gpr, machine.cpu.regs.gpr);
    assert_eq!(before.flags, machine.cpu.regs.flags);
    let step = machine.step().unwrap();
    assert_eq!(true, step.halted);
}

#[test]
fn missing_string_terminator_faults() {
    // memory past DX is zero-filled, so no '$' is ever found
    let mut machine = load_source(
        "MOV AH, 09h
MOV DX, 0xFFFE
INT 21h
HLT",
    );
    machine.step().unwrap();
    machine.step().unwrap();
    let fault = machine.step().unwrap_err();
    assert_eq!(Fault::MemoryOutOfBounds(0x10000), fault);
}

#[test]
fn unhandled_interrupts_are_ignored() {
    let mut machine = load_source(
        "MOV AH, 4Ch
INT 21h
INT 10h
HLT",
    );
    let outputs = run_to_halt(&mut machine);
    assert_eq!(Vec::<String>::new(), outputs);
}

#[test]
fn initial_register_values() {
    let machine = Machine::default();
    assert_eq!(0x100, machine.cpu.regs.ip);
    assert_eq!(0xFFFE, machine.cpu.get_r16(R::SP));
    assert_eq!(0, machine.cpu.get_r16(R::AX));
    assert_eq!(0, machine.cpu.regs.sreg[0]);
}

#[test]
fn forward_and_backward_references_agree() {
    let mut fwd = load_source(
        "MOV AL, [data]
HLT
data: DB 5",
    );
    let mut back = load_source(
        "JMP start
data: DB 5
start: MOV AL, [data]
HLT",
    );
    run_to_halt(&mut fwd);
    run_to_halt(&mut back);
    assert_eq!(5, fwd.cpu.get_r8(R::AL));
    assert_eq!(fwd.cpu.get_r8(R::AL), back.cpu.get_r8(R::AL));
}

#[test]
fn can_execute_memory_destination_add() {
    let mut machine = load_source(
        "MOV AL, 7
ADD counter, AL
ADD counter, AL
HLT
counter: DB 1",
    );
    run_to_halt(&mut machine);
    let counter_addr = 0x100 + 4 + 4 + 4 + 1;
    assert_eq!(15, machine.mmu.read_u8(counter_addr).unwrap());
}

#[test]
fn can_save_and_restore_state() {
    let mut machine = load_source(
        "MOV AX, 1234h
HLT",
    );
    machine.step().unwrap();
    let snapshot = machine.save_state().unwrap();
    let restored = Machine::load_state(&snapshot).unwrap();
    assert_eq!(machine, restored);
    assert_eq!(0x1234, restored.cpu.get_r16(R::AX));
}

#[test]
fn execute_instructions_stops_on_halt() {
    let mut machine = load_source(
        "MOV CX, 100
top: LOOP top
HLT",
    );
    assert_eq!(true, machine.execute_instructions(10_000));
    assert_eq!(Status::Idle, machine.status);
    assert_eq!(0, machine.cpu.get_r16(R::CX));
}

#[test]
fn compare_memory_with_immediate() {
    let mut machine = load_source(
        "CMP [data], 5
JE equal
HLT
equal: MOV AX, 1
HLT
data: DB 5",
    );
    run_to_halt(&mut machine);
    assert_eq!(1, machine.cpu.get_r16(R::AX));
}

#[test]
fn eight_bit_arithmetic_ignores_immediate_high_byte() {
    let mut machine = load_source(
        "MOV AL, 1
ADD AL, 0x1FF
HLT",
    );
    run_to_halt(&mut machine);
    // only the low byte of the immediate participates
    assert_eq!(0x00, machine.cpu.get_r8(R::AL));
    assert_eq!(true, machine.cpu.regs.flags.carry);
    assert_eq!(true, machine.cpu.regs.flags.zero);
}
