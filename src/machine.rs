use crate::cpu::{CPU, Instruction, Op, Parameter, R};
use crate::interrupt::int21;
use crate::memory::{MEMORY_SIZE, MMU};

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// prints each instruction as it is executed
const DEBUG_EXEC: bool = false;

quick_error! {
    /// A fault stops execution; the host decides whether to reset.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Fault {
        IpOutOfBounds(ip: u32) {
            display("IP out of bounds at {:04X}", ip)
        }
        MemoryOutOfBounds(addr: u32) {
            display("Memory access out of bounds at {:04X}", addr)
        }
        DivideByZero {
            display("Divide by Zero")
        }
        DivideOverflow {
            display("Divide Overflow")
        }
        UnknownOpcode(op: u8, addr: u32) {
            display("Unknown opcode {:02X} at {:04X}", op, addr)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Running,
    Paused,
    Error,
}

/// The observable result of one instruction step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Step {
    /// text emitted on the hosted output side-channel
    pub output: Option<String>,
    pub halted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub cpu: CPU,
    pub mmu: MMU,
    pub status: Status,
    pub error: Option<String>,

    /// log of everything emitted on the output side-channel
    pub output: Vec<String>,

    /// treat unknown opcodes as NOP instead of faulting, for images that
    /// run off the end of emitted code into zero-filled memory
    pub permissive: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Machine {
            cpu: CPU::new(),
            mmu: MMU::new(),
            status: Status::Idle,
            error: None,
            output: Vec::new(),
            permissive: false,
        }
    }
}

impl Machine {
    /// returns a machine that executes unknown opcodes as NOP
    pub fn permissive() -> Self {
        let mut m = Self::default();
        m.permissive = true;
        m
    }

    /// copies an assembled image into memory and prepares for stepping
    pub fn load_image(&mut self, image: &[u8], entry: u16) {
        let len = image.len().min(MEMORY_SIZE);
        self.mmu.memory.data[..len].copy_from_slice(&image[..len]);
        self.cpu.regs.ip = entry;
        self.status = Status::Idle;
        self.error = None;
    }

    /// Advances the machine by exactly one instruction.
    ///
    /// On a fault the machine transitions to `Status::Error` with the
    /// fault message recorded in `error`, and the fault is returned.
    pub fn step(&mut self) -> Result<Step, Fault> {
        match self.step_inner() {
            Ok(step) => Ok(step),
            Err(fault) => {
                self.error = Some(fault.to_string());
                self.status = Status::Error;
                Err(fault)
            }
        }
    }

    fn step_inner(&mut self) -> Result<Step, Fault> {
        let ip = u32::from(self.cpu.regs.ip);
        let instr = match self.cpu.decoder.get_instruction(&self.mmu, ip) {
            Ok(instr) => instr,
            Err(Fault::UnknownOpcode(_, _)) if self.permissive => Instruction::new(Op::Nop, 1),
            Err(fault) => return Err(fault),
        };

        let next_ip = ip + u32::from(instr.length);
        if next_ip > 0xFFFF {
            return Err(Fault::IpOutOfBounds(next_ip));
        }

        if DEBUG_EXEC {
            println!("[{:04X}] {}", ip, instr);
        }

        self.cpu.regs.ip = next_ip as u16;
        self.cpu.instruction_count += 1;
        self.execute(&instr)
    }

    /// executes n instructions
    /// returns true if execution stopped early on a halt or fault
    pub fn execute_instructions(&mut self, count: usize) -> bool {
        for _ in 0..count {
            match self.step() {
                Ok(step) => {
                    if step.halted {
                        return true;
                    }
                }
                Err(_) => return true,
            }
        }
        false
    }

    /// serializes the whole machine for later restore
    pub fn save_state(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn load_state(data: &[u8]) -> bincode::Result<Machine> {
        bincode::deserialize(data)
    }

    fn execute(&mut self, op: &Instruction) -> Result<Step, Fault> {
        match op.command {
            Op::Nop | Op::Ret => {}

            Op::Hlt => {
                self.status = Status::Idle;
                return Ok(Step { output: None, halted: true });
            }

            Op::Mov => {
                let wide = self.cpu.operand_is_wide(&op.dst, &op.src);
                let v = self.cpu.read_parameter(&self.mmu, &op.src, wide)?;
                self.cpu.write_parameter(&mut self.mmu, &op.dst, wide, v)?;
            }

            Op::Add | Op::Sub | Op::And | Op::Or | Op::Xor => {
                let wide = self.cpu.operand_is_wide(&op.dst, &op.src);
                let mask = if wide { 0xFFFF } else { 0xFF };
                let dst = self.cpu.read_parameter(&self.mmu, &op.dst, wide)? & mask;
                let src = self.cpu.read_parameter(&self.mmu, &op.src, wide)? & mask;
                let res = match (op.command, wide) {
                    (Op::Add, false) => self.cpu.add8(dst, src),
                    (Op::Add, true) => self.cpu.add16(dst, src),
                    (Op::Sub, false) => self.cpu.sub8(dst, src),
                    (Op::Sub, true) => self.cpu.sub16(dst, src),
                    (Op::And, false) => self.cpu.bitwise8(dst & src),
                    (Op::And, true) => self.cpu.bitwise16(dst & src),
                    (Op::Or, false) => self.cpu.bitwise8(dst | src),
                    (Op::Or, true) => self.cpu.bitwise16(dst | src),
                    (Op::Xor, false) => self.cpu.bitwise8(dst ^ src),
                    (Op::Xor, true) => self.cpu.bitwise16(dst ^ src),
                    _ => unreachable!(),
                };
                self.cpu.write_parameter(&mut self.mmu, &op.dst, wide, res)?;
            }

            Op::Cmp => {
                let wide = self.cpu.operand_is_wide(&op.dst, &op.src);
                let mask = if wide { 0xFFFF } else { 0xFF };
                let dst = self.cpu.read_parameter(&self.mmu, &op.dst, wide)? & mask;
                let src = self.cpu.read_parameter(&self.mmu, &op.src, wide)? & mask;
                if wide {
                    self.cpu.sub16(dst, src);
                } else {
                    self.cpu.sub8(dst, src);
                }
            }

            Op::Not => {
                let wide = op.dst.is_wide_reg();
                let mask = if wide { 0xFFFF } else { 0xFF };
                let v = self.cpu.read_parameter(&self.mmu, &op.dst, wide)?;
                self.cpu.write_parameter(&mut self.mmu, &op.dst, wide, !v & mask)?;
            }

            Op::Inc | Op::Dec => {
                let wide = op.dst.is_wide_reg();
                let mask = if wide { 0xFFFF } else { 0xFF };
                let v = self.cpu.read_parameter(&self.mmu, &op.dst, wide)? & mask;
                let res = match (op.command, wide) {
                    (Op::Inc, false) => self.cpu.add8(v, 1),
                    (Op::Inc, true) => self.cpu.add16(v, 1),
                    (Op::Dec, false) => self.cpu.sub8(v, 1),
                    (Op::Dec, true) => self.cpu.sub16(v, 1),
                    _ => unreachable!(),
                };
                self.cpu.write_parameter(&mut self.mmu, &op.dst, wide, res)?;
            }

            Op::Mul => {
                let wide = op.dst.is_wide_reg();
                let v = self.cpu.read_parameter(&self.mmu, &op.dst, wide)?;
                if wide {
                    self.cpu.mul16(v);
                } else {
                    self.cpu.mul8(v & 0xFF);
                }
            }

            Op::Div => {
                let wide = op.dst.is_wide_reg();
                let v = self.cpu.read_parameter(&self.mmu, &op.dst, wide)?;
                if wide {
                    self.cpu.div16(v)?;
                } else {
                    self.cpu.div8(v & 0xFF)?;
                }
            }

            Op::Jmp => {
                if let Parameter::Imm(disp) = op.dst {
                    self.branch(i32::from(disp as i16))?;
                }
            }

            Op::Je | Op::Jne | Op::Jl | Op::Jle | Op::Jg | Op::Jge
            | Op::Jb | Op::Jbe | Op::Ja | Op::Jae => {
                if self.condition(op.command) {
                    if let Parameter::ImmS8(disp) = op.dst {
                        self.branch(i32::from(disp))?;
                    }
                }
            }

            Op::Loop => {
                let cx = self.cpu.get_r16(R::CX).wrapping_sub(1);
                self.cpu.set_r16(R::CX, cx);
                if cx != 0 {
                    if let Parameter::ImmS8(disp) = op.dst {
                        self.branch(i32::from(disp))?;
                    }
                }
            }

            Op::Int => {
                if let Parameter::Imm(n) = op.dst {
                    let output = self.interrupt(n as u8)?;
                    if let Some(s) = &output {
                        self.output.push(s.clone());
                    }
                    self.status = Status::Running;
                    return Ok(Step { output, halted: false });
                }
            }

        }

        self.status = Status::Running;
        Ok(Step { output: None, halted: false })
    }

    fn interrupt(&mut self, int: u8) -> Result<Option<String>, Fault> {
        match int {
            0x21 => int21::handle(&mut self.cpu, &self.mmu),
            // other interrupt vectors are ignored
            _ => Ok(None),
        }
    }

    fn condition(&self, op: Op) -> bool {
        let f = &self.cpu.regs.flags;
        match op {
            Op::Je => f.zero,
            Op::Jne => !f.zero,
            Op::Jl => f.sign != f.overflow,
            Op::Jle => f.zero || f.sign != f.overflow,
            Op::Jg => !f.zero && f.sign == f.overflow,
            Op::Jge => f.sign == f.overflow,
            Op::Jb => f.carry,
            Op::Jbe => f.carry || f.zero,
            Op::Ja => !f.carry && !f.zero,
            Op::Jae => !f.carry,
            _ => unreachable!(),
        }
    }

    /// displaces IP relative to the end of the current instruction
    fn branch(&mut self, disp: i32) -> Result<(), Fault> {
        let target = i32::from(self.cpu.regs.ip) + disp;
        if target < 0 || target > 0xFFFF {
            return Err(Fault::IpOutOfBounds(target as u32));
        }
        self.cpu.regs.ip = target as u16;
        Ok(())
    }
}
