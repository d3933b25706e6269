use crate::cpu::instruction::Instruction;
use crate::cpu::op::*;
use crate::cpu::parameter::Parameter;
use crate::cpu::register::R;
use crate::machine::Fault;
use crate::memory::MMU;

/// if enabled, prints decoded instructions each time they are being decoded
const DEBUG_DECODER: bool = false;

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Decoder {
    /// instruction decoding offset, follows IP during a fetch
    current_offset: u32,
}

impl Decoder {
    /// decodes the instruction at `offset` without touching machine state
    pub fn get_instruction(&mut self, mmu: &MMU, offset: u32) -> Result<Instruction, Fault> {
        self.current_offset = offset;
        let instr = self.decode(mmu)?;
        if DEBUG_DECODER {
            println!("decoded {:04X}: {}", offset, instr);
        }
        Ok(instr)
    }

    fn decode(&mut self, mmu: &MMU) -> Result<Instruction, Fault> {
        let start = self.current_offset;
        let b = self.read_u8(mmu)?;

        let (op, dst, src) = match b {
            OP_NOP => (Op::Nop, Parameter::None, Parameter::None),
            OP_HLT => (Op::Hlt, Parameter::None, Parameter::None),
            OP_RET => (Op::Ret, Parameter::None, Parameter::None),

            OP_MOV_REG_REG => self.reg_reg(mmu, Op::Mov)?,
            OP_MOV_REG_IMM => self.reg_imm(mmu, Op::Mov)?,
            OP_MOV_REG_MEM => self.reg_mem(mmu, Op::Mov)?,
            OP_MOV_MEM_REG => self.mem_reg(mmu, Op::Mov)?,
            OP_MOV_REG_IDX => self.reg_idx(mmu, Op::Mov)?,
            OP_MOV_IDX_REG => self.idx_reg(mmu, Op::Mov)?,
            OP_MOV_MEM_IMM => self.mem_imm(mmu, Op::Mov)?,
            OP_MOV_IDX_IMM => self.idx_imm(mmu, Op::Mov)?,

            OP_ADD_REG_REG => self.reg_reg(mmu, Op::Add)?,
            OP_ADD_REG_IMM => self.reg_imm(mmu, Op::Add)?,
            OP_ADD_REG_MEM => self.reg_mem(mmu, Op::Add)?,
            OP_ADD_REG_IDX => self.reg_idx(mmu, Op::Add)?,
            OP_ADD_MEM_REG => self.mem_reg(mmu, Op::Add)?,

            OP_AND_REG_REG => self.reg_reg(mmu, Op::And)?,
            OP_AND_REG_IMM => self.reg_imm(mmu, Op::And)?,
            OP_AND_REG_MEM => self.reg_mem(mmu, Op::And)?,
            OP_AND_REG_IDX => self.reg_idx(mmu, Op::And)?,

            OP_SUB_REG_REG => self.reg_reg(mmu, Op::Sub)?,
            OP_SUB_REG_IMM => self.reg_imm(mmu, Op::Sub)?,
            OP_SUB_REG_MEM => self.reg_mem(mmu, Op::Sub)?,
            OP_SUB_REG_IDX => self.reg_idx(mmu, Op::Sub)?,

            OP_XOR_REG_REG => self.reg_reg(mmu, Op::Xor)?,
            OP_XOR_REG_IMM => self.reg_imm(mmu, Op::Xor)?,
            OP_XOR_REG_MEM => self.reg_mem(mmu, Op::Xor)?,
            OP_XOR_REG_IDX => self.reg_idx(mmu, Op::Xor)?,

            OP_OR_REG_REG => self.reg_reg(mmu, Op::Or)?,
            OP_OR_REG_IMM => self.reg_imm(mmu, Op::Or)?,
            OP_OR_REG_MEM => self.reg_mem(mmu, Op::Or)?,
            OP_OR_REG_IDX => self.reg_idx(mmu, Op::Or)?,

            OP_CMP_REG_REG => self.reg_reg(mmu, Op::Cmp)?,
            OP_CMP_REG_IMM => self.reg_imm(mmu, Op::Cmp)?,
            OP_CMP_REG_MEM => self.reg_mem(mmu, Op::Cmp)?,
            OP_CMP_REG_IDX => self.reg_idx(mmu, Op::Cmp)?,
            OP_CMP_MEM_REG => self.mem_reg(mmu, Op::Cmp)?,
            OP_CMP_IDX_REG => self.idx_reg(mmu, Op::Cmp)?,
            OP_CMP_MEM_IMM => self.mem_imm(mmu, Op::Cmp)?,
            OP_CMP_IDX_IMM => self.idx_imm(mmu, Op::Cmp)?,

            OP_INC_REG => self.one_reg(mmu, Op::Inc)?,
            OP_DEC_REG => self.one_reg(mmu, Op::Dec)?,
            OP_MUL_REG => self.one_reg(mmu, Op::Mul)?,
            OP_DIV_REG => self.one_reg(mmu, Op::Div)?,
            OP_NOT_REG => self.one_reg(mmu, Op::Not)?,

            OP_INC_MEM => self.one_mem(mmu, Op::Inc)?,
            OP_INC_IDX => self.one_idx(mmu, Op::Inc)?,
            OP_DEC_MEM => self.one_mem(mmu, Op::Dec)?,
            OP_DEC_IDX => self.one_idx(mmu, Op::Dec)?,
            OP_NOT_MEM => self.one_mem(mmu, Op::Not)?,
            OP_NOT_IDX => self.one_idx(mmu, Op::Not)?,
            OP_MUL_MEM => self.one_mem(mmu, Op::Mul)?,
            OP_MUL_IDX => self.one_idx(mmu, Op::Mul)?,
            OP_DIV_MEM => self.one_mem(mmu, Op::Div)?,
            OP_DIV_IDX => self.one_idx(mmu, Op::Div)?,

            OP_JE => self.rel8(mmu, Op::Je)?,
            OP_JNE => self.rel8(mmu, Op::Jne)?,
            OP_JL => self.rel8(mmu, Op::Jl)?,
            OP_JLE => self.rel8(mmu, Op::Jle)?,
            OP_JG => self.rel8(mmu, Op::Jg)?,
            OP_JGE => self.rel8(mmu, Op::Jge)?,
            OP_JB => self.rel8(mmu, Op::Jb)?,
            OP_JBE => self.rel8(mmu, Op::Jbe)?,
            OP_JA => self.rel8(mmu, Op::Ja)?,
            OP_JAE => self.rel8(mmu, Op::Jae)?,
            OP_LOOP => self.rel8(mmu, Op::Loop)?,

            OP_JMP => {
                let disp = self.read_u16(mmu)?;
                (Op::Jmp, Parameter::Imm(disp), Parameter::None)
            }
            OP_INT => {
                let n = self.read_u8(mmu)?;
                (Op::Int, Parameter::Imm(u16::from(n)), Parameter::None)
            }

            _ => return Err(Fault::UnknownOpcode(b, start)),
        };

        Ok(Instruction::new2(op, dst, src, (self.current_offset - start) as u8))
    }

    /// packed register pair: (dst << 4) | src
    fn reg_reg(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let pair = self.read_u8(mmu)?;
        let dst = R::from_u8(pair >> 4);
        let src = R::from_u8(pair & 0xF);
        Ok((op, Parameter::Reg(dst), Parameter::Reg(src)))
    }

    fn reg_imm(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let dst = R::from_u8(self.read_u8(mmu)?);
        let imm = self.read_u16(mmu)?;
        Ok((op, Parameter::Reg(dst), Parameter::Imm(imm)))
    }

    fn reg_mem(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let dst = R::from_u8(self.read_u8(mmu)?);
        let addr = self.read_u16(mmu)?;
        Ok((op, Parameter::Reg(dst), Parameter::Ptr(addr)))
    }

    fn mem_reg(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let src = R::from_u8(self.read_u8(mmu)?);
        let addr = self.read_u16(mmu)?;
        Ok((op, Parameter::Ptr(addr), Parameter::Reg(src)))
    }

    fn reg_idx(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let dst = R::from_u8(self.read_u8(mmu)?);
        let idx = R::from_u8(self.read_u8(mmu)?);
        let base = self.read_u16(mmu)?;
        Ok((op, Parameter::Reg(dst), Parameter::PtrIdx(base, idx)))
    }

    fn idx_reg(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let src = R::from_u8(self.read_u8(mmu)?);
        let idx = R::from_u8(self.read_u8(mmu)?);
        let base = self.read_u16(mmu)?;
        Ok((op, Parameter::PtrIdx(base, idx), Parameter::Reg(src)))
    }

    fn mem_imm(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let addr = self.read_u16(mmu)?;
        let imm = self.read_u8(mmu)?;
        Ok((op, Parameter::Ptr(addr), Parameter::Imm(u16::from(imm))))
    }

    fn idx_imm(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let idx = R::from_u8(self.read_u8(mmu)?);
        let base = self.read_u16(mmu)?;
        let imm = self.read_u8(mmu)?;
        Ok((op, Parameter::PtrIdx(base, idx), Parameter::Imm(u16::from(imm))))
    }

    fn one_reg(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let dst = R::from_u8(self.read_u8(mmu)?);
        Ok((op, Parameter::Reg(dst), Parameter::None))
    }

    fn one_mem(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let addr = self.read_u16(mmu)?;
        Ok((op, Parameter::Ptr(addr), Parameter::None))
    }

    fn one_idx(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let idx = R::from_u8(self.read_u8(mmu)?);
        let base = self.read_u16(mmu)?;
        Ok((op, Parameter::PtrIdx(base, idx), Parameter::None))
    }

    fn rel8(&mut self, mmu: &MMU, op: Op) -> Result<(Op, Parameter, Parameter), Fault> {
        let disp = self.read_u8(mmu)? as i8;
        Ok((op, Parameter::ImmS8(disp), Parameter::None))
    }

    /// fetches the next instruction byte; running off the end of memory is
    /// an instruction pointer fault, not a data fault
    fn read_u8(&mut self, mmu: &MMU) -> Result<u8, Fault> {
        let b = mmu
            .read_u8(self.current_offset)
            .map_err(|_| Fault::IpOutOfBounds(self.current_offset))?;
        self.current_offset += 1;
        Ok(b)
    }

    fn read_u16(&mut self, mmu: &MMU) -> Result<u16, Fault> {
        let lo = self.read_u8(mmu)?;
        let hi = self.read_u8(mmu)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }
}
