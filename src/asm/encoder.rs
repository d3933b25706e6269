use crate::asm::operand::{parse_operand, Expr, Operand};
use crate::asm::statement::Statement;
use crate::asm::SymbolTable;
use crate::cpu::*;

/// opcode bytes for the two-operand families; `None` marks operand shapes
/// a family does not support
struct BinaryOps {
    reg_reg: u8,
    reg_imm: u8,
    reg_mem: u8,
    reg_idx: u8,
    mem_reg: Option<u8>,
    idx_reg: Option<u8>,
    mem_imm: Option<u8>,
    idx_imm: Option<u8>,
}

const MOV_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_MOV_REG_REG,
    reg_imm: OP_MOV_REG_IMM,
    reg_mem: OP_MOV_REG_MEM,
    reg_idx: OP_MOV_REG_IDX,
    mem_reg: Some(OP_MOV_MEM_REG),
    idx_reg: Some(OP_MOV_IDX_REG),
    mem_imm: Some(OP_MOV_MEM_IMM),
    idx_imm: Some(OP_MOV_IDX_IMM),
};

const ADD_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_ADD_REG_REG,
    reg_imm: OP_ADD_REG_IMM,
    reg_mem: OP_ADD_REG_MEM,
    reg_idx: OP_ADD_REG_IDX,
    mem_reg: Some(OP_ADD_MEM_REG),
    idx_reg: None,
    mem_imm: None,
    idx_imm: None,
};

const SUB_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_SUB_REG_REG,
    reg_imm: OP_SUB_REG_IMM,
    reg_mem: OP_SUB_REG_MEM,
    reg_idx: OP_SUB_REG_IDX,
    mem_reg: None,
    idx_reg: None,
    mem_imm: None,
    idx_imm: None,
};

const AND_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_AND_REG_REG,
    reg_imm: OP_AND_REG_IMM,
    reg_mem: OP_AND_REG_MEM,
    reg_idx: OP_AND_REG_IDX,
    mem_reg: None,
    idx_reg: None,
    mem_imm: None,
    idx_imm: None,
};

const OR_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_OR_REG_REG,
    reg_imm: OP_OR_REG_IMM,
    reg_mem: OP_OR_REG_MEM,
    reg_idx: OP_OR_REG_IDX,
    mem_reg: None,
    idx_reg: None,
    mem_imm: None,
    idx_imm: None,
};

const XOR_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_XOR_REG_REG,
    reg_imm: OP_XOR_REG_IMM,
    reg_mem: OP_XOR_REG_MEM,
    reg_idx: OP_XOR_REG_IDX,
    mem_reg: None,
    idx_reg: None,
    mem_imm: None,
    idx_imm: None,
};

const CMP_OPS: BinaryOps = BinaryOps {
    reg_reg: OP_CMP_REG_REG,
    reg_imm: OP_CMP_REG_IMM,
    reg_mem: OP_CMP_REG_MEM,
    reg_idx: OP_CMP_REG_IDX,
    mem_reg: Some(OP_CMP_MEM_REG),
    idx_reg: Some(OP_CMP_IDX_REG),
    mem_imm: Some(OP_CMP_MEM_IMM),
    idx_imm: Some(OP_CMP_IDX_IMM),
};

/// opcode bytes for the single-operand family
struct UnaryOps {
    reg: u8,
    mem: u8,
    idx: u8,
}

const INC_OPS: UnaryOps = UnaryOps { reg: OP_INC_REG, mem: OP_INC_MEM, idx: OP_INC_IDX };
const DEC_OPS: UnaryOps = UnaryOps { reg: OP_DEC_REG, mem: OP_DEC_MEM, idx: OP_DEC_IDX };
const NOT_OPS: UnaryOps = UnaryOps { reg: OP_NOT_REG, mem: OP_NOT_MEM, idx: OP_NOT_IDX };
const MUL_OPS: UnaryOps = UnaryOps { reg: OP_MUL_REG, mem: OP_MUL_MEM, idx: OP_MUL_IDX };
const DIV_OPS: UnaryOps = UnaryOps { reg: OP_DIV_REG, mem: OP_DIV_MEM, idx: OP_DIV_IDX };

/// an operand with its symbols resolved, as the bytecode sees it
enum Side {
    Reg(R),
    Val(u16),
    Mem(u16),
    MemIdx(u16, R),
}

pub struct Encoder<'a> {
    symbols: &'a SymbolTable,

    /// pass 1 mode: unresolved labels encode as zero so that instruction
    /// lengths come out right before the symbol table is complete
    allow_unresolved: bool,
}

impl<'a> Encoder<'a> {
    pub fn new(symbols: &'a SymbolTable, allow_unresolved: bool) -> Self {
        Encoder { symbols, allow_unresolved }
    }

    /// encodes one instruction statement at the given emit offset
    pub fn encode(&self, stmt: &Statement, offset: u16) -> Result<Vec<u8>, String> {
        let mnemonic = match &stmt.mnemonic {
            Some(m) => m.to_ascii_uppercase(),
            None => return Ok(Vec::new()),
        };

        let mut operands = Vec::new();
        for token in &stmt.operands {
            operands.push(parse_operand(token)?);
        }

        match mnemonic.as_str() {
            "NOP" => self.no_operands(OP_NOP, &mnemonic, &operands),
            "HLT" => self.no_operands(OP_HLT, &mnemonic, &operands),
            "RET" => self.no_operands(OP_RET, &mnemonic, &operands),

            "MOV" => self.binary(&MOV_OPS, &mnemonic, &operands, offset),
            "ADD" => self.binary(&ADD_OPS, &mnemonic, &operands, offset),
            "SUB" => self.binary(&SUB_OPS, &mnemonic, &operands, offset),
            "AND" => self.binary(&AND_OPS, &mnemonic, &operands, offset),
            "OR" => self.binary(&OR_OPS, &mnemonic, &operands, offset),
            "XOR" => self.binary(&XOR_OPS, &mnemonic, &operands, offset),
            "CMP" => self.binary(&CMP_OPS, &mnemonic, &operands, offset),

            "INC" => self.unary(&INC_OPS, &mnemonic, &operands, offset),
            "DEC" => self.unary(&DEC_OPS, &mnemonic, &operands, offset),
            "NOT" => self.unary(&NOT_OPS, &mnemonic, &operands, offset),
            "MUL" => self.unary(&MUL_OPS, &mnemonic, &operands, offset),
            "DIV" => self.unary(&DIV_OPS, &mnemonic, &operands, offset),

            "JMP" => self.jump_rel16(&mnemonic, &operands, offset),
            "LOOP" => self.jump_rel8(OP_LOOP, &mnemonic, &operands, offset),

            "INT" => {
                let n = self.value(self.single(&mnemonic, &operands)?, offset)?;
                Ok(vec![OP_INT, (n & 0xFF) as u8])
            }

            _ => match cond_opcode(&mnemonic) {
                Some(op) => self.jump_rel8(op, &mnemonic, &operands, offset),
                None => Err(format!("Unknown mnemonic `{}`", mnemonic)),
            },
        }
    }

    fn no_operands(&self, op: u8, mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, String> {
        if !operands.is_empty() {
            return Err(format!("{} takes no operands", mnemonic));
        }
        Ok(vec![op])
    }

    fn single<'o>(&self, mnemonic: &str, operands: &'o [Operand]) -> Result<&'o Operand, String> {
        if operands.len() != 1 {
            return Err(format!("{} expects one operand", mnemonic));
        }
        Ok(&operands[0])
    }

    fn binary(&self, ops: &BinaryOps, mnemonic: &str, operands: &[Operand], offset: u16) -> Result<Vec<u8>, String> {
        if operands.len() != 2 {
            return Err(format!("{} expects two operands", mnemonic));
        }
        let dst = self.side(&operands[0], true, offset, mnemonic)?;
        let src = self.side(&operands[1], false, offset, mnemonic)?;

        let unsupported = || format!("Invalid operands for {}", mnemonic);
        match (dst, src) {
            (Side::Reg(d), Side::Reg(s)) => Ok(vec![ops.reg_reg, d.id() << 4 | s.id()]),
            (Side::Reg(d), Side::Val(v)) => {
                Ok(vec![ops.reg_imm, d.id(), lo(v), hi(v)])
            }
            (Side::Reg(d), Side::Mem(addr)) => {
                Ok(vec![ops.reg_mem, d.id(), lo(addr), hi(addr)])
            }
            (Side::Reg(d), Side::MemIdx(base, i)) => {
                Ok(vec![ops.reg_idx, d.id(), i.id(), lo(base), hi(base)])
            }
            (Side::Mem(addr), Side::Reg(s)) => match ops.mem_reg {
                Some(op) => Ok(vec![op, s.id(), lo(addr), hi(addr)]),
                None => Err(unsupported()),
            },
            (Side::MemIdx(base, i), Side::Reg(s)) => match ops.idx_reg {
                Some(op) => Ok(vec![op, s.id(), i.id(), lo(base), hi(base)]),
                None => Err(unsupported()),
            },
            (Side::Mem(addr), Side::Val(v)) => match ops.mem_imm {
                Some(op) => Ok(vec![op, lo(addr), hi(addr), (v & 0xFF) as u8]),
                None => Err(unsupported()),
            },
            (Side::MemIdx(base, i), Side::Val(v)) => match ops.idx_imm {
                Some(op) => Ok(vec![op, i.id(), lo(base), hi(base), (v & 0xFF) as u8]),
                None => Err(unsupported()),
            },
            (Side::Mem(_), _) | (Side::MemIdx(_, _), _) => Err(
                "Memory to Memory transfer not allowed. Use a register as intermediate.".to_string(),
            ),
            (Side::Val(_), _) => Err(format!("Invalid destination operand for {}", mnemonic)),
        }
    }

    fn unary(&self, ops: &UnaryOps, mnemonic: &str, operands: &[Operand], offset: u16) -> Result<Vec<u8>, String> {
        let invalid = || format!("Invalid operand to {}", mnemonic);
        match self.single(mnemonic, operands)? {
            Operand::Reg(r) => Ok(vec![ops.reg, r.id()]),
            Operand::Sym(name) if name != "$" => {
                let addr = Expr::Sym(name.clone()).resolve(self.symbols, self.allow_unresolved)?;
                Ok(vec![ops.mem, lo(addr), hi(addr)])
            }
            Operand::Mem(expr) => {
                let addr = self.resolve(expr, offset)?;
                Ok(vec![ops.mem, lo(addr), hi(addr)])
            }
            Operand::MemIdx(expr, r) => {
                let base = self.resolve(expr, offset)?;
                Ok(vec![ops.idx, r.id(), lo(base), hi(base)])
            }
            _ => Err(invalid()),
        }
    }

    /// 16-bit displacement relative to the end of the 3-byte instruction
    fn jump_rel16(&self, mnemonic: &str, operands: &[Operand], offset: u16) -> Result<Vec<u8>, String> {
        let target = self.value(self.single(mnemonic, operands)?, offset)?;
        let disp = i32::from(target) - (i32::from(offset) + 3);
        if !self.allow_unresolved && (disp < -32768 || disp > 32767) {
            return Err(format!("Jump target out of range for {}", mnemonic));
        }
        let disp = disp as u16;
        Ok(vec![OP_JMP, lo(disp), hi(disp)])
    }

    /// 8-bit displacement relative to the end of the 2-byte instruction
    fn jump_rel8(&self, op: u8, mnemonic: &str, operands: &[Operand], offset: u16) -> Result<Vec<u8>, String> {
        let target = self.value(self.single(mnemonic, operands)?, offset)?;
        let disp = i32::from(target) - (i32::from(offset) + 2);
        if !self.allow_unresolved && (disp < -128 || disp > 127) {
            return Err(format!("Jump target out of range for {}", mnemonic));
        }
        Ok(vec![op, disp as u8])
    }

    /// resolves an operand by bytecode position: bare symbols are values in
    /// source position and direct memory references in destination position
    fn side(&self, operand: &Operand, is_dst: bool, offset: u16, mnemonic: &str) -> Result<Side, String> {
        match operand {
            Operand::Reg(r) => Ok(Side::Reg(*r)),
            Operand::Imm(v) => Ok(Side::Val(*v)),
            Operand::Sym(name) => {
                let v = self.resolve(&Expr::Sym(name.clone()), offset)?;
                if is_dst {
                    Ok(Side::Mem(v))
                } else {
                    Ok(Side::Val(v))
                }
            }
            Operand::Mem(expr) => Ok(Side::Mem(self.resolve(expr, offset)?)),
            Operand::MemIdx(expr, r) => Ok(Side::MemIdx(self.resolve(expr, offset)?, *r)),
            Operand::Str(_) => Err(format!("Invalid operand for {}", mnemonic)),
        }
    }

    /// a plain 16-bit value: a number, a label address, or `$`
    fn value(&self, operand: &Operand, offset: u16) -> Result<u16, String> {
        match operand {
            Operand::Imm(v) => Ok(*v),
            Operand::Sym(name) => self.resolve(&Expr::Sym(name.clone()), offset),
            _ => Err("Expected a value".to_string()),
        }
    }

    fn resolve(&self, expr: &Expr, offset: u16) -> Result<u16, String> {
        if let Expr::Sym(name) = expr {
            if name == "$" {
                return Ok(offset);
            }
        }
        expr.resolve(self.symbols, self.allow_unresolved)
    }
}

fn cond_opcode(mnemonic: &str) -> Option<u8> {
    match mnemonic {
        "JE" | "JZ" => Some(OP_JE),
        "JNE" | "JNZ" => Some(OP_JNE),
        "JL" | "JNGE" => Some(OP_JL),
        "JLE" | "JNG" => Some(OP_JLE),
        "JG" | "JNLE" => Some(OP_JG),
        "JGE" | "JNL" => Some(OP_JGE),
        "JB" | "JNAE" | "JC" => Some(OP_JB),
        "JBE" | "JNA" => Some(OP_JBE),
        "JA" | "JNBE" => Some(OP_JA),
        "JAE" | "JNB" | "JNC" => Some(OP_JAE),
        _ => None,
    }
}

fn lo(v: u16) -> u8 {
    (v & 0xFF) as u8
}

fn hi(v: u16) -> u8 {
    (v >> 8) as u8
}
