use std::fmt;

use crate::cpu::flag::Flags;

#[cfg(test)]
#[path = "./register_test.rs"]
mod register_test;

/// A 16-bit register with addressable high and low halves.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Register16 {
    pub val: u16,
}

impl Register16 {
    pub fn set_hi(&mut self, val: u8) {
        self.val = (self.val & 0xFF) | (u16::from(val) << 8);
    }

    pub fn set_lo(&mut self, val: u8) {
        self.val = (self.val & 0xFF00) | u16::from(val);
    }

    pub fn lo_u8(&self) -> u8 {
        (self.val & 0xFF) as u8
    }

    pub fn hi_u8(&self) -> u8 {
        (self.val >> 8) as u8
    }
}

/// Register id as used in the bytecode: 0..3 = AL,CL,DL,BL; 4..7 = AH,CH,DH,BH;
/// 8..15 = AX,CX,DX,BX,SP,BP,SI,DI. Ids below 8 denote 8-bit access.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum R {
    AL, CL, DL, BL,
    AH, CH, DH, BH,
    AX, CX, DX, BX,
    SP, BP, SI, DI,
}

impl R {
    /// the bytecode register id
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> R {
        match v & 0xF {
            0 => R::AL,
            1 => R::CL,
            2 => R::DL,
            3 => R::BL,
            4 => R::AH,
            5 => R::CH,
            6 => R::DH,
            7 => R::BH,
            8 => R::AX,
            9 => R::CX,
            10 => R::DX,
            11 => R::BX,
            12 => R::SP,
            13 => R::BP,
            14 => R::SI,
            15 => R::DI,
            _ => unreachable!(),
        }
    }

    /// slot in the backing gpr array
    pub fn index(self) -> usize {
        let id = self as u8;
        if id < 8 {
            (id & 3) as usize
        } else {
            (id - 8) as usize
        }
    }

    /// ids 8..15 denote full 16-bit registers
    pub fn is_wide(self) -> bool {
        self as u8 >= 8
    }

    /// ids 4..7 denote the high half of the parent register
    pub fn is_high(self) -> bool {
        let id = self as u8;
        (4..8).contains(&id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            R::AL => "al",
            R::CL => "cl",
            R::DL => "dl",
            R::BL => "bl",
            R::AH => "ah",
            R::CH => "ch",
            R::DH => "dh",
            R::BH => "bh",
            R::AX => "ax",
            R::CX => "cx",
            R::DX => "dx",
            R::BX => "bx",
            R::SP => "sp",
            R::BP => "bp",
            R::SI => "si",
            R::DI => "di",
        }
    }

    /// parses a register name, case-insensitive
    pub fn from_name(name: &str) -> Option<R> {
        let name = name.to_ascii_lowercase();
        for id in 0..16 {
            let r = R::from_u8(id);
            if r.as_str() == name {
                return Some(r);
            }
        }
        None
    }
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Segment register slots. Present for inspector parity, never touched by
/// any instruction.
pub const SR_CS: usize = 0;
pub const SR_DS: usize = 1;
pub const SR_ES: usize = 2;
pub const SR_SS: usize = 3;

/// The full register file: general purpose registers, segment registers,
/// instruction pointer and flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterState {
    /// AX, CX, DX, BX, SP, BP, SI, DI
    pub gpr: [Register16; 8],

    /// CS, DS, ES, SS
    pub sreg: [u16; 4],

    pub ip: u16,
    pub flags: Flags,
}

impl RegisterState {
    pub fn new() -> Self {
        let mut regs = RegisterState::default();
        regs.gpr[R::SP.index()].val = 0xFFFE;
        regs.ip = 0x100;
        regs
    }

    pub fn get_r8(&self, r: R) -> u8 {
        if r.is_high() {
            self.gpr[r.index()].hi_u8()
        } else {
            self.gpr[r.index()].lo_u8()
        }
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        if r.is_high() {
            self.gpr[r.index()].set_hi(val);
        } else {
            self.gpr[r.index()].set_lo(val);
        }
    }

    pub fn get_r16(&self, r: R) -> u16 {
        self.gpr[r.index()].val
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        self.gpr[r.index()].val = val;
    }

    /// reads register `r` at its natural width, truncated to that width
    pub fn get(&self, r: R) -> usize {
        if r.is_wide() {
            self.get_r16(r) as usize
        } else {
            self.get_r8(r) as usize
        }
    }

    /// writes register `r`, truncating `val` to the register width
    pub fn set(&mut self, r: R, val: usize) {
        if r.is_wide() {
            self.set_r16(r, (val & 0xFFFF) as u16);
        } else {
            self.set_r8(r, (val & 0xFF) as u8);
        }
    }
}
