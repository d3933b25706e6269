use std::fmt;

use crate::cpu::register::R;

/// A decoded instruction operand.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Parameter {
    /// general purpose register, 8- or 16-bit per its id
    Reg(R),

    /// 16-bit immediate (for 8-bit destinations the high byte is ignored
    /// at execute time)
    Imm(u16),

    /// 8-bit signed branch displacement
    ImmS8(i8),

    /// direct memory, like "[0x0200]"
    Ptr(u16),

    /// indexed memory, base address plus a register, like "data[si]"
    PtrIdx(u16, R),

    None,
}

impl Parameter {
    /// true for 16-bit register operands; memory operands are byte-wide
    /// unless the opposing register operand says otherwise
    pub fn is_wide_reg(&self) -> bool {
        match *self {
            Parameter::Reg(r) => r.is_wide(),
            _ => false,
        }
    }

    pub fn is_memory(&self) -> bool {
        match *self {
            Parameter::Ptr(_) | Parameter::PtrIdx(_, _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Parameter::Reg(r) => write!(f, "{}", r),
            Parameter::Imm(imm) => write!(f, "0x{:04X}", imm),
            Parameter::ImmS8(imm) => write!(
                f,
                "{}0x{:02X}",
                if imm < 0 { "-" } else { "+" },
                imm.wrapping_abs()
            ),
            Parameter::Ptr(addr) => write!(f, "[0x{:04X}]", addr),
            Parameter::PtrIdx(base, r) => write!(f, "[0x{:04X}+{}]", base, r),
            Parameter::None => Ok(()),
        }
    }
}
