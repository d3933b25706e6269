use crate::cpu::{CPU, R};
use crate::machine::Fault;
use crate::memory::MMU;

// hosted output interrupt, sub-function selected by AH
pub fn handle(cpu: &mut CPU, mmu: &MMU) -> Result<Option<String>, Fault> {
    match cpu.get_r8(R::AH) {
        0x02 => {
            // WRITE CHARACTER TO STANDARD OUTPUT
            // DL = character to write
            let dl = cpu.get_r8(R::DL);
            Ok(Some(char::from(dl).to_string()))
        }
        0x09 => {
            // WRITE STRING TO STANDARD OUTPUT
            // DX -> '$'-terminated string
            let dx = cpu.get_r16(R::DX);
            let s = mmu.read_dollar_string(u32::from(dx))?;
            Ok(Some(s))
        }
        _ => {
            // unknown sub-functions are ignored
            Ok(None)
        }
    }
}
