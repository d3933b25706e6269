#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod asm;
pub mod cpu;
pub mod machine;
pub mod memory;

mod interrupt;
