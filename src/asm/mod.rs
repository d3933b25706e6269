//! Two-pass assembler for the emulator's compact bytecode.
//!
//! The first pass resolves labels into a symbol table, encoding each
//! instruction in allow-unresolved mode so forward references still produce
//! the right lengths. The second pass re-encodes with the complete table and
//! writes the image, the sourcemap and any per-line diagnostics.

pub use self::encoder::Encoder;
mod encoder;

pub use self::operand::{parse_number, Expr, Operand};
mod operand;

pub use self::statement::Statement;
mod statement;


use std::collections::HashMap;

use crate::asm::operand::parse_operand;
use crate::memory::MEMORY_SIZE;

/// labels and EQU constants; identifiers are case-sensitive
pub type SymbolTable = HashMap<String, u16>;

/// execution always begins here
pub const ENTRY: u16 = 0x100;

/// The result of assembling a source text. The image is always present,
/// even when `errors` is non-empty; a host should refuse to load an image
/// that compiled with errors.
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    /// flat 64 KiB image, code and data share it
    pub image: Vec<u8>,
    pub entry: u16,
    pub errors: Vec<String>,

    /// emit offset of each statement's first byte -> 0-based source line
    pub sourcemap: HashMap<u16, u32>,
}

/// Translates assembly source into a loadable image. Never fails on user
/// input; problems are reported per line in `Assembly::errors`.
pub fn compile(source: &str) -> Assembly {
    let lexer = statement::lexer();
    let statements: Vec<Statement> = source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| Statement::parse(line, i, &lexer))
        .collect();

    let symbols = first_pass(&statements);
    second_pass(&statements, &symbols)
}

fn is_directive(stmt: &Statement, name: &str) -> bool {
    match &stmt.mnemonic {
        Some(m) => m.eq_ignore_ascii_case(name),
        None => false,
    }
}

fn first_pass(statements: &[Statement]) -> SymbolTable {
    let mut symbols = SymbolTable::new();
    let mut offset = u32::from(ENTRY);
    let mut constants: Vec<(String, &Statement)> = Vec::new();

    for stmt in statements {
        if let Some(label) = &stmt.label {
            if is_directive(stmt, "EQU") {
                // EQU defines a constant, not an address; its value may
                // reference labels defined later, so resolution waits until
                // every address is known
                constants.push((label.clone(), stmt));
            } else {
                symbols.insert(label.clone(), (offset & 0xFFFF) as u16);
            }
        }

        offset = advance(stmt, offset, &symbols);
    }

    // constants may also chain to other constants in any order; retry until
    // a round resolves nothing. Names still unresolved stay out of the
    // table and surface as undefined-label errors in the second pass.
    loop {
        let mut resolved_any = false;
        constants.retain(|(name, stmt)| match equ_value(stmt, &symbols) {
            Ok(value) => {
                symbols.insert(name.clone(), value);
                resolved_any = true;
                false
            }
            Err(_) => true,
        });
        if !resolved_any || constants.is_empty() {
            break;
        }
    }

    symbols
}

/// pass-1 offset tracking; encoding errors are ignored here, the second
/// pass reports them
fn advance(stmt: &Statement, offset: u32, symbols: &SymbolTable) -> u32 {
    if stmt.mnemonic.is_none() {
        return offset;
    }
    if is_directive(stmt, "ORG") {
        return match org_value(stmt) {
            Ok(v) => u32::from(v),
            Err(_) => offset,
        };
    }
    if is_directive(stmt, "EQU") {
        return offset;
    }
    if is_directive(stmt, "DB") || is_directive(stmt, "DW") {
        let len = directive_bytes(stmt, symbols, true).map(|b| b.len()).unwrap_or(0);
        return offset + len as u32;
    }

    let encoder = Encoder::new(symbols, true);
    let len = encoder
        .encode(stmt, (offset & 0xFFFF) as u16)
        .map(|b| b.len())
        .unwrap_or(0);
    offset + len as u32
}

fn second_pass(statements: &[Statement], symbols: &SymbolTable) -> Assembly {
    let mut image = vec![0u8; MEMORY_SIZE];
    let mut errors = Vec::new();
    let mut sourcemap = HashMap::new();
    let mut offset = u32::from(ENTRY);

    let encoder = Encoder::new(symbols, false);

    for stmt in statements {
        if stmt.mnemonic.is_none() {
            continue;
        }

        if is_directive(stmt, "ORG") {
            match org_value(stmt) {
                Ok(v) => offset = u32::from(v),
                Err(e) => errors.push(line_error(stmt, &e)),
            }
            continue;
        }
        if is_directive(stmt, "EQU") {
            // the constant's value was fixed in the first pass; this only
            // reports the ones that never resolved
            if stmt.label.is_none() {
                errors.push(line_error(stmt, "EQU requires a label"));
            } else if let Err(e) = equ_value(stmt, symbols) {
                errors.push(line_error(stmt, &e));
            }
            continue;
        }

        let encoded = if is_directive(stmt, "DB") || is_directive(stmt, "DW") {
            directive_bytes(stmt, symbols, false)
        } else {
            encoder.encode(stmt, (offset & 0xFFFF) as u16)
        };

        match encoded {
            Ok(bytes) => {
                if bytes.is_empty() {
                    continue;
                }
                if offset as usize + bytes.len() > MEMORY_SIZE {
                    errors.push(line_error(stmt, "Emitted past end of image"));
                    continue;
                }
                sourcemap.insert((offset & 0xFFFF) as u16, stmt.line_index as u32);
                image[offset as usize..offset as usize + bytes.len()].copy_from_slice(&bytes);
                offset += bytes.len() as u32;
            }
            Err(e) => errors.push(line_error(stmt, &e)),
        }
    }

    Assembly {
        image,
        entry: ENTRY,
        errors,
        sourcemap,
    }
}

fn line_error(stmt: &Statement, message: &str) -> String {
    format!("Line {}: {}", stmt.line_number(), message)
}

/// payload for `DB` and `DW`; strings are only meaningful to `DB`
fn directive_bytes(stmt: &Statement, symbols: &SymbolTable, allow_unresolved: bool) -> Result<Vec<u8>, String> {
    let wide = is_directive(stmt, "DW");
    let name = if wide { "DW" } else { "DB" };
    if stmt.operands.is_empty() {
        return Err(format!("{} expects at least one value", name));
    }

    let mut out = Vec::new();
    for token in &stmt.operands {
        match parse_operand(token)? {
            Operand::Str(s) if !wide => {
                for c in s.chars() {
                    out.push(c as u8);
                }
            }
            Operand::Imm(v) => {
                if wide {
                    out.push((v & 0xFF) as u8);
                    out.push((v >> 8) as u8);
                } else {
                    out.push((v & 0xFF) as u8);
                }
            }
            Operand::Sym(sym) => {
                let v = Expr::Sym(sym).resolve(symbols, allow_unresolved)?;
                if wide {
                    out.push((v & 0xFF) as u8);
                    out.push((v >> 8) as u8);
                } else {
                    out.push((v & 0xFF) as u8);
                }
            }
            _ => return Err(format!("Invalid operand to {}", name)),
        }
    }
    Ok(out)
}

fn org_value(stmt: &Statement) -> Result<u16, String> {
    if stmt.operands.len() != 1 {
        return Err("ORG expects one value".to_string());
    }
    match parse_operand(&stmt.operands[0])? {
        Operand::Imm(v) => Ok(v),
        _ => Err(format!("Invalid number `{}`", stmt.operands[0])),
    }
}

/// `NAME EQU v` binds NAME to the constant v; the value is a number or a
/// symbol defined anywhere in the file
fn equ_value(stmt: &Statement, symbols: &SymbolTable) -> Result<u16, String> {
    if stmt.operands.len() != 1 {
        return Err("EQU expects one value".to_string());
    }
    match parse_operand(&stmt.operands[0])? {
        Operand::Imm(v) => Ok(v),
        Operand::Sym(sym) => Expr::Sym(sym).resolve(symbols, false),
        _ => Err("Invalid operand to EQU".to_string()),
    }
}
