use crate::asm::SymbolTable;
use crate::cpu::R;

/// A parsed instruction operand, before symbol resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Reg(R),

    /// numeric immediate
    Imm(u16),

    /// bare identifier; a value in source position, a direct memory
    /// reference in destination position. `$` names the current offset.
    Sym(String),

    /// direct memory, `[expr]`
    Mem(Expr),

    /// indexed memory, `expr[reg]`
    MemIdx(Expr, R),

    /// quoted string literal, only meaningful to `DB`
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(u16),
    Sym(String),
}

impl Expr {
    pub fn resolve(&self, symbols: &SymbolTable, allow_unresolved: bool) -> Result<u16, String> {
        match self {
            Expr::Num(v) => Ok(*v),
            Expr::Sym(name) => match symbols.get(name) {
                Some(v) => Ok(*v),
                None if allow_unresolved => Ok(0),
                None => Err(format!("Undefined label `{}`", name)),
            },
        }
    }
}

pub fn parse_operand(token: &str) -> Result<Operand, String> {
    if token.starts_with('"') || token.starts_with('\'') {
        let quote = token.as_bytes()[0] as char;
        if token.len() >= 2 && token.ends_with(quote) {
            return Ok(Operand::Str(token[1..token.len() - 1].to_string()));
        }
        return Err(format!("Unterminated string {}", token));
    }
    if let Some(r) = R::from_name(token) {
        return Ok(Operand::Reg(r));
    }
    if token == "$" {
        return Ok(Operand::Sym("$".to_string()));
    }
    if token.starts_with('[') && token.ends_with(']') {
        let expr = parse_expr(&token[1..token.len() - 1])?;
        return Ok(Operand::Mem(expr));
    }
    if token.ends_with(']') {
        if let Some(open) = token.find('[') {
            let expr = parse_expr(&token[..open])?;
            let index = &token[open + 1..token.len() - 1];
            return match R::from_name(index) {
                Some(r) => Ok(Operand::MemIdx(expr, r)),
                None => Err(format!("Invalid index register `{}`", index)),
            };
        }
    }
    if let Some(v) = parse_number(token) {
        return Ok(Operand::Imm(v));
    }
    if is_identifier(token) {
        return Ok(Operand::Sym(token.to_string()));
    }
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("Invalid number `{}`", token));
    }
    Err(format!("Invalid operand `{}`", token))
}

fn parse_expr(text: &str) -> Result<Expr, String> {
    let text = text.trim();
    if let Some(v) = parse_number(text) {
        return Ok(Expr::Num(v));
    }
    if is_identifier(text) {
        return Ok(Expr::Sym(text.to_string()));
    }
    Err(format!("Invalid address expression `{}`", text))
}

/// `123` decimal, `0x1F` hex, `1Fh` hex; case-insensitive, wide values
/// truncate to 16 bits
pub fn parse_number(text: &str) -> Option<u16> {
    if let Some(hex) = strip_prefix_ci(text, "0x") {
        return u32::from_str_radix(hex, 16).ok().map(|v| (v & 0xFFFF) as u16);
    }
    if text.len() > 1 && (text.ends_with('h') || text.ends_with('H')) {
        let body = &text[..text.len() - 1];
        if body.starts_with(|c: char| c.is_ascii_digit()) {
            return u32::from_str_radix(body, 16).ok().map(|v| (v & 0xFFFF) as u16);
        }
    }
    text.parse::<u32>().ok().map(|v| (v & 0xFFFF) as u16)
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let bytes = text.as_bytes();
    let head = prefix.as_bytes();
    if bytes.len() >= head.len() && bytes[..head.len()].eq_ignore_ascii_case(head) {
        Some(&text[head.len()..])
    } else {
        None
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
