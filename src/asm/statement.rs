use regex::Regex;

/// One source line split into label, mnemonic and operand lexemes.
/// Mnemonics and directives are case-insensitive; labels are not.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// 0-based source line index
    pub line_index: usize,
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: Vec<String>,
}

impl Statement {
    /// returns None for lines that are empty or comment-only
    pub fn parse(line: &str, line_index: usize, lexer: &Regex) -> Option<Statement> {
        let code = strip_comment(line);

        let mut lexemes: Vec<&str> = lexer.find_iter(code).map(|m| m.as_str()).collect();
        if lexemes.is_empty() {
            return None;
        }

        let mut label = None;
        if lexemes[0].ends_with(':') {
            label = Some(lexemes[0].trim_end_matches(':').to_string());
            lexemes.remove(0);
        } else if lexemes.len() >= 2 && is_labelled_directive(lexemes[1]) {
            label = Some(lexemes[0].to_string());
            lexemes.remove(0);
        }

        let mnemonic = if lexemes.is_empty() {
            None
        } else {
            Some(lexemes.remove(0).to_string())
        };

        Some(Statement {
            line_index,
            label,
            mnemonic,
            operands: lexemes.into_iter().map(|s| s.to_string()).collect(),
        })
    }

    /// 1-based line number for diagnostics
    pub fn line_number(&self) -> usize {
        self.line_index + 1
    }
}

/// the lexeme pattern: quoted strings are atomic, everything else splits
/// on whitespace and commas
pub fn lexer() -> Regex {
    Regex::new(r#""[^"]*"|'[^']*'|[^\s,]+"#).unwrap()
}

/// a bare `NAME` in front of these directives defines a label without a colon
fn is_labelled_directive(token: &str) -> bool {
    let token = token.to_ascii_uppercase();
    token == "DB" || token == "DW" || token == "EQU"
}

/// cuts the line at the first `;` that is not inside a string literal
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                ';' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}
