//! Rule tokenizer.

use super::predicate::CmpOp;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Int(u64),
    Str(String),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    True,
    False,
    LParen,
    RParen,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{name}'"),
            Token::Int(value) => value.to_string(),
            Token::Str(value) => format!("\"{value}\""),
            Token::Cmp(op) => format!("'{}'", op.as_str()),
            Token::And => "'&&'".into(),
            Token::Or => "'||'".into(),
            Token::Not => "'!'".into(),
            Token::True => "'true'".into(),
            Token::False => "'false'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

/// Split a rule into tokens. Keywords (`and`, `or`, `not`, `true`, `false`)
/// are recognised case-insensitively; identifiers may contain `-` and `_`
/// after their first character so region keys like `dar-es-salaam` lex as
/// one token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(format!("expected '{c}{c}' at position {i}"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '=' => {
                if chars.get(i + 1) != Some(&'=') {
                    return Err(format!("expected '==' at position {i}"));
                }
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Cmp(CmpOp::Ne));
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '>' | '<' => {
                let or_equal = chars.get(i + 1) == Some(&'=');
                let op = match (c, or_equal) {
                    ('>', true) => CmpOp::Ge,
                    ('>', false) => CmpOp::Gt,
                    ('<', true) => CmpOp::Le,
                    _ => CmpOp::Lt,
                };
                tokens.push(Token::Cmp(op));
                i += if or_equal { 2 } else { 1 };
            }
            '"' | '\'' => {
                let start = i;
                i += 1;
                let mut value = String::new();
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == c => break,
                        Some(&ch) => value.push(ch),
                        None => return Err(format!("unterminated string starting at position {start}")),
                    }
                    i += 1;
                }
                i += 1;
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().filter(|ch| **ch != '_').collect();
                let value = literal
                    .parse::<u64>()
                    .map_err(|_| format!("integer literal out of range at position {start}"))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            other => return Err(format!("unexpected character '{other}' at position {i}")),
        }
    }

    Ok(tokens)
}
