//! Tokenizer.

use crate::error::{CompileError, CompileResult};

/// One token with the line it starts on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// A builtin call name, `ident!`.
    Builtin(String),
    Number(String),
    // keywords
    TxScript,
    TxContract,
    AssetScript,
    Pub,
    Payable,
    Fn,
    Let,
    If,
    Else,
    While,
    Return,
    Emit,
    Event,
    True,
    False,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Eof,
}

/// Tokenize `source`; comments run `//` to end of line.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1usize;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            line += 1;
                            break;
                        }
                    }
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Slash,
                        line,
                    });
                }
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '_' || d == 'i' || d == 'u' {
                        if d != '_' {
                            text.push(d);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Number(text),
                    line,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let kind = match text.as_str() {
                    "TxScript" => TokenKind::TxScript,
                    "TxContract" => TokenKind::TxContract,
                    "AssetScript" => TokenKind::AssetScript,
                    "pub" => TokenKind::Pub,
                    "payable" => TokenKind::Payable,
                    "fn" => TokenKind::Fn,
                    "let" => TokenKind::Let,
                    "if" => TokenKind::If,
                    "else" => TokenKind::Else,
                    "while" => TokenKind::While,
                    "return" => TokenKind::Return,
                    "emit" => TokenKind::Emit,
                    "event" => TokenKind::Event,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    _ => {
                        if chars.peek() == Some(&'!') {
                            chars.next();
                            TokenKind::Builtin(text)
                        } else {
                            TokenKind::Ident(text)
                        }
                    }
                };
                tokens.push(Token { kind, line });
            }
            _ => {
                chars.next();
                let kind = match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    ',' => TokenKind::Comma,
                    ':' => TokenKind::Colon,
                    ';' => TokenKind::Semicolon,
                    '+' => TokenKind::Plus,
                    '*' => TokenKind::Star,
                    '%' => TokenKind::Percent,
                    '-' => {
                        if chars.peek() == Some(&'>') {
                            chars.next();
                            TokenKind::Arrow
                        } else {
                            TokenKind::Minus
                        }
                    }
                    '=' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            TokenKind::Eq
                        } else {
                            TokenKind::Assign
                        }
                    }
                    '!' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            TokenKind::Neq
                        } else {
                            TokenKind::Not
                        }
                    }
                    '<' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            TokenKind::Le
                        } else {
                            TokenKind::Lt
                        }
                    }
                    '>' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            TokenKind::Ge
                        } else {
                            TokenKind::Gt
                        }
                    }
                    '&' => {
                        if chars.peek() == Some(&'&') {
                            chars.next();
                            TokenKind::AndAnd
                        } else {
                            return Err(CompileError::Parse {
                                message: "expected `&&`".into(),
                                line,
                            });
                        }
                    }
                    '|' => {
                        if chars.peek() == Some(&'|') {
                            chars.next();
                            TokenKind::OrOr
                        } else {
                            return Err(CompileError::Parse {
                                message: "expected `||`".into(),
                                line,
                            });
                        }
                    }
                    other => {
                        return Err(CompileError::Parse {
                            message: format!("unexpected character `{other}`"),
                            line,
                        });
                    }
                };
                tokens.push(Token { kind, line });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("pub fn add"),
            vec![
                TokenKind::Pub,
                TokenKind::Fn,
                TokenKind::Ident("add".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_builtin_marker() {
        assert_eq!(
            kinds("blake2b!(x)"),
            vec![
                TokenKind::Builtin("blake2b".into()),
                TokenKind::LParen,
                TokenKind::Ident("x".into()),
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a == b != c <= -> ="),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Eq,
                TokenKind::Ident("b".into()),
                TokenKind::Neq,
                TokenKind::Ident("c".into()),
                TokenKind::Le,
                TokenKind::Arrow,
                TokenKind::Assign,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("let a = 1 // note\nlet b = 2").unwrap();
        let last = tokens.iter().rev().nth(1).unwrap();
        assert_eq!(last.line, 2);
    }

    #[test]
    fn test_number_suffix() {
        assert_eq!(
            kinds("10i 3u 1_000"),
            vec![
                TokenKind::Number("10i".into()),
                TokenKind::Number("3u".into()),
                TokenKind::Number("1000".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_bad_char() {
        assert!(matches!(
            tokenize("let $ = 1"),
            Err(CompileError::Parse { .. })
        ));
    }
}
