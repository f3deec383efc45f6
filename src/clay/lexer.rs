//! S-expression lexer for Clay source text.

use super::compiler::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub line: usize,
    pub col: usize,
}

impl SourceLoc {
    pub fn new(line: usize, col: usize) -> Self {
        SourceLoc { line, col }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    Symbol(String),
    Integer(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithLoc {
    pub token: Token,
    pub loc: SourceLoc,
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '*' | '/' | '<' | '>' | '=' | '!' | '?')
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current();
        if let Some(ch) = c {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
        c
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.line, self.col)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else if c == ';' {
                // Comment runs to end of line
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_symbol_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.current() {
            if is_symbol_char(c) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    pub fn tokenize(mut self) -> Result<Vec<TokenWithLoc>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let loc = self.loc();
            let Some(c) = self.current() else {
                return Ok(tokens);
            };
            let token = match c {
                '(' => {
                    self.advance();
                    Token::LeftParen
                }
                ')' => {
                    self.advance();
                    Token::RightParen
                }
                '#' => {
                    self.advance();
                    match self.advance() {
                        Some('t') => Token::Bool(true),
                        Some('f') => Token::Bool(false),
                        other => {
                            return Err(Diagnostic::new(
                                loc,
                                format!("expected #t or #f, found #{}", other.unwrap_or(' ')),
                            ))
                        }
                    }
                }
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek().is_some_and(|n| n.is_ascii_digit())) =>
                {
                    let text = self.read_symbol_text();
                    match text.parse::<i64>() {
                        Ok(n) => Token::Integer(n),
                        Err(_) => {
                            return Err(Diagnostic::new(
                                loc,
                                format!("bad integer literal: {}", text),
                            ))
                        }
                    }
                }
                c if is_symbol_char(c) => Token::Symbol(self.read_symbol_text()),
                c => {
                    return Err(Diagnostic::new(
                        loc,
                        format!("unexpected character: {:?}", c),
                    ))
                }
            };
            tokens.push(TokenWithLoc { token, loc });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens("(+ 1 -23)"),
            vec![
                Token::LeftParen,
                Token::Symbol("+".to_string()),
                Token::Integer(1),
                Token::Integer(-23),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_qualified_symbols_and_bools() {
        assert_eq!(
            tokens("com.acme.Foo #t #f"),
            vec![
                Token::Symbol("com.acme.Foo".to_string()),
                Token::Bool(true),
                Token::Bool(false),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("1 ; the rest is noise (\n2"),
            vec![Token::Integer(1), Token::Integer(2)]
        );
    }

    #[test]
    fn test_locations() {
        let toks = Lexer::new("(a\n  b)").tokenize().unwrap();
        assert_eq!(toks[0].loc, SourceLoc::new(1, 1));
        assert_eq!(toks[1].loc, SourceLoc::new(1, 2));
        assert_eq!(toks[2].loc, SourceLoc::new(2, 3));
    }

    #[test]
    fn test_bad_literal() {
        assert!(Lexer::new("#x").tokenize().is_err());
        assert!(Lexer::new("99999999999999999999").tokenize().is_err());
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        let err = Lexer::new("9223372036854775808").tokenize().unwrap_err();
        assert!(err.message.contains("bad integer literal"));
    }
}
