//! Parser producing s-expression forms from Clay tokens.

use super::compiler::Diagnostic;
use super::lexer::{SourceLoc, Token, TokenWithLoc};

#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Symbol(String, SourceLoc),
    Integer(i64, SourceLoc),
    Bool(bool, SourceLoc),
    List(Vec<Form>, SourceLoc),
}

impl Form {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Form::Symbol(_, loc)
            | Form::Integer(_, loc)
            | Form::Bool(_, loc)
            | Form::List(_, loc) => *loc,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Form::Symbol(name, _) => Some(name),
            _ => None,
        }
    }
}

pub struct Parser {
    tokens: Vec<TokenWithLoc>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithLoc>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn last_loc(&self) -> SourceLoc {
        self.tokens
            .last()
            .map(|t| t.loc)
            .unwrap_or(SourceLoc::new(1, 1))
    }

    fn next(&mut self) -> Option<TokenWithLoc> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_form(&mut self) -> Result<Form, Diagnostic> {
        let Some(TokenWithLoc { token, loc }) = self.next() else {
            return Err(Diagnostic::new(self.last_loc(), "unexpected end of input"));
        };
        match token {
            Token::Symbol(name) => Ok(Form::Symbol(name, loc)),
            Token::Integer(n) => Ok(Form::Integer(n, loc)),
            Token::Bool(b) => Ok(Form::Bool(b, loc)),
            Token::RightParen => Err(Diagnostic::new(loc, "unmatched )")),
            Token::LeftParen => {
                let mut items = Vec::new();
                loop {
                    match self.tokens.get(self.pos) {
                        None => return Err(Diagnostic::new(loc, "unclosed (")),
                        Some(t) if t.token == Token::RightParen => {
                            self.pos += 1;
                            return Ok(Form::List(items, loc));
                        }
                        Some(_) => items.push(self.parse_form()?),
                    }
                }
            }
        }
    }

    /// Parse every top-level form in the token stream.
    pub fn parse_all(mut self) -> Result<Vec<Form>, Diagnostic> {
        let mut forms = Vec::new();
        while self.pos < self.tokens.len() {
            forms.push(self.parse_form()?);
        }
        Ok(forms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clay::lexer::Lexer;

    fn parse(input: &str) -> Result<Vec<Form>, Diagnostic> {
        Parser::new(Lexer::new(input).tokenize().unwrap()).parse_all()
    }

    #[test]
    fn test_nested_lists() {
        let forms = parse("(a (b 1) #t)").unwrap();
        assert_eq!(forms.len(), 1);
        let Form::List(items, _) = &forms[0] else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_symbol(), Some("a"));
        assert!(matches!(items[1], Form::List(_, _)));
        assert!(matches!(items[2], Form::Bool(true, _)));
    }

    #[test]
    fn test_multiple_top_level_forms() {
        let forms = parse("(a) (b)").unwrap();
        assert_eq!(forms.len(), 2);
    }

    #[test]
    fn test_unbalanced() {
        assert!(parse("(a (b)").is_err());
        assert!(parse("a)").is_err());
    }
}
