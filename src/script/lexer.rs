//! Tokenizer for block module scripts

use super::ScriptError;

/// Punctuation recognised by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Assign,
    Arrow,
    Bang,
    OrOr,
    AndAnd,
    Question,
    Plus,
    Minus,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords; the parser tells them apart
    Ident(String),
    Number(f64),
    Str(String),
    Punct(Punct),
    Eof,
}

/// A token with the 1-based line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Split `source` into tokens. The result always ends with [`Token::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn run(mut self) -> Result<Vec<Spanned>, ScriptError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(&c) = self.chars.peek() else {
                tokens.push(Spanned {
                    token: Token::Eof,
                    line,
                });
                return Ok(tokens);
            };

            let token = if c.is_ascii_digit() {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.string()?
            } else if c == '_' || c == '$' || c.is_alphabetic() {
                self.ident()
            } else {
                self.punct()?
            };
            tokens.push(Spanned { token, line });
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ScriptError> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => return Err(self.error("unterminated comment")),
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> Result<Token, ScriptError> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number literal '{}'", text)))
    }

    fn string(&mut self) -> Result<Token, ScriptError> {
        let quote = self.bump().unwrap_or('"');
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::Str(text)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('u') => self.unicode_escape()?,
                        Some(other) => other,
                        None => return Err(self.error("unterminated string literal")),
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, ScriptError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid unicode escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn ident(&mut self) -> Token {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '_' || c == '$' || c.is_alphanumeric() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Ident(text)
    }

    fn punct(&mut self) -> Result<Token, ScriptError> {
        let c = self.bump().unwrap_or('\0');
        let punct = match c {
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '{' => Punct::LBrace,
            '}' => Punct::RBrace,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            ',' => Punct::Comma,
            ';' => Punct::Semi,
            ':' => Punct::Colon,
            '.' => Punct::Dot,
            '?' => Punct::Question,
            '+' => Punct::Plus,
            '-' => Punct::Minus,
            '!' if self.eat('=') => {
                if self.eat('=') {
                    Punct::StrictNotEq
                } else {
                    Punct::NotEq
                }
            }
            '!' => Punct::Bang,
            '=' if self.eat('>') => Punct::Arrow,
            '=' if self.eat('=') => {
                if self.eat('=') {
                    Punct::StrictEq
                } else {
                    Punct::EqEq
                }
            }
            '=' => Punct::Assign,
            '<' if self.eat('=') => Punct::LtEq,
            '<' => Punct::Lt,
            '>' if self.eat('=') => Punct::GtEq,
            '>' => Punct::Gt,
            '|' if self.eat('|') => Punct::OrOr,
            '&' if self.eat('&') => Punct::AndAnd,
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };
        Ok(Token::Punct(punct))
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_require_statement() {
        let tokens = kinds(r#"const React = require("react");"#);
        assert_eq!(
            tokens,
            vec![
                Token::Ident("const".into()),
                Token::Ident("React".into()),
                Token::Punct(Punct::Assign),
                Token::Ident("require".into()),
                Token::Punct(Punct::LParen),
                Token::Str("react".into()),
                Token::Punct(Punct::RParen),
                Token::Punct(Punct::Semi),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("// header\n/* block\ncomment */ x => 1").unwrap();
        assert_eq!(tokens[0].token, Token::Ident("x".into()));
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[1].token, Token::Punct(Punct::Arrow));
        assert_eq!(tokens[2].token, Token::Number(1.0));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#"'it\'s' "a\nb" "A""#);
        assert_eq!(tokens[0], Token::Str("it's".into()));
        assert_eq!(tokens[1], Token::Str("a\nb".into()));
        assert_eq!(tokens[2], Token::Str("A".into()));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a === b !== c == d != e >= f => g ? h : -i");
        let puncts: Vec<_> = tokens
            .into_iter()
            .filter_map(|t| match t {
                Token::Punct(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(
            puncts,
            vec![
                Punct::StrictEq,
                Punct::StrictNotEq,
                Punct::EqEq,
                Punct::NotEq,
                Punct::GtEq,
                Punct::Arrow,
                Punct::Question,
                Punct::Colon,
                Punct::Minus,
            ]
        );
    }

    #[test]
    fn test_unsupported_character() {
        let err = tokenize("a % b").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("\"abc").is_err());
    }
}
