use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Source position of a token, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(String),

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Dot,      // .
    Gt,       // >
    Lt,       // <
    Dash,     // -

    Eof,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Pos),
    #[error("unterminated string starting at {0}")]
    UnterminatedString(Pos),
    #[error("unterminated SQL block starting at {0} (missing End)")]
    UnterminatedRawBlock(Pos),
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    pub fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.col = 1;
            }
            Some(_) => self.col += 1,
            None => {}
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        while let Some(c) = self.bump() {
                            if c == '\n' {
                                break;
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_string(&mut self, start: Pos) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(s),
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        match c {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            _ => s.push(c),
                        }
                    }
                }
                Some(c) => s.push(c),
                None => return Err(LexError::UnterminatedString(start)),
            }
        }
    }

    fn read_number(&mut self, first: char) -> String {
        let mut s = String::from(first);
        let mut has_dot = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else if c == '.' && !has_dot {
                // One-char probe past the dot: "1.5" is a number, a
                // dotted name never continues with a digit here.
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                    has_dot = true;
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        s
    }

    pub fn next_token(&mut self) -> Result<(Token, Pos), LexError> {
        self.skip_whitespace_and_comments();
        let pos = self.pos();

        let c = match self.bump() {
            Some(c) => c,
            None => return Ok((Token::Eof, pos)),
        };

        let tok = match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '>' => Token::Gt,
            '<' => Token::Lt,
            '-' => {
                if self.chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                    let first = self.bump().unwrap();
                    let mut n = String::from('-');
                    n.push_str(&self.read_number(first));
                    Token::Num(n)
                } else {
                    Token::Dash
                }
            }
            '"' => Token::Str(self.read_string(pos)?),
            c if c.is_ascii_digit() => Token::Num(self.read_number(c)),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident(c)),
            _ => return Err(LexError::UnexpectedChar(c, pos)),
        };

        Ok((tok, pos))
    }

    /// Consume raw text verbatim until a line consisting solely of
    /// `End`. Used for view bodies, where the payload is opaque SQL
    /// the schema grammar must not try to tokenize.
    pub fn read_raw_block(&mut self) -> Result<String, LexError> {
        let start = self.pos();
        let mut body = String::new();
        let mut line = String::new();
        loop {
            match self.bump() {
                Some('\n') => {
                    if line.trim() == "End" {
                        return Ok(body.trim().to_string());
                    }
                    body.push_str(&line);
                    body.push('\n');
                    line.clear();
                }
                Some(c) => line.push(c),
                None => {
                    if line.trim() == "End" {
                        return Ok(body.trim().to_string());
                    }
                    return Err(LexError::UnterminatedRawBlock(start));
                }
            }
        }
    }

    #[cfg(test)]
    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let (tok, _) = self.next_token()?;
            if tok == Token::Eof {
                tokens.push(tok);
                break;
            }
            tokens.push(tok);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let tokens = Lexer::new("Table public.users { }").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Table".into()),
                Token::Ident("public".into()),
                Token::Dot,
                Token::Ident("users".into()),
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_settings_tokens() {
        let tokens = Lexer::new("[pk, not null, ref: > users.id]")
            .tokenize()
            .unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LBracket,
                Token::Ident("pk".into()),
                Token::Comma,
                Token::Ident("not".into()),
                Token::Ident("null".into()),
                Token::Comma,
                Token::Ident("ref".into()),
                Token::Colon,
                Token::Gt,
                Token::Ident("users".into()),
                Token::Dot,
                Token::Ident("id".into()),
                Token::RBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let input = "// header\nEnum status { // inline\n}";
        let tokens = Lexer::new(input).tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Enum".into()),
                Token::Ident("status".into()),
                Token::LBrace,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = Lexer::new(r#""line\none" "tab\there""#).tokenize().unwrap();
        assert_eq!(tokens[0], Token::Str("line\none".into()));
        assert_eq!(tokens[1], Token::Str("tab\there".into()));
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("255 3.14 -1").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Num("255".into()),
                Token::Num("3.14".into()),
                Token::Num("-1".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let mut lexer = Lexer::new("a\n  b");
        let (_, pos) = lexer.next_token().unwrap();
        assert_eq!(pos, Pos { line: 1, col: 1 });
        let (_, pos) = lexer.next_token().unwrap();
        assert_eq!(pos, Pos { line: 2, col: 3 });
    }

    #[test]
    fn test_raw_block() {
        let mut lexer = Lexer::new("SELECT *\nFROM users\nEnd\nEnum");
        let body = lexer.read_raw_block().unwrap();
        assert_eq!(body, "SELECT *\nFROM users");
        let (tok, _) = lexer.next_token().unwrap();
        assert_eq!(tok, Token::Ident("Enum".into()));
    }

    #[test]
    fn test_unterminated_raw_block() {
        let mut lexer = Lexer::new("SELECT 1\n");
        assert!(matches!(
            lexer.read_raw_block(),
            Err(LexError::UnterminatedRawBlock(_))
        ));
    }

    #[test]
    fn test_unexpected_char_carries_position() {
        let mut lexer = Lexer::new("a ?");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err, LexError::UnexpectedChar('?', Pos { line: 1, col: 3 }));
    }

    #[test]
    fn test_unicode_ident() {
        let tokens = Lexer::new("Table public.ユーザー { }").tokenize().unwrap();
        assert_eq!(tokens[3], Token::Ident("ユーザー".into()));
    }
}
