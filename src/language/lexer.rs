use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '\n' => {
                    self.insert_semi_if_needed();
                    self.bump();
                }
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
                '"' => self.lex_string(),
                '`' => self.lex_raw_string(),
                '\'' => self.lex_rune(),
                _ => self.lex_symbol(),
            }
        }
        self.insert_semi_if_needed();
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn insert_semi_if_needed(&mut self) {
        if let Some(last) = self.tokens.last() {
            if last.kind.ends_statement() {
                self.push_token(TokenKind::Semi, self.offset, self.offset);
            }
        }
    }

    fn eat_line_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                return;
            }
            self.bump();
        }
        self.error(self.offset, self.offset, "Unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let slice = &self.src[start..end];
        let kind = match slice {
            "package" => TokenKind::Package,
            "import" => TokenKind::Import,
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "type" => TokenKind::TypeKw,
            "func" => TokenKind::Func,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "goto" => TokenKind::Goto,
            "fallthrough" => TokenKind::Fallthrough,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "range" => TokenKind::Range,
            "go" => TokenKind::Go,
            "select" => TokenKind::Select,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "chan" => TokenKind::Chan,
            "map" => TokenKind::Map,
            "struct" => TokenKind::Struct,
            "interface" => TokenKind::Interface,
            "defer" => TokenKind::Defer,
            _ => TokenKind::Identifier(slice.to_string()),
        };
        self.push_token(kind, start, end);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        let mut is_float = false;

        if self.current == Some('0') && matches!(self.peek(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let digits_start = self.offset;
            while let Some(ch) = self.current {
                if ch.is_ascii_hexdigit() {
                    self.bump();
                } else {
                    break;
                }
            }
            let end = self.offset;
            let text = &self.src[digits_start..end];
            match i128::from_str_radix(text, 16) {
                Ok(value) => self.push_token(TokenKind::Integer(value), start, end),
                Err(_) => self.error(start, end, "Invalid hexadecimal literal"),
            }
            return;
        }

        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }

        if self.current == Some('.') && self.peek() != Some('.') {
            is_float = true;
            self.bump();
            while let Some(ch) = self.current {
                if ch.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if matches!(self.current, Some('e') | Some('E')) {
            is_float = true;
            self.bump();
            if matches!(self.current, Some('+') | Some('-')) {
                self.bump();
            }
            while let Some(ch) = self.current {
                if ch.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if self.current == Some('i') {
            self.bump();
            let end = self.offset;
            let text = &self.src[start..end - 1];
            match text.parse::<f64>() {
                Ok(value) => self.push_token(TokenKind::Imaginary(value), start, end),
                Err(_) => self.error(start, end, "Invalid imaginary literal"),
            }
            return;
        }

        let end = self.offset;
        let text = &self.src[start..end];

        if is_float {
            match text.parse::<f64>() {
                Ok(value) => self.push_token(TokenKind::Float(value), start, end),
                Err(_) => self.error(start, end, "Invalid float literal"),
            }
        } else {
            match text.parse::<i128>() {
                Ok(value) => self.push_token(TokenKind::Integer(value), start, end),
                Err(_) => self.error(start, end, "Invalid integer literal"),
            }
        }
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            match ch {
                '"' => {
                    self.bump();
                    let end = self.offset;
                    self.push_token(TokenKind::String(value), start, end);
                    return;
                }
                '\n' => break,
                '\\' => {
                    self.bump();
                    if let Some(escaped) = self.current {
                        value.push(match escaped {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            '0' => '\0',
                            '\\' => '\\',
                            '"' => '"',
                            other => other,
                        });
                        self.bump();
                    } else {
                        break;
                    }
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
    }

    fn lex_raw_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            if ch == '`' {
                self.bump();
                let end = self.offset;
                self.push_token(TokenKind::String(value), start, end);
                return;
            }
            value.push(ch);
            self.bump();
        }
        self.error(start, self.offset, "Unterminated raw string literal");
    }

    fn lex_rune(&mut self) {
        let start = self.offset;
        self.bump(); // '
        let Some(ch) = self.current else {
            self.error(start, self.offset, "Unterminated rune literal");
            return;
        };
        let value = if ch == '\\' {
            self.bump();
            match self.current {
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('0') => '\0',
                Some('\\') => '\\',
                Some('\'') => '\'',
                Some(other) => other,
                None => {
                    self.error(start, self.offset, "Invalid escape in rune literal");
                    return;
                }
            }
        } else {
            ch
        };
        self.bump();
        if self.current != Some('\'') {
            self.error(start, self.offset, "Unterminated rune literal");
            return;
        }
        self.bump();
        let end = self.offset;
        self.push_token(TokenKind::Rune(value), start, end);
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let ch = self.current;
        match ch {
            Some('(') => self.single(TokenKind::LParen),
            Some(')') => self.single(TokenKind::RParen),
            Some('{') => self.single(TokenKind::LBrace),
            Some('}') => self.single(TokenKind::RBrace),
            Some('[') => self.single(TokenKind::LBracket),
            Some(']') => self.single(TokenKind::RBracket),
            Some(',') => self.single(TokenKind::Comma),
            Some(';') => self.single(TokenKind::Semi),
            Some('.') => {
                self.bump();
                if self.current == Some('.') && self.peek() == Some('.') {
                    self.bump();
                    self.bump();
                    self.push_token(TokenKind::Ellipsis, start, self.offset);
                } else {
                    self.push_token(TokenKind::Dot, start, self.offset);
                }
            }
            Some(':') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::ColonEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Colon, start, self.offset);
                }
            }
            Some('%') => self.single(TokenKind::Percent),
            Some('/') => self.single(TokenKind::Slash),
            Some('+') => {
                self.bump();
                if self.current == Some('+') {
                    self.bump();
                    self.push_token(TokenKind::PlusPlus, start, self.offset);
                } else {
                    self.push_token(TokenKind::Plus, start, self.offset);
                }
            }
            Some('-') => {
                self.bump();
                if self.current == Some('-') {
                    self.bump();
                    self.push_token(TokenKind::MinusMinus, start, self.offset);
                } else {
                    self.push_token(TokenKind::Minus, start, self.offset);
                }
            }
            Some('*') => self.single(TokenKind::Star),
            Some('^') => self.single(TokenKind::Caret),
            Some('&') => {
                self.bump();
                if self.current == Some('&') {
                    self.bump();
                    self.push_token(TokenKind::AmpersandAmpersand, start, self.offset);
                } else if self.current == Some('^') {
                    self.bump();
                    self.push_token(TokenKind::AmpCaret, start, self.offset);
                } else {
                    self.push_token(TokenKind::Ampersand, start, self.offset);
                }
            }
            Some('|') => {
                self.bump();
                if self.current == Some('|') {
                    self.bump();
                    self.push_token(TokenKind::PipePipe, start, self.offset);
                } else {
                    self.push_token(TokenKind::Pipe, start, self.offset);
                }
            }
            Some('!') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::BangEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Bang, start, self.offset);
                }
            }
            Some('=') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::EqEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Eq, start, self.offset);
                }
            }
            Some('<') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::LtEq, start, self.offset);
                } else if self.current == Some('-') {
                    self.bump();
                    self.push_token(TokenKind::Arrow, start, self.offset);
                } else if self.current == Some('<') {
                    self.bump();
                    self.push_token(TokenKind::Shl, start, self.offset);
                } else {
                    self.push_token(TokenKind::Lt, start, self.offset);
                }
            }
            Some('>') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::GtEq, start, self.offset);
                } else if self.current == Some('>') {
                    self.bump();
                    self.push_token(TokenKind::Shr, start, self.offset);
                } else {
                    self.push_token(TokenKind::Gt, start, self.offset);
                }
            }
            Some(ch) => {
                self.bump();
                self.error(start, self.offset, format!("Unexpected character '{}'", ch));
            }
            None => {}
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.bump();
        self.push_token(kind, start, self.offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_short_declaration() {
        let kinds = kinds("x := 2 + 3 * 4");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::ColonEq,
                TokenKind::Integer(2),
                TokenKind::Plus,
                TokenKind::Integer(3),
                TokenKind::Star,
                TokenKind::Integer(4),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_channel_operators() {
        let kinds = kinds("ch <- 7\nv := <-ch");
        assert!(kinds.contains(&TokenKind::Arrow));
        assert!(kinds.contains(&TokenKind::ColonEq));
    }

    #[test]
    fn inserts_semicolon_after_value_tokens_only() {
        let kinds = kinds("x := 1 +\n2");
        // No semicolon after '+', so the statement continues across the newline.
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::ColonEq,
                TokenKind::Integer(1),
                TokenKind::Plus,
                TokenKind::Integer(2),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_shift_from_comparison() {
        assert_eq!(
            kinds("1 << 2 < 3"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Shl,
                TokenKind::Integer(2),
                TokenKind::Lt,
                TokenKind::Integer(3),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_and_not_operator() {
        assert!(kinds("a &^ b").contains(&TokenKind::AmpCaret));
    }

    #[test]
    fn lexes_imaginary_literal() {
        assert!(matches!(kinds("3i")[0], TokenKind::Imaginary(v) if v == 3.0));
    }
}
