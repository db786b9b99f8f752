//! Byte-level tokenizer for FHIRPath expressions
//!
//! Scans the raw expression into a token stream for the Pratt parser.
//! String escapes are decoded here; date/time literal bodies are kept as
//! text and validated when the parser builds the literal node.

use rust_decimal::Decimal;

use crate::core::error::{FhirPathError, Result};

/// A token with its starting byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token
    pub token: Token,
    /// Byte offset where the token starts
    pub start: usize,
}

/// Lexical tokens
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal
    Integer(i32),
    /// Long literal (`123L`)
    Long(i64),
    /// Decimal literal
    Decimal(Decimal),
    /// String literal with escapes decoded
    String(String),
    /// Date literal body (after `@`)
    Date(String),
    /// DateTime literal body (after `@`)
    DateTime(String),
    /// Time literal body (after `@T`)
    Time(String),
    /// Identifier or delimited `` `identifier` ``
    Identifier(String),

    /// `true`
    True,
    /// `false`
    False,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
    /// `implies`
    Implies,
    /// `is`
    Is,
    /// `as`
    As,
    /// `in`
    In,
    /// `contains`
    Contains,
    /// `div`
    Div,
    /// `mod`
    Mod,

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `~`
    Equivalent,
    /// `!~`
    NotEquivalent,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `%`
    Percent,

    /// `$this`
    DollarThis,
    /// `$index`
    DollarIndex,
    /// `$total`
    DollarTotal,
}

impl Token {
    /// The identifier text a keyword stands for when it follows `.` — the
    /// grammar lets keywords be used as member names (`Questionnaire.contains`).
    pub fn as_identifier_text(&self) -> Option<&str> {
        match self {
            Token::Identifier(name) => Some(name),
            Token::True => Some("true"),
            Token::False => Some("false"),
            Token::And => Some("and"),
            Token::Or => Some("or"),
            Token::Xor => Some("xor"),
            Token::Implies => Some("implies"),
            Token::Is => Some("is"),
            Token::As => Some("as"),
            Token::In => Some("in"),
            Token::Contains => Some("contains"),
            Token::Div => Some("div"),
            Token::Mod => Some("mod"),
            _ => None,
        }
    }
}

fn keyword(text: &str) -> Option<Token> {
    match text {
        "true" => Some(Token::True),
        "false" => Some(Token::False),
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "xor" => Some(Token::Xor),
        "implies" => Some(Token::Implies),
        "is" => Some(Token::Is),
        "as" => Some(Token::As),
        "in" => Some(Token::In),
        "contains" => Some(Token::Contains),
        "div" => Some(Token::Div),
        "mod" => Some(Token::Mod),
        _ => None,
    }
}

/// Tokenizer over the expression bytes
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer for `input`
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input
    pub fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::with_capacity(16);
        while let Some(spanned) = self.next_token()? {
            tokens.push(spanned);
        }
        Ok(tokens)
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> FhirPathError {
        FhirPathError::parse_error(self.input, offset, message)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek(0) {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.peek(1) == Some(b'/') => {
                    while !matches!(self.peek(0), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek(0), self.peek(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (None, _) => {
                                return Err(self.error(start, "unterminated block comment"));
                            }
                            _ => self.pos += 1,
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(byte) = self.peek(0) else {
            return Ok(None);
        };

        let token = match byte {
            b'.' => self.single(Token::Dot),
            b'(' => self.single(Token::LeftParen),
            b')' => self.single(Token::RightParen),
            b'[' => self.single(Token::LeftBracket),
            b']' => self.single(Token::RightBracket),
            b'{' => self.single(Token::LeftBrace),
            b'}' => self.single(Token::RightBrace),
            b',' => self.single(Token::Comma),
            b'+' => self.single(Token::Plus),
            b'-' => self.single(Token::Minus),
            b'*' => self.single(Token::Star),
            b'/' => self.single(Token::Slash),
            b'&' => self.single(Token::Ampersand),
            b'|' => self.single(Token::Pipe),
            b'%' => self.single(Token::Percent),
            b'~' => self.single(Token::Equivalent),
            b'=' => self.single(Token::Equal),
            b'!' => match self.peek(1) {
                Some(b'=') => self.double(Token::NotEqual),
                Some(b'~') => self.double(Token::NotEquivalent),
                _ => return Err(self.error(start, "unexpected character '!'")),
            },
            b'<' => match self.peek(1) {
                Some(b'=') => self.double(Token::LessThanOrEqual),
                _ => self.single(Token::LessThan),
            },
            b'>' => match self.peek(1) {
                Some(b'=') => self.double(Token::GreaterThanOrEqual),
                _ => self.single(Token::GreaterThan),
            },
            b'$' => self.dollar_variable()?,
            b'\'' => self.string_literal()?,
            b'`' => self.delimited_identifier()?,
            b'@' => self.temporal_literal()?,
            b'0'..=b'9' => self.number()?,
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let text = self.identifier_text();
                keyword(text).unwrap_or_else(|| Token::Identifier(text.to_string()))
            }
            other => {
                return Err(self.error(
                    start,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };

        Ok(Some(Spanned { token, start }))
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.pos += 2;
        token
    }

    fn identifier_text(&mut self) -> &'input str {
        let start = self.pos;
        while matches!(self.peek(0), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn dollar_variable(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let name = self.identifier_text();
        match name {
            "this" => Ok(Token::DollarThis),
            "index" => Ok(Token::DollarIndex),
            "total" => Ok(Token::DollarTotal),
            _ => Err(self.error(start, format!("unknown special variable '${name}'"))),
        }
    }

    fn string_literal(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated string literal")),
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(Token::String(value));
                }
                Some(b'\\') => {
                    let escape_start = self.pos;
                    self.pos += 1;
                    match self.peek(0) {
                        Some(b'\'') => value.push('\''),
                        Some(b'"') => value.push('"'),
                        Some(b'`') => value.push('`'),
                        Some(b'\\') => value.push('\\'),
                        Some(b'/') => value.push('/'),
                        Some(b'f') => value.push('\u{c}'),
                        Some(b'n') => value.push('\n'),
                        Some(b'r') => value.push('\r'),
                        Some(b't') => value.push('\t'),
                        Some(b'u') => {
                            self.pos += 1;
                            let hex_start = self.pos;
                            for _ in 0..4 {
                                if !matches!(self.peek(0), Some(b) if b.is_ascii_hexdigit()) {
                                    return Err(self.error(
                                        escape_start,
                                        "\\u escape requires four hex digits",
                                    ));
                                }
                                self.pos += 1;
                            }
                            let code = u32::from_str_radix(&self.input[hex_start..self.pos], 16)
                                .expect("scanned hex digits");
                            match char::from_u32(code) {
                                Some(ch) => value.push(ch),
                                None => {
                                    return Err(
                                        self.error(escape_start, "invalid \\u escape code point")
                                    );
                                }
                            }
                            continue;
                        }
                        _ => return Err(self.error(escape_start, "invalid escape sequence")),
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    // Multi-byte UTF-8 is copied through as-is.
                    let ch_start = self.pos;
                    let ch = self.input[ch_start..].chars().next().expect("in bounds");
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn delimited_identifier(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let name_start = self.pos;
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated delimited identifier")),
                Some(b'`') => {
                    let name = self.input[name_start..self.pos].to_string();
                    self.pos += 1;
                    return Ok(Token::Identifier(name));
                }
                _ => self.pos += 1,
            }
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        while matches!(self.peek(0), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_decimal = self.peek(0) == Some(b'.')
            && matches!(self.peek(1), Some(b) if b.is_ascii_digit());
        if is_decimal {
            self.pos += 1;
            while matches!(self.peek(0), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
            let text = &self.input[start..self.pos];
            return text
                .parse::<Decimal>()
                .map(Token::Decimal)
                .map_err(|_| self.error(start, format!("invalid decimal literal '{text}'")));
        }
        if self.peek(0) == Some(b'L') {
            let text = &self.input[start..self.pos];
            self.pos += 1;
            return text
                .parse::<i64>()
                .map(Token::Long)
                .map_err(|_| self.error(start, format!("long literal '{text}L' out of range")));
        }
        let text = &self.input[start..self.pos];
        text.parse::<i32>()
            .map(Token::Integer)
            .map_err(|_| self.error(start, format!("integer literal '{text}' out of range")))
    }

    /// Scan a `@`-prefixed temporal literal: date, datetime or time.
    fn temporal_literal(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        if self.peek(0) == Some(b'T') {
            self.pos += 1;
            let body_start = self.pos;
            self.scan_time_body();
            if self.pos == body_start {
                return Err(self.error(start, "expected time after '@T'"));
            }
            return Ok(Token::Time(self.input[body_start..self.pos].to_string()));
        }

        let body_start = self.pos;
        if !self.scan_date_body() {
            return Err(self.error(start, "expected date after '@'"));
        }
        if self.peek(0) == Some(b'T') {
            self.pos += 1;
            self.scan_time_body();
            return Ok(Token::DateTime(self.input[body_start..self.pos].to_string()));
        }
        Ok(Token::Date(self.input[body_start..self.pos].to_string()))
    }

    fn scan_digits(&mut self, count: usize) -> bool {
        for i in 0..count {
            if !matches!(self.peek(i), Some(b) if b.is_ascii_digit()) {
                return false;
            }
        }
        self.pos += count;
        true
    }

    fn scan_date_body(&mut self) -> bool {
        if !self.scan_digits(4) {
            return false;
        }
        if self.peek(0) == Some(b'-') && matches!(self.peek(1), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
            if !self.scan_digits(2) {
                return false;
            }
            if self.peek(0) == Some(b'-') && matches!(self.peek(1), Some(b) if b.is_ascii_digit())
            {
                self.pos += 1;
                if !self.scan_digits(2) {
                    return false;
                }
            }
        }
        true
    }

    fn scan_time_body(&mut self) {
        if !self.scan_digits(2) {
            return;
        }
        if self.peek(0) == Some(b':') && self.scan_separated_digits() {
            if self.peek(0) == Some(b':') && self.scan_separated_digits() {
                if self.peek(0) == Some(b'.') {
                    self.pos += 1;
                    while matches!(self.peek(0), Some(b) if b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
            }
        }
        // Optional timezone offset
        match self.peek(0) {
            Some(b'Z') => self.pos += 1,
            Some(b'+' | b'-') => {
                if matches!(self.peek(1), Some(b) if b.is_ascii_digit())
                    && matches!(self.peek(2), Some(b) if b.is_ascii_digit())
                    && self.peek(3) == Some(b':')
                    && matches!(self.peek(4), Some(b) if b.is_ascii_digit())
                    && matches!(self.peek(5), Some(b) if b.is_ascii_digit())
                {
                    self.pos += 6;
                }
            }
            _ => {}
        }
    }

    fn scan_separated_digits(&mut self) -> bool {
        // Consumes ":DD"; the caller checked the ':'.
        if matches!(self.peek(1), Some(b) if b.is_ascii_digit())
            && matches!(self.peek(2), Some(b) if b.is_ascii_digit())
        {
            self.pos += 3;
            true
        } else {
            false
        }
    }
}

/// Tokenize `input` into a spanned token stream
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    Tokenizer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn basic_path() {
        assert_eq!(
            kinds("Patient.name"),
            vec![
                Token::Identifier("Patient".into()),
                Token::Dot,
                Token::Identifier("name".into()),
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("= != <= >= ~ !~ < >"),
            vec![
                Token::Equal,
                Token::NotEqual,
                Token::LessThanOrEqual,
                Token::GreaterThanOrEqual,
                Token::Equivalent,
                Token::NotEquivalent,
                Token::LessThan,
                Token::GreaterThan,
            ]
        );
    }

    #[test]
    fn numbers_and_suffixes() {
        assert_eq!(
            kinds("42 42L 3.14"),
            vec![
                Token::Integer(42),
                Token::Long(42),
                Token::Decimal("3.14".parse().unwrap()),
            ]
        );
        assert!(tokenize("2147483648").is_err());
        assert!(tokenize("9223372036854775808L").is_err());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r"'it\'s A\n'"),
            vec![Token::String("it's A\n".into())]
        );
        assert!(tokenize("'open").is_err());
        assert!(tokenize(r"'\q'").is_err());
    }

    #[test]
    fn temporal_literals() {
        assert_eq!(
            kinds("@2020-01-31 @2020-01-31T08:30:00Z @T14:30"),
            vec![
                Token::Date("2020-01-31".into()),
                Token::DateTime("2020-01-31T08:30:00Z".into()),
                Token::Time("14:30".into()),
            ]
        );
        assert_eq!(kinds("@2020")[0], Token::Date("2020".into()));
        assert_eq!(
            kinds("@2020-01-31T08:30:00.123+02:00")[0],
            Token::DateTime("2020-01-31T08:30:00.123+02:00".into())
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("value div 2 and true"),
            vec![
                Token::Identifier("value".into()),
                Token::Div,
                Token::Integer(2),
                Token::And,
                Token::True,
            ]
        );
    }

    #[test]
    fn dollar_variables() {
        assert_eq!(
            kinds("$this $index $total"),
            vec![Token::DollarThis, Token::DollarIndex, Token::DollarTotal]
        );
        assert!(tokenize("$other").is_err());
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("1 // line\n + /* block */ 2"),
            vec![Token::Integer(1), Token::Plus, Token::Integer(2)]
        );
        assert!(tokenize("/* open").is_err());
    }

    #[test]
    fn delimited_identifier() {
        assert_eq!(
            kinds("`PID-1`"),
            vec![Token::Identifier("PID-1".into())]
        );
    }
}
