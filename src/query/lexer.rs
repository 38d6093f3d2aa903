/// Query scanner - converts query text into positioned tokens
///
/// The scanner never fails: anything it does not recognise becomes a
/// single-character `Invalid` token for the parser to reject.
use super::token::{Token, TokenType};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Scan the whole input. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.is(TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Produce the next token; returns `Eof` (at the input length) once
    /// exhausted, and keeps returning it on further calls.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.is_eof() {
            return Token::eof(self.input.len());
        }

        let start = self.position;
        let ch = self.current_char();

        match ch {
            '\'' | '"' => self.read_string(ch),
            '0'..='9' => self.read_number(),
            '-' if self.peek_char().map_or(false, |c| c.is_ascii_digit()) => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            '(' => self.single(TokenType::LeftParen),
            ')' => self.single(TokenType::RightParen),
            '[' => self.single(TokenType::LeftBracket),
            ']' => self.single(TokenType::RightBracket),
            '{' => self.single(TokenType::LeftBrace),
            '}' => self.single(TokenType::RightBrace),
            '.' => self.single(TokenType::Dot),
            ',' => self.single(TokenType::Comma),
            ':' => self.single(TokenType::Colon),
            ';' => self.single(TokenType::Semicolon),
            '=' => self.single(TokenType::Equals),
            '!' if self.peek_char() == Some('=') => self.double(TokenType::NotEquals),
            '<' => match self.peek_char() {
                Some('=') => self.double(TokenType::LessThanOrEqual),
                Some('>') => self.double(TokenType::NotEquals),
                _ => self.single(TokenType::LessThan),
            },
            '>' => match self.peek_char() {
                Some('=') => self.double(TokenType::GreaterThanOrEqual),
                _ => self.single(TokenType::GreaterThan),
            },
            '-' if self.peek_char() == Some('>') => self.double(TokenType::Arrow),
            _ => {
                self.advance();
                Token::new(TokenType::Invalid, ch.to_string(), start, 1)
            }
        }
    }

    fn single(&mut self, token_type: TokenType) -> Token {
        let start = self.position;
        let text = self.current_char().to_string();
        self.advance();
        Token::new(token_type, text, start, 1)
    }

    fn double(&mut self, token_type: TokenType) -> Token {
        let start = self.position;
        let text: String = self.input[start..start + 2].iter().collect();
        self.advance();
        self.advance();
        Token::new(token_type, text, start, 2)
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Read a quoted string. A backslash keeps itself and the following
    /// character verbatim; a missing closing quote ends at end of input.
    fn read_string(&mut self, quote: char) -> Token {
        let start = self.position;
        self.advance(); // skip opening quote
        let mut value = String::new();

        while !self.is_eof() && self.current_char() != quote {
            if self.current_char() == '\\' {
                value.push('\\');
                self.advance();
                if self.is_eof() {
                    break;
                }
            }
            value.push(self.current_char());
            self.advance();
        }

        if !self.is_eof() {
            self.advance(); // skip closing quote
        }

        Token::new(TokenType::String, value, start, self.position - start)
    }

    /// Optional leading '-', digits, then at most one '.' followed by digits
    fn read_number(&mut self) -> Token {
        let start = self.position;
        let mut value = String::new();

        if self.current_char() == '-' {
            value.push('-');
            self.advance();
        }

        self.read_digits(&mut value);

        if self.current_char() == '.' && self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            value.push('.');
            self.advance();
            self.read_digits(&mut value);
        }

        Token::new(TokenType::Number, value, start, self.position - start)
    }

    fn read_digits(&mut self, value: &mut String) {
        while !self.is_eof() && self.current_char().is_ascii_digit() {
            value.push(self.current_char());
            self.advance();
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Check if it's a keyword
        let token_type = TokenType::from_keyword(&value).unwrap_or(TokenType::Identifier);
        let length = self.position - start;
        Token::new(token_type, value, start, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenType> {
        Lexer::new(input).tokenize().into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_lexer_simple_get() {
        let tokens = Lexer::new("get users where age > 25").tokenize();

        assert_eq!(tokens.len(), 7); // get, users, where, age, >, 25, EOF
        assert!(matches!(tokens[0].token_type, TokenType::Get));
        assert!(matches!(tokens[1].token_type, TokenType::Identifier));
        assert!(matches!(tokens[2].token_type, TokenType::Where));
        assert!(matches!(tokens[4].token_type, TokenType::GreaterThan));
        assert!(matches!(tokens[5].token_type, TokenType::Number));
        assert_eq!(tokens[5].text, "25");
        assert!(matches!(tokens[6].token_type, TokenType::Eof));
    }

    #[test]
    fn test_lexer_keywords_keep_casing() {
        let tokens = Lexer::new("GET Users").tokenize();
        assert!(matches!(tokens[0].token_type, TokenType::Get));
        assert_eq!(tokens[0].text, "GET");
        assert_eq!(tokens[1].text, "Users");
    }

    #[test]
    fn test_lexer_operators() {
        assert_eq!(
            kinds("= != <> < <= > >= ->"),
            vec![
                TokenType::Equals,
                TokenType::NotEquals,
                TokenType::NotEquals,
                TokenType::LessThan,
                TokenType::LessThanOrEqual,
                TokenType::GreaterThan,
                TokenType::GreaterThanOrEqual,
                TokenType::Arrow,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_punctuation() {
        assert_eq!(
            kinds("( ) [ ] { } . , : ;"),
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::Dot,
                TokenType::Comma,
                TokenType::Colon,
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_string_literal() {
        let tokens = Lexer::new("'John Doe' \"x\"").tokenize();
        assert!(matches!(tokens[0].token_type, TokenType::String));
        assert_eq!(tokens[0].text, "John Doe");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[0].length, 10);
        assert_eq!(tokens[1].text, "x");
    }

    #[test]
    fn test_lexer_string_escape_and_unterminated() {
        let tokens = Lexer::new(r"'it\'s' 'open").tokenize();
        assert_eq!(tokens[0].text, r"it\'s");
        assert!(matches!(tokens[1].token_type, TokenType::String));
        assert_eq!(tokens[1].text, "open");
        assert!(matches!(tokens[2].token_type, TokenType::Eof));
    }

    #[test]
    fn test_lexer_numbers() {
        let tokens = Lexer::new("-12.5 3. 7").tokenize();
        assert_eq!(tokens[0].text, "-12.5");
        assert_eq!(tokens[1].text, "3");
        assert!(matches!(tokens[2].token_type, TokenType::Dot));
        assert_eq!(tokens[3].text, "7");
    }

    #[test]
    fn test_lexer_invalid_does_not_abort() {
        assert_eq!(
            kinds("get @ users"),
            vec![TokenType::Get, TokenType::Invalid, TokenType::Identifier, TokenType::Eof]
        );
        assert_eq!(kinds("!"), vec![TokenType::Invalid, TokenType::Eof]);
    }

    #[test]
    fn test_lexer_eof_is_stable() {
        let mut lexer = Lexer::new("get");
        lexer.next_token();
        let first = lexer.next_token();
        let second = lexer.next_token();
        assert_eq!(first, second);
        assert_eq!(first.position, 3);
    }
}
