//! Lexer for DSL and solver source files
//!
//! Transforms Python-syntax source into a stream of tokens, including the
//! `Newline`/`Indent`/`Dedent` layout tokens the parser uses to find blocks.

use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Result, TyperError};

/// Token types for the DSL source language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(String),
    String(String),

    // Identifiers and keywords
    Identifier(String),

    // Keywords
    Def,
    Class,
    Return,
    Lambda,
    If,
    Elif,
    Else,
    For,
    While,
    With,
    Try,
    Except,
    Finally,
    Async,
    Await,
    Pass,
    Import,
    From,
    As,
    In,
    Is,
    And,
    Or,
    Not,
    Yield,
    Raise,
    Assert,
    Del,
    Global,
    Nonlocal,
    Break,
    Continue,
    None,
    True,
    False,

    // Operators
    Plus,           // +
    Minus,          // -
    Star,           // *
    DoubleStar,     // **
    Slash,          // /
    DoubleSlash,    // //
    Percent,        // %
    At,             // @
    Ampersand,      // &
    Pipe,           // |
    Caret,          // ^
    Tilde,          // ~
    ShiftLeft,      // <<
    ShiftRight,     // >>

    // Comparison
    Equal,          // ==
    NotEqual,       // !=
    Less,           // <
    LessEqual,      // <=
    Greater,        // >
    GreaterEqual,   // >=

    // Assignment
    Assign,             // =
    AugAssign(String),  // +=, -=, ...
    Walrus,             // :=

    // Delimiters
    LeftParen,      // (
    RightParen,     // )
    LeftBrace,      // {
    RightBrace,     // }
    LeftBracket,    // [
    RightBracket,   // ]

    // Punctuation
    Comma,          // ,
    Dot,            // .
    Ellipsis,       // ...
    Colon,          // :
    Semicolon,      // ;
    Arrow,          // ->

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token with position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, lexeme: String) -> Self {
        Token { kind, line, column, lexeme }
    }
}

/// Tokenize a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).collect()
}

/// Lexer for tokenizing DSL source code
pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    current_lexeme: String,
    /// Indentation widths of the enclosing blocks, outermost first
    indent_stack: Vec<usize>,
    /// Open brackets with their position, for matching and error reporting
    brackets: Vec<(char, usize, usize)>,
    /// Layout tokens waiting to be handed out
    pending: VecDeque<Token>,
    at_line_start: bool,
    last_was_newline: bool,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            line: 1,
            column: 1,
            current_lexeme: String::new(),
            indent_stack: vec![0],
            brackets: Vec::new(),
            pending: VecDeque::new(),
            at_line_start: true,
            last_was_newline: true,
            finished: false,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.next()?;
        self.current_lexeme.push(ch);
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<&char> {
        self.source.peek()
    }

    fn peek_is(&mut self, expected: char) -> bool {
        self.peek() == Some(&expected)
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source.clone();
        chars.next();
        chars.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_is(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Skip spaces, comments and line continuations inside a logical line.
    /// Newlines are skipped too while a bracket is open.
    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance();
                }
                '\n' if !self.brackets.is_empty() => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\\' if matches!(self.peek_second(), Some('\n') | Some('\r')) => {
                    self.advance();
                    if self.match_char('\r') {
                        self.match_char('\n');
                    } else {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Measure the indentation of the next non-blank line and queue the
    /// matching `Indent`/`Dedent` tokens.
    fn scan_indentation(&mut self) -> Result<()> {
        loop {
            let mut width = 0;
            while let Some(&ch) = self.peek() {
                match ch {
                    ' ' => width += 1,
                    '\t' => width = (width / 8 + 1) * 8,
                    '\x0c' => width = 0,
                    _ => break,
                }
                self.advance();
            }

            match self.peek().copied() {
                None => return Ok(()),
                Some('\n') | Some('\r') => {
                    self.advance();
                }
                Some('#') => self.skip_comment(),
                Some(_) => {
                    self.at_line_start = false;
                    return self.apply_indentation(width);
                }
            }
        }
    }

    fn apply_indentation(&mut self, width: usize) -> Result<()> {
        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            self.indent_stack.push(width);
            self.pending
                .push_back(Token::new(TokenKind::Indent, self.line, 1, String::new()));
        } else if width < current {
            while self.indent_stack.last().copied().unwrap_or(0) > width {
                self.indent_stack.pop();
                self.pending
                    .push_back(Token::new(TokenKind::Dedent, self.line, 1, String::new()));
            }
            if self.indent_stack.last().copied().unwrap_or(0) != width {
                return Err(TyperError::parse(
                    self.line,
                    self.column,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(&(open, line, column)) = self.brackets.last() {
            return Err(TyperError::parse(line, column, format!("'{}' was never closed", open)));
        }
        if !self.last_was_newline {
            self.pending
                .push_back(Token::new(TokenKind::Newline, self.line, self.column, String::new()));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending
                .push_back(Token::new(TokenKind::Dedent, self.line, 1, String::new()));
        }
        self.pending
            .push_back(Token::new(TokenKind::Eof, self.line, self.column, String::new()));
        self.finished = true;
        Ok(())
    }

    fn open_bracket(&mut self, ch: char, line: usize, column: usize) {
        self.brackets.push((ch, line, column));
    }

    fn close_bracket(&mut self, ch: char, line: usize, column: usize) -> Result<()> {
        let expected = match ch {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.pop() {
            Some((open, _, _)) if open == expected => Ok(()),
            Some((open, _, _)) => Err(TyperError::parse(
                line,
                column,
                format!("closing parenthesis '{}' does not match opening parenthesis '{}'", ch, open),
            )),
            None => Err(TyperError::parse(line, column, format!("unmatched '{}'", ch))),
        }
    }

    fn scan_string(&mut self, quote: char, start_line: usize, start_column: usize) -> Result<Token> {
        let triple = self.peek_is(quote) && self.peek_second() == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut value = String::new();
        loop {
            let ch = match self.advance() {
                Some(ch) => ch,
                None => {
                    return Err(TyperError::parse(
                        start_line,
                        start_column,
                        "unterminated string literal",
                    ))
                }
            };
            if ch == '\\' {
                if let Some(escaped) = self.advance() {
                    value.push('\\');
                    value.push(escaped);
                }
                continue;
            }
            if ch == quote {
                if !triple {
                    break;
                }
                if self.peek_is(quote) && self.peek_second() == Some(quote) {
                    self.advance();
                    self.advance();
                    break;
                }
            }
            if ch == '\n' && !triple {
                return Err(TyperError::parse(
                    start_line,
                    start_column,
                    "unterminated string literal",
                ));
            }
            value.push(ch);
        }

        Ok(Token::new(
            TokenKind::String(value),
            start_line,
            start_column,
            self.current_lexeme.clone(),
        ))
    }

    fn scan_number(&mut self, start_line: usize, start_column: usize) -> Token {
        while let Some(&ch) = self.peek() {
            let exponent_sign = (ch == '+' || ch == '-')
                && matches!(self.current_lexeme.chars().last(), Some('e') | Some('E'))
                && !self.current_lexeme.starts_with("0x")
                && !self.current_lexeme.starts_with("0X");
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                self.advance();
            } else {
                break;
            }
        }
        let lexeme = self.current_lexeme.clone();
        Token::new(TokenKind::Number(lexeme.clone()), start_line, start_column, lexeme)
    }

    fn scan_identifier(&mut self, start_line: usize, start_column: usize) -> Result<Token> {
        while let Some(&ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let ident = self.current_lexeme.clone();

        // String prefixes: r"..", b'..', f"..", rb"..", ...
        if matches!(self.peek().copied(), Some('"') | Some('\''))
            && ident.len() <= 2
            && ident.chars().all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'f' | 'u'))
        {
            let quote = self.advance().unwrap_or('"');
            return self.scan_string(quote, start_line, start_column);
        }

        let kind = match ident.as_str() {
            "def" => TokenKind::Def,
            "class" => TokenKind::Class,
            "return" => TokenKind::Return,
            "lambda" => TokenKind::Lambda,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "with" => TokenKind::With,
            "try" => TokenKind::Try,
            "except" => TokenKind::Except,
            "finally" => TokenKind::Finally,
            "async" => TokenKind::Async,
            "await" => TokenKind::Await,
            "pass" => TokenKind::Pass,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "yield" => TokenKind::Yield,
            "raise" => TokenKind::Raise,
            "assert" => TokenKind::Assert,
            "del" => TokenKind::Del,
            "global" => TokenKind::Global,
            "nonlocal" => TokenKind::Nonlocal,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "None" => TokenKind::None,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            _ => TokenKind::Identifier(ident.clone()),
        };

        Ok(Token::new(kind, start_line, start_column, ident))
    }

    /// Operator that may be followed by `=` to form an augmented assignment.
    fn operator(&mut self, plain: TokenKind, symbol: &str, line: usize, column: usize) -> Token {
        if self.match_char('=') {
            let op = format!("{}=", symbol);
            Token::new(TokenKind::AugAssign(op.clone()), line, column, op)
        } else {
            Token::new(plain, line, column, symbol.to_string())
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(Some(token));
        }
        if self.finished {
            return Ok(None);
        }

        if self.at_line_start && self.brackets.is_empty() {
            self.scan_indentation()?;
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
        }

        self.skip_whitespace();
        self.current_lexeme.clear();

        let start_line = self.line;
        let start_column = self.column;

        let ch = match self.advance() {
            Some(ch) => ch,
            None => {
                self.finish()?;
                return Ok(self.pending.pop_front());
            }
        };
        let digit_follows = self.peek().map_or(false, |c| c.is_ascii_digit());

        let token = match ch {
            '\n' => {
                self.at_line_start = true;
                Token::new(TokenKind::Newline, start_line, start_column, "\n".into())
            }

            // String literals
            '"' | '\'' => self.scan_string(ch, start_line, start_column)?,

            // Numbers
            '0'..='9' => self.scan_number(start_line, start_column),
            '.' if digit_follows => {
                self.scan_number(start_line, start_column)
            }

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(start_line, start_column)?,

            // Operators
            '+' => self.operator(TokenKind::Plus, "+", start_line, start_column),
            '-' => {
                if self.match_char('>') {
                    Token::new(TokenKind::Arrow, start_line, start_column, "->".into())
                } else {
                    self.operator(TokenKind::Minus, "-", start_line, start_column)
                }
            }
            '*' => {
                if self.match_char('*') {
                    self.operator(TokenKind::DoubleStar, "**", start_line, start_column)
                } else {
                    self.operator(TokenKind::Star, "*", start_line, start_column)
                }
            }
            '/' => {
                if self.match_char('/') {
                    self.operator(TokenKind::DoubleSlash, "//", start_line, start_column)
                } else {
                    self.operator(TokenKind::Slash, "/", start_line, start_column)
                }
            }
            '%' => self.operator(TokenKind::Percent, "%", start_line, start_column),
            '@' => self.operator(TokenKind::At, "@", start_line, start_column),
            '&' => self.operator(TokenKind::Ampersand, "&", start_line, start_column),
            '|' => self.operator(TokenKind::Pipe, "|", start_line, start_column),
            '^' => self.operator(TokenKind::Caret, "^", start_line, start_column),
            '~' => Token::new(TokenKind::Tilde, start_line, start_column, "~".into()),

            '=' => {
                if self.match_char('=') {
                    Token::new(TokenKind::Equal, start_line, start_column, "==".into())
                } else {
                    Token::new(TokenKind::Assign, start_line, start_column, "=".into())
                }
            }
            '!' => {
                if self.match_char('=') {
                    Token::new(TokenKind::NotEqual, start_line, start_column, "!=".into())
                } else {
                    return Err(TyperError::parse(start_line, start_column, "invalid syntax '!'"));
                }
            }
            '<' => {
                if self.match_char('<') {
                    self.operator(TokenKind::ShiftLeft, "<<", start_line, start_column)
                } else if self.match_char('=') {
                    Token::new(TokenKind::LessEqual, start_line, start_column, "<=".into())
                } else {
                    Token::new(TokenKind::Less, start_line, start_column, "<".into())
                }
            }
            '>' => {
                if self.match_char('>') {
                    self.operator(TokenKind::ShiftRight, ">>", start_line, start_column)
                } else if self.match_char('=') {
                    Token::new(TokenKind::GreaterEqual, start_line, start_column, ">=".into())
                } else {
                    Token::new(TokenKind::Greater, start_line, start_column, ">".into())
                }
            }

            // Delimiters
            '(' | '[' | '{' => {
                self.open_bracket(ch, start_line, start_column);
                let kind = match ch {
                    '(' => TokenKind::LeftParen,
                    '[' => TokenKind::LeftBracket,
                    _ => TokenKind::LeftBrace,
                };
                Token::new(kind, start_line, start_column, ch.to_string())
            }
            ')' | ']' | '}' => {
                self.close_bracket(ch, start_line, start_column)?;
                let kind = match ch {
                    ')' => TokenKind::RightParen,
                    ']' => TokenKind::RightBracket,
                    _ => TokenKind::RightBrace,
                };
                Token::new(kind, start_line, start_column, ch.to_string())
            }

            // Punctuation
            ',' => Token::new(TokenKind::Comma, start_line, start_column, ",".into()),
            '.' => {
                if self.peek_is('.') && self.peek_second() == Some('.') {
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::Ellipsis, start_line, start_column, "...".into())
                } else {
                    Token::new(TokenKind::Dot, start_line, start_column, ".".into())
                }
            }
            ':' => {
                if self.match_char('=') {
                    Token::new(TokenKind::Walrus, start_line, start_column, ":=".into())
                } else {
                    Token::new(TokenKind::Colon, start_line, start_column, ":".into())
                }
            }
            ';' => Token::new(TokenKind::Semicolon, start_line, start_column, ";".into()),

            _ => {
                return Err(TyperError::parse(
                    start_line,
                    start_column,
                    format!("invalid character '{}'", ch),
                ))
            }
        };

        self.last_was_newline = token.kind == TokenKind::Newline;
        Ok(Some(token))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                // Stop after the first error
                self.finished = true;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}
