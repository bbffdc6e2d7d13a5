//! Parser for DSL source files
//!
//! Transforms a stream of tokens into a statement-level syntax tree. Only
//! definitions and annotations are parsed in full; other statements are
//! checked for layout and kept as line ranges.

use crate::ast::*;
use crate::error::{Result, TyperError};
use crate::lexer::{tokenize, Token, TokenKind};

/// Tokenize and parse a whole source file.
pub fn parse_module(source: &str) -> Result<Module> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse()
}

/// Parser for DSL source code
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// Parse a complete module
    pub fn parse(&mut self) -> Result<Module> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            if self.check(&TokenKind::Dedent) {
                return Err(self.error("unexpected dedent"));
            }
            body.push(self.statement()?);
        }

        Ok(Module { body })
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.check(&TokenKind::Eof)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn previous(&self) -> Option<&Token> {
        if self.current > 0 {
            self.tokens.get(self.current - 1)
        } else {
            None
        }
    }

    fn advance(&mut self) -> Option<&Token> {
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    fn check_next(&self, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.current + 1)
            .map_or(false, |t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            if let Some(token) = self.advance() {
                return Ok(token.clone());
            }
        }
        Err(self.error(message))
    }

    fn current_line(&self) -> usize {
        self.peek().map(|t| t.line).unwrap_or(0)
    }

    fn error(&self, message: &str) -> TyperError {
        let (line, column) = self
            .peek()
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0));
        TyperError::parse(line, column, message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String> {
        if let Some(token) = self.peek() {
            if let TokenKind::Identifier(ref name) = token.kind {
                let name = name.clone();
                self.advance();
                return Ok(name);
            }
        }
        Err(self.error(message))
    }

    // Statements

    fn statement(&mut self) -> Result<Statement> {
        if self.check(&TokenKind::Indent) {
            return Err(self.error("unexpected indent"));
        }

        if self.check(&TokenKind::At) {
            let line = self.current_line();
            self.decorators()?;
            return self.definition(line);
        }

        if self.check(&TokenKind::Def)
            || self.check(&TokenKind::Class)
            || (self.check(&TokenKind::Async) && self.check_next(&TokenKind::Def))
        {
            let line = self.current_line();
            return self.definition(line);
        }

        self.line_statement()
    }

    /// Skip `@decorator` lines; only their position matters.
    fn decorators(&mut self) -> Result<()> {
        while self.match_token(&[TokenKind::At]) {
            while !self.check(&TokenKind::Newline) && !self.is_at_end() {
                self.advance();
            }
            self.consume(&TokenKind::Newline, "Expected newline after decorator")?;
        }
        Ok(())
    }

    fn definition(&mut self, line: usize) -> Result<Statement> {
        if self.match_token(&[TokenKind::Class]) {
            return self.class_definition(line);
        }
        let is_async = self.match_token(&[TokenKind::Async]);
        if self.check(&TokenKind::Def) {
            return self.function_definition(is_async, line);
        }
        Err(self.error("Expected 'def' or 'class' after decorator"))
    }

    fn function_definition(&mut self, is_async: bool, line: usize) -> Result<Statement> {
        let def_line = self.consume(&TokenKind::Def, "Expected 'def'")?.line;
        let name = self.consume_identifier("Expected function name")?;

        self.consume(&TokenKind::LeftParen, "Expected '(' after function name")?;
        let params = self.parse_parameters()?;
        self.consume(&TokenKind::RightParen, "Expected ')' after parameters")?;

        let returns = if self.match_token(&[TokenKind::Arrow]) {
            Some(self.type_expr()?)
        } else {
            None
        };

        self.consume(&TokenKind::Colon, "Expected ':' after function signature")?;
        let (body, end_line) = self.suite()?;

        Ok(Statement::FunctionDef(FunctionDef {
            name,
            params,
            returns,
            is_async,
            body,
            line,
            def_line,
            end_line,
        }))
    }

    fn class_definition(&mut self, line: usize) -> Result<Statement> {
        let name = self.consume_identifier("Expected class name")?;

        if self.match_token(&[TokenKind::LeftParen]) {
            let mut depth = 1;
            while depth > 0 {
                match self.advance().map(|t| t.kind.clone()) {
                    Some(TokenKind::LeftParen) => depth += 1,
                    Some(TokenKind::RightParen) => depth -= 1,
                    Some(TokenKind::Eof) | None => {
                        return Err(self.error("Expected ')' after class bases"))
                    }
                    _ => {}
                }
            }
        }

        self.consume(&TokenKind::Colon, "Expected ':' after class name")?;
        let (body, end_line) = self.suite()?;

        Ok(Statement::ClassDef {
            name,
            body,
            line,
            end_line,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>> {
        let mut params = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            let kind = if self.match_token(&[TokenKind::DoubleStar]) {
                ParamKind::VarKeyword
            } else if self.match_token(&[TokenKind::Star]) {
                ParamKind::VarPositional
            } else if self.match_token(&[TokenKind::Slash]) {
                // positional-only marker
                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
                continue;
            } else {
                ParamKind::Normal
            };

            // bare `*` separates keyword-only parameters
            let named = matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Identifier(_)));
            if kind == ParamKind::VarPositional && !named {
                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
                continue;
            }

            let name = self.consume_identifier("Expected parameter name")?;

            // Parameter annotations are checked but not kept
            if self.match_token(&[TokenKind::Colon]) {
                self.type_expr()?;
            }
            if self.match_token(&[TokenKind::Assign]) {
                self.skip_default()?;
            }

            params.push(Parameter { name, kind });

            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }

        Ok(params)
    }

    /// Skip a default value expression up to the next `,` or `)` of the
    /// parameter list.
    fn skip_default(&mut self) -> Result<()> {
        let mut depth = 0usize;
        let start = self.current;
        loop {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::LeftParen) | Some(TokenKind::LeftBracket) | Some(TokenKind::LeftBrace) => {
                    depth += 1
                }
                Some(TokenKind::RightParen) if depth == 0 => break,
                Some(TokenKind::Comma) if depth == 0 => break,
                Some(TokenKind::RightParen) | Some(TokenKind::RightBracket) | Some(TokenKind::RightBrace) => {
                    depth = depth.saturating_sub(1)
                }
                Some(TokenKind::Eof) | Some(TokenKind::Newline) | None => {
                    return Err(self.error("Unexpected end of parameter list"))
                }
                _ => {}
            }
            self.advance();
        }
        if self.current == start {
            return Err(self.error("Expected default value"));
        }
        Ok(())
    }

    /// Body of a definition or compound statement: an indented block, or a
    /// single statement on the header line.
    fn suite(&mut self) -> Result<(Vec<Statement>, usize)> {
        if self.match_token(&[TokenKind::Newline]) {
            self.block()
        } else {
            let stmt = self.line_statement()?;
            let end_line = stmt.end_line();
            Ok((vec![stmt], end_line))
        }
    }

    fn block(&mut self) -> Result<(Vec<Statement>, usize)> {
        self.consume(&TokenKind::Indent, "Expected an indented block")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.consume(&TokenKind::Dedent, "Expected end of indented block")?;

        let end_line = statements.last().map(|s| s.end_line()).unwrap_or(0);
        Ok((statements, end_line))
    }

    /// A logical line; when it ends in `:` it opens an indented block.
    fn line_statement(&mut self) -> Result<Statement> {
        let line = self.current_line();
        let keyword = self.peek().map(|t| t.lexeme.clone()).unwrap_or_default();

        let mut ends_with_colon = false;
        while !self.check(&TokenKind::Newline) {
            if self.is_at_end() || self.check(&TokenKind::Indent) || self.check(&TokenKind::Dedent) {
                return Err(self.error("Expected end of line"));
            }
            ends_with_colon = self.check(&TokenKind::Colon);
            self.advance();
        }
        let newline = self.consume(&TokenKind::Newline, "Expected newline")?;

        if ends_with_colon {
            let (body, end_line) = self.block()?;
            return Ok(Statement::Compound {
                keyword,
                body,
                line,
                end_line,
            });
        }

        Ok(Statement::Simple {
            line,
            end_line: newline.line,
        })
    }

    // Annotations

    fn type_expr(&mut self) -> Result<TypeExpr> {
        let mut expr = self.primary_type()?;

        while self.match_token(&[TokenKind::Pipe]) {
            let right = self.primary_type()?;
            expr = TypeExpr::Union(Box::new(expr), Box::new(right));
        }

        Ok(expr)
    }

    fn primary_type(&mut self) -> Result<TypeExpr> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error("Expected type annotation")),
        };

        let mut expr = match token.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                TypeExpr::Name(name)
            }
            TokenKind::String(value) => {
                self.advance();
                TypeExpr::Str(value)
            }
            TokenKind::Number(text) => {
                self.advance();
                TypeExpr::Number(text)
            }
            TokenKind::Minus => {
                self.advance();
                match self.advance().map(|t| t.kind.clone()) {
                    Some(TokenKind::Number(text)) => TypeExpr::Number(format!("-{}", text)),
                    _ => return Err(self.error("Expected number after '-'")),
                }
            }
            TokenKind::None => {
                self.advance();
                TypeExpr::None
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                TypeExpr::Name(token.lexeme)
            }
            TokenKind::Ellipsis => {
                self.advance();
                TypeExpr::Ellipsis
            }
            TokenKind::LeftBracket => {
                self.advance();
                let items = self.type_list(&TokenKind::RightBracket)?;
                self.consume(&TokenKind::RightBracket, "Expected ']'")?;
                TypeExpr::List(items)
            }
            TokenKind::LeftParen => {
                self.advance();
                let mut items = self.type_list(&TokenKind::RightParen)?;
                let trailing_comma = self.previous().map_or(false, |t| t.kind == TokenKind::Comma);
                self.consume(&TokenKind::RightParen, "Expected ')'")?;
                if items.len() == 1 && !trailing_comma {
                    items.remove(0)
                } else {
                    TypeExpr::Tuple(items)
                }
            }
            _ => return Err(self.error("Invalid type annotation")),
        };

        loop {
            if self.match_token(&[TokenKind::Dot]) {
                let attr = self.consume_identifier("Expected attribute name after '.'")?;
                expr = TypeExpr::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else if self.match_token(&[TokenKind::LeftBracket]) {
                let mut items = self.type_list(&TokenKind::RightBracket)?;
                let trailing_comma = self.previous().map_or(false, |t| t.kind == TokenKind::Comma);
                self.consume(&TokenKind::RightBracket, "Expected ']' after subscript")?;
                let slice = if items.len() == 1 && !trailing_comma {
                    items.remove(0)
                } else if items.is_empty() {
                    return Err(self.error("Expected subscript"));
                } else {
                    TypeExpr::Tuple(items)
                };
                expr = TypeExpr::Subscript {
                    value: Box::new(expr),
                    slice: Box::new(slice),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma-separated annotations up to (not including) `close`.
    fn type_list(&mut self, close: &TokenKind) -> Result<Vec<TypeExpr>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.type_expr()?);
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_function(source: &str) -> FunctionDef {
        let module = parse_module(source).unwrap();
        let f = module.functions().next().cloned().unwrap();
        f
    }

    #[test]
    fn test_function() {
        let def = first_function("def head(x: Container) -> Piece:\n    return x[0]\n");
        assert_eq!(def.name, "head");
        assert_eq!(def.params.len(), 1);
        assert_eq!(def.returns.unwrap().to_string(), "Piece");
        assert_eq!((def.line, def.end_line), (1, 2));
    }

    #[test]
    fn test_callable_annotation() {
        let def = first_function(
            "def compose(\n    outer: Callable,\n    inner: Callable\n) -> Callable[[Grid], Grid]:\n    return lambda x: outer(inner(x))\n",
        );
        assert_eq!(def.returns.unwrap().to_string(), "Callable[[Grid], Grid]");
        assert_eq!(def.end_line, 5);
    }

    #[test]
    fn test_annotation_shapes() {
        let source = "def f() -> Tuple[int, int]: ...\n\
                      def g() -> 'Grid': ...\n\
                      def h() -> typing.Optional[int]: ...\n\
                      def k() -> int | None: ...\n";
        let module = parse_module(source).unwrap();
        let rendered: Vec<String> = module
            .functions()
            .map(|f| f.returns.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(
            rendered,
            vec!["Tuple[int, int]", "'Grid'", "typing.Optional[int]", "int | None"]
        );
    }

    #[test]
    fn test_parameters() {
        let def = first_function("def f(a, b: int = 3, *args, key=(1, 2), **kw) -> None:\n    pass\n");
        let names: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "args", "key", "kw"]);
        assert_eq!(def.params[2].kind, ParamKind::VarPositional);
        assert_eq!(def.params[4].kind, ParamKind::VarKeyword);
    }

    #[test]
    fn test_nested_blocks() {
        let source = "class Box:\n    def size(self) -> int:\n        if True:\n            def inner() -> str:\n                return ''\n        return 1\n";
        let module = parse_module(source).unwrap();
        assert_eq!(module.body.len(), 1);
        assert!(matches!(&module.body[0], Statement::ClassDef { end_line: 6, .. }));
    }

    #[test]
    fn test_decorated_function() {
        let def = first_function("@cache\n@wraps(f)\ndef f(x):\n    return x\n");
        assert_eq!(def.name, "f");
        assert_eq!((def.line, def.def_line), (1, 3));
    }

    #[test]
    fn test_missing_colon() {
        let err = parse_module("def f(x) -> Grid\n    return x\n").unwrap_err();
        assert!(matches!(err, TyperError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_missing_block() {
        let err = parse_module("def f(x):\nreturn x\n").unwrap_err();
        assert!(matches!(err, TyperError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_unexpected_indent() {
        let err = parse_module("x = 1\n    y = 2\n").unwrap_err();
        assert!(matches!(err, TyperError::ParseError { line: 2, .. }));
    }
}
