use tracing::debug;

use crate::{
    ast::{
        ArithOperator, Block, CompareOperator, Expr, ExprKind, Function, Ident, Param, Program,
        Stmt, StmtKind, Untyped,
    },
    lexer::{self, extract, Lexer},
    token::{Spanned, Token, TokenKind},
    types::Type,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T>;

/// Parses a whole program, pulling tokens from the lexer on demand.
pub fn parse_program(src: &str) -> ParseResult<Program<Untyped>> {
    let mut p = Parser::new(src)?;
    let program = p.parse_program()?;
    debug!(functions = program.functions.len(), "parsed program");
    Ok(program)
}

/// Parses a single expression spanning the whole input.
pub fn parse_expr(src: &str) -> ParseResult<Expr<Untyped>> {
    let mut p = Parser::new(src)?;
    let expr = p.parse_expr()?;
    p.consume(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    /// The single token of lookahead.
    current: Token<'src>,
}

impl Parser<'_> {
    fn parse_program(&mut self) -> Result<Program<Untyped>> {
        let mut functions = Vec::with_capacity(4);
        while !self.is(TokenKind::Eof) {
            functions.push(self.parse_function()?);
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> Result<Function<Untyped>> {
        self.consume(TokenKind::Func)?;
        let name = self.parse_ident()?;

        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, Parser::parse_param)?;
        self.consume(TokenKind::RParen)?;

        self.consume(TokenKind::Arrow)?;
        let return_ty = self.parse_type()?;
        let body = self.parse_block()?;

        Ok(Function {
            name,
            params,
            return_ty,
            body,
        })
    }

    fn parse_param(&mut self) -> Result<Param<Untyped>> {
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        Ok(Param { ty, name, info: () })
    }

    fn parse_type(&mut self) -> Result<Type> {
        let ty = match self.peek().kind {
            TokenKind::Int => Type::Int,
            TokenKind::String => Type::String,
            other => return Err(self.error(Error::ExpectedType(other))),
        };
        self.advance()?;
        Ok(ty)
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: extract::ident(token),
            span: token.span,
        })
    }

    fn parse_block(&mut self) -> Result<Block<Untyped>> {
        let start = self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.is(TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.consume(TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: start.span.to(end.span),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt<Untyped>> {
        let start = self.peek();
        let kind = match start.kind {
            TokenKind::Manual | TokenKind::Int | TokenKind::String => self.parse_var_decl()?,

            // Assignment: ID = expr ;
            TokenKind::Identifier => {
                let target = self.parse_ident()?;
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.consume(TokenKind::Semicolon)?;
                StmtKind::Assign {
                    target,
                    value,
                    info: (),
                }
            }

            // Conditional: if ( expr ) block [else block]
            TokenKind::If => {
                self.advance()?;
                let condition = self.parse_paren_expr()?;
                let then_block = self.parse_block()?;
                let else_block = if self.take(TokenKind::Else)? {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                StmtKind::If {
                    condition,
                    then_block,
                    else_block,
                }
            }

            // Loop: while ( expr ) block
            TokenKind::While => {
                self.advance()?;
                let condition = self.parse_paren_expr()?;
                let body = self.parse_block()?;
                StmtKind::While { condition, body }
            }

            // Print: print ( expr ) ;
            TokenKind::Print => {
                self.advance()?;
                let expr = self.parse_paren_expr()?;
                self.consume(TokenKind::Semicolon)?;
                StmtKind::Print(expr)
            }

            // Return: return [expr] ;
            TokenKind::Return => {
                self.advance()?;
                let value = if self.is(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.consume(TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }

            other => return Err(self.error(Error::ExpectedStmt(other))),
        };
        Ok(Stmt {
            kind,
            span: start.span,
        })
    }

    /// Parses `['manual'] type ID ['=' expr] ';'`.
    fn parse_var_decl(&mut self) -> Result<StmtKind<Untyped>> {
        let manual = self.take(TokenKind::Manual)?;
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        let initializer = if self.take(TokenKind::Assign)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon)?;
        Ok(StmtKind::VarDecl {
            manual,
            ty,
            name,
            initializer,
            info: (),
        })
    }

    fn parse_paren_expr(&mut self) -> Result<Expr<Untyped>> {
        self.consume(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        Ok(expr)
    }

    /// Additive expressions bind loosest: `cmp (('+' | '-') cmp)*`.
    fn parse_expr(&mut self) -> Result<Expr<Untyped>> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ArithOperator::Add,
                TokenKind::Minus => ArithOperator::Sub,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_comparison()?;
            let span = lhs.span.to(rhs.span);
            let kind = ExprKind::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
            lhs = Expr { kind, span, ty: () };
        }
        Ok(lhs)
    }

    /// Comparisons fold left: `a < b < c` is `(a < b) < c`.
    fn parse_comparison(&mut self) -> Result<Expr<Untyped>> {
        let mut lhs = self.parse_primary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => CompareOperator::Eq,
                TokenKind::NotEq => CompareOperator::Ne,
                TokenKind::Less => CompareOperator::Lt,
                TokenKind::LessEq => CompareOperator::Le,
                TokenKind::Greater => CompareOperator::Gt,
                TokenKind::GreaterEq => CompareOperator::Ge,
                _ => break,
            };
            self.advance()?;
            let rhs = self.parse_primary()?;
            let span = lhs.span.to(rhs.span);
            let kind = ExprKind::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
            lhs = Expr { kind, span, ty: () };
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr<Untyped>> {
        let token = self.peek();
        let (kind, span) = match token.kind {
            TokenKind::IntLiteral => {
                self.advance()?;
                let Ok(value) = extract::int(token) else {
                    let error = Error::IntOutOfRange(Box::from(token.text));
                    return Err(token.span.wrap(error));
                };
                (ExprKind::Int(value), token.span)
            }
            TokenKind::StringLiteral => {
                self.advance()?;
                (ExprKind::String(extract::string(token)), token.span)
            }
            TokenKind::Identifier => {
                let ident = self.parse_ident()?;
                // An identifier immediately followed by `(` is a call.
                if self.take(TokenKind::LParen)? {
                    let args = self.parse_list(TokenKind::RParen, Parser::parse_expr)?;
                    let end = self.consume(TokenKind::RParen)?;
                    let span = ident.span.to(end.span);
                    (ExprKind::Call { callee: ident, args }, span)
                } else {
                    let span = ident.span;
                    (ExprKind::Ident(ident, ()), span)
                }
            }
            // Grouping: ( expr ). The tree keeps no trace of the parentheses.
            TokenKind::LParen => return self.parse_paren_expr(),
            other => return Err(self.error(Error::ExpectedExpr(other))),
        };
        Ok(Expr { kind, span, ty: () })
    }

    /// Parses `[item (',' item)*]` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.is(end_delim) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma)? {
                break;
            }
        }
        Ok(items)
    }
}

impl<'src> Parser<'src> {
    /// Creates a parser and pulls the first token.
    fn new(src: &'src str) -> Result<Parser<'src>> {
        let mut lexer = Lexer::new(src);
        let current = lexer.next_token().map_err(from_lexer)?;
        Ok(Parser { lexer, current })
    }

    /// Returns the current token.
    fn peek(&self) -> Token<'src> {
        self.current
    }

    /// Returns the current token and pulls the next one from the lexer.
    fn advance(&mut self) -> Result<Token<'src>> {
        let next = self.lexer.next_token().map_err(from_lexer)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.current.kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> Result<bool> {
        if self.is(expect) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Advances if the current token matches the provided one. If not, fails
    /// with an error at the current token.
    fn consume(&mut self, expect: TokenKind) -> Result<Token<'src>> {
        if self.is(expect) {
            self.advance()
        } else {
            Err(self.error(Error::Unexpected {
                expected: expect,
                actual: self.current.kind,
            }))
        }
    }

    /// Wraps the error in the span of the current token.
    fn error(&self, error: Error) -> Spanned<Error> {
        self.current.span.wrap(error)
    }
}

fn from_lexer(error: Spanned<lexer::Error>) -> Spanned<Error> {
    error.span.wrap(Error::Lexer(error.inner))
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(lexer::Error),
    #[error("expected {expected}, found {actual}")]
    Unexpected {
        expected: TokenKind,
        actual: TokenKind,
    },
    #[error("expected a type, found {0}")]
    ExpectedType(TokenKind),
    #[error("expected an expression, found {0}")]
    ExpectedExpr(TokenKind),
    #[error("expected a statement, found {0}")]
    ExpectedStmt(TokenKind),
    #[error("integer literal {0} is out of range")]
    IntOutOfRange(Box<str>),
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_integer_literal_expr() {
            let expr = "12345";
            let tree_ok = "int 12345";
        }

        fn test_string_literal_expr() {
            let expr = r#""hello world""#;
            let tree_ok = r#"string "hello world""#;
        }

        fn test_string_literal_has_no_escapes() {
            let expr = r#""a\n""#;
            let tree_ok = r#"string "a\\n""#;
        }

        fn test_identifier_expr() {
            let expr = "myVar";
            let tree_ok = "ident myVar";
        }

        fn test_parenthesized_expr() {
            let expr = "((x))";
            let tree_ok = "ident x";
        }

        fn test_additive_left_fold() {
            let expr = "a - b + c";
            let tree_ok = "
                arith +
                  arith -
                    ident a
                    ident b
                  ident c
            ";
        }

        fn test_comparison_left_fold() {
            let expr = "a < b < c";
            let tree_ok = "
                compare <
                  compare <
                    ident a
                    ident b
                  ident c
            ";
        }

        fn test_comparison_binds_tighter_than_additive() {
            let expr = "a + b >= c - d";
            let tree_ok = "
                arith -
                  arith +
                    ident a
                    compare >=
                      ident b
                      ident c
                  ident d
            ";
        }

        fn test_parens_override_precedence() {
            let expr = "(a + b) != c";
            let tree_ok = "
                compare !=
                  arith +
                    ident a
                    ident b
                  ident c
            ";
        }

        fn test_every_comparison_operator() {
            let expr = "a == b != c < d <= e > f >= g";
            let tree_ok = "
                compare >=
                  compare >
                    compare <=
                      compare <
                        compare !=
                          compare ==
                            ident a
                            ident b
                          ident c
                        ident d
                      ident e
                    ident f
                  ident g
            ";
        }

        fn test_call_no_args() {
            let expr = "f()";
            let tree_ok = "call f";
        }

        fn test_call_multiple_args() {
            let expr = r#"f(1, g(x), "s" + 2)"#;
            let tree_ok = r#"
                call f
                  int 1
                  call g
                    ident x
                  arith +
                    string "s"
                    int 2
            "#;
        }

        fn test_function_and_statements() {
            let program = "
                func main() -> int {
                    int x = 1;
                    manual string s;
                    x = x + 1;
                    print(x);
                    return x;
                }
            ";
            let tree_ok = r#"
                func main() -> int
                  declare int x
                    int 1
                  declare manual string s
                  assign x
                    arith +
                      ident x
                      int 1
                  print
                    ident x
                  return
                    ident x
            "#;
        }

        fn test_params_and_control_flow() {
            let program = "
                func f(int a, string b) -> string {
                    if (a < 1) { return b; } else { a = 0; }
                    while (a) { a = a - 1; }
                    if (a) { }
                    return;
                }
                func main() -> int { return 0; }
            ";
            let tree_ok = "
                func f(int a, string b) -> string
                  if
                    compare <
                      ident a
                      int 1
                    then
                      return
                        ident b
                    else
                      assign a
                        int 0
                  while
                    ident a
                    do
                      assign a
                        arith -
                          ident a
                          int 1
                  if
                    ident a
                    then
                  return
                func main() -> int
                  return
                    int 0
            ";
        }

        fn test_empty_program() {
            let program = "  // nothing here\n";
            let tree_ok = "";
        }

        fn test_error_missing_semicolon() {
            let program = "func main() -> int {\n  return 0\n}";
            let expected_error = "line 3: expected `;`, found `}`";
        }

        fn test_error_missing_arrow() {
            let program = "func main() int { }";
            let expected_error = "line 1: expected `->`, found `int`";
        }

        fn test_error_bad_type() {
            let program = "func main() -> void { }";
            let expected_error = "line 1: expected a type, found identifier";
        }

        fn test_error_statement_expected() {
            let program = "func main() -> int {\n  + 1;\n}";
            let expected_error = "line 2: expected a statement, found `+`";
        }

        fn test_error_multiplicative_is_not_an_expression() {
            let program = "func main() -> int { int x = 2 * 3; }";
            let expected_error = "line 1: expected `;`, found `*`";
        }

        fn test_error_expression_expected() {
            let expr = "1 + ;";
            let expected_error = "line 1: expected an expression, found `;`";
        }

        fn test_error_unclosed_paren() {
            let expr = "(1 + 2";
            let expected_error = "line 1: expected `)`, found end of input";
        }

        fn test_error_trailing_comma() {
            let expr = "f(1,)";
            let expected_error = "line 1: expected an expression, found `)`";
        }

        fn test_error_int_out_of_range() {
            let expr = "2147483648";
            let expected_error = "line 1: integer literal 2147483648 is out of range";
        }

        fn test_error_lexer_is_forwarded() {
            let program = "func main() -> int {\n\n  string s = \"abc;\n}";
            let expected_error = "line 3: unterminated string literal";
        }

        fn test_error_lone_bang() {
            let expr = "a ! b";
            let expected_error = "line 1: '!' must be followed by '='";
        }

        fn test_error_missing_function_keyword() {
            let program = "main() -> int { }";
            let expected_error = "line 1: expected `func`, found identifier";
        }
    );
}
