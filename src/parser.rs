use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::{LocatedToken, SourceLocation, Token};

pub struct Parser {
    tokens: Vec<LocatedToken>,
    position: usize,
    ast: Ast,
}

impl Parser {
    pub fn new(tokens: Vec<LocatedToken>) -> Self {
        Parser {
            tokens,
            position: 0,
            ast: Ast::new(),
        }
    }

    /// Get the current token
    fn current_token(&self) -> &Token {
        &self.tokens[self.position].token
    }

    /// Get the current location
    fn current_location(&self) -> SourceLocation {
        self.tokens[self.position].location
    }

    pub fn parse(mut self) -> Result<Ast, CompileError> {
        while !self.is_at_end() {
            if self.current_token() == &Token::Eof {
                break;
            }
            self.parse_file_scope_item()?;
        }
        Ok(self.ast)
    }

    /// A file-scope item is either a global declaration list or a function
    /// definition/prototype; both start with a specifier and a declarator.
    fn parse_file_scope_item(&mut self) -> Result<(), CompileError> {
        let location = self.current_location();
        let base = self.parse_specifier()?;
        let ty = self.parse_pointers(base.clone());
        let name = self.expect_identifier()?;

        if self.current_token() == &Token::OpenParen {
            return self.parse_function(ty, name, location);
        }

        let mut decls = vec![Decl { name, ty, location }];
        while self.matches(&Token::Comma) {
            let location = self.current_location();
            let ty = self.parse_pointers(base.clone());
            let name = self.expect_identifier()?;
            decls.push(Decl { name, ty, location });
        }
        self.expect(&Token::Semicolon)?;
        self.ast.declarations.extend(decls);
        Ok(())
    }

    fn parse_function(
        &mut self,
        ret: Type,
        name: String,
        location: SourceLocation,
    ) -> Result<(), CompileError> {
        self.expect(&Token::OpenParen)?;

        let mut params = Vec::new();
        let mut variadic = false;
        if self.current_token() != &Token::CloseParen {
            loop {
                if self.current_token() == &Token::Ellipsis {
                    self.advance();
                    variadic = true;
                    break;
                }
                let location = self.current_location();
                let base = self.parse_specifier()?;
                let ty = self.parse_pointers(base);
                let name = self.expect_identifier()?;
                params.push(Decl { name, ty, location });
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::CloseParen)?;

        let body = if self.matches(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_block()?)
        };

        self.ast.functions.push(Function {
            name,
            ret,
            params,
            variadic,
            body,
            location,
            id: None,
            param_symbols: Vec::new(),
            locals: Vec::new(),
        });
        Ok(())
    }

    fn parse_specifier(&mut self) -> Result<Type, CompileError> {
        let ty = match self.current_token() {
            Token::Char => Type::Char,
            Token::Int => Type::Int,
            Token::Long => Type::Long,
            other => {
                return Err(CompileError::with_location(
                    format!("expected type specifier, got '{}'", other),
                    self.current_location(),
                ))
            }
        };
        self.advance();
        Ok(ty)
    }

    fn parse_pointers(&mut self, mut ty: Type) -> Type {
        while self.matches(&Token::Star) {
            ty = Type::Pointer(Box::new(ty));
        }
        ty
    }

    fn is_specifier(&self) -> bool {
        matches!(
            self.current_token(),
            Token::Char | Token::Int | Token::Long
        )
    }

    fn parse_block(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::OpenBrace)?;
        let mut stmts = Vec::new();

        // Declarations come first in each block, C89 style.
        while self.is_specifier() {
            let (decls, inits) = self.parse_declaration()?;
            stmts.push(Stmt::Declaration(decls));
            stmts.extend(inits);
        }

        while self.current_token() != &Token::CloseBrace {
            if self.current_token() == &Token::Eof {
                return Err(CompileError::with_location(
                    "expected '}'".to_string(),
                    self.current_location(),
                ));
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(&Token::CloseBrace)?;
        Ok(Stmt::Block(stmts))
    }

    /// Parse `specifier declarator [= expr] {, declarator [= expr]} ;`.
    /// Initializers desugar to assignment statements following the
    /// declaration.
    fn parse_declaration(&mut self) -> Result<(Vec<Decl>, Vec<Stmt>), CompileError> {
        let base = self.parse_specifier()?;
        let mut decls = Vec::new();
        let mut inits = Vec::new();
        loop {
            let location = self.current_location();
            let ty = self.parse_pointers(base.clone());
            let name = self.expect_identifier()?;
            decls.push(Decl {
                name: name.clone(),
                ty,
                location,
            });
            if self.matches(&Token::Assign) {
                let left = self.ast.add_expr(Expr {
                    kind: ExprKind::Identifier { name, symbol: None },
                    ty: Type::Int,
                    location,
                });
                let right = self.parse_expression()?;
                inits.push(Stmt::Assignment {
                    left,
                    right,
                    location,
                });
            }
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semicolon)?;
        Ok((decls, inits))
    }

    fn parse_statement(&mut self) -> Result<Stmt, CompileError> {
        match self.current_token() {
            Token::OpenBrace => self.parse_block(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Break => {
                let location = self.current_location();
                self.advance();
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Break(location))
            }
            Token::Return => {
                let location = self.current_location();
                self.advance();
                let expr = if self.current_token() == &Token::Semicolon {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Return { expr, location })
            }
            _ => {
                let stmt = self.parse_assignment_or_expression()?;
                self.expect(&Token::Semicolon)?;
                Ok(stmt)
            }
        }
    }

    /// `lvalue = expr` is a statement in Simple C, not an expression.
    fn parse_assignment_or_expression(&mut self) -> Result<Stmt, CompileError> {
        let location = self.current_location();
        let left = self.parse_expression()?;
        if self.matches(&Token::Assign) {
            let right = self.parse_expression()?;
            Ok(Stmt::Assignment {
                left,
                right,
                location,
            })
        } else {
            Ok(Stmt::Simple(left))
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::If)?;
        self.expect(&Token::OpenParen)?;
        let cond = self.parse_expression()?;
        self.expect(&Token::CloseParen)?;
        let then_stmt = Box::new(self.parse_statement()?);
        let else_stmt = if self.matches(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_stmt,
            else_stmt,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::While)?;
        self.expect(&Token::OpenParen)?;
        let cond = self.parse_expression()?;
        self.expect(&Token::CloseParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::For)?;
        self.expect(&Token::OpenParen)?;
        let init = Box::new(self.parse_assignment_or_expression()?);
        self.expect(&Token::Semicolon)?;
        let cond = self.parse_expression()?;
        self.expect(&Token::Semicolon)?;
        let incr = Box::new(self.parse_assignment_or_expression()?);
        self.expect(&Token::CloseParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            incr,
            body,
        })
    }

    fn parse_expression(&mut self) -> Result<ExprId, CompileError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<ExprId, CompileError> {
        let mut left = self.parse_logical_and()?;
        while self.current_token() == &Token::OrOr {
            let location = self.current_location();
            self.advance();
            let right = self.parse_logical_and()?;
            left = self.add_binary(BinOp::LogicalOr, left, right, location);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<ExprId, CompileError> {
        let mut left = self.parse_equality()?;
        while self.current_token() == &Token::AndAnd {
            let location = self.current_location();
            self.advance();
            let right = self.parse_equality()?;
            left = self.add_binary(BinOp::LogicalAnd, left, right, location);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<ExprId, CompileError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current_token() {
                Token::EqualEqual => BinOp::Equal,
                Token::NotEqual => BinOp::NotEqual,
                _ => break,
            };
            let location = self.current_location();
            self.advance();
            let right = self.parse_relational()?;
            left = self.add_binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<ExprId, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_token() {
                Token::Less => BinOp::Less,
                Token::Greater => BinOp::Greater,
                Token::LessEqual => BinOp::LessEqual,
                Token::GreaterEqual => BinOp::GreaterEqual,
                _ => break,
            };
            let location = self.current_location();
            self.advance();
            let right = self.parse_additive()?;
            left = self.add_binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<ExprId, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };
            let location = self.current_location();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.add_binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprId, CompileError> {
        let mut left = self.parse_prefix()?;
        loop {
            let op = match self.current_token() {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Remainder,
                _ => break,
            };
            let location = self.current_location();
            self.advance();
            let right = self.parse_prefix()?;
            left = self.add_binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<ExprId, CompileError> {
        let location = self.current_location();
        match self.current_token() {
            Token::Not => {
                self.advance();
                let expr = self.parse_prefix()?;
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Not(expr),
                    ty: Type::Int,
                    location,
                }))
            }
            Token::Minus => {
                self.advance();
                let expr = self.parse_prefix()?;
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Negate(expr),
                    ty: Type::Int,
                    location,
                }))
            }
            Token::Amp => {
                self.advance();
                let expr = self.parse_prefix()?;
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Address(expr),
                    ty: Type::Int,
                    location,
                }))
            }
            Token::Star => {
                self.advance();
                let expr = self.parse_prefix()?;
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Dereference(expr),
                    ty: Type::Int,
                    location,
                }))
            }
            Token::OpenParen if self.peek_is_specifier() => {
                self.advance();
                let base = self.parse_specifier()?;
                let ty = self.parse_pointers(base);
                self.expect(&Token::CloseParen)?;
                let expr = self.parse_prefix()?;
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Cast(expr),
                    ty,
                    location,
                }))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<ExprId, CompileError> {
        let location = self.current_location();
        match self.current_token().clone() {
            Token::Number(n) => {
                self.advance();
                // Literals are int unless they need 8 bytes.
                let ty = if i32::try_from(n).is_ok() {
                    Type::Int
                } else {
                    Type::Long
                };
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Number(n),
                    ty,
                    location,
                }))
            }
            Token::CharLiteral(c) => {
                self.advance();
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::Number(c),
                    ty: Type::Int,
                    location,
                }))
            }
            Token::StringLiteral(s) => {
                self.advance();
                Ok(self.ast.add_expr(Expr {
                    kind: ExprKind::String(s),
                    ty: Type::Char,
                    location,
                }))
            }
            Token::Identifier(name) => {
                self.advance();
                if self.matches(&Token::OpenParen) {
                    let mut args = Vec::new();
                    if self.current_token() != &Token::CloseParen {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.matches(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::CloseParen)?;
                    Ok(self.ast.add_expr(Expr {
                        kind: ExprKind::Call {
                            name,
                            symbol: None,
                            args,
                        },
                        ty: Type::Int,
                        location,
                    }))
                } else {
                    Ok(self.ast.add_expr(Expr {
                        kind: ExprKind::Identifier { name, symbol: None },
                        ty: Type::Int,
                        location,
                    }))
                }
            }
            Token::OpenParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&Token::CloseParen)?;
                Ok(expr)
            }
            other => Err(CompileError::with_location(
                format!("expected expression, got '{}'", other),
                location,
            )),
        }
    }

    fn add_binary(
        &mut self,
        op: BinOp,
        left: ExprId,
        right: ExprId,
        location: SourceLocation,
    ) -> ExprId {
        self.ast.add_expr(Expr {
            kind: ExprKind::Binary { op, left, right },
            ty: Type::Int,
            location,
        })
    }

    fn peek_is_specifier(&self) -> bool {
        matches!(
            self.tokens.get(self.position + 1).map(|t| &t.token),
            Some(Token::Char) | Some(Token::Int) | Some(Token::Long)
        )
    }

    fn expect_identifier(&mut self) -> Result<String, CompileError> {
        match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(CompileError::with_location(
                format!("expected identifier, got '{}'", other),
                self.current_location(),
            )),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), CompileError> {
        if self.current_token() == token {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::with_location(
                format!("expected '{}', got '{}'", token, self.current_token()),
                self.current_location(),
            ))
        }
    }

    fn matches(&mut self, token: &Token) -> bool {
        if self.current_token() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }
}
