use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};

pub fn parse_file(source: &str) -> Result<File, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    next_id: NodeId,
}

/// A statement headed by an expression list, before we know whether it is an
/// assignment, a send, an inc/dec, or a bare expression.
enum SimpleStmt {
    Stmt(Stmt),
    Labeled(Ident),
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            next_id: 0,
        }
    }

    fn parse(mut self) -> Result<File, SyntaxErrors> {
        let start = self.current_span().start;
        let package = match self.parse_package_clause() {
            Ok(name) => name,
            Err(err) => {
                return Err(SyntaxErrors::new(vec![err]));
            }
        };

        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            match self.parse_import_decl() {
                Ok(mut batch) => imports.append(&mut batch),
                Err(err) => return Err(SyntaxErrors::new(vec![err])),
            }
        }

        let mut decls = Vec::new();
        while !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            match self.parse_func_decl() {
                Ok(decl) => decls.push(decl),
                Err(err) => {
                    self.errors.push(err);
                    break;
                }
            }
        }

        if self.errors.is_empty() {
            let end = self.current_span().end;
            Ok(File {
                package,
                imports,
                decls,
                span: Span::new(start, end),
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_package_clause(&mut self) -> Result<String, SyntaxError> {
        self.expect(TokenKind::Package)?;
        let name = self.expect_identifier("Expected package name")?;
        self.consume_optional(&TokenKind::Semi);
        Ok(name.name)
    }

    fn parse_import_decl(&mut self) -> Result<Vec<Import>, SyntaxError> {
        let start = self.expect(TokenKind::Import)?.span.start;
        let mut imports = Vec::new();
        if self.matches(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.is_eof() {
                if self.matches(&TokenKind::Semi) {
                    continue;
                }
                imports.push(self.parse_import_spec(start)?);
            }
            self.expect(TokenKind::RParen)?;
        } else {
            imports.push(self.parse_import_spec(start)?);
        }
        self.consume_optional(&TokenKind::Semi);
        Ok(imports)
    }

    fn parse_import_spec(&mut self, start: usize) -> Result<Import, SyntaxError> {
        let alias = if let TokenKind::Identifier(_) = self.current_kind() {
            Some(self.expect_identifier("Expected import alias")?.name)
        } else {
            None
        };
        let path = self.expect_string_literal("Expected import path string")?;
        let end = self.prev_span_end(start);
        Ok(Import {
            path,
            alias,
            span: Span::new(start, end),
        })
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, SyntaxError> {
        if !self.check(&TokenKind::Func) {
            return Err(self.error_here(format!(
                "Expected declaration, found {}",
                self.describe_current()
            )));
        }
        let start = self.expect(TokenKind::Func)?.span.start;
        let name = self.expect_identifier("Expected function name")?;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        let end = body.span.end;
        Ok(FuncDecl {
            name: name.name,
            body,
            span: Span::new(start, end),
        })
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let id = self.fresh_id();
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
            if !self.check(&TokenKind::RBrace) {
                self.expect_stmt_end()?;
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(Block {
            id,
            stmts,
            span: Span::new(start, end),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        match self.current_kind() {
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::Const => Err(self
                .error_here("Constant declarations are not supported")
                .with_help("declare a variable with var instead")),
            TokenKind::TypeKw => Err(self.error_here("Type declarations are not supported")),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Goto
            | TokenKind::Fallthrough => self.parse_branch(),
            TokenKind::If => self.parse_if().map(|s| Stmt::If(Box::new(s))),
            TokenKind::For => self.parse_for(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Go => self.parse_go(),
            TokenKind::Defer => self.parse_defer(),
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Semi => {
                self.bump();
                Ok(Stmt::Empty)
            }
            _ => match self.parse_simple_stmt()? {
                SimpleStmt::Stmt(stmt) => Ok(stmt),
                SimpleStmt::Labeled(label) => {
                    let stmt = self.parse_stmt()?;
                    let span = Span::new(label.span.start, stmt.span().end);
                    Ok(Stmt::Labeled(Box::new(LabeledStmt { label, stmt, span })))
                }
            },
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Var)?.span.start;
        let mut names = vec![self.expect_identifier("Expected variable name")?];
        while self.matches(&TokenKind::Comma) {
            names.push(self.expect_identifier("Expected variable name")?);
        }
        let ty = if !self.check(&TokenKind::Eq) && !self.check(&TokenKind::Semi) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.matches(&TokenKind::Eq) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        if ty.is_none() && values.is_empty() {
            return Err(self.error_here("Variable declaration needs a type or an initializer"));
        }
        let end = self.prev_span_end(start);
        Ok(Stmt::VarDecl(VarDeclStmt {
            names,
            ty,
            values,
            span: Span::new(start, end),
        }))
    }

    fn parse_return(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Return)?.span.start;
        let results = if self.check(&TokenKind::Semi)
            || self.check(&TokenKind::RBrace)
            || self.is_eof()
        {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        let end = self.prev_span_end(start);
        Ok(Stmt::Return(ReturnStmt {
            results,
            span: Span::new(start, end),
        }))
    }

    fn parse_branch(&mut self) -> Result<Stmt, SyntaxError> {
        let tok = self.bump_token();
        let kind = match tok.kind {
            TokenKind::Break => BranchKind::Break,
            TokenKind::Continue => BranchKind::Continue,
            TokenKind::Goto => BranchKind::Goto,
            TokenKind::Fallthrough => BranchKind::Fallthrough,
            _ => unreachable!("parse_branch called on a non-branch token"),
        };
        let label = if let TokenKind::Identifier(_) = self.current_kind() {
            Some(self.expect_identifier("Expected label")?)
        } else {
            None
        };
        let end = self.prev_span_end(tok.span.start);
        Ok(Stmt::Branch(BranchStmt {
            kind,
            label,
            span: Span::new(tok.span.start, end),
        }))
    }

    fn parse_if(&mut self) -> Result<IfStmt, SyntaxError> {
        let start = self.expect(TokenKind::If)?.span.start;
        let (init, cond) = self.parse_header_clause()?;
        let then = self.parse_block()?;
        let els = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Stmt::If(Box::new(self.parse_if()?)))
            } else {
                Some(Stmt::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let end = self.prev_span_end(start);
        Ok(IfStmt {
            init,
            cond,
            then,
            els,
            span: Span::new(start, end),
        })
    }

    /// Parses `[init ;] cond` as used by `if`. The init clause is detected
    /// after the fact: a simple statement followed by a semicolon.
    fn parse_header_clause(&mut self) -> Result<(Option<Stmt>, Expr), SyntaxError> {
        let first = self.parse_simple_stmt()?;
        match first {
            SimpleStmt::Labeled(_) => Err(self.error_here("Unexpected label in condition")),
            SimpleStmt::Stmt(stmt) => {
                if self.matches(&TokenKind::Semi) {
                    let cond = self.parse_expr()?;
                    Ok((Some(stmt), cond))
                } else {
                    match stmt {
                        Stmt::Expr(es) => Ok((None, es.expr)),
                        _ => Err(self.error_here("Expected condition expression")),
                    }
                }
            }
        }
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::For)?.span.start;

        // `for { ... }`
        if self.check(&TokenKind::LBrace) {
            let body = self.parse_block()?;
            let end = body.span.end;
            return Ok(Stmt::For(Box::new(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
                span: Span::new(start, end),
            })));
        }

        // `for range x { ... }`
        if self.check(&TokenKind::Range) {
            self.bump();
            let collection = self.parse_expr()?;
            let body = self.parse_block()?;
            let end = body.span.end;
            return Ok(Stmt::Range(Box::new(RangeStmt {
                key: None,
                value: None,
                tok: None,
                collection,
                body,
                span: Span::new(start, end),
            })));
        }

        let first = self.parse_simple_stmt_allow_range()?;
        match first {
            RangeHeader::Range(key, value, tok) => {
                let collection = self.parse_expr()?;
                let body = self.parse_block()?;
                let end = body.span.end;
                Ok(Stmt::Range(Box::new(RangeStmt {
                    key,
                    value,
                    tok,
                    collection,
                    body,
                    span: Span::new(start, end),
                })))
            }
            RangeHeader::Simple(SimpleStmt::Labeled(_)) => {
                Err(self.error_here("Unexpected label in for header"))
            }
            RangeHeader::Simple(SimpleStmt::Stmt(stmt)) => {
                if self.matches(&TokenKind::Semi) {
                    // Three-clause form.
                    let cond = if self.check(&TokenKind::Semi) {
                        None
                    } else {
                        Some(self.parse_expr()?)
                    };
                    self.expect(TokenKind::Semi)?;
                    let post = if self.check(&TokenKind::LBrace) {
                        None
                    } else {
                        match self.parse_simple_stmt()? {
                            SimpleStmt::Stmt(post) => Some(post),
                            SimpleStmt::Labeled(_) => {
                                return Err(self.error_here("Unexpected label in for header"));
                            }
                        }
                    };
                    let body = self.parse_block()?;
                    let end = body.span.end;
                    Ok(Stmt::For(Box::new(ForStmt {
                        init: Some(stmt),
                        cond,
                        post,
                        body,
                        span: Span::new(start, end),
                    })))
                } else {
                    // Condition-only form.
                    let cond = match stmt {
                        Stmt::Expr(es) => es.expr,
                        _ => return Err(self.error_here("Expected loop condition")),
                    };
                    let body = self.parse_block()?;
                    let end = body.span.end;
                    Ok(Stmt::For(Box::new(ForStmt {
                        init: None,
                        cond: Some(cond),
                        post: None,
                        body,
                        span: Span::new(start, end),
                    })))
                }
            }
        }
    }

    fn parse_select(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Select)?.span.start;
        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            cases.push(self.parse_select_case()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(Stmt::Select(SelectStmt {
            cases,
            span: Span::new(start, end),
        }))
    }

    fn parse_select_case(&mut self) -> Result<SelectCase, SyntaxError> {
        let start = self.current_span().start;
        let comm = if self.matches(&TokenKind::Default) {
            self.expect(TokenKind::Colon)?;
            CommClause::Default
        } else {
            self.expect(TokenKind::Case)?;
            let stmt = match self.parse_simple_stmt()? {
                SimpleStmt::Stmt(stmt) => stmt,
                SimpleStmt::Labeled(_) => {
                    return Err(self.error_here("Unexpected label in select case"));
                }
            };
            self.expect(TokenKind::Colon)?;
            self.classify_comm_clause(stmt)?
        };

        let mut body = Vec::new();
        while !self.check(&TokenKind::Case)
            && !self.check(&TokenKind::Default)
            && !self.check(&TokenKind::RBrace)
            && !self.is_eof()
        {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            body.push(self.parse_stmt()?);
            if !self.check(&TokenKind::Case)
                && !self.check(&TokenKind::Default)
                && !self.check(&TokenKind::RBrace)
            {
                self.expect_stmt_end()?;
            }
        }
        let end = self.prev_span_end(start);
        Ok(SelectCase {
            comm,
            body,
            span: Span::new(start, end),
        })
    }

    fn classify_comm_clause(&mut self, stmt: Stmt) -> Result<CommClause, SyntaxError> {
        match stmt {
            Stmt::Send(send) => Ok(CommClause::Send(send)),
            Stmt::Expr(es) => {
                let chan = match strip_parens(&es.expr) {
                    Expr {
                        kind: ExprKind::Unary {
                            op: UnaryOp::Recv,
                            operand,
                        },
                        ..
                    } => operand.as_ref().clone(),
                    _ => {
                        return Err(self.error_here(
                            "Select case must be a send or a receive operation",
                        ));
                    }
                };
                Ok(CommClause::Recv {
                    lhs: Vec::new(),
                    tok: None,
                    chan,
                })
            }
            Stmt::Assign(assign) => {
                if assign.rhs.len() != 1 {
                    return Err(
                        self.error_here("Select receive must have a single channel operand")
                    );
                }
                let chan = match strip_parens(&assign.rhs[0]) {
                    Expr {
                        kind: ExprKind::Unary {
                            op: UnaryOp::Recv,
                            operand,
                        },
                        ..
                    } => operand.as_ref().clone(),
                    _ => {
                        return Err(self.error_here(
                            "Select case must be a send or a receive operation",
                        ));
                    }
                };
                Ok(CommClause::Recv {
                    lhs: assign.lhs,
                    tok: Some(assign.tok),
                    chan,
                })
            }
            _ => Err(self.error_here("Select case must be a send or a receive operation")),
        }
    }

    fn parse_go(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Go)?.span.start;
        let call = self.parse_expr()?;
        let end = call.span.end;
        Ok(Stmt::Go(GoStmt {
            call,
            span: Span::new(start, end),
        }))
    }

    fn parse_defer(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Defer)?.span.start;
        let call = self.parse_expr()?;
        let end = call.span.end;
        Ok(Stmt::Defer(DeferStmt {
            call,
            span: Span::new(start, end),
        }))
    }

    fn parse_simple_stmt(&mut self) -> Result<SimpleStmt, SyntaxError> {
        match self.parse_simple_stmt_allow_range()? {
            RangeHeader::Simple(simple) => Ok(simple),
            RangeHeader::Range(..) => Err(self.error_here("Unexpected range clause")),
        }
    }

    fn parse_simple_stmt_allow_range(&mut self) -> Result<RangeHeader, SyntaxError> {
        let exprs = self.parse_expr_list()?;
        let start = exprs[0].span.start;

        match self.current_kind() {
            TokenKind::ColonEq | TokenKind::Eq => {
                let tok = if self.check(&TokenKind::ColonEq) {
                    AssignTok::Define
                } else {
                    AssignTok::Assign
                };
                self.bump();
                if self.check(&TokenKind::Range) {
                    self.bump();
                    let mut iter = exprs.into_iter();
                    let key = iter.next();
                    let value = iter.next();
                    return Ok(RangeHeader::Range(key, value, Some(tok)));
                }
                let rhs = self.parse_expr_list()?;
                let end = rhs.last().map(|e| e.span.end).unwrap_or(start);
                Ok(RangeHeader::Simple(SimpleStmt::Stmt(Stmt::Assign(
                    AssignStmt {
                        lhs: exprs,
                        tok,
                        rhs,
                        span: Span::new(start, end),
                    },
                ))))
            }
            TokenKind::Arrow if exprs.len() == 1 => {
                self.bump();
                let value = self.parse_expr()?;
                let end = value.span.end;
                let chan = exprs.into_iter().next().expect("send channel operand");
                Ok(RangeHeader::Simple(SimpleStmt::Stmt(Stmt::Send(
                    SendStmt {
                        chan,
                        value,
                        span: Span::new(start, end),
                    },
                ))))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus if exprs.len() == 1 => {
                let dec = self.check(&TokenKind::MinusMinus);
                let end = self.bump_token().span.end;
                let expr = exprs.into_iter().next().expect("inc/dec operand");
                Ok(RangeHeader::Simple(SimpleStmt::Stmt(Stmt::IncDec(
                    IncDecStmt {
                        expr,
                        dec,
                        span: Span::new(start, end),
                    },
                ))))
            }
            TokenKind::Colon if exprs.len() == 1 => {
                let expr = exprs.into_iter().next().expect("label operand");
                if let ExprKind::Ident(name) = &expr.kind {
                    self.bump();
                    Ok(RangeHeader::Simple(SimpleStmt::Labeled(Ident {
                        id: expr.id,
                        name: name.clone(),
                        span: expr.span,
                    })))
                } else {
                    Err(self.error_here("Label must be an identifier"))
                }
            }
            _ => {
                if exprs.len() != 1 {
                    return Err(self.error_here("Expected assignment after expression list"));
                }
                let expr = exprs.into_iter().next().expect("expression statement");
                Ok(RangeHeader::Simple(SimpleStmt::Stmt(Stmt::Expr(ExprStmt {
                    expr,
                }))))
            }
        }
    }

    // ---- expressions ----

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.matches(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_expr(1)
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let Some((op, prec)) = self.current_binary_op() else {
                return Ok(left);
            };
            if prec < min_prec {
                return Ok(left);
            }
            self.bump();
            let right = self.parse_binary_expr(prec + 1)?;
            let span = left.span.merge(right.span);
            left = Expr {
                id: self.fresh_id(),
                span,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    fn current_binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.current_kind() {
            TokenKind::PipePipe => (BinaryOp::LogOr, 1),
            TokenKind::AmpersandAmpersand => (BinaryOp::LogAnd, 2),
            TokenKind::EqEq => (BinaryOp::Eq, 3),
            TokenKind::BangEq => (BinaryOp::NotEq, 3),
            TokenKind::Lt => (BinaryOp::Lt, 3),
            TokenKind::LtEq => (BinaryOp::LtEq, 3),
            TokenKind::Gt => (BinaryOp::Gt, 3),
            TokenKind::GtEq => (BinaryOp::GtEq, 3),
            TokenKind::Plus => (BinaryOp::Add, 4),
            TokenKind::Minus => (BinaryOp::Sub, 4),
            TokenKind::Pipe => (BinaryOp::Or, 4),
            TokenKind::Caret => (BinaryOp::Xor, 4),
            TokenKind::Star => (BinaryOp::Mul, 5),
            TokenKind::Slash => (BinaryOp::Div, 5),
            TokenKind::Percent => (BinaryOp::Rem, 5),
            TokenKind::Shl => (BinaryOp::Shl, 5),
            TokenKind::Shr => (BinaryOp::Shr, 5),
            TokenKind::Ampersand => (BinaryOp::And, 5),
            TokenKind::AmpCaret => (BinaryOp::AndNot, 5),
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.current_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Caret => Some(UnaryOp::BitNot),
            TokenKind::Ampersand => Some(UnaryOp::Addr),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Arrow => Some(UnaryOp::Recv),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.bump_token().span.start;
            let operand = self.parse_unary_expr()?;
            let span = Span::new(start, operand.span.end);
            return Ok(Expr {
                id: self.fresh_id(),
                span,
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_operand()?;
        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    self.bump();
                    if self.matches(&TokenKind::LParen) {
                        let ty = self.parse_type()?;
                        let end = self.expect(TokenKind::RParen)?.span.end;
                        let span = Span::new(expr.span.start, end);
                        expr = Expr {
                            id: self.fresh_id(),
                            span,
                            kind: ExprKind::TypeAssert {
                                expr: Box::new(expr),
                                ty,
                            },
                        };
                    } else {
                        let sel = self.expect_identifier("Expected field or package member")?;
                        let span = Span::new(expr.span.start, sel.span.end);
                        expr = Expr {
                            id: self.fresh_id(),
                            span,
                            kind: ExprKind::Selector {
                                expr: Box::new(expr),
                                sel,
                            },
                        };
                    }
                }
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    while !self.check(&TokenKind::RParen) && !self.is_eof() {
                        args.push(self.parse_call_arg()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::RParen)?.span.end;
                    let span = Span::new(expr.span.start, end);
                    expr = Expr {
                        id: self.fresh_id(),
                        span,
                        kind: ExprKind::Call {
                            fun: Box::new(expr),
                            args,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    if self.check(&TokenKind::Colon) {
                        return Err(self
                            .error_here("Slice expressions are not supported")
                            .with_help("index one element at a time"));
                    }
                    let end = self.expect(TokenKind::RBracket)?.span.end;
                    let span = Span::new(expr.span.start, end);
                    expr = Expr {
                        id: self.fresh_id(),
                        span,
                        kind: ExprKind::Index {
                            expr: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// A call argument is an expression, except that type syntax is allowed
    /// where a type is expected (the first argument of `make`).
    fn parse_call_arg(&mut self) -> Result<Expr, SyntaxError> {
        if self.starts_composite_type() {
            let id = self.fresh_id();
            let ty = self.parse_type()?;
            return Ok(Expr {
                id,
                span: ty.span,
                kind: ExprKind::Type(ty),
            });
        }
        self.parse_expr()
    }

    fn starts_composite_type(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Chan
                | TokenKind::Map
                | TokenKind::LBracket
                | TokenKind::Struct
                | TokenKind::Interface
        )
    }

    fn parse_operand(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::Ident(name),
                })
            }
            TokenKind::Integer(value) => {
                self.bump();
                Ok(Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::IntLit(value),
                })
            }
            TokenKind::Float(value) => {
                self.bump();
                Ok(Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::FloatLit(value),
                })
            }
            TokenKind::Imaginary(value) => {
                self.bump();
                Ok(Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::ImagLit(value),
                })
            }
            TokenKind::String(value) => {
                self.bump();
                Ok(Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::StringLit(value),
                })
            }
            TokenKind::Rune(value) => {
                self.bump();
                Ok(Expr {
                    id: self.fresh_id(),
                    span,
                    kind: ExprKind::RuneLit(value),
                })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                let end = self.expect(TokenKind::RParen)?.span.end;
                Ok(Expr {
                    id: self.fresh_id(),
                    span: Span::new(span.start, end),
                    kind: ExprKind::Paren(Box::new(inner)),
                })
            }
            TokenKind::Func => self.parse_func_lit_or_type(),
            TokenKind::Chan
            | TokenKind::Map
            | TokenKind::LBracket
            | TokenKind::Struct
            | TokenKind::Interface => {
                let id = self.fresh_id();
                let ty = self.parse_type()?;
                Ok(Expr {
                    id,
                    span: ty.span,
                    kind: ExprKind::Type(ty),
                })
            }
            other => Err(self.error_here(format!(
                "Expected expression, found {}",
                describe_kind(&other)
            ))),
        }
    }

    fn parse_func_lit_or_type(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::Func)?.span.start;
        let sig = self.parse_func_signature(start)?;
        if self.check(&TokenKind::LBrace) {
            let id = self.fresh_id();
            let body = self.parse_block()?;
            let span = Span::new(start, body.span.end);
            Ok(Expr {
                id: self.fresh_id(),
                span,
                kind: ExprKind::FuncLit(std::sync::Arc::new(FuncLit {
                    id,
                    sig,
                    body,
                    span,
                })),
            })
        } else {
            let span = sig.span;
            Ok(Expr {
                id: self.fresh_id(),
                span,
                kind: ExprKind::Type(TypeExpr {
                    span,
                    kind: TypeExprKind::Func(sig),
                }),
            })
        }
    }

    // ---- types ----

    fn parse_type(&mut self) -> Result<TypeExpr, SyntaxError> {
        let span = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Identifier(_) => {
                let name = self.expect_identifier("Expected type name")?;
                if self.check(&TokenKind::Dot) {
                    self.bump();
                    let member = self.expect_identifier("Expected type name after '.'")?;
                    let end = member.span.end;
                    Ok(TypeExpr {
                        span: Span::new(span.start, end),
                        kind: TypeExprKind::Qualified {
                            pkg: name,
                            name: member,
                        },
                    })
                } else {
                    Ok(TypeExpr {
                        span: name.span,
                        kind: TypeExprKind::Name(name),
                    })
                }
            }
            TokenKind::Star => {
                self.bump();
                let elem = self.parse_type()?;
                Ok(TypeExpr {
                    span: Span::new(span.start, elem.span.end),
                    kind: TypeExprKind::Pointer(Box::new(elem)),
                })
            }
            TokenKind::LBracket => {
                self.bump();
                if self.matches(&TokenKind::RBracket) {
                    let elem = self.parse_type()?;
                    Ok(TypeExpr {
                        span: Span::new(span.start, elem.span.end),
                        kind: TypeExprKind::Slice(Box::new(elem)),
                    })
                } else {
                    let len = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let elem = self.parse_type()?;
                    Ok(TypeExpr {
                        span: Span::new(span.start, elem.span.end),
                        kind: TypeExprKind::Array {
                            len: Box::new(len),
                            elem: Box::new(elem),
                        },
                    })
                }
            }
            TokenKind::Map => {
                self.bump();
                self.expect(TokenKind::LBracket)?;
                let key = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                let value = self.parse_type()?;
                Ok(TypeExpr {
                    span: Span::new(span.start, value.span.end),
                    kind: TypeExprKind::Map {
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                })
            }
            TokenKind::Chan => {
                self.bump();
                let dir = if self.matches(&TokenKind::Arrow) {
                    ChanDirExpr::SendOnly
                } else {
                    ChanDirExpr::Both
                };
                let elem = self.parse_type()?;
                Ok(TypeExpr {
                    span: Span::new(span.start, elem.span.end),
                    kind: TypeExprKind::Chan {
                        dir,
                        elem: Box::new(elem),
                    },
                })
            }
            TokenKind::Arrow => {
                self.bump();
                self.expect(TokenKind::Chan)?;
                let elem = self.parse_type()?;
                Ok(TypeExpr {
                    span: Span::new(span.start, elem.span.end),
                    kind: TypeExprKind::Chan {
                        dir: ChanDirExpr::RecvOnly,
                        elem: Box::new(elem),
                    },
                })
            }
            TokenKind::Func => {
                self.bump();
                let sig = self.parse_func_signature(span.start)?;
                Ok(TypeExpr {
                    span: sig.span,
                    kind: TypeExprKind::Func(sig),
                })
            }
            TokenKind::Struct => {
                self.bump();
                self.expect(TokenKind::LBrace)?;
                let mut fields = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.is_eof() {
                    if self.matches(&TokenKind::Semi) {
                        continue;
                    }
                    let name = self.expect_identifier("Expected field name")?;
                    let ty = self.parse_type()?;
                    let field_span = Span::new(name.span.start, ty.span.end);
                    fields.push(FieldDecl {
                        name,
                        ty,
                        span: field_span,
                    });
                }
                let end = self.expect(TokenKind::RBrace)?.span.end;
                Ok(TypeExpr {
                    span: Span::new(span.start, end),
                    kind: TypeExprKind::Struct { fields },
                })
            }
            TokenKind::Interface => {
                self.bump();
                self.expect(TokenKind::LBrace)?;
                if !self.check(&TokenKind::RBrace) {
                    return Err(
                        self.error_here("Interface types with methods are not supported")
                    );
                }
                let end = self.expect(TokenKind::RBrace)?.span.end;
                Ok(TypeExpr {
                    span: Span::new(span.start, end),
                    kind: TypeExprKind::Interface,
                })
            }
            other => Err(self.error_here(format!(
                "Expected type, found {}",
                describe_kind(&other)
            ))),
        }
    }

    /// Parses a signature after the `func` keyword has been consumed.
    fn parse_func_signature(&mut self, start: usize) -> Result<FuncTypeExpr, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut variadic = false;
        while !self.check(&TokenKind::RParen) && !self.is_eof() {
            if variadic {
                return Err(self.error_here("Variadic parameter must be last"));
            }
            params.push(self.parse_param(&mut variadic)?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        let mut end = self.expect(TokenKind::RParen)?.span.end;

        let mut results = Vec::new();
        if self.matches(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) && !self.is_eof() {
                let mut no_variadic = false;
                let param = self.parse_param(&mut no_variadic)?;
                if no_variadic {
                    return Err(self.error_here("Results cannot be variadic"));
                }
                results.push(param);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            end = self.expect(TokenKind::RParen)?.span.end;
        } else if self.starts_type() {
            let ty = self.parse_type()?;
            end = ty.span.end;
            let span = ty.span;
            results.push(ParamDecl {
                name: None,
                ty,
                span,
            });
        }

        Ok(FuncTypeExpr {
            params,
            variadic,
            results,
            span: Span::new(start, end),
        })
    }

    /// One parameter or result: `name Type`, `name ...Type`, or a bare type.
    fn parse_param(&mut self, variadic: &mut bool) -> Result<ParamDecl, SyntaxError> {
        let start = self.current_span().start;
        if let TokenKind::Identifier(_) = self.current_kind() {
            // A lone identifier followed by ',' or ')' is an unnamed type.
            let after = self.peek_kind(1);
            if !matches!(after, TokenKind::Comma | TokenKind::RParen | TokenKind::Dot) {
                let name = self.expect_identifier("Expected parameter name")?;
                if self.matches(&TokenKind::Ellipsis) {
                    *variadic = true;
                }
                let ty = self.parse_type()?;
                let span = Span::new(start, ty.span.end);
                return Ok(ParamDecl {
                    name: Some(name),
                    ty,
                    span,
                });
            }
        }
        if self.matches(&TokenKind::Ellipsis) {
            *variadic = true;
        }
        let ty = self.parse_type()?;
        let span = Span::new(start, ty.span.end);
        Ok(ParamDecl {
            name: None,
            ty,
            span,
        })
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Identifier(_)
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Arrow
                | TokenKind::Func
                | TokenKind::Struct
                | TokenKind::Interface
        )
    }

    // ---- plumbing ----

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn prev_span_end(&self, fallback: usize) -> usize {
        if self.pos == 0 {
            fallback
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn is_eof(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn bump_token(&mut self) -> Token {
        let tok = self.current().clone();
        self.bump();
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn consume_optional(&mut self, kind: &TokenKind) {
        if self.check(kind) {
            self.bump();
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            Ok(self.bump_token())
        } else {
            Err(self.error_here(format!(
                "Expected {}, found {}",
                describe_kind(&kind),
                self.describe_current()
            )))
        }
    }

    fn expect_stmt_end(&mut self) -> Result<(), SyntaxError> {
        if self.check(&TokenKind::Semi) {
            self.bump();
            Ok(())
        } else if self.check(&TokenKind::RBrace) || self.is_eof() {
            Ok(())
        } else {
            Err(self.error_here(format!(
                "Expected end of statement, found {}",
                self.describe_current()
            )))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<Ident, SyntaxError> {
        if let TokenKind::Identifier(name) = self.current_kind().clone() {
            let tok = self.bump_token();
            Ok(Ident {
                id: self.fresh_id(),
                name,
                span: tok.span,
            })
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_string_literal(&mut self, message: &str) -> Result<String, SyntaxError> {
        if let TokenKind::String(value) = self.current_kind().clone() {
            self.bump();
            Ok(value)
        } else {
            Err(self.error_here(message))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current_span())
    }

    fn describe_current(&self) -> String {
        describe_kind(self.current_kind())
    }
}

enum RangeHeader {
    Simple(SimpleStmt),
    Range(Option<Expr>, Option<Expr>, Option<AssignTok>),
}

fn strip_parens(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Paren(inner) => strip_parens(inner),
        _ => expr,
    }
}

fn describe_kind(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(name) => format!("'{}'", name),
        TokenKind::Integer(v) => format!("'{}'", v),
        TokenKind::Float(v) => format!("'{}'", v),
        TokenKind::Imaginary(v) => format!("'{}i'", v),
        TokenKind::String(_) => "string literal".to_string(),
        TokenKind::Rune(_) => "rune literal".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::LBrace => "'{'".to_string(),
        TokenKind::RBrace => "'}'".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Semi => "';'".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_stmts(body: &str) -> File {
        let src = format!("package p;func _(){{{}\n}}", body);
        parse_file(&src).expect("parse")
    }

    fn first_stmt(body: &str) -> Stmt {
        parse_stmts(body).decls[0].body.stmts[0].clone()
    }

    #[test]
    fn parses_short_declaration() {
        let stmt = first_stmt("x := 2 + 3 * 4");
        let Stmt::Assign(assign) = stmt else {
            panic!("expected assignment");
        };
        assert_eq!(assign.tok, AssignTok::Define);
        assert_eq!(assign.lhs.len(), 1);
        assert_eq!(assign.rhs.len(), 1);
    }

    #[test]
    fn parses_send_and_receive() {
        let stmt = first_stmt("ch <- 7");
        assert!(matches!(stmt, Stmt::Send(_)));

        let stmt = first_stmt("v := <-ch");
        let Stmt::Assign(assign) = stmt else {
            panic!("expected assignment");
        };
        assert!(matches!(
            assign.rhs[0].kind,
            ExprKind::Unary {
                op: UnaryOp::Recv,
                ..
            }
        ));
    }

    #[test]
    fn parses_make_with_type_argument() {
        let stmt = first_stmt("ch := make(chan int, 1)");
        let Stmt::Assign(assign) = stmt else {
            panic!("expected assignment");
        };
        let ExprKind::Call { args, .. } = &assign.rhs[0].kind else {
            panic!("expected call");
        };
        assert!(matches!(args[0].kind, ExprKind::Type(_)));
        assert!(matches!(args[1].kind, ExprKind::IntLit(1)));
    }

    #[test]
    fn parses_func_literal_with_result() {
        let stmt = first_stmt("f := func(n int) int { return n }");
        let Stmt::Assign(assign) = stmt else {
            panic!("expected assignment");
        };
        let ExprKind::FuncLit(lit) = &assign.rhs[0].kind else {
            panic!("expected function literal");
        };
        assert_eq!(lit.sig.params.len(), 1);
        assert_eq!(lit.sig.results.len(), 1);
    }

    #[test]
    fn parses_select_with_cases() {
        let stmt = first_stmt(
            "select { case v := <-ch: v = v; case ch2 <- 1: ; default: x = 2 }",
        );
        let Stmt::Select(select) = stmt else {
            panic!("expected select");
        };
        assert_eq!(select.cases.len(), 3);
        assert!(matches!(select.cases[0].comm, CommClause::Recv { .. }));
        assert!(matches!(select.cases[1].comm, CommClause::Send(_)));
        assert!(matches!(select.cases[2].comm, CommClause::Default));
    }

    #[test]
    fn parses_three_clause_for_with_label() {
        let stmt = first_stmt("outer: for i := 0; i < 3; i++ { break outer }");
        let Stmt::Labeled(labeled) = stmt else {
            panic!("expected labeled statement");
        };
        assert_eq!(labeled.label.name, "outer");
        assert!(matches!(labeled.stmt, Stmt::For(_)));
    }

    #[test]
    fn parses_if_with_init_clause() {
        let stmt = first_stmt("if x := 1; x < 2 { y = x }");
        let Stmt::If(ifs) = stmt else {
            panic!("expected if");
        };
        assert!(ifs.init.is_some());
    }

    #[test]
    fn parses_type_assertion() {
        let stmt = first_stmt("v, ok := x.(int)");
        let Stmt::Assign(assign) = stmt else {
            panic!("expected assignment");
        };
        assert!(matches!(assign.rhs[0].kind, ExprKind::TypeAssert { .. }));
    }

    #[test]
    fn parses_var_decl_splice_output() {
        let file = parse_stmts("var x int;var f func(int) int;var m map[string]int");
        assert_eq!(file.decls[0].body.stmts.len(), 3);
    }

    #[test]
    fn reports_error_position_at_end_for_unterminated_block() {
        let src = "package p;func _(){f := func() {\n}";
        let err = parse_file(src).unwrap_err();
        // The error is at or past the end of the source.
        assert!(err.first().span.start >= src.len() - 1);
    }

    #[test]
    fn rejects_slice_expressions() {
        let src = "package p;func _(){x := a[1:2]\n}";
        let err = parse_file(src).unwrap_err();
        assert!(err.first().message.contains("Slice expressions"));
    }
}
