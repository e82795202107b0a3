// ABOUTME: Pratt-precedence recursive-descent parser building the typed AST

use crate::ast::*;
use crate::error::{ParseError, Pos};
use crate::lexer::{Lexer, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_node_id: NodeId,
}

type PResult<T> = Result<T, ParseError>;

pub fn parse_program(src: &str) -> PResult<Block> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        next_node_id: 0,
    };
    let block = parser.parse_block_items_until_eof()?;
    Ok(block)
}

impl Parser {
    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_pos(&self) -> Pos {
        self.peek().pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn describe(kind: &TokenKind) -> String {
        format!("{kind:?}")
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected(
                Self::describe(&kind),
                Self::describe(&self.peek().kind),
                self.peek_pos(),
            ))
        }
    }

    fn ident(&mut self) -> PResult<(String, Pos)> {
        let pos = self.peek_pos();
        match self.advance().kind {
            TokenKind::Ident(name) => Ok((name, pos)),
            other => Err(ParseError::unexpected("identifier", Self::describe(&other), pos)),
        }
    }

    fn parse_block_items_until_eof(&mut self) -> PResult<Block> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Block { stmts })
    }

    fn parse_braced_block(&mut self) -> PResult<Block> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { stmts })
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        match &self.peek().kind {
            TokenKind::Let => {
                self.advance();
                let (name, _) = self.ident()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Let(name, value, pos))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_braced_block()?;
                Ok(Stmt::While { cond, body, pos })
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Break(pos))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Continue(pos))
            }
            TokenKind::Class => self.parse_class(),
            TokenKind::Module => self.parse_module(),
            TokenKind::TypeAlias => {
                self.advance();
                let (name, _) = self.ident()?;
                self.expect(TokenKind::Eq)?;
                let (target, _) = self.ident()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::TypeAlias { name, target, pos })
            }
            TokenKind::Try => self.parse_try(),
            TokenKind::Fn => Ok(Stmt::FunctionDecl(self.parse_function_decl()?)),
            TokenKind::Return => {
                self.advance();
                if self.check(&TokenKind::Semi) {
                    self.advance();
                    Ok(Stmt::Return(None, pos))
                } else {
                    let value = self.parse_expr()?;
                    self.expect(TokenKind::Semi)?;
                    Ok(Stmt::Return(Some(value), pos))
                }
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Throw(value, pos))
            }
            TokenKind::Import => {
                self.advance();
                let path_pos = self.peek_pos();
                let path = match self.advance().kind {
                    TokenKind::Str(s) => s,
                    other => {
                        return Err(ParseError::unexpected(
                            "string literal",
                            Self::describe(&other),
                            path_pos,
                        ))
                    }
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Import(path, pos))
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_block = self.parse_braced_block()?;
        let else_block = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                let inner = self.parse_if()?;
                Some(Block { stmts: vec![inner] })
            } else {
                Some(self.parse_braced_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            pos,
        })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        self.expect(TokenKind::LParen)?;
        let subject = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Case) {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let mut stmts = Vec::new();
                while !self.check(&TokenKind::Case)
                    && !self.check(&TokenKind::Default)
                    && !self.check(&TokenKind::RBrace)
                {
                    stmts.push(self.parse_stmt()?);
                }
                cases.push(SwitchCase {
                    value,
                    body: Block { stmts },
                });
            } else if self.check(&TokenKind::Default) {
                let default_pos = self.peek_pos();
                if default.is_some() {
                    return Err(ParseError::DuplicateDefault { pos: default_pos });
                }
                self.advance();
                self.expect(TokenKind::Colon)?;
                let mut stmts = Vec::new();
                while !self.check(&TokenKind::Case)
                    && !self.check(&TokenKind::Default)
                    && !self.check(&TokenKind::RBrace)
                {
                    stmts.push(self.parse_stmt()?);
                }
                default = Some(Block { stmts });
            } else {
                return Err(ParseError::unexpected(
                    "'case' or 'default'",
                    Self::describe(&self.peek().kind),
                    self.peek_pos(),
                ));
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Stmt::Switch {
            subject,
            cases,
            default,
            pos,
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        self.expect(TokenKind::LParen)?;
        let (first, _) = self.ident()?;
        let head = if self.check(&TokenKind::Comma) {
            self.advance();
            let (second, _) = self.ident()?;
            ForHead::Pair(first, second)
        } else {
            ForHead::Single(first)
        };
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_braced_block()?;
        Ok(Stmt::For {
            head,
            iterable,
            body,
            pos,
        })
    }

    fn parse_class(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        let (name, _) = self.ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            methods.push(self.parse_function_decl()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Stmt::Class { name, methods, pos })
    }

    fn parse_module(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        let (name, _) = self.ident()?;
        let body = self.parse_braced_block()?;
        Ok(Stmt::Module { name, body, pos })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        self.advance();
        let body = self.parse_braced_block()?;
        self.expect(TokenKind::Catch)?;
        self.expect(TokenKind::LParen)?;
        let (catch_var, _) = self.ident()?;
        self.expect(TokenKind::RParen)?;
        let catch_body = self.parse_braced_block()?;
        Ok(Stmt::Try {
            body,
            catch_var,
            catch_body,
            pos,
        })
    }

    fn parse_function_decl(&mut self) -> PResult<FunctionDecl> {
        let pos = self.peek_pos();
        self.expect(TokenKind::Fn)?;
        let (name, _) = self.ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (pname, _) = self.ident()?;
                params.push(Param { name: pname });
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_braced_block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            pos,
        })
    }

    fn parse_expr_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.peek_pos();
        let expr = self.parse_expr()?;
        if matches!(self.peek().kind, TokenKind::Eq) {
            let target = Self::expr_to_assign_target(expr)?;
            self.advance();
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi)?;
            return Ok(Stmt::Assign(target, value, pos));
        }
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::ExprStmt(expr, pos))
    }

    fn expr_to_assign_target(expr: Expr) -> PResult<AssignTarget> {
        match expr {
            Expr::Ident(name, pos, _) => Ok(AssignTarget::Ident(name, pos)),
            Expr::Member(obj, field, pos, _) => Ok(AssignTarget::Member(obj, field, pos)),
            Expr::Index(obj, idx, pos, _) => Ok(AssignTarget::Index(obj, idx, pos)),
            other => Err(ParseError::InvalidAssignTarget { pos: other.pos() }),
        }
    }

    // ---- expression parsing: precedence climbing ----

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_coalesce()
    }

    fn parse_coalesce(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_or()?;
        while self.check(&TokenKind::QuestionQuestion) {
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_or()?;
            lhs = Expr::Binary(BinaryOp::Coalesce, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_compare()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Neq,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_compare()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let pos = self.peek_pos();
            self.advance();
            let rhs = self.parse_prefix()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), pos, self.fresh_id());
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        let pos = self.peek_pos();
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_prefix()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand), pos, self.fresh_id()))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_prefix()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(operand), pos, self.fresh_id()))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    let pos = self.peek_pos();
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::Call(Box::new(expr), args, pos, self.fresh_id());
                }
                TokenKind::LBracket => {
                    let pos = self.peek_pos();
                    self.advance();
                    let idx = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(idx), pos, self.fresh_id());
                }
                TokenKind::Dot => {
                    let pos = self.peek_pos();
                    self.advance();
                    let (field, _) = self.ident()?;
                    expr = Expr::Member(Box::new(expr), field, pos, self.fresh_id());
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.peek_pos();
        match self.peek().kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n, pos, self.fresh_id()))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s, pos, self.fresh_id()))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true, pos, self.fresh_id()))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false, pos, self.fresh_id()))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null(pos, self.fresh_id()))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name, pos, self.fresh_id()))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_or_comprehension(pos),
            TokenKind::LBrace => self.parse_object_literal(pos),
            other => Err(ParseError::unexpected(
                "expression",
                Self::describe(&other),
                pos,
            )),
        }
    }

    fn parse_array_or_comprehension(&mut self, pos: Pos) -> PResult<Expr> {
        self.advance(); // '['
        if self.check(&TokenKind::RBracket) {
            self.advance();
            return Ok(Expr::Array(Vec::new(), pos, self.fresh_id()));
        }

        let first = self.parse_expr()?;

        if self.check(&TokenKind::For) {
            self.advance();
            let (name1, _) = self.ident()?;
            let vars = if self.check(&TokenKind::Comma) {
                self.advance();
                let (name2, _) = self.ident()?;
                ComprehensionVars {
                    key: Some(name1),
                    value: name2,
                }
            } else {
                ComprehensionVars {
                    key: None,
                    value: name1,
                }
            };
            self.expect(TokenKind::In)?;
            let iterable = self.parse_expr()?;
            let filter = if self.check(&TokenKind::If) {
                self.advance();
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            if self.check(&TokenKind::Comma) {
                return Err(ParseError::MixedComprehension {
                    pos: self.peek_pos(),
                });
            }
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::ArrayComprehension {
                element: Box::new(first),
                vars,
                iterable: Box::new(iterable),
                filter,
                pos,
                id: self.fresh_id(),
            });
        }

        let mut items = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.check(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::Array(items, pos, self.fresh_id()))
    }

    fn parse_object_literal(&mut self, pos: Pos) -> PResult<Expr> {
        self.advance(); // '{'
        let mut entries: Vec<(String, Expr)> = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (key, _) = match &self.peek().kind {
                TokenKind::Ident(_) => self.ident()?,
                TokenKind::Str(_) => {
                    let p = self.peek_pos();
                    match self.advance().kind {
                        TokenKind::Str(s) => (s, p),
                        _ => unreachable!(),
                    }
                }
                other => {
                    return Err(ParseError::unexpected(
                        "object key",
                        Self::describe(other),
                        self.peek_pos(),
                    ))
                }
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            // Insertion order preserved, duplicate keys last-write-wins.
            if let Some(slot) = entries.iter_mut().find(|(k, _)| k == &key) {
                slot.1 = value;
            } else {
                entries.push((key, value));
            }
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::Object(entries, pos, self.fresh_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence_ladder() {
        let block = parse_program("let x = 1 + 2 * 3 ?? 0;").unwrap();
        assert_eq!(block.stmts.len(), 1);
    }

    #[test]
    fn parses_hello_world() {
        let block = parse_program(r#"print("hello");"#).unwrap();
        match &block.stmts[0] {
            Stmt::ExprStmt(Expr::Call(callee, args, _, _), _) => {
                assert!(matches!(**callee, Expr::Ident(ref n, _, _) if n == "print"));
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn parses_array_comprehension_with_filter() {
        let block = parse_program("let xs = [x for x in range(10) if x > 2];").unwrap();
        match &block.stmts[0] {
            Stmt::Let(_, Expr::ArrayComprehension { filter, .. }, _) => {
                assert!(filter.is_some());
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn rejects_mixed_comprehension() {
        let err = parse_program("let xs = [x for x in y, 1];").unwrap_err();
        assert!(matches!(err, ParseError::MixedComprehension { .. }));
    }

    #[test]
    fn assignment_target_must_be_place_expr() {
        let err = parse_program("1 + 1 = 2;").unwrap_err();
        assert!(matches!(err, ParseError::InvalidAssignTarget { .. }));
    }

    #[test]
    fn node_ids_are_stable_across_parses() {
        let a = parse_program("[1, 2];").unwrap();
        let b = parse_program("[1, 2];").unwrap();
        let id_a = match &a.stmts[0] {
            Stmt::ExprStmt(e, _) => e.node_id(),
            _ => unreachable!(),
        };
        let id_b = match &b.stmts[0] {
            Stmt::ExprStmt(e, _) => e.node_id(),
            _ => unreachable!(),
        };
        assert_eq!(id_a, id_b);
    }
}
