//! Recursive-descent parser.

use crate::ast::{
    AssignTarget, BinOp, ContractDef, ContractKind, EventDef, Expr, FuncDef, Stmt, TypeAnn, UnOp,
};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{tokenize, Token, TokenKind};

/// Parse a full source file into its top-level definitions.
pub fn parse(source: &str) -> CompileResult<Vec<ContractDef>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut defs = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        defs.push(parser.contract_def()?);
    }
    if defs.is_empty() {
        return Err(CompileError::Parse {
            message: "empty source".into(),
            line: 1,
        });
    }
    Ok(defs)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.at(&kind) {
            Ok(self.bump())
        } else {
            Err(CompileError::Parse {
                message: format!("expected {kind:?}, found {:?}", self.peek().kind),
                line: self.line(),
            })
        }
    }

    fn ident(&mut self) -> CompileResult<(String, usize)> {
        let line = self.line();
        match self.bump().kind {
            TokenKind::Ident(name) => Ok((name, line)),
            other => Err(CompileError::Parse {
                message: format!("expected identifier, found {other:?}"),
                line,
            }),
        }
    }

    fn contract_def(&mut self) -> CompileResult<ContractDef> {
        let line = self.line();
        let kind = match self.bump().kind {
            TokenKind::TxScript => ContractKind::TxScript,
            TokenKind::TxContract => ContractKind::TxContract,
            TokenKind::AssetScript => ContractKind::AssetScript,
            other => {
                return Err(CompileError::Parse {
                    message: format!("expected top-level form, found {other:?}"),
                    line,
                });
            }
        };
        let (name, _) = self.ident()?;

        let mut fields = Vec::new();
        if self.at(&TokenKind::LParen) {
            if kind != ContractKind::TxContract {
                return Err(CompileError::Parse {
                    message: "only TxContract declares fields".into(),
                    line: self.line(),
                });
            }
            self.bump();
            while !self.at(&TokenKind::RParen) {
                let (field_name, _) = self.ident()?;
                self.eat(TokenKind::Colon)?;
                let field_type = self.type_ann()?;
                fields.push((field_name, field_type));
                if self.at(&TokenKind::Comma) {
                    self.bump();
                }
            }
            self.eat(TokenKind::RParen)?;
        }

        self.eat(TokenKind::LBrace)?;
        let mut events = Vec::new();
        let mut funcs = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Event) {
                events.push(self.event_def()?);
            } else {
                funcs.push(self.func_def()?);
            }
        }
        self.eat(TokenKind::RBrace)?;

        Ok(ContractDef {
            kind,
            name,
            fields,
            events,
            funcs,
            line,
        })
    }

    fn event_def(&mut self) -> CompileResult<EventDef> {
        let line = self.line();
        self.eat(TokenKind::Event)?;
        let (name, _) = self.ident()?;
        self.eat(TokenKind::LParen)?;
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let (field_name, _) = self.ident()?;
            self.eat(TokenKind::Colon)?;
            fields.push((field_name, self.type_ann()?));
            if self.at(&TokenKind::Comma) {
                self.bump();
            }
        }
        self.eat(TokenKind::RParen)?;
        Ok(EventDef { name, fields, line })
    }

    fn func_def(&mut self) -> CompileResult<FuncDef> {
        let line = self.line();
        let is_public = if self.at(&TokenKind::Pub) {
            self.bump();
            true
        } else {
            false
        };
        let is_payable = if self.at(&TokenKind::Payable) {
            self.bump();
            true
        } else {
            false
        };
        self.eat(TokenKind::Fn)?;
        let (name, _) = self.ident()?;

        self.eat(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let (param_name, _) = self.ident()?;
            let annotation = if self.at(&TokenKind::Colon) {
                self.bump();
                Some(self.type_ann()?)
            } else {
                None
            };
            params.push((param_name, annotation));
            if self.at(&TokenKind::Comma) {
                self.bump();
            }
        }
        self.eat(TokenKind::RParen)?;

        let mut returns = Vec::new();
        if self.at(&TokenKind::Arrow) {
            self.bump();
            if self.at(&TokenKind::LParen) {
                self.bump();
                while !self.at(&TokenKind::RParen) {
                    returns.push(self.type_ann()?);
                    if self.at(&TokenKind::Comma) {
                        self.bump();
                    }
                }
                self.eat(TokenKind::RParen)?;
            } else {
                returns.push(self.type_ann()?);
            }
        }

        let body = self.block()?;
        Ok(FuncDef {
            name,
            is_public,
            is_payable,
            params,
            returns,
            body,
            line,
        })
    }

    fn type_ann(&mut self) -> CompileResult<TypeAnn> {
        let line = self.line();
        if self.at(&TokenKind::LBracket) {
            self.bump();
            let element = self.type_ann()?;
            self.eat(TokenKind::Semicolon)?;
            let size = self.const_usize()?;
            self.eat(TokenKind::RBracket)?;
            return Ok(TypeAnn::Array(Box::new(element), size));
        }
        let (name, _) = self.ident()?;
        Ok(match name.as_str() {
            "Bool" => TypeAnn::Bool,
            "I256" => TypeAnn::I256,
            "U256" => TypeAnn::U256,
            "ByteVec" => TypeAnn::ByteVec,
            "Address" => TypeAnn::Address,
            "Contract" => {
                self.eat(TokenKind::Lt)?;
                let (type_name, _) = self.ident()?;
                self.eat(TokenKind::Gt)?;
                TypeAnn::Contract(type_name)
            }
            other => {
                return Err(CompileError::Parse {
                    message: format!("unknown type `{other}`"),
                    line,
                });
            }
        })
    }

    fn const_usize(&mut self) -> CompileResult<usize> {
        let line = self.line();
        match self.bump().kind {
            TokenKind::Number(text) => text.parse().map_err(|_| CompileError::Parse {
                message: format!("invalid array size `{text}`"),
                line,
            }),
            other => Err(CompileError::Parse {
                message: format!("expected array size, found {other:?}"),
                line,
            }),
        }
    }

    fn block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.eat(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            statements.push(self.statement()?);
        }
        self.eat(TokenKind::RBrace)?;
        Ok(statements)
    }

    fn statement(&mut self) -> CompileResult<Stmt> {
        let line = self.line();
        match &self.peek().kind {
            TokenKind::Let => {
                self.bump();
                let (name, _) = self.ident()?;
                let type_ann = if self.at(&TokenKind::Colon) {
                    self.bump();
                    Some(self.type_ann()?)
                } else {
                    None
                };
                self.eat(TokenKind::Assign)?;
                let value = self.expr()?;
                Ok(Stmt::Let {
                    name,
                    type_ann,
                    value,
                    line,
                })
            }
            TokenKind::If => {
                self.bump();
                let cond = self.expr()?;
                let then_body = self.block()?;
                let else_body = if self.at(&TokenKind::Else) {
                    self.bump();
                    Some(self.block()?)
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_body,
                    else_body,
                    line,
                })
            }
            TokenKind::While => {
                self.bump();
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Stmt::While { cond, body, line })
            }
            TokenKind::Return => {
                self.bump();
                let mut values = Vec::new();
                // return values end at a closing brace or the next statement
                if !self.at(&TokenKind::RBrace) {
                    values.push(self.expr()?);
                    while self.at(&TokenKind::Comma) {
                        self.bump();
                        values.push(self.expr()?);
                    }
                }
                Ok(Stmt::Return(values, line))
            }
            TokenKind::Emit => {
                self.bump();
                let (event, _) = self.ident()?;
                self.eat(TokenKind::LParen)?;
                let mut args = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    args.push(self.expr()?);
                    if self.at(&TokenKind::Comma) {
                        self.bump();
                    }
                }
                self.eat(TokenKind::RParen)?;
                Ok(Stmt::Emit { event, args, line })
            }
            TokenKind::Ident(_) => {
                // assignment or a bare call
                let checkpoint = self.pos;
                let (name, _) = self.ident()?;
                if self.at(&TokenKind::Assign) {
                    self.bump();
                    let value = self.expr()?;
                    return Ok(Stmt::Assign {
                        target: AssignTarget::Var(name),
                        value,
                        line,
                    });
                }
                if self.at(&TokenKind::LBracket) {
                    let mut indices = Vec::new();
                    while self.at(&TokenKind::LBracket) {
                        self.bump();
                        indices.push(self.expr()?);
                        self.eat(TokenKind::RBracket)?;
                    }
                    if self.at(&TokenKind::Assign) {
                        self.bump();
                        let value = self.expr()?;
                        return Ok(Stmt::Assign {
                            target: AssignTarget::Index(name, indices),
                            value,
                            line,
                        });
                    }
                }
                // not an assignment: reparse as expression statement
                self.pos = checkpoint;
                let expr = self.expr()?;
                Ok(Stmt::ExprStmt(expr))
            }
            _ => {
                let expr = self.expr()?;
                Ok(Stmt::ExprStmt(expr))
            }
        }
    }

    fn expr(&mut self) -> CompileResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> CompileResult<Expr> {
        let mut left = self.and_expr()?;
        while self.at(&TokenKind::OrOr) {
            let line = self.line();
            self.bump();
            let right = self.and_expr()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> CompileResult<Expr> {
        let mut left = self.cmp_expr()?;
        while self.at(&TokenKind::AndAnd) {
            let line = self.line();
            self.bump();
            let right = self.cmp_expr()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn cmp_expr(&mut self) -> CompileResult<Expr> {
        let left = self.add_expr()?;
        let op = match self.peek().kind {
            TokenKind::Eq => Some(BinOp::Eq),
            TokenKind::Neq => Some(BinOp::Neq),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            _ => None,
        };
        match op {
            Some(op) => {
                let line = self.line();
                self.bump();
                let right = self.add_expr()?;
                Ok(Expr::Binary(op, Box::new(left), Box::new(right), line))
            }
            None => Ok(left),
        }
    }

    fn add_expr(&mut self) -> CompileResult<Expr> {
        let mut left = self.mul_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let right = self.mul_expr()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn mul_expr(&mut self) -> CompileResult<Expr> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let right = self.unary_expr()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        if self.at(&TokenKind::Not) {
            self.bump();
            let inner = self.unary_expr()?;
            return Ok(Expr::Unary(UnOp::Not, Box::new(inner), line));
        }
        if self.at(&TokenKind::Minus) {
            self.bump();
            let inner = self.unary_expr()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(inner), line));
        }
        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> CompileResult<Expr> {
        let mut expr = self.primary_expr()?;
        while self.at(&TokenKind::LBracket) {
            let line = self.line();
            self.bump();
            let index = self.expr()?;
            self.eat(TokenKind::RBracket)?;
            expr = Expr::Index(Box::new(expr), Box::new(index), line);
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> CompileResult<Expr> {
        let line = self.line();
        match self.bump().kind {
            TokenKind::True => Ok(Expr::BoolLit(true, line)),
            TokenKind::False => Ok(Expr::BoolLit(false, line)),
            TokenKind::Number(text) => Ok(Expr::NumLit(text, line)),
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.eat(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                // array literal or repeat
                let first = self.expr()?;
                if self.at(&TokenKind::Semicolon) {
                    self.bump();
                    let count = self.const_usize()?;
                    self.eat(TokenKind::RBracket)?;
                    return Ok(Expr::ArrayRepeat(Box::new(first), count, line));
                }
                let mut elements = vec![first];
                while self.at(&TokenKind::Comma) {
                    self.bump();
                    elements.push(self.expr()?);
                }
                self.eat(TokenKind::RBracket)?;
                Ok(Expr::ArrayLit(elements, line))
            }
            TokenKind::Builtin(name) => {
                self.eat(TokenKind::LParen)?;
                let mut args = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    args.push(self.expr()?);
                    if self.at(&TokenKind::Comma) {
                        self.bump();
                    }
                }
                self.eat(TokenKind::RParen)?;
                Ok(Expr::Builtin(name, args, line))
            }
            TokenKind::Ident(name) => {
                if self.at(&TokenKind::LParen) {
                    self.bump();
                    let mut args = Vec::new();
                    while !self.at(&TokenKind::RParen) {
                        args.push(self.expr()?);
                        if self.at(&TokenKind::Comma) {
                            self.bump();
                        }
                    }
                    self.eat(TokenKind::RParen)?;
                    Ok(Expr::Call(name, args, line))
                } else {
                    Ok(Expr::Var(name, line))
                }
            }
            other => Err(CompileError::Parse {
                message: format!("unexpected token {other:?} in expression"),
                line,
            }),
        }
    }
}
