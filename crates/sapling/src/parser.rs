//! Recursive-descent parser producing the instruction tree.
//!
//! The precedence ladder, low to high: `||` · `&&` · unary `!` ·
//! equality/relational · additive · multiplicative · postfix (call, index,
//! attribute) · primary. Assignment is a statement, not an expression.
//!
//! Braced expressions are disambiguated by lookahead: `{a, b}` is an array,
//! `{k: v}` a dictionary, and `{e : id in src}` an array comprehension.

use crate::ast::{
    ArgNode, BinOp, Body, Code, EnumMember, ImportSpec, Node, ParamNode, StructField, UnOp,
};
use crate::error::{Error, Result};
use crate::lexer::lex;
use crate::token::{Pos, Token, TokenKind};

/// Lex and parse a source string.
pub fn parse(src: &str) -> Result<Code> {
    let tokens = lex(src)?;
    Parser::new(tokens).code()
}

struct Parser {
    tokens: Vec<Token>,
    at: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, at: 0 }
    }

    // -----------------------------------------------------------------------
    // Token stream helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_kind_at(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.at + n).map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.at).cloned();
        if tok.is_some() {
            self.at += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        match self.peek() {
            Some(tok) if tok.kind == kind => Ok(self.advance().unwrap()),
            Some(tok) => Err(Error::syntax(
                format!("Unexpected token '{}'", tok.text),
                tok.pos,
            )),
            None => Err(self.eof()),
        }
    }

    fn eof(&self) -> Error {
        let pos = self
            .tokens
            .last()
            .map(|t| t.pos)
            .unwrap_or_else(|| Pos::new(1, 1));
        Error::syntax("Unexpected EOF", pos)
    }

    fn unexpected(&mut self) -> Error {
        match self.peek() {
            Some(tok) => Error::syntax(format!("Unexpected token '{}'", tok.text), tok.pos),
            None => self.eof(),
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn code(&mut self) -> Result<Code> {
        let pos = self.peek().map(|t| t.pos).unwrap_or_default();
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.stmt()?);
        }
        Ok(Code { pos, stmts })
    }

    fn stmt(&mut self) -> Result<Node> {
        match self.peek_kind() {
            Some(TokenKind::Func) => self.func_def(),
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::While) => self.while_stmt(),
            Some(TokenKind::Repeat) => self.repeat_stmt(),
            Some(TokenKind::Return) => self.return_stmt(),
            Some(TokenKind::Import) => self.import_stmt(),
            Some(TokenKind::Enum) => self.enum_stmt(),
            Some(TokenKind::Struct) => self.struct_stmt(),
            Some(TokenKind::Const) => self.assignment(true),
            Some(TokenKind::Id) => {
                // Lookahead distinguishes the assignment forms from a plain
                // expression statement that happens to start with an Id.
                match (self.peek_kind_at(1), self.peek_kind_at(2)) {
                    (Some(TokenKind::Eq), _) => self.assignment(false),
                    (Some(TokenKind::Id), Some(TokenKind::Eq)) => self.assignment(false),
                    (Some(op), Some(TokenKind::Eq)) if compound_op(op).is_some() => {
                        self.compound_assignment()
                    }
                    _ => self.expr(),
                }
            }
            Some(_) => self.expr(),
            None => Err(self.eof()),
        }
    }

    /// `id = e` · `type id = e` · `const id = e` · `const type id = e`
    fn assignment(&mut self, constant: bool) -> Result<Node> {
        let pos = self.peek().map(|t| t.pos).unwrap_or_default();
        if constant {
            self.expect(TokenKind::Const)?;
        }

        let first = self.expect(TokenKind::Id)?;
        let (annotation, name) = if self.check(TokenKind::Id) {
            let second = self.advance().unwrap();
            (first.text, second.text)
        } else {
            ("any".to_string(), first.text)
        };

        self.expect(TokenKind::Eq)?;
        let value = self.expr()?;

        Ok(Node::Assign {
            pos,
            name,
            value: Box::new(value),
            constant,
            op: None,
            annotation,
        })
    }

    /// `id op= e` for `+ - * / %`
    fn compound_assignment(&mut self) -> Result<Node> {
        let target = self.expect(TokenKind::Id)?;
        let op_tok = self.advance().ok_or_else(|| self.eof())?;
        let op = compound_op(op_tok.kind).expect("checked by caller");
        self.expect(TokenKind::Eq)?;
        let value = self.expr()?;

        Ok(Node::Assign {
            pos: target.pos,
            name: target.text,
            value: Box::new(value),
            constant: false,
            op: Some(op),
            annotation: "any".to_string(),
        })
    }

    /// `func id ( params? ) body` · `func Class . id ( params? ) body`
    fn func_def(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::Func)?;
        let first = self.expect(TokenKind::Id)?;

        if self.eat(TokenKind::Dot) {
            let method = self.expect(TokenKind::Id)?;
            let params = self.param_list()?;
            let body = self.body()?;
            return Ok(Node::AttrFuncDef {
                pos: kw.pos,
                class_name: first.text,
                name: method.text,
                params,
                body,
            });
        }

        let params = self.param_list()?;
        let body = self.body()?;
        Ok(Node::FuncDef {
            pos: kw.pos,
            name: first.text,
            params,
            body,
        })
    }

    fn param_list(&mut self) -> Result<Vec<ParamNode>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.param()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    /// `id` · `type id` · `id = default` · `type id = default`
    fn param(&mut self) -> Result<ParamNode> {
        let first = self.expect(TokenKind::Id)?;
        let (annotation, name) = if self.check(TokenKind::Id) {
            let second = self.advance().unwrap();
            (first.text.clone(), second.text)
        } else {
            ("any".to_string(), first.text.clone())
        };
        let default = if self.eat(TokenKind::Eq) {
            Some(self.expr()?)
        } else {
            None
        };
        Ok(ParamNode {
            pos: first.pos,
            name,
            annotation,
            default,
        })
    }

    fn body(&mut self) -> Result<Body> {
        let open = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.peek().is_none() {
                return Err(self.eof());
            }
            stmts.push(self.stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Body {
            pos: open.pos,
            stmts,
        })
    }

    /// `if e body (else if …)* (else body)?` — an `else if` nests the inner
    /// `if` as the sole statement of the else body.
    fn if_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::If)?;
        let condition = self.expr()?;
        let then = self.body()?;

        let otherwise = if self.eat(TokenKind::Else) {
            if self.check(TokenKind::If) {
                let else_pos = self.peek().map(|t| t.pos).unwrap_or_default();
                let nested = self.if_stmt()?;
                Some(Body {
                    pos: else_pos,
                    stmts: vec![nested],
                })
            } else {
                Some(self.body()?)
            }
        } else {
            None
        };

        Ok(Node::If {
            pos: kw.pos,
            condition: Box::new(condition),
            then,
            otherwise,
        })
    }

    fn while_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::While)?;
        let condition = self.expr()?;
        let body = self.body()?;
        Ok(Node::While {
            pos: kw.pos,
            condition: Box::new(condition),
            body,
        })
    }

    /// `repeat body until e` — bottom-tested.
    fn repeat_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::Repeat)?;
        let body = self.body()?;
        self.expect(TokenKind::Until)?;
        let until = self.expr()?;
        Ok(Node::Repeat {
            pos: kw.pos,
            body,
            until: Box::new(until),
        })
    }

    fn return_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::Return)?;
        let value = self.expr()?;
        Ok(Node::Return {
            pos: kw.pos,
            value: Box::new(value),
        })
    }

    /// `import "mod"` · `import "a", "b" from "mod"`
    fn import_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::Import)?;
        let first = self.string_literal()?;

        let spec = if self.check(TokenKind::Comma) || self.check(TokenKind::From) {
            let mut names = vec![first];
            while self.eat(TokenKind::Comma) {
                names.push(self.string_literal()?);
            }
            self.expect(TokenKind::From)?;
            let module = self.string_literal()?;
            ImportSpec::From { names, module }
        } else {
            ImportSpec::Module(first)
        };

        Ok(Node::Import { pos: kw.pos, spec })
    }

    fn string_literal(&mut self) -> Result<String> {
        let tok = self.expect(TokenKind::Str)?;
        Ok(unquote(&tok.text))
    }

    /// `enum Id { (id = expr)* }`
    fn enum_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::Enum)?;
        let name = self.expect(TokenKind::Id)?;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let id = self.expect(TokenKind::Id)?;
            self.expect(TokenKind::Eq)?;
            let value = self.expr()?;
            members.push(EnumMember {
                pos: id.pos,
                name: id.text,
                value,
            });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Node::Enum {
            pos: kw.pos,
            name: name.text,
            members,
        })
    }

    /// `struct Id { (type id)* }`
    fn struct_stmt(&mut self) -> Result<Node> {
        let kw = self.expect(TokenKind::Struct)?;
        let name = self.expect(TokenKind::Id)?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let ty = self.expect(TokenKind::Id)?;
            let field = self.expect(TokenKind::Id)?;
            fields.push(StructField {
                pos: ty.pos,
                name: field.text,
                type_name: ty.text,
            });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Node::Struct {
            pos: kw.pos,
            name: name.text,
            fields,
        })
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expr(&mut self) -> Result<Node> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Node> {
        let mut left = self.and_expr()?;
        while self.check(TokenKind::OrOr) {
            self.advance();
            let right = self.and_expr()?;
            left = Node::BinaryOp {
                pos: left.pos(),
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Node> {
        let mut left = self.not_expr()?;
        while self.check(TokenKind::AndAnd) {
            self.advance();
            let right = self.not_expr()?;
            left = Node::BinaryOp {
                pos: left.pos(),
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Node> {
        if self.check(TokenKind::Bang) {
            let bang = self.advance().unwrap();
            let expr = self.not_expr()?;
            return Ok(Node::UnaryOp {
                pos: bang.pos,
                op: UnOp::Not,
                expr: Box::new(expr),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node> {
        let mut left = self.additive()?;
        while let Some(op) = self.peek_kind().and_then(comparison_op) {
            self.advance();
            let right = self.additive()?;
            left = Node::BinaryOp {
                pos: left.pos(),
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Node> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Node::BinaryOp {
                pos: left.pos(),
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Node> {
        let mut left = self.postfix()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.postfix()?;
            left = Node::BinaryOp {
                pos: left.pos(),
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn postfix(&mut self) -> Result<Node> {
        let base = self.primary()?;
        self.postfix_suffixes(base, true)
    }

    fn postfix_suffixes(&mut self, mut expr: Node, allow_call: bool) -> Result<Node> {
        loop {
            match self.peek_kind() {
                Some(TokenKind::LParen) if allow_call => {
                    self.advance();
                    let args = self.arg_list()?;
                    self.expect(TokenKind::RParen)?;
                    expr = Node::Call {
                        pos: expr.pos(),
                        func: Box::new(expr),
                        args,
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Node::Index {
                        pos: expr.pos(),
                        expr: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(TokenKind::Dot) => {
                    self.advance();
                    let attr = self.expect(TokenKind::Id)?;
                    expr = Node::Attribute {
                        pos: expr.pos(),
                        base: Box::new(expr),
                        attr: attr.text,
                        null_safe: false,
                    };
                }
                Some(TokenKind::QuestionDot) => {
                    self.advance();
                    let attr = self.expect(TokenKind::Id)?;
                    expr = Node::Attribute {
                        pos: expr.pos(),
                        base: Box::new(expr),
                        attr: attr.text,
                        null_safe: true,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn arg_list(&mut self) -> Result<Vec<ArgNode>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            // `id : expr` is a named argument.
            let name = if self.check(TokenKind::Id) && self.peek_kind_at(1) == Some(TokenKind::Colon)
            {
                let id = self.advance().unwrap();
                self.advance(); // colon
                Some(id)
            } else {
                None
            };
            let value = self.expr()?;
            args.push(ArgNode {
                pos: name.as_ref().map(|t| t.pos).unwrap_or_else(|| value.pos()),
                value,
                name: name.map(|t| t.text),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Node> {
        let tok = match self.peek() {
            Some(t) => t.clone(),
            None => return Err(self.eof()),
        };

        match tok.kind {
            TokenKind::Int => {
                self.advance();
                let value: i64 = tok
                    .text
                    .parse()
                    .map_err(|_| Error::syntax("Integer literal too large", tok.pos))?;
                Ok(Node::Int {
                    pos: tok.pos,
                    value,
                })
            }
            TokenKind::Float => {
                self.advance();
                let value: f64 = tok
                    .text
                    .parse()
                    .map_err(|_| Error::syntax("Malformed float literal", tok.pos))?;
                Ok(Node::Float {
                    pos: tok.pos,
                    value,
                })
            }
            TokenKind::Hex => {
                self.advance();
                let digits = &tok.text[2..];
                let value = i64::from_str_radix(digits, 16)
                    .map_err(|_| Error::syntax("Hex literal too large", tok.pos))?;
                Ok(Node::Hex {
                    pos: tok.pos,
                    value,
                })
            }
            TokenKind::Str => {
                self.advance();
                Ok(Node::Str {
                    pos: tok.pos,
                    value: unquote(&tok.text),
                })
            }
            TokenKind::Regex => {
                self.advance();
                Ok(Node::Regex {
                    pos: tok.pos,
                    pattern: unquote(&tok.text),
                })
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Node::Bool {
                    pos: tok.pos,
                    value: tok.kind == TokenKind::True,
                })
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Node::Nil { pos: tok.pos })
            }
            TokenKind::Id => {
                self.advance();
                Ok(Node::Id {
                    pos: tok.pos,
                    name: tok.text,
                })
            }
            TokenKind::New => {
                self.advance();
                // The class expression may be dotted or indexed, but a `(`
                // always begins the constructor argument list.
                let base = self.primary()?;
                let class = self.postfix_suffixes(base, false)?;
                self.expect(TokenKind::LParen)?;
                let args = self.arg_list()?;
                self.expect(TokenKind::RParen)?;
                Ok(Node::New {
                    pos: tok.pos,
                    class: Box::new(class),
                    args,
                })
            }
            TokenKind::LBrace => self.braced_expr(),
            _ => Err(self.unexpected()),
        }
    }

    /// `{…}` — array literal, dictionary literal, or array comprehension.
    fn braced_expr(&mut self) -> Result<Node> {
        let open = self.expect(TokenKind::LBrace)?;

        if self.eat(TokenKind::RBrace) {
            return Ok(Node::Array {
                pos: open.pos,
                items: Vec::new(),
            });
        }

        let first = self.expr()?;

        if self.eat(TokenKind::Colon) {
            // `{e : id in src}` is a comprehension; anything else after the
            // colon makes this a dictionary.
            if self.check(TokenKind::Id) && self.peek_kind_at(1) == Some(TokenKind::In) {
                let binder = self.advance().unwrap();
                self.expect(TokenKind::In)?;
                let source = self.expr()?;
                self.expect(TokenKind::RBrace)?;
                return Ok(Node::ArrayComp {
                    pos: open.pos,
                    expr: Box::new(first),
                    binder: binder.text,
                    source: Box::new(source),
                });
            }

            let mut entries = vec![(first, self.expr()?)];
            while self.eat(TokenKind::Comma) {
                let key = self.expr()?;
                self.expect(TokenKind::Colon)?;
                let value = self.expr()?;
                entries.push((key, value));
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(Node::Dictionary {
                pos: open.pos,
                entries,
            });
        }

        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            items.push(self.expr()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Node::Array {
            pos: open.pos,
            items,
        })
    }
}

fn compound_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Plus => Some(BinOp::Add),
        TokenKind::Minus => Some(BinOp::Sub),
        TokenKind::Star => Some(BinOp::Mul),
        TokenKind::Slash => Some(BinOp::Div),
        TokenKind::Percent => Some(BinOp::Mod),
        _ => None,
    }
}

fn comparison_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::EqEq => Some(BinOp::Eq),
        TokenKind::NotEq => Some(BinOp::Ne),
        TokenKind::Lt => Some(BinOp::Lt),
        TokenKind::Gt => Some(BinOp::Gt),
        TokenKind::Le => Some(BinOp::Le),
        TokenKind::Ge => Some(BinOp::Ge),
        _ => None,
    }
}

fn unquote(text: &str) -> String {
    text[1..text.len() - 1].to_string()
}
