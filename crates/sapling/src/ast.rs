//! The instruction-node tree the parser emits and the evaluator consumes.
//!
//! Nodes form a closed variant set. Every node carries the position of its
//! leading token. The whole tree derives `serde` so a parsed program can be
//! written to a `.sapped` sidecar and reloaded without reparsing (see
//! [`crate::cache`]).

use serde::{Deserialize, Serialize};

use crate::token::Pos;

/// A whole program: the top-level statement sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub pos: Pos,
    pub stmts: Vec<Node>,
}

/// A braced statement sequence. A `Return` inside short-circuits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub pos: Pos,
    pub stmts: Vec<Node>,
}

/// Binary operator tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        f.write_str(s)
    }
}

/// Unary operator tags. `!` is the only prefix operator in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
}

/// A call-site argument: the value expression plus an optional name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgNode {
    pub pos: Pos,
    pub value: Node,
    pub name: Option<String>,
}

/// A declared parameter: name, annotation (`any` means unchecked), and an
/// optional default expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamNode {
    pub pos: Pos,
    pub name: String,
    pub annotation: String,
    pub default: Option<Node>,
}

/// One `type name` field of a struct declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub pos: Pos,
    pub name: String,
    pub type_name: String,
}

/// One `name = expr` member of an enum declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub pos: Pos,
    pub name: String,
    pub value: Node,
}

/// The two import forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportSpec {
    /// `import "mod"` — bind the whole module.
    Module(String),
    /// `import "a", "b" from "mod"` — copy the named attributes.
    From { names: Vec<String>, module: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Int {
        pos: Pos,
        value: i64,
    },
    Float {
        pos: Pos,
        value: f64,
    },
    Hex {
        pos: Pos,
        value: i64,
    },
    Bool {
        pos: Pos,
        value: bool,
    },
    Str {
        pos: Pos,
        value: String,
    },
    Regex {
        pos: Pos,
        pattern: String,
    },
    Nil {
        pos: Pos,
    },
    Id {
        pos: Pos,
        name: String,
    },
    Array {
        pos: Pos,
        items: Vec<Node>,
    },
    Dictionary {
        pos: Pos,
        entries: Vec<(Node, Node)>,
    },
    ArrayComp {
        pos: Pos,
        expr: Box<Node>,
        binder: String,
        source: Box<Node>,
    },
    BinaryOp {
        pos: Pos,
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryOp {
        pos: Pos,
        op: UnOp,
        expr: Box<Node>,
    },
    Index {
        pos: Pos,
        expr: Box<Node>,
        index: Box<Node>,
    },
    Attribute {
        pos: Pos,
        base: Box<Node>,
        attr: String,
        null_safe: bool,
    },
    Call {
        pos: Pos,
        func: Box<Node>,
        args: Vec<ArgNode>,
    },
    New {
        pos: Pos,
        class: Box<Node>,
        args: Vec<ArgNode>,
    },
    Assign {
        pos: Pos,
        name: String,
        value: Box<Node>,
        constant: bool,
        /// Compound-assignment operator (`x += e`), or `None` for plain `=`.
        op: Option<BinOp>,
        /// Annotated type name; `any` means unchecked.
        annotation: String,
    },
    FuncDef {
        pos: Pos,
        name: String,
        params: Vec<ParamNode>,
        body: Body,
    },
    AttrFuncDef {
        pos: Pos,
        class_name: String,
        name: String,
        params: Vec<ParamNode>,
        body: Body,
    },
    Struct {
        pos: Pos,
        name: String,
        fields: Vec<StructField>,
    },
    Enum {
        pos: Pos,
        name: String,
        members: Vec<EnumMember>,
    },
    /// Writes a field on the owning class; only synthesised inside `_init`
    /// bodies of struct classes.
    SetSelf {
        pos: Pos,
        field: String,
        value: Box<Node>,
        class_name: String,
    },
    If {
        pos: Pos,
        condition: Box<Node>,
        then: Body,
        otherwise: Option<Body>,
    },
    While {
        pos: Pos,
        condition: Box<Node>,
        body: Body,
    },
    Repeat {
        pos: Pos,
        body: Body,
        until: Box<Node>,
    },
    Return {
        pos: Pos,
        value: Box<Node>,
    },
    Import {
        pos: Pos,
        spec: ImportSpec,
    },
}

impl Node {
    /// The position of the node's leading token.
    pub fn pos(&self) -> Pos {
        match self {
            Node::Int { pos, .. }
            | Node::Float { pos, .. }
            | Node::Hex { pos, .. }
            | Node::Bool { pos, .. }
            | Node::Str { pos, .. }
            | Node::Regex { pos, .. }
            | Node::Nil { pos }
            | Node::Id { pos, .. }
            | Node::Array { pos, .. }
            | Node::Dictionary { pos, .. }
            | Node::ArrayComp { pos, .. }
            | Node::BinaryOp { pos, .. }
            | Node::UnaryOp { pos, .. }
            | Node::Index { pos, .. }
            | Node::Attribute { pos, .. }
            | Node::Call { pos, .. }
            | Node::New { pos, .. }
            | Node::Assign { pos, .. }
            | Node::FuncDef { pos, .. }
            | Node::AttrFuncDef { pos, .. }
            | Node::Struct { pos, .. }
            | Node::Enum { pos, .. }
            | Node::SetSelf { pos, .. }
            | Node::If { pos, .. }
            | Node::While { pos, .. }
            | Node::Repeat { pos, .. }
            | Node::Return { pos, .. }
            | Node::Import { pos, .. } => *pos,
        }
    }
}
