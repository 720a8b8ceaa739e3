//! Abstract syntax tree.

/// A type annotation as written in source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeAnn {
    Bool,
    I256,
    U256,
    ByteVec,
    Address,
    /// `Contract<Name>`: a handle to a deployed contract of that type.
    Contract(String),
    /// `[T; n]`
    Array(Box<TypeAnn>, usize),
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    And,
    Or,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

/// Expressions; every node carries its source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    BoolLit(bool, usize),
    /// Numeric literal text, `i` suffix forcing I256.
    NumLit(String, usize),
    Var(String, usize),
    /// `base[index]`; indices must be constant.
    Index(Box<Expr>, Box<Expr>, usize),
    Binary(BinOp, Box<Expr>, Box<Expr>, usize),
    Unary(UnOp, Box<Expr>, usize),
    /// Local function call.
    Call(String, Vec<Expr>, usize),
    /// Builtin call, `name!(args)`.
    Builtin(String, Vec<Expr>, usize),
    /// `[a, b, c]`
    ArrayLit(Vec<Expr>, usize),
    /// `[e; n]`
    ArrayRepeat(Box<Expr>, usize, usize),
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::BoolLit(_, line)
            | Expr::NumLit(_, line)
            | Expr::Var(_, line)
            | Expr::Index(_, _, line)
            | Expr::Binary(_, _, _, line)
            | Expr::Unary(_, _, line)
            | Expr::Call(_, _, line)
            | Expr::Builtin(_, _, line)
            | Expr::ArrayLit(_, line)
            | Expr::ArrayRepeat(_, _, line) => *line,
        }
    }
}

/// Assignment targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignTarget {
    Var(String),
    /// `name[i]…[k]`
    Index(String, Vec<Expr>),
}

/// Statements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    Let {
        name: String,
        type_ann: Option<TypeAnn>,
        value: Expr,
        line: usize,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        line: usize,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Return(Vec<Expr>, usize),
    Emit {
        event: String,
        args: Vec<Expr>,
        line: usize,
    },
    /// Bare call for its effects; returned values are dropped.
    ExprStmt(Expr),
}

/// A function definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncDef {
    pub name: String,
    pub is_public: bool,
    pub is_payable: bool,
    /// `(name, annotation)`; a missing annotation defaults to `U256`.
    pub params: Vec<(String, Option<TypeAnn>)>,
    pub returns: Vec<TypeAnn>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

/// An event definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDef {
    pub name: String,
    pub fields: Vec<(String, TypeAnn)>,
    pub line: usize,
}

/// Top-level form kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    TxScript,
    TxContract,
    AssetScript,
}

/// One top-level definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractDef {
    pub kind: ContractKind,
    pub name: String,
    /// Persistent fields; only `TxContract` may have them.
    pub fields: Vec<(String, TypeAnn)>,
    pub events: Vec<EventDef>,
    pub funcs: Vec<FuncDef>,
    pub line: usize,
}
