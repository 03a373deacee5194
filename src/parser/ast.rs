// AST node definitions for the template language

use crate::span::Span;
use rust_decimal::Decimal;

/// Top-level AST: a list of statements (raw text chunks and code)
#[derive(Debug, Clone)]
pub struct Ast {
    pub stmts: Vec<Stmt>,
}

/// A statement with source span
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

// --- Boxed data structs for large StmtKind variants ---

#[derive(Debug, Clone)]
pub struct AssignData {
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct IfData {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct CaseData {
    pub value: Expr,
    pub whens: Vec<WhenArm>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhenArm {
    pub values: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForData {
    pub var: String,
    pub iterable: Expr,
    pub args: Vec<LoopArg>,
    pub body: Vec<Stmt>,
}

/// Named loop argument: `offset: 1`, `limit: 2`, bare `reversed`
#[derive(Debug, Clone)]
pub struct LoopArg {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileData {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CaptureData {
    pub target: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct WithData {
    pub target: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct FuncDefData {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub is_rest: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Raw template text outside code blocks
    Text(String),

    /// Expression statement: the value auto-prints when non-null
    Expr(Expr),

    /// Assignment: `target = value`
    Assign(Box<AssignData>),

    /// If statement (`else if` chains nest inside else_body)
    If(Box<IfData>),

    /// Case/when dispatch
    Case(Box<CaseData>),

    /// For loop over a sequence, with optional offset/limit/reversed
    For(Box<ForData>),

    /// While loop
    While(Box<WhileData>),

    /// Table-row loop: for loop emitting HTML row/cell markup
    TableRow(Box<ForData>),

    /// Capture block: body output is bound to the target instead of written
    Capture(Box<CaptureData>),

    /// With block: pushes the target object as the innermost global scope
    With(Box<WithData>),

    /// Import: merges a keyed container into the current global scope
    Import(Expr),

    /// Named function definition
    FuncDef(Box<FuncDefData>),

    /// Return from the enclosing function (or the render itself)
    Ret(Option<Expr>),

    Break,
    Continue,
}

/// Expression with source span
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Which scope stack a variable resolves against. Fixed at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Global,
    Local,
    Loop,
}

/// Call argument, optionally named: `f(1, sep: ", ")`
#[derive(Debug, Clone)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    NullLit,
    BoolLit(bool),
    IntLit(i32),
    LongLit(i64),
    FloatLit(f32),
    DoubleLit(f64),
    DecimalLit(Decimal),
    StrLit(String),
    /// The distinguished `empty` sentinel
    EmptyLit,

    /// Variable reference, tagged with its scope at parse time
    Var { name: String, scope: VarScope },

    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Unary operation
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Member access: `expr.name`
    Member { target: Box<Expr>, name: String },

    /// Indexer access: `expr[index]`
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },

    /// Emptiness test: `expr.empty?`
    IsEmpty { target: Box<Expr> },

    /// Pipe: `input | func`
    Pipe { input: Box<Expr>, func: Box<Expr> },

    /// Function call with positional and named arguments
    Call {
        target: Box<Expr>,
        args: Vec<CallArg>,
    },

    /// Array initializer: `[a, b, c]`
    ArrayInit(Vec<Expr>),

    /// Object initializer: `{key: value, ...}` in source order
    ObjectInit(Vec<(String, Expr)>),

    /// Anonymous function: `do(params) ... end`
    AnonFunc(Box<FuncDefData>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    DivRound,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    NullCoalesce,
    RangeIncl,
    RangeExcl,
    ShiftLeft,
    ShiftRight,
    Contains,
    StartsWith,
    EndsWith,
}

impl BinaryOp {
    /// The operator's textual form, used in error messages
    pub fn text(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::DivRound => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::NullCoalesce => "??",
            BinaryOp::RangeIncl => "..",
            BinaryOp::RangeExcl => "..<",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Contains => "contains",
            BinaryOp::StartsWith => "startsWith",
            BinaryOp::EndsWith => "endsWith",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!` boolean negation
    Not,
    /// `-` arithmetic negation
    Negate,
    /// `+` numeric identity
    Plus,
    /// `@` function alias: yields the callable without invoking it
    Alias,
    /// `^` argument expansion, only meaningful in call-argument position
    Expand,
}

impl UnaryOp {
    pub fn text(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Alias => "@",
            UnaryOp::Expand => "^",
        }
    }
}
