use serde::{Deserialize, Serialize};

pub mod source_map;
pub use source_map::{Location, SourceMap};

// ---- Span infrastructure ----

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span { start: range.start, end: range.end }
    }
}

// ---- Core AST types ----

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name = expr;`
    Let {
        name: String,
        value: Expr,
        #[serde(skip)]
        span: Span,
    },

    /// Expression evaluated for its value: `expr;`
    Expr {
        expr: Expr,
        #[serde(skip)]
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. } | Stmt::Expr { span, .. } => *span,
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Integer(i64),
    Boolean(bool),
    Str(String),

    /// Identifier reference (global binding or builtin name)
    Ident(String),

    /// `!expr` or `-expr`
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
    },

    /// `left op right`
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `[a, b, c]`
    Array(Vec<Expr>),

    /// `callee(arg, ...)`
    Call {
        function: Box<Expr>,
        args: Vec<Expr>,
    },

    /// `left[index]`
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },

    /// `if (cond) { ... } else { ... }`
    If {
        condition: Box<Expr>,
        consequence: Vec<Stmt>,
        alternative: Option<Vec<Stmt>>,
    },
}

impl Expr {
    /// Short human-readable name of the node shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Integer(_) => "integer literal",
            Expr::Boolean(_) => "boolean literal",
            Expr::Str(_) => "string literal",
            Expr::Ident(_) => "identifier",
            Expr::Prefix { .. } => "prefix expression",
            Expr::Infix { .. } => "infix expression",
            Expr::Array(_) => "array literal",
            Expr::Call { .. } => "call expression",
            Expr::Index { .. } => "index expression",
            Expr::If { .. } => "if expression",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Not,
    Negate,
}

impl std::fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PrefixOp::Not => "!",
            PrefixOp::Negate => "-",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfixOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
}

impl std::fmt::Display for InfixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InfixOp::Add => "+",
            InfixOp::Subtract => "-",
            InfixOp::Multiply => "*",
            InfixOp::Divide => "/",
            InfixOp::Modulo => "%",
            InfixOp::Equals => "==",
            InfixOp::NotEquals => "!=",
            InfixOp::LessThan => "<",
            InfixOp::GreaterThan => ">",
        })
    }
}

/// A complete program is a list of statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
    #[serde(skip)]
    pub source: Option<String>,
}
