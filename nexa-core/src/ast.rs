//! Surface syntax tree for Nexa.
//!
//! Every [`Expr`] carries a type slot that starts empty and is filled in
//! by the analyzer. Lowering only ever reads it.

use crate::lexer::TokenKind;
use crate::span::Span;
use crate::types::{Scalar, Type};

/// The bracket pair used by a shaped declaration or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeFamily {
    /// `<x>`
    Int32,
    /// `<<x>>`
    Int64,
    /// `|x|`
    Float32,
    /// `||x||`
    Float64,
    /// `{x}`
    Char,
    /// `{{x}}`
    String,
}

impl ShapeFamily {
    /// The family opened by `kind`, if it is an opening shape bracket.
    pub fn from_open(kind: TokenKind) -> Option<ShapeFamily> {
        match kind {
            TokenKind::Less => Some(ShapeFamily::Int32),
            TokenKind::DoubleLess => Some(ShapeFamily::Int64),
            TokenKind::Pipe => Some(ShapeFamily::Float32),
            TokenKind::DoublePipe => Some(ShapeFamily::Float64),
            TokenKind::LBrace => Some(ShapeFamily::Char),
            TokenKind::DoubleLBrace => Some(ShapeFamily::String),
            _ => None,
        }
    }

    pub fn open(self) -> TokenKind {
        match self {
            ShapeFamily::Int32 => TokenKind::Less,
            ShapeFamily::Int64 => TokenKind::DoubleLess,
            ShapeFamily::Float32 => TokenKind::Pipe,
            ShapeFamily::Float64 => TokenKind::DoublePipe,
            ShapeFamily::Char => TokenKind::LBrace,
            ShapeFamily::String => TokenKind::DoubleLBrace,
        }
    }

    pub fn close(self) -> TokenKind {
        match self {
            ShapeFamily::Int32 => TokenKind::Greater,
            ShapeFamily::Int64 => TokenKind::DoubleGreater,
            ShapeFamily::Float32 => TokenKind::Pipe,
            ShapeFamily::Float64 => TokenKind::DoublePipe,
            ShapeFamily::Char => TokenKind::RBrace,
            ShapeFamily::String => TokenKind::DoubleRBrace,
        }
    }

    pub fn element(self) -> Scalar {
        match self {
            ShapeFamily::Int32 => Scalar::Int32,
            ShapeFamily::Int64 => Scalar::Int64,
            ShapeFamily::Float32 => Scalar::Float32,
            ShapeFamily::Float64 => Scalar::Float64,
            ShapeFamily::Char => Scalar::Char,
            ShapeFamily::String => Scalar::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Resolved type; `None` until analysis succeeds on this node.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Char(u8),
    Bool(bool),
    Var(String),
    /// `<a>`: a variable referenced through its bracket family.
    ShapedVar {
        family: ShapeFamily,
        name: String,
    },
    /// `f(args)`; only builtins exist.
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    /// `a[i]`; `base` is always a `Var`.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    ArrayLit(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `<a>.<b>`: dot product for arrays, matrix multiply for matrices.
    /// Both sides are `ShapedVar`s of the same family.
    Dot {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr {
            kind,
            span,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `int x = expr;`
    VarDecl {
        ty: Type,
        name: Ident,
        init: Expr,
    },
    /// `<x> = e1, e2, ...;`
    ShapedDecl {
        family: ShapeFamily,
        name: Ident,
        inits: Vec<Expr>,
        /// Declared type, resolved from the initializer shape.
        resolved: Option<Type>,
    },
    /// `x = expr;`
    Assign {
        target: Ident,
        value: Expr,
    },
    /// `print(expr);`
    Print(Expr),
    /// `loop(i, count) { ... }`
    Loop {
        iterator: Ident,
        count: Expr,
        body: Vec<Stmt>,
    },
}

/// Root of a compilation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILIES: [ShapeFamily; 6] = [
        ShapeFamily::Int32,
        ShapeFamily::Int64,
        ShapeFamily::Float32,
        ShapeFamily::Float64,
        ShapeFamily::Char,
        ShapeFamily::String,
    ];

    #[test]
    fn open_bracket_maps_back_to_its_family() {
        for family in FAMILIES {
            assert_eq!(ShapeFamily::from_open(family.open()), Some(family));
        }
    }

    #[test]
    fn doubled_families_use_doubled_brackets() {
        assert_eq!(ShapeFamily::Int64.open(), TokenKind::DoubleLess);
        assert_eq!(ShapeFamily::Int64.close(), TokenKind::DoubleGreater);
        assert_eq!(ShapeFamily::String.open(), TokenKind::DoubleLBrace);
        assert_eq!(ShapeFamily::Float32.open(), ShapeFamily::Float32.close());
    }
}
