//! Core type system for Nexa.
//!
//! Types are plain values compared structurally. Aggregates carry their
//! shape, and their element is always a [`Scalar`], so nested
//! aggregates cannot be represented at all.

use std::fmt;

/// Scalar kinds. Also the element type of arrays and matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    Bool,
    String,
}

impl Scalar {
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Scalar::Int32 | Scalar::Int64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Scalar::Float32 | Scalar::Float64)
    }

    /// Position in the promotion order; `None` for non-numeric kinds.
    fn rank(self) -> Option<u8> {
        match self {
            Scalar::Int32 => Some(0),
            Scalar::Int64 => Some(1),
            Scalar::Float32 => Some(2),
            Scalar::Float64 => Some(3),
            Scalar::Char | Scalar::Bool | Scalar::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scalar::Int32 => "int",
            Scalar::Int64 => "long",
            Scalar::Float32 => "float",
            Scalar::Float64 => "double",
            Scalar::Char => "char",
            Scalar::Bool => "bool",
            Scalar::String => "string",
        }
    }
}

/// Represents the type of a value or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(Scalar),
    /// One-dimensional array of `len` elements.
    Array(Scalar, u32),
    /// Row-major matrix of `rows * cols` elements.
    Matrix(Scalar, u32, u32),
}

impl Type {
    pub const INT32: Type = Type::Scalar(Scalar::Int32);
    pub const INT64: Type = Type::Scalar(Scalar::Int64);
    pub const FLOAT32: Type = Type::Scalar(Scalar::Float32);
    pub const FLOAT64: Type = Type::Scalar(Scalar::Float64);
    pub const CHAR: Type = Type::Scalar(Scalar::Char);
    pub const BOOL: Type = Type::Scalar(Scalar::Bool);
    pub const STRING: Type = Type::Scalar(Scalar::String);

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Type::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_scalar().is_some_and(Scalar::is_numeric)
    }

    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Type::Scalar(_))
    }

    /// Element type of an aggregate, or the scalar itself.
    pub fn element(&self) -> Scalar {
        match self {
            Type::Scalar(scalar) | Type::Array(scalar, _) | Type::Matrix(scalar, _, _) => *scalar,
        }
    }

    /// Shape as `(rows, cols)`. Scalars are `(1, 1)`; arrays are one row.
    pub fn shape(&self) -> (u32, u32) {
        match self {
            Type::Scalar(_) => (1, 1),
            Type::Array(_, len) => (1, *len),
            Type::Matrix(_, rows, cols) => (*rows, *cols),
        }
    }

    /// Total number of scalar elements.
    pub fn element_count(&self) -> u32 {
        let (rows, cols) = self.shape();
        rows * cols
    }
}

impl From<Scalar> for Type {
    fn from(scalar: Scalar) -> Self {
        Type::Scalar(scalar)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(scalar) => write!(f, "{scalar}"),
            Type::Array(elem, len) => write!(f, "{elem}[{len}]"),
            Type::Matrix(elem, rows, cols) => write!(f, "{elem}[{rows}x{cols}]"),
        }
    }
}

/// Result of checking whether a value can be stored into a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    /// Identical types; stored as-is.
    Equal,
    /// Both numeric; the value is converted to the target type.
    Convert,
    /// Not storable.
    Incompatible,
}

/// Check whether a value of type `value` may initialize or be assigned to
/// a slot of type `target`.
///
/// The target type always wins: any numeric scalar converts to any other
/// numeric scalar. Aggregates must match exactly.
pub fn assignability(target: &Type, value: &Type) -> Assignability {
    if target == value {
        return Assignability::Equal;
    }
    if target.is_numeric() && value.is_numeric() {
        return Assignability::Convert;
    }
    Assignability::Incompatible
}

/// Same rule as [`assignability`], applied to scalar element kinds.
pub fn scalar_assignability(target: Scalar, value: Scalar) -> Assignability {
    assignability(&Type::Scalar(target), &Type::Scalar(value))
}

/// Result type of an arithmetic operation on two numeric scalars.
///
/// Equal kinds propagate unchanged; otherwise the wider kind wins, with
/// any float ranking above any integer. Returns `None` when either side
/// is not numeric.
pub fn promote(left: Scalar, right: Scalar) -> Option<Scalar> {
    let (l, r) = (left.rank()?, right.rank()?);
    Some(if l >= r { left } else { right })
}
