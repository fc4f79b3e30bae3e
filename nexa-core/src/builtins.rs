//! Built-in functions visible at the Nexa language level.
//!
//! Nexa has no user-defined functions; the postfix call syntax only
//! reaches the shape queries listed here. All of them are answered from
//! the argument's static type, so lowering folds them to constants.

use crate::types::Type;

/// Kind of builtin, used by lowering to compute the constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// Number of elements in an array or matrix.
    Len,
    /// Number of rows; arrays have one.
    Rows,
    /// Number of columns; equals the length for arrays.
    Cols,
}

/// Metadata about a single builtin symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub name: &'static str,
    pub arity: usize,
    pub kind: BuiltinKind,
}

/// The complete list of builtins known to the core.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        name: "len",
        arity: 1,
        kind: BuiltinKind::Len,
    },
    BuiltinDescriptor {
        name: "rows",
        arity: 1,
        kind: BuiltinKind::Rows,
    },
    BuiltinDescriptor {
        name: "cols",
        arity: 1,
        kind: BuiltinKind::Cols,
    },
];

/// Look up a builtin by its Nexa-level name.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

impl BuiltinKind {
    /// Result type for an argument of type `arg`, or `None` if the
    /// argument is not accepted.
    pub fn result_type(self, arg: &Type) -> Option<Type> {
        arg.is_aggregate().then_some(Type::INT32)
    }

    /// Constant value of the call for an argument of type `arg`.
    pub fn evaluate(self, arg: &Type) -> i64 {
        let (rows, cols) = arg.shape();
        match self {
            BuiltinKind::Len => i64::from(rows) * i64::from(cols),
            BuiltinKind::Rows => i64::from(rows),
            BuiltinKind::Cols => i64::from(cols),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scalar;

    #[test]
    fn finds_known_builtins() {
        assert_eq!(find_builtin("len").map(|b| b.kind), Some(BuiltinKind::Len));
        assert!(find_builtin("printf").is_none());
    }

    #[test]
    fn evaluates_shape_queries() {
        let matrix = Type::Matrix(Scalar::Float64, 2, 3);
        assert_eq!(BuiltinKind::Len.evaluate(&matrix), 6);
        assert_eq!(BuiltinKind::Rows.evaluate(&matrix), 2);
        assert_eq!(BuiltinKind::Cols.evaluate(&matrix), 3);
        assert_eq!(BuiltinKind::Cols.evaluate(&Type::Array(Scalar::Int32, 4)), 4);
    }

    #[test]
    fn rejects_scalar_arguments() {
        assert_eq!(BuiltinKind::Len.result_type(&Type::INT32), None);
        assert_eq!(
            BuiltinKind::Len.result_type(&Type::Array(Scalar::Int32, 2)),
            Some(Type::INT32)
        );
    }
}
