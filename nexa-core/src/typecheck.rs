//! Semantic analysis for Nexa.
//!
//! A single top-to-bottom pass binds names through a [`SymbolTable`],
//! checks types, and writes the resolved type of every expression into
//! its `ty` slot. The first fault aborts the pass.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, Ident, Program, ShapeFamily, Stmt, StmtKind};
use crate::builtins::find_builtin;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::span::Span;
use crate::types::{Assignability, Scalar, Type, assignability, promote, scalar_assignability};

/// Analyze `program` in place.
///
/// The symbol table is rebuilt on every call, so running the analysis
/// again on an already annotated program yields the same annotations.
#[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
pub fn analyze(program: &mut Program) -> Result<(), CoreError> {
    let mut checker = TypeChecker::new();
    for stmt in &mut program.statements {
        checker.check_stmt(stmt)?;
    }
    tracing::debug!("analysis complete");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub ty: Type,
    /// Loop iterators are read-only.
    pub mutable: bool,
}

/// Flat namespace with nested block scopes.
///
/// A name may exist in at most one live scope: there is no shadowing,
/// and declaring a name that is visible anywhere is an error. Leaving a
/// scope forgets everything declared in it.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable {
            scopes: vec![HashMap::new()],
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Insert into the innermost scope. Returns `false` if the name is
    /// already visible.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> bool {
        if self.contains(name) {
            return false;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
        true
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }
}

fn error(span: Span, code: &'static str, message: impl Into<String>) -> CoreError {
    CoreError::SemanticError(Diagnostic::error(message, span).with_code(code))
}

fn undefined(name: &str, span: Span) -> CoreError {
    error(span, "E0201", format!("undefined variable `{name}`"))
}

struct TypeChecker {
    symbols: SymbolTable,
}

impl TypeChecker {
    fn new() -> Self {
        TypeChecker {
            symbols: SymbolTable::new(),
        }
    }

    fn declare(&mut self, name: &Ident, ty: Type, mutable: bool) -> Result<(), CoreError> {
        if self.symbols.declare(&name.name, Symbol { ty, mutable }) {
            Ok(())
        } else {
            Err(redeclared(name))
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CoreError> {
        match &mut stmt.kind {
            StmtKind::VarDecl { ty, name, init } => {
                if self.symbols.contains(&name.name) {
                    return Err(redeclared(name));
                }
                let init_ty = self.check_expr(init)?;
                if assignability(ty, &init_ty) == Assignability::Incompatible {
                    return Err(error(
                        init.span,
                        "E0203",
                        format!(
                            "cannot initialize `{}` of type {ty} with a value of type {init_ty}",
                            name.name
                        ),
                    ));
                }
                self.declare(name, *ty, true)
            }
            StmtKind::ShapedDecl {
                family,
                name,
                inits,
                resolved,
            } => {
                if self.symbols.contains(&name.name) {
                    return Err(redeclared(name));
                }
                let ty = self.resolve_shaped(*family, name, inits)?;
                *resolved = Some(ty);
                self.declare(name, ty, true)
            }
            StmtKind::Assign { target, value } => {
                let symbol = *self
                    .symbols
                    .lookup(&target.name)
                    .ok_or_else(|| undefined(&target.name, target.span))?;
                if !symbol.mutable {
                    return Err(error(
                        target.span,
                        "E0208",
                        format!("cannot assign to loop iterator `{}`", target.name),
                    ));
                }
                let value_ty = self.check_expr(value)?;
                if assignability(&symbol.ty, &value_ty) == Assignability::Incompatible {
                    return Err(error(
                        value.span,
                        "E0203",
                        format!(
                            "cannot assign a value of type {value_ty} to `{}` of type {}",
                            target.name, symbol.ty
                        ),
                    ));
                }
                Ok(())
            }
            StmtKind::Print(expr) => self.check_expr(expr).map(|_| ()),
            StmtKind::Loop {
                iterator,
                count,
                body,
            } => {
                let count_ty = self.check_expr(count)?;
                if count_ty != Type::INT32 {
                    return Err(error(
                        count.span,
                        "E0203",
                        format!("loop count must be int, found {count_ty}"),
                    ));
                }
                if self.symbols.contains(&iterator.name) {
                    return Err(redeclared(iterator));
                }

                self.symbols.push_scope();
                let result = self
                    .declare(iterator, Type::INT32, false)
                    .and_then(|()| body.iter_mut().try_for_each(|stmt| self.check_stmt(stmt)));
                self.symbols.pop_scope();
                result
            }
        }
    }

    /// Work out the declared type of `<x> = ...` from the shape of its
    /// initializers.
    fn resolve_shaped(
        &mut self,
        family: ShapeFamily,
        name: &Ident,
        inits: &mut [Expr],
    ) -> Result<Type, CoreError> {
        let elem = family.element();
        if inits.is_empty() {
            return Ok(Type::Scalar(elem));
        }

        let mut types = Vec::with_capacity(inits.len());
        for init in inits.iter_mut() {
            types.push(self.check_expr(init)?);
        }

        if let [single] = types.as_slice() {
            let init = &inits[0];
            return match single {
                Type::Scalar(value) => {
                    check_element(elem, *value, name, init.span)?;
                    Ok(Type::Scalar(elem))
                }
                Type::Array(value, len) if matches!(init.kind, ExprKind::ArrayLit(_)) => {
                    check_element(elem, *value, name, init.span)?;
                    Ok(Type::Array(elem, *len))
                }
                aggregate => {
                    if aggregate.element() != elem {
                        return Err(error(
                            init.span,
                            "E0203",
                            format!(
                                "cannot initialize `{}` with element type {elem} from a value of type {aggregate}",
                                name.name
                            ),
                        ));
                    }
                    Ok(*aggregate)
                }
            };
        }

        if types.iter().all(|ty| !ty.is_aggregate()) {
            for (ty, init) in types.iter().zip(inits.iter()) {
                check_element(elem, ty.element(), name, init.span)?;
            }
            return Ok(Type::Array(elem, types.len() as u32));
        }

        let all_rows = inits
            .iter()
            .all(|init| matches!(init.kind, ExprKind::ArrayLit(_)));
        if !all_rows {
            return Err(error(
                name.span,
                "E0203",
                format!(
                    "initializers of `{}` must be all scalars or all array literal rows",
                    name.name
                ),
            ));
        }

        let (_, cols) = types[0].shape();
        for (ty, init) in types.iter().zip(inits.iter()) {
            let (_, row_len) = ty.shape();
            if row_len != cols {
                return Err(error(
                    init.span,
                    "E0205",
                    format!("matrix rows must have equal length: expected {cols}, found {row_len}"),
                ));
            }
            check_element(elem, ty.element(), name, init.span)?;
        }
        Ok(Type::Matrix(elem, types.len() as u32, cols))
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Result<Type, CoreError> {
        if let Some(ty) = expr.ty {
            if is_literal(&expr.kind) {
                return Ok(ty);
            }
        }

        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::Int(value) => {
                if i32::try_from(*value).is_ok() {
                    Type::INT32
                } else {
                    Type::INT64
                }
            }
            ExprKind::Float(_) => Type::FLOAT64,
            ExprKind::Str(_) => Type::STRING,
            ExprKind::Char(_) => Type::CHAR,
            ExprKind::Bool(_) => Type::BOOL,
            ExprKind::Var(name) => {
                self.symbols
                    .lookup(name)
                    .ok_or_else(|| undefined(name, span))?
                    .ty
            }
            ExprKind::ShapedVar { family, name } => {
                let ty = self
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| undefined(name, span))?
                    .ty;
                if ty.element() != family.element() {
                    return Err(error(
                        span,
                        "E0203",
                        format!(
                            "`{name}` has element type {}, but is referenced with {} brackets",
                            ty.element(),
                            family.element()
                        ),
                    ));
                }
                ty
            }
            ExprKind::Call { callee, args } => {
                let builtin = find_builtin(&callee.name).ok_or_else(|| {
                    error(
                        callee.span,
                        "E0207",
                        format!("unknown function `{}`", callee.name),
                    )
                })?;
                if args.len() != builtin.arity {
                    return Err(error(
                        span,
                        "E0207",
                        format!(
                            "`{}` expects {} argument(s) but received {}",
                            builtin.name,
                            builtin.arity,
                            args.len()
                        ),
                    ));
                }
                let arg_ty = self.check_expr(&mut args[0])?;
                builtin.kind.result_type(&arg_ty).ok_or_else(|| {
                    error(
                        args[0].span,
                        "E0207",
                        format!(
                            "`{}` expects an array or matrix, found {arg_ty}",
                            builtin.name
                        ),
                    )
                })?
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base)?;
                let Type::Array(elem, len) = base_ty else {
                    return Err(error(
                        base.span,
                        "E0206",
                        format!("cannot index into a value of type {base_ty}"),
                    ));
                };
                let index_ty = self.check_expr(index)?;
                if index_ty != Type::INT32 {
                    return Err(error(
                        index.span,
                        "E0206",
                        format!("array index must be int, found {index_ty}"),
                    ));
                }
                if let ExprKind::Int(value) = index.kind {
                    if value < 0 || value >= i64::from(len) {
                        return Err(error(
                            index.span,
                            "E0206",
                            format!("index {value} is out of bounds for an array of length {len}"),
                        ));
                    }
                }
                Type::Scalar(elem)
            }
            ExprKind::ArrayLit(elements) => {
                if elements.is_empty() {
                    return Err(error(span, "E0209", "array literal must not be empty"));
                }
                let mut elem: Option<Scalar> = None;
                for element in elements.iter_mut() {
                    let ty = self.check_expr(element)?;
                    let Type::Scalar(scalar) = ty else {
                        return Err(error(
                            element.span,
                            "E0209",
                            "nested array literals are only allowed as matrix rows of a shaped declaration",
                        ));
                    };
                    match elem {
                        None => elem = Some(scalar),
                        Some(first) if first != scalar => {
                            return Err(error(
                                element.span,
                                "E0209",
                                format!(
                                    "array literal elements must share one type: found {first} and {scalar}"
                                ),
                            ));
                        }
                        Some(_) => {}
                    }
                }
                match elem {
                    Some(elem) => Type::Array(elem, elements.len() as u32),
                    None => return Err(error(span, "E0209", "array literal must not be empty")),
                }
            }
            ExprKind::Unary { operand, .. } => {
                let ty = self.check_expr(operand)?;
                if !ty.is_numeric() {
                    return Err(error(
                        span,
                        "E0204",
                        format!("unary `-` requires a numeric operand, found {ty}"),
                    ));
                }
                ty
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.check_expr(lhs)?;
                let right = self.check_expr(rhs)?;
                match (left, right) {
                    (Type::Scalar(l), Type::Scalar(r)) => promote(l, r).map(Type::Scalar),
                    _ => None,
                }
                .ok_or_else(|| {
                    error(
                        span,
                        "E0204",
                        format!(
                            "operator `{}` requires numeric operands, found {left} and {right}",
                            op.symbol()
                        ),
                    )
                })?
            }
            ExprKind::Dot { lhs, rhs } => {
                let left = self.check_expr(lhs)?;
                let right = self.check_expr(rhs)?;
                check_dot(left, right, span)?
            }
        };

        expr.ty = Some(ty);
        Ok(ty)
    }
}

fn is_literal(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Char(_) | ExprKind::Bool(_)
    )
}

fn redeclared(name: &Ident) -> CoreError {
    error(
        name.span,
        "E0202",
        format!("variable `{}` is already declared", name.name),
    )
}

fn check_element(target: Scalar, value: Scalar, name: &Ident, span: Span) -> Result<(), CoreError> {
    if scalar_assignability(target, value) == Assignability::Incompatible {
        return Err(error(
            span,
            "E0203",
            format!(
                "cannot store a value of type {value} in `{}` with element type {target}",
                name.name
            ),
        ));
    }
    Ok(())
}

/// Result type of `<a>.<b>`: a scalar for two equal-length arrays, a
/// matrix for two conformable matrices.
fn check_dot(left: Type, right: Type, span: Span) -> Result<Type, CoreError> {
    if !left.element().is_numeric() {
        return Err(error(
            span,
            "E0204",
            format!(
                "dot product requires numeric elements, found {}",
                left.element()
            ),
        ));
    }
    match (left, right) {
        (Type::Array(elem, n), Type::Array(_, m)) => {
            if n != m {
                return Err(error(
                    span,
                    "E0205",
                    format!("dot product needs arrays of equal length, found {n} and {m}"),
                ));
            }
            Ok(Type::Scalar(elem))
        }
        (Type::Matrix(elem, rows, inner), Type::Matrix(_, inner_rhs, cols)) => {
            if inner != inner_rhs {
                return Err(error(
                    span,
                    "E0205",
                    format!(
                        "cannot multiply a {rows}x{inner} matrix by a {inner_rhs}x{cols} matrix"
                    ),
                ));
            }
            Ok(Type::Matrix(elem, rows, cols))
        }
        _ => Err(error(
            span,
            "E0205",
            format!("dot product needs two arrays or two matrices, found {left} and {right}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyzed(source: &str) -> Program {
        let mut program = parse(source).expect("parse");
        analyze(&mut program).expect("analyze");
        program
    }

    fn semantic_err(source: &str) -> Diagnostic {
        let mut program = parse(source).expect("parse");
        match analyze(&mut program) {
            Err(CoreError::SemanticError(diag)) => diag,
            other => panic!("expected semantic error, got {other:?}"),
        }
    }

    fn printed_type(program: &Program, index: usize) -> Option<Type> {
        match &program.statements[index].kind {
            StmtKind::Print(expr) => expr.ty,
            other => panic!("expected print, got {other:?}"),
        }
    }

    #[test]
    fn annotates_literals() {
        let program = analyzed("print(1); print(3000000000); print(1.5); print(\"s\"); print('c'); print(true);");
        let types: Vec<_> = (0..6).map(|i| printed_type(&program, i)).collect();
        assert_eq!(
            types,
            vec![
                Some(Type::INT32),
                Some(Type::INT64),
                Some(Type::FLOAT64),
                Some(Type::STRING),
                Some(Type::CHAR),
                Some(Type::BOOL)
            ]
        );
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let program = analyzed("int a = 2; print(a + 1.5);");
        assert_eq!(printed_type(&program, 1), Some(Type::FLOAT64));

        let StmtKind::Print(expr) = &program.statements[1].kind else {
            panic!("expected print");
        };
        let ExprKind::Binary { lhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        // The operand keeps its own type; lowering converts it.
        assert_eq!(lhs.ty, Some(Type::INT32));
    }

    #[test]
    fn declaration_converts_numeric_initializer() {
        let program = analyzed("double d = 1; float f = 2.5; print(d); print(f);");
        assert_eq!(printed_type(&program, 2), Some(Type::FLOAT64));
        assert_eq!(printed_type(&program, 3), Some(Type::FLOAT32));
    }

    #[test]
    fn rejects_non_numeric_initializer_mismatch() {
        let diag = semantic_err("int x = \"text\";");
        assert_eq!(diag.code, Some("E0203"));
        assert!(diag.message.contains("cannot initialize `x`"));
    }

    #[test]
    fn rejects_undefined_variable() {
        let diag = semantic_err("print(missing);");
        assert_eq!(diag.code, Some("E0201"));
        assert!(diag.message.contains("`missing`"));
    }

    #[test]
    fn rejects_redeclaration_regardless_of_type() {
        assert_eq!(semantic_err("int x = 1; int x = 2;").code, Some("E0202"));
        assert_eq!(semantic_err("int x = 1; string x = \"a\";").code, Some("E0202"));
        assert_eq!(semantic_err("int x = 1; <x> = 1, 2;").code, Some("E0202"));
    }

    #[test]
    fn rejects_string_arithmetic() {
        let diag = semantic_err("string s = \"a\"; print(s + 1);");
        assert_eq!(diag.code, Some("E0204"));
        let diag = semantic_err("print(-\"a\");");
        assert_eq!(diag.code, Some("E0204"));
    }

    #[test]
    fn assignment_follows_declaration_rule() {
        analyzed("double d = 1.0; d = 3; int i = 0; i = 2.5;");
        let diag = semantic_err("int i = 0; i = \"no\";");
        assert_eq!(diag.code, Some("E0203"));
        let diag = semantic_err("y = 1;");
        assert_eq!(diag.code, Some("E0201"));
    }

    #[test]
    fn shaped_declarations_resolve_by_initializer_shape() {
        let program = analyzed(
            "<s> = 4; <a> = 1, 2, 3; ||m|| = [1, 2], [3, 4], [5, 6]; {c}; <l> = [7, 8];",
        );
        let resolved: Vec<_> = program
            .statements
            .iter()
            .map(|stmt| match &stmt.kind {
                StmtKind::ShapedDecl { resolved, .. } => *resolved,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            resolved,
            vec![
                Some(Type::INT32),
                Some(Type::Array(Scalar::Int32, 3)),
                Some(Type::Matrix(Scalar::Float64, 3, 2)),
                Some(Type::CHAR),
                Some(Type::Array(Scalar::Int32, 2)),
            ]
        );
    }

    #[test]
    fn rejects_ragged_matrix_rows() {
        let diag = semantic_err("<m> = [1, 2], [3];");
        assert_eq!(diag.code, Some("E0205"));
    }

    #[test]
    fn rejects_mixed_scalar_and_row_initializers() {
        let diag = semantic_err("<m> = 1, [2, 3];");
        assert_eq!(diag.code, Some("E0203"));
    }

    #[test]
    fn shaped_reference_must_match_family() {
        let diag = semantic_err("<a> = 1, 2; print(|a|);");
        assert_eq!(diag.code, Some("E0203"));
        assert!(diag.message.contains("brackets"));
    }

    #[test]
    fn array_literal_elements_share_one_type() {
        let program = analyzed("print([1, 2, 3]);");
        assert_eq!(printed_type(&program, 0), Some(Type::Array(Scalar::Int32, 3)));
        let diag = semantic_err("print([1, 2.5]);");
        assert_eq!(diag.code, Some("E0209"));
    }

    #[test]
    fn index_requires_array_and_int() {
        let program = analyzed("<a> = 1, 2, 3; print(a[2]);");
        assert_eq!(printed_type(&program, 1), Some(Type::INT32));

        assert_eq!(semantic_err("<a> = 1, 2; print(a[1.0]);").code, Some("E0206"));
        assert_eq!(semantic_err("int x = 1; print(x[0]);").code, Some("E0206"));
        assert_eq!(semantic_err("<a> = 1, 2; print(a[2]);").code, Some("E0206"));
        assert_eq!(semantic_err("<a> = 1, 2; print(a[-1]);").code, Some("E0206"));
    }

    #[test]
    fn dot_product_of_arrays_is_scalar() {
        let program = analyzed("<a> = 1, 2, 3; <b> = 4, 5, 6; print(<a>.<b>);");
        assert_eq!(printed_type(&program, 2), Some(Type::INT32));
    }

    #[test]
    fn matrix_product_has_outer_shape() {
        let program = analyzed("<a> = [1, 2, 3], [4, 5, 6]; <b> = [1], [2], [3]; print(<a>.<b>);");
        assert_eq!(
            printed_type(&program, 2),
            Some(Type::Matrix(Scalar::Int32, 2, 1))
        );
    }

    #[test]
    fn dot_product_shape_errors() {
        assert_eq!(
            semantic_err("<a> = 1, 2; <b> = 1, 2, 3; print(<a>.<b>);").code,
            Some("E0205")
        );
        assert_eq!(
            semantic_err("<a> = [1, 2], [3, 4]; <b> = [1, 2, 3], [4, 5, 6], [7, 8, 9]; print(<a>.<b>);").code,
            Some("E0205")
        );
        assert_eq!(
            semantic_err("<a> = 1, 2; <b> = [1, 2], [3, 4]; print(<a>.<b>);").code,
            Some("E0205")
        );
        assert_eq!(
            semantic_err("{{a}} = \"x\", \"y\"; {{b}} = \"z\", \"w\"; print({{a}}.{{b}});").code,
            Some("E0204")
        );
    }

    #[test]
    fn loop_count_must_be_int() {
        let diag = semantic_err("loop(i, 2.0) { print(i); }");
        assert_eq!(diag.code, Some("E0203"));
    }

    #[test]
    fn loop_iterator_is_block_scoped_and_read_only() {
        let program = analyzed("loop(i, 3) { print(i); int x = i; } loop(i, 2) { int x = 1; }");
        assert_eq!(program.statements.len(), 2);

        assert_eq!(semantic_err("loop(i, 3) { i = 1; }").code, Some("E0208"));
        assert_eq!(semantic_err("loop(i, 3) { } print(i);").code, Some("E0201"));
        assert_eq!(semantic_err("int i = 0; loop(i, 3) { }").code, Some("E0202"));
        assert_eq!(
            semantic_err("loop(i, 2) { loop(i, 2) { } }").code,
            Some("E0202")
        );
    }

    #[test]
    fn builtins_fold_shape_queries() {
        let program = analyzed("<m> = [1, 2, 3], [4, 5, 6]; print(len(m)); print(rows(m));");
        assert_eq!(printed_type(&program, 1), Some(Type::INT32));
        assert_eq!(semantic_err("print(size(1));").code, Some("E0207"));
        assert_eq!(semantic_err("int x = 1; print(len(x));").code, Some("E0207"));
        assert_eq!(semantic_err("<a> = 1, 2; print(len(a, a));").code, Some("E0207"));
    }

    #[test]
    fn reanalysis_is_idempotent() {
        let mut program = parse(
            "int a = 1; double b = a * 2.5; <v> = 1, 2; <w> = 3, 4; print(<v>.<w> + b); loop(i, 2) { print(v[i]); }",
        )
        .expect("parse");
        analyze(&mut program).expect("first pass");
        let first = program.clone();
        analyze(&mut program).expect("second pass");
        assert_eq!(program, first);
    }
}
