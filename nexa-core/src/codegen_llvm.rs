//! Lowering from the analyzed AST to the IR in [`crate::ir`].
//!
//! Everything the program does happens inside a single `i32 @main()`.
//! Variables live in stack slots; aggregates are contiguous row-major
//! blocks of their element type. Output goes through a variadic
//! `printf` declaration, and the printed form of each value is chosen
//! from the type the analyzer recorded on the expression.

mod matrix;

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::builtins::find_builtin;
use crate::error::CoreError;
use crate::ir::{BinOp, Builder, CastOp, CmpPred, IrType, Module, Operand};
use crate::types::{Scalar, Type};

pub const PRINTF: &str = "printf";

/// Lower an analyzed program into an IR module named `module_name`.
#[tracing::instrument(level = "debug", skip_all, fields(module = module_name))]
pub fn generate(program: &Program, module_name: &str) -> Result<Module, CoreError> {
    let mut lowering = Lowering::new(module_name);
    lowering
        .builder
        .declare_extern(PRINTF, IrType::I32, &[IrType::Ptr], true);
    lowering.builder.begin_function("main", IrType::I32)?;
    for stmt in &program.statements {
        lowering.lower_stmt(stmt)?;
    }
    lowering.builder.ret(Some(Operand::Int(IrType::I32, 0)))?;
    lowering.builder.finish_function()?;

    let module = lowering.builder.finish()?;
    tracing::debug!(
        globals = module.globals.len(),
        blocks = module.functions.iter().map(|f| f.blocks.len()).sum::<usize>(),
        "lowered program"
    );
    Ok(module)
}

/// Storage type of a scalar.
pub fn ir_type(scalar: Scalar) -> IrType {
    match scalar {
        Scalar::Int32 => IrType::I32,
        Scalar::Int64 => IrType::I64,
        Scalar::Float32 => IrType::F32,
        Scalar::Float64 => IrType::F64,
        Scalar::Char => IrType::I8,
        Scalar::Bool => IrType::I1,
        Scalar::String => IrType::Ptr,
    }
}

fn format_spec(scalar: Scalar) -> &'static str {
    match scalar {
        Scalar::Int32 | Scalar::Bool => "%d",
        Scalar::Int64 => "%lld",
        Scalar::Float32 | Scalar::Float64 => "%f",
        Scalar::Char => "%c",
        Scalar::String => "%s",
    }
}

fn arith_op(op: BinaryOp, float: bool) -> BinOp {
    match (op, float) {
        (BinaryOp::Add, false) => BinOp::Add,
        (BinaryOp::Sub, false) => BinOp::Sub,
        (BinaryOp::Mul, false) => BinOp::Mul,
        (BinaryOp::Div, false) => BinOp::SDiv,
        (BinaryOp::Add, true) => BinOp::FAdd,
        (BinaryOp::Sub, true) => BinOp::FSub,
        (BinaryOp::Mul, true) => BinOp::FMul,
        (BinaryOp::Div, true) => BinOp::FDiv,
    }
}

fn internal(message: impl Into<String>) -> CoreError {
    CoreError::CodegenError(message.into())
}

fn annotation(expr: &Expr) -> Result<Type, CoreError> {
    expr.ty
        .ok_or_else(|| internal(format!("expression at {} was not analyzed", expr.span)))
}

fn scalar_annotation(expr: &Expr) -> Result<Scalar, CoreError> {
    annotation(expr)?
        .as_scalar()
        .ok_or_else(|| internal(format!("expected a scalar expression at {}", expr.span)))
}

fn i32_const(value: u32) -> Operand {
    Operand::Int(IrType::I32, i64::from(value))
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    ptr: Operand,
    ty: Type,
}

struct Lowering {
    builder: Builder,
    scopes: Vec<HashMap<String, Slot>>,
}

impl Lowering {
    fn new(module_name: &str) -> Self {
        Lowering {
            builder: Builder::new(module_name),
            scopes: vec![HashMap::new()],
        }
    }

    fn lookup(&self, name: &str) -> Result<Slot, CoreError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| internal(format!("no storage for `{name}`")))
    }

    fn bind(&mut self, name: &str, slot: Slot) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CoreError> {
        match &stmt.kind {
            StmtKind::VarDecl { ty, name, init } => {
                let scalar = ty
                    .as_scalar()
                    .ok_or_else(|| internal(format!("`{}` is not a scalar", name.name)))?;
                let value = self.lower_scalar(init)?;
                let value = self.convert(value, scalar_annotation(init)?, scalar)?;
                let ptr = self.builder.alloca(ir_type(scalar), 1, &name.name)?;
                self.builder.store(value, ptr)?;
                self.bind(&name.name, Slot { ptr, ty: *ty });
            }
            StmtKind::ShapedDecl {
                name,
                inits,
                resolved,
                ..
            } => {
                let ty = resolved
                    .ok_or_else(|| internal(format!("`{}` has no resolved type", name.name)))?;
                let ptr = self.lower_shaped_init(ty, &name.name, inits)?;
                self.bind(&name.name, Slot { ptr, ty });
            }
            StmtKind::Assign { target, value } => {
                let slot = self.lookup(&target.name)?;
                match slot.ty {
                    Type::Scalar(scalar) => {
                        let lowered = self.lower_scalar(value)?;
                        let lowered = self.convert(lowered, scalar_annotation(value)?, scalar)?;
                        self.builder.store(lowered, slot.ptr)?;
                    }
                    aggregate => {
                        let source = self.lower_aggregate(value)?;
                        self.copy_elements(
                            source,
                            slot.ptr,
                            aggregate.element(),
                            aggregate.element_count(),
                        )?;
                    }
                }
            }
            StmtKind::Print(expr) => self.lower_print(expr)?,
            StmtKind::Loop {
                iterator,
                count,
                body,
            } => {
                let count = self.lower_scalar(count)?;
                self.counted_loop("loop", &iterator.name, count, |this, counter, _| {
                    this.scopes.push(HashMap::new());
                    this.bind(
                        &iterator.name,
                        Slot {
                            ptr: counter,
                            ty: Type::INT32,
                        },
                    );
                    let result = body.iter().try_for_each(|stmt| this.lower_stmt(stmt));
                    this.scopes.pop();
                    result
                })?;
            }
        }
        Ok(())
    }

    /// Allocate and fill the storage of a shaped declaration.
    fn lower_shaped_init(
        &mut self,
        ty: Type,
        name: &str,
        inits: &[Expr],
    ) -> Result<Operand, CoreError> {
        let elem = ty.element();
        if let Type::Scalar(_) = ty {
            let value = match inits.first() {
                Some(init) => {
                    let value = self.lower_scalar(init)?;
                    self.convert(value, scalar_annotation(init)?, elem)?
                }
                None => self.zero(elem),
            };
            let ptr = self.builder.alloca(ir_type(elem), 1, name)?;
            self.builder.store(value, ptr)?;
            return Ok(ptr);
        }

        if let [init] = inits {
            match &init.kind {
                ExprKind::ArrayLit(_) => {}
                // A product is written into a fresh block; adopt it.
                ExprKind::Dot { .. } => return self.lower_aggregate(init),
                _ => {
                    let source = self.lower_aggregate(init)?;
                    let ptr = self
                        .builder
                        .alloca(ir_type(elem), ty.element_count(), name)?;
                    self.copy_elements(source, ptr, elem, ty.element_count())?;
                    return Ok(ptr);
                }
            }
        }

        let ptr = self
            .builder
            .alloca(ir_type(elem), ty.element_count(), name)?;
        let elements = inits.iter().flat_map(|init| match &init.kind {
            ExprKind::ArrayLit(row) => row.iter().collect::<Vec<_>>(),
            _ => vec![init],
        });
        self.store_elements(ptr, elem, elements)?;
        Ok(ptr)
    }

    fn store_elements<'e>(
        &mut self,
        ptr: Operand,
        elem: Scalar,
        elements: impl IntoIterator<Item = &'e Expr>,
    ) -> Result<(), CoreError> {
        for (index, element) in elements.into_iter().enumerate() {
            let value = self.lower_scalar(element)?;
            let value = self.convert(value, scalar_annotation(element)?, elem)?;
            let slot = self.builder.element_ptr(
                ir_type(elem),
                ptr,
                Operand::Int(IrType::I32, index as i64),
                "elem",
            )?;
            self.builder.store(value, slot)?;
        }
        Ok(())
    }

    fn copy_elements(
        &mut self,
        source: Operand,
        dest: Operand,
        elem: Scalar,
        count: u32,
    ) -> Result<(), CoreError> {
        self.counted_loop("copy", "i", i32_const(count), |this, _, index| {
            let value = this.load_element(source, elem, index)?;
            let slot = this
                .builder
                .element_ptr(ir_type(elem), dest, index, "elem")?;
            this.builder.store(value, slot)?;
            Ok(())
        })
    }

    fn load_element(
        &mut self,
        base: Operand,
        elem: Scalar,
        index: Operand,
    ) -> Result<Operand, CoreError> {
        let ty = ir_type(elem);
        let ptr = self.builder.element_ptr(ty, base, index, "elem")?;
        Ok(self.builder.load(ty, ptr, "")?)
    }

    /// Address of an array or matrix value.
    fn lower_aggregate(&mut self, expr: &Expr) -> Result<Operand, CoreError> {
        match &expr.kind {
            ExprKind::Var(name) | ExprKind::ShapedVar { name, .. } => Ok(self.lookup(name)?.ptr),
            ExprKind::ArrayLit(elements) => {
                let Type::Array(elem, len) = annotation(expr)? else {
                    return Err(internal(format!("array literal at {} is not an array", expr.span)));
                };
                let ptr = self.builder.alloca(ir_type(elem), len, "lit")?;
                self.store_elements(ptr, elem, elements)?;
                Ok(ptr)
            }
            ExprKind::Dot { lhs, rhs } => {
                let (Type::Matrix(elem, rows, inner), Type::Matrix(_, _, cols)) =
                    (annotation(lhs)?, annotation(rhs)?)
                else {
                    return Err(internal(format!("product at {} is not a matrix product", expr.span)));
                };
                let a = self.lower_aggregate(lhs)?;
                let b = self.lower_aggregate(rhs)?;
                self.lower_matmul(a, b, elem, rows, inner, cols)
            }
            _ => Err(internal(format!(
                "expected an array or matrix expression at {}",
                expr.span
            ))),
        }
    }

    fn lower_scalar(&mut self, expr: &Expr) -> Result<Operand, CoreError> {
        let scalar = scalar_annotation(expr)?;
        match &expr.kind {
            ExprKind::Int(value) => Ok(Operand::Int(ir_type(scalar), *value)),
            ExprKind::Float(value) => Ok(Operand::Float(IrType::F64, *value)),
            ExprKind::Str(text) => Ok(self.builder.global_string(text)),
            ExprKind::Char(byte) => Ok(Operand::Int(IrType::I8, i64::from(*byte))),
            ExprKind::Bool(value) => Ok(Operand::Int(IrType::I1, i64::from(*value))),
            ExprKind::Var(name) | ExprKind::ShapedVar { name, .. } => {
                let slot = self.lookup(name)?;
                Ok(self.builder.load(ir_type(scalar), slot.ptr, name)?)
            }
            ExprKind::Call { callee, args } => {
                let builtin = find_builtin(&callee.name)
                    .ok_or_else(|| internal(format!("unknown builtin `{}`", callee.name)))?;
                let arg = args
                    .first()
                    .ok_or_else(|| internal(format!("`{}` has no argument", callee.name)))?;
                let value = builtin.kind.evaluate(&annotation(arg)?);
                Ok(Operand::Int(IrType::I32, value))
            }
            ExprKind::Index { base, index } => self.lower_index(base, index),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let value = self.lower_scalar(operand)?;
                if scalar.is_float() {
                    Ok(self.builder.fneg(value, "neg")?)
                } else {
                    Ok(self.builder.binary(
                        BinOp::Sub,
                        Operand::Int(ir_type(scalar), 0),
                        value,
                        "neg",
                    )?)
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.lower_scalar(lhs)?;
                let left = self.convert(left, scalar_annotation(lhs)?, scalar)?;
                let right = self.lower_scalar(rhs)?;
                let right = self.convert(right, scalar_annotation(rhs)?, scalar)?;
                Ok(self
                    .builder
                    .binary(arith_op(*op, scalar.is_float()), left, right, "")?)
            }
            ExprKind::Dot { lhs, rhs } => {
                let Type::Array(_, len) = annotation(lhs)? else {
                    return Err(internal(format!("dot product at {} is not over arrays", expr.span)));
                };
                let a = self.lower_aggregate(lhs)?;
                let b = self.lower_aggregate(rhs)?;
                self.lower_dot(a, b, scalar, len)
            }
            ExprKind::ArrayLit(_) => Err(internal(format!(
                "array literal at {} used as a scalar",
                expr.span
            ))),
        }
    }

    fn lower_index(&mut self, base: &Expr, index: &Expr) -> Result<Operand, CoreError> {
        let ExprKind::Var(name) = &base.kind else {
            return Err(internal(format!("indexed expression at {} is not a variable", base.span)));
        };
        let slot = self.lookup(name)?;
        let Type::Array(elem, len) = slot.ty else {
            return Err(internal(format!("`{name}` is not an array")));
        };
        let index = self.lower_scalar(index)?;
        self.bounds_check(index, len)?;
        self.load_element(slot.ptr, elem, index)
    }

    /// Branch to a trap block unless `0 <= index < len`. The unsigned
    /// comparison also catches negative indices.
    fn bounds_check(&mut self, index: Operand, len: u32) -> Result<(), CoreError> {
        let in_bounds = self
            .builder
            .cmp(CmpPred::Ult, index, i32_const(len), "inbounds")?;
        let ok = self.builder.append_block("index.ok")?;
        let trap = self.builder.append_block("index.trap")?;
        self.builder.cond_br(in_bounds, ok, trap)?;
        self.builder.position_at_end(trap)?;
        self.builder.trap()?;
        self.builder.position_at_end(ok)?;
        Ok(())
    }

    /// Convert a numeric value between scalar kinds. Constants are folded.
    fn convert(&mut self, value: Operand, from: Scalar, to: Scalar) -> Result<Operand, CoreError> {
        if from == to {
            return Ok(value);
        }
        if !from.is_numeric() || !to.is_numeric() {
            return Err(internal(format!("cannot convert {from} to {to}")));
        }
        let target = ir_type(to);
        match value {
            Operand::Int(_, v) if to == Scalar::Int32 => {
                return Ok(Operand::Int(target, i64::from(v as i32)));
            }
            Operand::Int(_, v) if to.is_integer() => return Ok(Operand::Int(target, v)),
            Operand::Int(_, v) => return Ok(Operand::Float(target, v as f64)),
            Operand::Float(_, v) if to.is_float() => return Ok(Operand::Float(target, v)),
            _ => {}
        }

        let op = match (from.is_float(), to.is_float()) {
            (false, false) if to == Scalar::Int64 => CastOp::SExt,
            (false, false) => CastOp::Trunc,
            (false, true) => CastOp::SIToFP,
            (true, false) => CastOp::FPToSI,
            (true, true) if to == Scalar::Float64 => CastOp::FPExt,
            (true, true) => CastOp::FPTrunc,
        };
        Ok(self.builder.cast(op, value, target, "conv")?)
    }

    fn zero(&mut self, scalar: Scalar) -> Operand {
        match scalar {
            Scalar::Float32 | Scalar::Float64 => Operand::Float(ir_type(scalar), 0.0),
            Scalar::String => self.builder.global_string(""),
            _ => Operand::Int(ir_type(scalar), 0),
        }
    }

    /// Emit `for index in 0..count { body }` with the counter in a stack
    /// slot. `count` is evaluated once, before the loop.
    fn counted_loop<F>(
        &mut self,
        prefix: &str,
        hint: &str,
        count: Operand,
        body: F,
    ) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Self, Operand, Operand) -> Result<(), CoreError>,
    {
        let counter = self.builder.alloca(IrType::I32, 1, hint)?;
        self.builder.store(i32_const(0), counter)?;
        let cond = self.builder.append_block(&format!("{prefix}.cond"))?;
        let body_block = self.builder.append_block(&format!("{prefix}.body"))?;
        let exit = self.builder.append_block(&format!("{prefix}.exit"))?;
        self.builder.br(cond)?;

        self.builder.position_at_end(cond)?;
        let current = self.builder.load(IrType::I32, counter, hint)?;
        let more = self.builder.cmp(CmpPred::Slt, current, count, "more")?;
        self.builder.cond_br(more, body_block, exit)?;

        self.builder.position_at_end(body_block)?;
        let index = self.builder.load(IrType::I32, counter, hint)?;
        body(self, counter, index)?;
        let index = self.builder.load(IrType::I32, counter, hint)?;
        let next = self
            .builder
            .binary(BinOp::Add, index, i32_const(1), "next")?;
        self.builder.store(next, counter)?;
        self.builder.br(cond)?;

        self.builder.position_at_end(exit)?;
        Ok(())
    }

    fn lower_print(&mut self, expr: &Expr) -> Result<(), CoreError> {
        match annotation(expr)? {
            Type::Scalar(scalar) => {
                let value = self.lower_scalar(expr)?;
                self.printf(&format!("{}\n", format_spec(scalar)), Some((value, scalar)))
            }
            Type::Array(elem, len) => {
                let ptr = self.lower_aggregate(expr)?;
                self.print_row(ptr, elem, i32_const(0), len)
            }
            Type::Matrix(elem, rows, cols) => {
                let ptr = self.lower_aggregate(expr)?;
                self.counted_loop("print.row", "row", i32_const(rows), |this, _, row| {
                    let start = this
                        .builder
                        .binary(BinOp::Mul, row, i32_const(cols), "start")?;
                    this.print_row(ptr, elem, start, cols)
                })
            }
        }
    }

    /// Print `len` elements starting at `start` as `[a b c]` and a newline.
    fn print_row(
        &mut self,
        ptr: Operand,
        elem: Scalar,
        start: Operand,
        len: u32,
    ) -> Result<(), CoreError> {
        let spec = format_spec(elem);
        let first = self.load_element(ptr, elem, start)?;
        self.printf(&format!("[{spec}"), Some((first, elem)))?;
        if len > 1 {
            self.counted_loop("print", "k", i32_const(len - 1), |this, _, k| {
                let offset = this.builder.binary(BinOp::Add, start, k, "")?;
                let offset = this
                    .builder
                    .binary(BinOp::Add, offset, i32_const(1), "")?;
                let value = this.load_element(ptr, elem, offset)?;
                this.printf(&format!(" {spec}"), Some((value, elem)))
            })?;
        }
        self.printf("]\n", None)
    }

    fn printf(&mut self, format: &str, arg: Option<(Operand, Scalar)>) -> Result<(), CoreError> {
        let mut args = vec![self.builder.global_string(format)];
        if let Some((value, scalar)) = arg {
            args.push(self.printf_arg(value, scalar)?);
        }
        self.builder.call(PRINTF, args, "")?;
        Ok(())
    }

    /// Apply C default argument promotion.
    fn printf_arg(&mut self, value: Operand, scalar: Scalar) -> Result<Operand, CoreError> {
        let (op, to) = match scalar {
            Scalar::Float32 => (CastOp::FPExt, IrType::F64),
            Scalar::Char | Scalar::Bool => (CastOp::ZExt, IrType::I32),
            _ => return Ok(value),
        };
        match value {
            Operand::Float(_, v) => Ok(Operand::Float(to, f64::from(v as f32))),
            Operand::Int(_, v) => Ok(Operand::Int(to, v)),
            _ => Ok(self.builder.cast(op, value, to, "arg")?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::typecheck::analyze;

    fn lower(source: &str) -> String {
        let mut program = parse(source).expect("parse");
        analyze(&mut program).expect("analyze");
        generate(&program, "test").expect("lower").to_string()
    }

    #[test]
    fn emits_main_and_printf() {
        let ir = lower("print(1);");
        assert!(ir.contains("declare i32 @printf(ptr, ...)"));
        assert!(ir.contains("define i32 @main() {"));
        assert!(ir.contains("ret i32 0"));
        assert!(ir.contains("c\"%d\\0A\\00\""));
    }

    #[test]
    fn loop_uses_three_blocks() {
        let ir = lower("loop(i, 3) { print(i); }");
        assert!(ir.contains("loop.cond"));
        assert!(ir.contains("loop.body"));
        assert!(ir.contains("loop.exit"));
        assert!(ir.contains("icmp slt i32"));
        assert!(ir.contains("store i32 0, ptr %i.0, align 4"));
    }

    #[test]
    fn index_is_bounds_checked() {
        let ir = lower("<a> = 1, 2, 3; int j = 1; print(a[j]);");
        assert!(ir.contains("icmp ult i32"));
        assert!(ir.contains(", 3\n"));
        assert!(ir.contains("call void @llvm.trap()"));
        assert!(ir.contains("getelementptr inbounds i32"));
    }

    #[test]
    fn mixed_arithmetic_converts_the_int_operand() {
        let ir = lower("int a = 1; print(a + 2.5);");
        assert!(ir.contains("sitofp i32"));
        assert!(ir.contains("fadd double"));
        assert!(ir.contains("c\"%f\\0A\\00\""));
    }

    #[test]
    fn declarations_convert_to_the_declared_type() {
        let ir = lower("long big = 1; int a = 2; double d = a; float f = d;");
        assert!(ir.contains("store i64 1, ptr %big.0"));
        assert!(ir.contains("sitofp i32"));
        assert!(ir.contains("fptrunc double"));
    }

    #[test]
    fn print_formats_follow_types() {
        let ir = lower("long l = 1; float f = 1.5; print(l); print(f); print('x'); print(\"hi\"); print(true);");
        assert!(ir.contains("c\"%lld\\0A\\00\""));
        assert!(ir.contains("fpext float"));
        assert!(ir.contains("i32 120)"));
        assert!(ir.contains("c\"%s\\0A\\00\""));
        assert!(ir.contains("c\"hi\\00\""));
    }

    #[test]
    fn dot_product_uses_dot_loop() {
        let ir = lower("<a> = 1, 2, 3; <b> = 4, 5, 6; print(<a>.<b>);");
        assert!(ir.contains("dot.cond"));
        assert!(ir.contains("dot.body"));
        assert!(ir.contains("dot.exit"));
        assert!(ir.contains("mul i32"));
    }

    #[test]
    fn matmul_uses_three_nested_loops() {
        let ir = lower("||a|| = [1, 0], [0, 1]; ||b|| = [1, 2], [3, 4]; ||c|| = ||a||.||b||; print(||c||);");
        assert!(ir.contains("matmul.row"));
        assert!(ir.contains("matmul.col"));
        assert!(ir.contains("matmul.inner"));
        assert!(ir.contains("fmul double"));
        assert!(ir.contains("alloca double, i32 4, align 8"));
        assert!(ir.contains("print.row"));
    }

    #[test]
    fn builtins_fold_to_constants() {
        let ir = lower("<m> = [1, 2, 3], [4, 5, 6]; print(len(m));");
        assert!(ir.contains("i32 6)"));
    }

    #[test]
    fn requires_an_analyzed_program() {
        let program = parse("print(1);").expect("parse");
        let err = generate(&program, "test").unwrap_err();
        assert!(matches!(err, CoreError::CodegenError(_)));
    }
}
