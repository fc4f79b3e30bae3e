//! Loop nests for `<a>.<b>`.

use crate::error::CoreError;
use crate::ir::{BinOp, Operand};
use crate::types::Scalar;

use super::{Lowering, i32_const, ir_type};

fn add_op(elem: Scalar) -> BinOp {
    if elem.is_float() { BinOp::FAdd } else { BinOp::Add }
}

fn mul_op(elem: Scalar) -> BinOp {
    if elem.is_float() { BinOp::FMul } else { BinOp::Mul }
}

impl Lowering {
    /// `sum(a[i] * b[i])` over `len` elements.
    pub(super) fn lower_dot(
        &mut self,
        a: Operand,
        b: Operand,
        elem: Scalar,
        len: u32,
    ) -> Result<Operand, CoreError> {
        let acc = self.builder.alloca(ir_type(elem), 1, "acc")?;
        let zero = self.zero(elem);
        self.builder.store(zero, acc)?;
        self.counted_loop("dot", "i", i32_const(len), |this, _, i| {
            let x = this.load_element(a, elem, i)?;
            let y = this.load_element(b, elem, i)?;
            let product = this.builder.binary(mul_op(elem), x, y, "prod")?;
            this.accumulate(acc, elem, product)
        })?;
        Ok(self.builder.load(ir_type(elem), acc, "dot")?)
    }

    /// Multiply a `rows x inner` matrix by an `inner x cols` matrix into a
    /// freshly allocated `rows x cols` block and return its address.
    pub(super) fn lower_matmul(
        &mut self,
        a: Operand,
        b: Operand,
        elem: Scalar,
        rows: u32,
        inner: u32,
        cols: u32,
    ) -> Result<Operand, CoreError> {
        let ty = ir_type(elem);
        let out = self.builder.alloca(ty, rows * cols, "matmul")?;
        let acc = self.builder.alloca(ty, 1, "acc")?;

        self.counted_loop("matmul.row", "row", i32_const(rows), |this, _, i| {
            this.counted_loop("matmul.col", "col", i32_const(cols), |this, _, j| {
                let zero = this.zero(elem);
                this.builder.store(zero, acc)?;

                this.counted_loop("matmul.inner", "k", i32_const(inner), |this, _, k| {
                    // a[i * inner + k] * b[k * cols + j]
                    let a_index = this.flat_index(i, inner, k)?;
                    let b_index = this.flat_index(k, cols, j)?;
                    let x = this.load_element(a, elem, a_index)?;
                    let y = this.load_element(b, elem, b_index)?;
                    let product = this.builder.binary(mul_op(elem), x, y, "prod")?;
                    this.accumulate(acc, elem, product)
                })?;

                let sum = this.builder.load(ty, acc, "sum")?;
                let out_index = this.flat_index(i, cols, j)?;
                let slot = this.builder.element_ptr(ty, out, out_index, "elem")?;
                this.builder.store(sum, slot)?;
                Ok(())
            })
        })?;
        Ok(out)
    }

    /// `row * width + col`
    fn flat_index(&mut self, row: Operand, width: u32, col: Operand) -> Result<Operand, CoreError> {
        let scaled = self
            .builder
            .binary(BinOp::Mul, row, i32_const(width), "")?;
        Ok(self.builder.binary(BinOp::Add, scaled, col, "idx")?)
    }

    fn accumulate(&mut self, acc: Operand, elem: Scalar, value: Operand) -> Result<(), CoreError> {
        let current = self.builder.load(ir_type(elem), acc, "")?;
        let next = self.builder.binary(add_op(elem), current, value, "")?;
        self.builder.store(next, acc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen_llvm::generate;
    use crate::parser::parse;
    use crate::typecheck::analyze;

    fn lower(source: &str) -> String {
        let mut program = parse(source).expect("parse");
        analyze(&mut program).expect("analyze");
        generate(&program, "test").expect("lower").to_string()
    }

    #[test]
    fn accumulator_starts_at_zero() {
        let ir = lower("|a| = 1.0, 2.0; |b| = 3.0, 4.0; print(|a|.|b|);");
        assert!(ir.contains("store float 0x0000000000000000, ptr %acc."));
        assert!(ir.contains("fmul float"));
        assert!(ir.contains("fadd float"));
    }

    #[test]
    fn matmul_result_is_adopted_by_declaration() {
        let ir = lower("<a> = [1, 2], [3, 4]; <b> = [5, 6], [7, 8]; <c> = <a>.<b>;");
        assert!(ir.contains("%matmul."));
        assert!(!ir.contains("copy.cond"));
    }

    #[test]
    fn matrix_copy_uses_a_loop() {
        let ir = lower("<a> = [1, 2], [3, 4]; <b> = <a>;");
        assert!(ir.contains("copy.cond"));
    }
}
