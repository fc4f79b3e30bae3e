//! Compiler driver: wires the stages together.
//!
//! ```text
//! source -> lexer -> parser -> typecheck -> codegen_llvm -> ir::Module
//!                                                         |-> LLVM text
//!                                                         '-> codegen_wasm -> runtime
//! ```

use crate::ast::Program;
use crate::codegen_llvm::generate;
use crate::codegen_wasm::generate_wasm;
use crate::error::CoreError;
use crate::ir;
use crate::parser::parse;
use crate::runtime::{Execution, run_wasm};
use crate::typecheck::analyze;

/// Settings that do not affect program semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name recorded in the emitted module header.
    pub module_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            module_name: "nexa".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub wasm: Vec<u8>,
    pub llvm_ir: String,
}

/// Parse and analyze `source`, returning the annotated program.
pub fn frontend(source: &str) -> Result<Program, CoreError> {
    let mut program = parse(source)?;
    analyze(&mut program)?;
    Ok(program)
}

pub fn generate_module(source: &str, options: &CompileOptions) -> Result<ir::Module, CoreError> {
    let program = frontend(source)?;
    generate(&program, &options.module_name)
}

pub fn emit_llvm_ir(source: &str, options: &CompileOptions) -> Result<String, CoreError> {
    Ok(generate_module(source, options)?.to_string())
}

pub fn compile_wasm(
    source: &str,
    options: &CompileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let module = generate_module(source, options)?;
    let wasm = generate_wasm(&module)?;
    Ok(CompilationArtifact {
        wasm,
        llvm_ir: module.to_string(),
    })
}

/// Compile `source` and execute it.
pub fn run_source(source: &str, options: &CompileOptions) -> Result<Execution, CoreError> {
    let artifact = compile_wasm(source, options)?;
    run_wasm(&artifact.wasm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        let execution = run_source(source, &CompileOptions::default()).expect("run");
        assert_eq!(execution.exit_code, 0);
        execution.stdout
    }

    #[test]
    fn counted_loop_prints_each_index() {
        assert_eq!(run("loop(i, 3) { print(i); }"), "0\n1\n2\n");
    }

    #[test]
    fn loop_count_is_evaluated_once() {
        let source = "int n = 2; loop(i, n) { n = n + 1; print(n); } print(n);";
        assert_eq!(run(source), "3\n4\n4\n");
    }

    #[test]
    fn nested_loops_and_zero_iterations() {
        assert_eq!(
            run("loop(i, 2) { loop(j, 2) { print(i * 2 + j); } } loop(k, -1) { print(k); }"),
            "0\n1\n2\n3\n"
        );
    }

    #[test]
    fn dot_product_of_literal_arrays() {
        assert_eq!(run("<a> = 1, 2, 3; <b> = 4, 5, 6; print(<a>.<b>);"), "32\n");
        assert_eq!(
            run("||a|| = 0.5, 1.5; ||b|| = 2, 4; print(||a||.||b||);"),
            "7.000000\n"
        );
    }

    #[test]
    fn identity_matmul_preserves_matrix() {
        let source = "<e> = [1, 0], [0, 1]; <m> = [1, 2], [3, 4]; <r> = <e>.<m>; print(<r>);";
        assert_eq!(run(source), "[1 2]\n[3 4]\n");
    }

    #[test]
    fn matmul_of_rectangular_matrices() {
        let source = "<a> = [1, 2, 3], [4, 5, 6]; <b> = [1], [2], [3]; print(<a>.<b>);";
        assert_eq!(run(source), "[14]\n[32]\n");
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(run("print(1 + 2.5);"), "3.500000\n");
        assert_eq!(run("int a = 7; print(a / 2); print(a / 2.0);"), "3\n3.500000\n");
    }

    #[test]
    fn declarations_convert_to_declared_type() {
        assert_eq!(
            run("int t = 2.9; double d = 4; long big = 3000000000; float f = 0.25; print(t); print(d); print(big); print(f);"),
            "2\n4.000000\n3000000000\n0.250000\n"
        );
    }

    #[test]
    fn prints_every_scalar_kind() {
        assert_eq!(
            run("char c = 'n'; string s = \"nexa\"; bool b = true; print(c); print(s); print(b); print(-5);"),
            "n\nnexa\n1\n-5\n"
        );
    }

    #[test]
    fn prints_arrays_on_one_line() {
        assert_eq!(run("<a> = 1, 2, 3; print(<a>); print([7]);"), "[1 2 3]\n[7]\n");
        assert_eq!(run("{{w}} = \"a\", \"b\"; print({{w}});"), "[a b]\n");
    }

    #[test]
    fn shaped_scalars_and_defaults() {
        assert_eq!(run("<z>; <<big>> = 5; print(z); print(big);"), "0\n5\n");
    }

    #[test]
    fn indexing_reads_elements() {
        assert_eq!(
            run("<a> = 10, 20, 30; loop(i, 3) { print(a[i]); }"),
            "10\n20\n30\n"
        );
    }

    #[test]
    fn out_of_bounds_index_traps() {
        let err = run_source(
            "<a> = 1, 2, 3; int j = 3; print(a[j]);",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::RuntimeError(_)));
    }

    #[test]
    fn aggregate_assignment_copies() {
        assert_eq!(
            run("<a> = 1, 2; <b> = 3, 4; a = b; print(<a>); <c> = <a>; print(c[1]);"),
            "[3 4]\n4\n"
        );
    }

    #[test]
    fn builtins_report_shapes() {
        assert_eq!(
            run("<m> = [1, 2, 3], [4, 5, 6]; print(len(m)); print(rows(m)); print(cols(m));"),
            "6\n2\n3\n"
        );
    }

    #[test]
    fn emits_llvm_text() {
        let ir = emit_llvm_ir(
            "loop(i, 3) { print(i); }",
            &CompileOptions {
                module_name: "loops.nx".to_string(),
            },
        )
        .expect("emit");
        assert!(ir.starts_with("; ModuleID = 'loops.nx'"));
        assert!(ir.contains("loop.cond"));
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn artifact_carries_both_outputs() {
        let artifact = compile_wasm("print(1);", &CompileOptions::default()).expect("compile");
        assert!(artifact.wasm.starts_with(b"\0asm"));
        assert!(artifact.llvm_ir.contains("@printf"));
    }

    #[test]
    fn reports_front_end_errors() {
        let options = CompileOptions::default();
        let err = emit_llvm_ir("int = 5;", &options).unwrap_err();
        assert!(matches!(err, CoreError::ParseError(_)));
        let err = emit_llvm_ir("print(x);", &options).unwrap_err();
        assert!(matches!(err, CoreError::SemanticError(_)));
        assert_eq!(err.diagnostic().and_then(|d| d.code), Some("E0201"));
    }
}
