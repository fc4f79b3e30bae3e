use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn nexa() -> Command {
    Command::cargo_bin("nexa").expect("binary exists")
}

#[test]
fn emits_llvm_ir_to_stdout() {
    nexa()
        .write_stdin("print(1);")
        .assert()
        .success()
        .stdout(predicate::str::contains("define i32 @main()"))
        .stdout(predicate::str::contains("; ModuleID = 'stdin'"));
}

#[test]
fn writes_llvm_ir_to_file() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("loops.nx");
    fs::write(&input_path, "loop(i, 3) { print(i); }").expect("write input");
    let output_path = dir.path().join("out/loops.ll");

    nexa()
        .arg("--input")
        .arg(&input_path)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let ir = fs::read_to_string(&output_path).expect("read ir");
    assert!(ir.contains("; ModuleID = 'loops.nx'"));
    assert!(ir.contains("loop.cond"));
}

#[test]
fn compiles_and_runs_wasm() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("dot.nx");
    fs::write(&input_path, "<a> = 1, 2, 3; <b> = 4, 5, 6; print(<a>.<b>);")
        .expect("write input");
    let output_path = dir.path().join("dot.wasm");

    nexa()
        .arg("-i")
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .arg("--emit")
        .arg("wasm")
        .arg("--run")
        .assert()
        .success()
        .stdout(predicate::str::diff("32\nProgram exited with 0\n"));

    let wasm = fs::read(&output_path).expect("read wasm");
    assert!(wasm.starts_with(b"\0asm"));
}

#[test]
fn runs_from_stdin_without_printing_ir() {
    nexa()
        .arg("--run")
        .write_stdin("loop(i, 3) { print(i); }")
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n1\n2\nProgram exited with 0\n"));
}

#[test]
fn wasm_without_output_requires_run() {
    nexa()
        .arg("--emit")
        .arg("wasm")
        .write_stdin("print(1);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--emit wasm requires --output"));
}

#[test]
fn reports_semantic_errors() {
    nexa()
        .write_stdin("print(missing);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E0201"))
        .stderr(predicate::str::contains("undefined variable `missing`"));
}

#[test]
fn reports_parse_errors_with_location() {
    nexa()
        .write_stdin("int x = ;")
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse error"))
        .stderr(predicate::str::contains("1:9"));
}

#[test]
fn reports_runtime_traps() {
    nexa()
        .arg("--run")
        .write_stdin("<a> = 1, 2; int j = 5; print(a[j]);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to execute program"));
}

#[test]
fn rejects_unknown_emit_format() {
    nexa()
        .arg("--emit")
        .arg("asm")
        .write_stdin("print(1);")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'asm'"));
}
