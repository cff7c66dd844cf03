use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_help_flag() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Simple C compiler"));
}

#[test]
fn test_missing_input_file() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.arg("nonexistent.c");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error reading file"));
}

#[test]
fn test_compile_from_stdin_to_stdout() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() { return 42; }");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("main:"))
        .stdout(predicate::str::contains("movl $42, %eax"))
        .stdout(predicate::str::contains(".globl main"));
}

#[test]
fn test_compile_to_output_file() {
    fs::create_dir_all("tests/fixtures").unwrap();
    let test_file = "tests/fixtures/simple_return.c";
    fs::write(test_file, "int main() { return 42; }").unwrap();

    let output_file = "tests/fixtures/simple_return.s";
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.arg(test_file).arg("-o").arg(output_file);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Compiled"));

    let asm = fs::read_to_string(output_file).unwrap();
    assert!(asm.contains("main:"));
    assert!(asm.contains("movl $42, %eax"));
    assert!(asm.contains("ret"));

    fs::remove_file(test_file).ok();
    fs::remove_file(output_file).ok();
}

#[test]
fn test_lex_only_flag() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.arg("--lex-only").write_stdin("int main() { return 0; }");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("int"))
        .stdout(predicate::str::contains("Identifier(main)"))
        .stdout(predicate::str::contains("Number(0)"));
}

#[test]
fn test_parse_only_flag() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.arg("--parse-only")
        .write_stdin("int main() { return 0; }");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Program"))
        .stdout(predicate::str::contains("Function(main: int ())"));
}

#[test]
fn test_compile_arithmetic() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() { return (1 + 2) * 3 - 4 / 2; }");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("addl"))
        .stdout(predicate::str::contains("imull"))
        .stdout(predicate::str::contains("idivl"))
        .stdout(predicate::str::contains("cltd"));
}

#[test]
fn test_compile_short_circuit() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() { return 1 || 0; }");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("jne .L0"));
}

#[test]
fn test_compile_string_literal() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int puts(char *s);\nint main() { puts(\"hello\"); return 0; }");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(".data"))
        .stdout(predicate::str::contains(".asciz \"hello\""));
}

#[test]
fn test_semantic_error_reports_line_and_fails() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() {\n    return x;\n}\n");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("line 2: 'x' undeclared"));
}

#[test]
fn test_break_outside_loop_fails() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() { break; return 0; }");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("break statement not within a loop"));
}

#[test]
fn test_parse_error_fails_with_context() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() { return 42 }");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected ';'"));
}

#[test]
fn test_multiple_semantic_errors_are_all_reported() {
    let mut cmd = Command::cargo_bin("scc").unwrap();
    cmd.write_stdin("int main() {\n    return x;\n    return y;\n}\n");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("'x' undeclared"))
        .stderr(predicate::str::contains("'y' undeclared"));
}
