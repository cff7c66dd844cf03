#[cfg(test)]
mod codegen_tests {
    use crate::checker;
    use crate::codegen::{escape_string, CodeGenerator};
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use serde::Serialize;

    fn compile(source: &str) -> String {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        let mut ast = Parser::new(tokens).parse().unwrap();
        checker::check(&mut ast).unwrap();
        CodeGenerator::new().generate(&mut ast)
    }

    fn frame_size(asm: &str, name: &str) -> i32 {
        let needle = format!(".set {}.size, ", name);
        let start = asm.find(&needle).expect("no frame size symbol") + needle.len();
        let rest = &asm[start..];
        let end = rest.find('\n').unwrap();
        rest[..end].parse().unwrap()
    }

    #[test]
    fn test_generate_return() {
        let asm = compile("int main() { return 42; }");

        assert!(asm.contains("main:"));
        assert!(asm.contains("    movl $42, %eax"));
        assert!(asm.contains("    jmp main.exit"));
        assert!(asm.contains("main.exit:"));
        assert!(asm.contains("    ret"));
        assert!(asm.contains("    .globl main"));
    }

    #[test]
    fn test_minimal_function_shape() {
        let asm = compile("int main() { return 0; }");
        insta::assert_snapshot!(asm, @r###"
        main:
            pushq %rbp
            movq %rsp, %rbp
            movl $main.size, %eax
            subq %rax, %rsp
            movl $0, %eax
            jmp main.exit

        main.exit:
            movq %rbp, %rsp
            popq %rbp
            ret

            .set main.size, 0
            .globl main

            .data
        "###);
    }

    #[test]
    fn test_generate_addition_reuses_left_register() {
        let asm = compile("int main() { return 1 + 2; }");

        assert!(asm.contains("    movl $1, %eax"));
        assert!(asm.contains("    addl $2, %eax"));
    }

    #[test]
    fn test_generate_multiplication() {
        let asm = compile("int main() { return 3 * 4; }");

        assert!(asm.contains("    movl $3, %eax"));
        assert!(asm.contains("    imull $4, %eax"));
    }

    #[test]
    fn test_generate_division() {
        let asm = compile("int main() { return 20 / 4; }");

        assert!(asm.contains("    movl $20, %eax"));
        assert!(asm.contains("    movl $4, %ecx"));
        assert!(asm.contains("    cltd"));
        assert!(asm.contains("    idivl %ecx"));
    }

    #[test]
    fn test_generate_long_division_sign_extends_with_cqto() {
        let asm = compile("long main() { long a; a = 20; return a / 4; }");

        assert!(asm.contains("    cqto"));
        assert!(asm.contains("    idivq %rcx"));
    }

    #[test]
    fn test_generate_remainder_result_in_rdx() {
        let asm = compile("int main() { return 7 % 3; }");

        assert!(asm.contains("    idivl %ecx"));
        // The remainder node lives in rdx and return moves it to rax.
        assert!(asm.contains("    movl %edx, %eax"));
    }

    #[test]
    fn test_generate_comparison() {
        let asm = compile("int main() { return 1 < 2; }");

        assert!(asm.contains("    cmpl $2, %eax"));
        assert!(asm.contains("    setl %al"));
        assert!(asm.contains("    movzbl %al, %eax"));
    }

    #[test]
    fn test_generate_not() {
        let asm = compile("int main() { return !0; }");

        assert!(asm.contains("    cmpl $0, %eax"));
        // The result register is acquired before the operand is released.
        assert!(asm.contains("    sete %dil"));
        assert!(asm.contains("    movzbl %dil, %edi"));
        assert!(asm.contains("    movl %edi, %eax"));
    }

    #[test]
    fn test_generate_negation_in_place() {
        let asm = compile("int main() { return -1 - 2; }");

        assert!(asm.contains("    movl $1, %eax"));
        assert!(asm.contains("    negl %eax"));
        assert!(asm.contains("    subl $2, %eax"));
    }

    #[test]
    fn test_spill_and_reload_across_division() {
        let asm = compile("int main() { return (1 + 2) * 3 - 4 / 2; }");

        // Loading the dividend into rax spills the product...
        assert!(asm.contains("    movl %eax, -4(%rbp)"));
        // ...and the subtraction reloads it into the next free register.
        assert!(asm.contains("    movl -4(%rbp), %edi"));
        assert!(asm.contains("    subl %eax, %edi"));
        assert_eq!(frame_size(&asm, "main"), 16);
    }

    #[test]
    fn test_short_circuit_and() {
        let asm = compile("int main() { return 0 && 1; }");

        // Both tests jump to the false label before the result is set.
        assert!(asm.contains("    je .L0"));
        let first_je = asm.find("    je .L0").unwrap();
        let result = asm.find("    movl $1, %eax").unwrap();
        assert!(first_je < result);
        assert!(asm.contains(".L0:"));
        assert!(asm.contains(".L1:"));
        assert!(asm.contains("    movl $0, %eax"));
    }

    #[test]
    fn test_short_circuit_and_suppresses_side_effects() {
        let asm = compile(
            r#"
int write_char(int c);
int main() { return 0 && write_char(66); }
"#,
        );

        // The call sits after the first test's branch, so a false left
        // operand skips it at run time.
        let branch = asm.find("    je .L0").unwrap();
        let call = asm.find("    call write_char").unwrap();
        assert!(branch < call);
    }

    #[test]
    fn test_short_circuit_or() {
        let asm = compile("int main() { return 1 || 0; }");

        assert!(asm.contains("    jne .L0"));
        assert!(asm.contains("    movl $0, %eax"));
        assert!(asm.contains("    movl $1, %eax"));
    }

    #[test]
    fn test_generate_pointer_read_and_write() {
        let asm = compile(
            r#"
int main() {
    int x;
    int *p;
    x = 7;
    p = &x;
    *p = *p + 1;
    return x;
}
"#,
        );

        assert!(asm.contains("    leaq -4(%rbp), %rax"));
        assert!(asm.contains("    movq %rax, -16(%rbp)"));
        // Load through the pointer, bump, store back through it.
        assert!(asm.contains("    movl (%rax), %eax"));
        assert!(asm.contains("    addl $1, %eax"));
        assert!(asm.contains("    movl %eax, (%rdi)"));
    }

    #[test]
    fn test_address_of_dereference_collapses() {
        let asm = compile("int main() { int x; int *p; p = &x; p = &*p; return 0; }");

        // Only the &x produces a leaq; &*p reuses the pointer register.
        assert_eq!(asm.matches("leaq").count(), 1);
    }

    #[test]
    fn test_cast_widens_char_to_int() {
        let asm = compile("int main() { char c; int i; c = -1; i = c; return i; }");

        assert!(asm.contains("    movb %al, -1(%rbp)"));
        assert!(asm.contains("    movb -1(%rbp), %al"));
        assert!(asm.contains("    movsbl %al, %eax"));
    }

    #[test]
    fn test_cast_widens_int_to_long() {
        let asm = compile("int main() { return (long)1 < 2; }");

        assert!(asm.contains("    movslq %eax, %rax"));
        assert!(asm.contains("    cmpq %rdi, %rax"));
    }

    #[test]
    fn test_call_with_six_args_no_stack_adjustment() {
        let asm = compile(
            r#"
int f(int a, int b, int c, int d, int e, int g) { return a; }
int main() { return f(1, 2, 3, 4, 5, 6); }
"#,
        );

        assert!(asm.contains("    movl $1, %edi"));
        assert!(asm.contains("    movl $6, %r9d"));
        assert!(!asm.contains("    addq $"));
        assert!(!asm.contains("    pushq %rax"));
    }

    #[test]
    fn test_call_with_seven_args_pads_to_sixteen() {
        let asm = compile(
            r#"
int f(int a, int b, int c, int d, int e, int g, int h) { return h; }
int main() { return f(1, 2, 3, 4, 5, 6, 7); }
"#,
        );

        assert!(asm.contains("    subq $8, %rsp"));
        assert!(asm.contains("    pushq %rax"));
        assert!(asm.contains("    addq $16, %rsp"));
        // The seventh parameter arrives above the saved frame.
        assert!(asm.contains(" 16(%rbp)"));
    }

    #[test]
    fn test_call_with_eight_args() {
        let asm = compile(
            r#"
int f(int a, int b, int c, int d, int e, int g, int h, int i) { return i; }
int main() { return f(1, 2, 3, 4, 5, 6, 7, 8); }
"#,
        );

        // Two pushes, no pre-padding.
        assert_eq!(asm.matches("    pushq %rax").count(), 2);
        assert!(!asm.contains("    subq $8, %rsp"));
        assert!(asm.contains("    addq $16, %rsp"));
        assert!(asm.contains("    movl $8, %eax"));
        assert!(asm.contains(" 24(%rbp)"));
    }

    #[test]
    fn test_byte_argument_sign_extended() {
        let asm = compile(
            r#"
int f(char c);
int main() { char c; c = 65; return f(c); }
"#,
        );

        assert!(asm.contains("    movb -1(%rbp), %dil"));
        assert!(asm.contains("    movsbl %dil, %edi"));
    }

    #[test]
    fn test_variadic_call_clears_eax() {
        let asm = compile(
            r#"
int printf(char *s, ...);
int main() { printf("%d\n", 42); return 0; }
"#,
        );

        let clear = asm.find("    movl $0, %eax").unwrap();
        let call = asm.find("    call printf").unwrap();
        assert!(clear < call);
        assert!(asm.contains("    movl $42, %esi"));
        assert!(asm.contains(".asciz \"%d\\012\""));
    }

    #[test]
    fn test_string_pool_dedups_identical_literals() {
        let asm = compile(
            r#"
int puts(char *s);
int main() { puts("hi"); puts("hi"); puts("yo"); return 0; }
"#,
        );

        assert_eq!(asm.matches(".asciz \"hi\"").count(), 1);
        assert_eq!(asm.matches(".asciz \"yo\"").count(), 1);
        assert_eq!(asm.matches("leaq .L0, ").count(), 2);
        assert!(asm.contains(".L1: .asciz \"yo\""));
    }

    #[test]
    fn test_globals_use_comm_and_symbol_operands() {
        let asm = compile(
            r#"
int count;
char flag;
int main() { count = 3; return count; }
"#,
        );

        assert!(asm.contains("    .comm count, 4"));
        assert!(asm.contains("    .comm flag, 1"));
        assert!(asm.contains("    movl %eax, count"));
        assert!(asm.contains("    movl count, %eax"));
    }

    #[test]
    fn test_for_loop_with_break() {
        let asm = compile(
            r#"
int main() {
    int i;
    for (i = 0; i < 10; i = i + 1) {
        if (i == 5) break;
    }
    return i;
}
"#,
        );

        // The loop test and the break both target the exit label.
        assert!(asm.contains("    je .L1"));
        assert!(asm.contains("    jmp .L1"));
        assert!(asm.contains("    jmp .L0"));
        assert!(asm.contains("    cmpl $5, %eax"));
        assert!(asm.contains("    addl $1, %eax"));
    }

    #[test]
    fn test_while_loop_shape() {
        let asm = compile("int main() { int i; i = 0; while (i < 3) i = i + 1; return i; }");

        assert!(asm.contains(".L0:"));
        assert!(asm.contains("    je .L1"));
        assert!(asm.contains("    jmp .L0"));
        assert!(asm.contains(".L1:"));
    }

    #[test]
    fn test_if_else() {
        let asm = compile("int main() { int x; x = 1; if (x) x = 2; else x = 3; return x; }");

        assert!(asm.contains("    je .L0"));
        assert!(asm.contains("    jmp .L1"));
        assert!(asm.contains("    movl $2, %eax"));
        assert!(asm.contains("    movl $3, %eax"));
    }

    #[test]
    fn test_pointer_arithmetic_is_scaled() {
        let asm = compile("int main() { int x; int *p; p = &x; p = p + 2; return 0; }");

        // The index is widened and multiplied by sizeof(int) before the add.
        assert!(asm.contains("    movslq %"));
        assert!(asm.contains("    imulq $4, "));
        assert!(asm.contains("    addq "));
    }

    #[test]
    fn test_parameter_spill_widths_match_types() {
        let asm = compile("int f(char c, long l, int i) { return i; }");

        assert!(asm.contains("    movb %dil, -1(%rbp)"));
        assert!(asm.contains("    movq %rsi, -16(%rbp)"));
        assert!(asm.contains("    movl %edx, -20(%rbp)"));
    }

    #[test]
    fn test_frame_sizes_are_sixteen_byte_multiples() {
        #[derive(Serialize)]
        struct FrameShape {
            name: &'static str,
            size: i32,
        }

        for source in [
            "int main() { return 0; }",
            "int main() { int a; return 0; }",
            "int main() { int a; char b; long c; return 0; }",
            "int main() { return (1 + 2) * 3 - 4 / 2; }",
        ] {
            let asm = compile(source);
            assert_eq!(frame_size(&asm, "main") % 16, 0, "source: {}", source);
        }

        let asm = compile("int main() { int a; return 0; }");
        let shape = FrameShape {
            name: "main",
            size: frame_size(&asm, "main"),
        };
        insta::assert_yaml_snapshot!(shape, @r###"
        ---
        name: main
        size: 16
        "###);
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hi"), "hi");
        assert_eq!(escape_string("a\"b"), "a\\\"b");
        assert_eq!(escape_string("a\\b"), "a\\\\b");
        assert_eq!(escape_string("line\n"), "line\\012");
        assert_eq!(escape_string("\t"), "\\011");
    }
}
