#[cfg(test)]
mod checker_tests {
    use crate::ast::{Ast, Type};
    use crate::checker;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn parse(source: &str) -> Ast {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    fn check_ok(source: &str) -> Ast {
        let mut ast = parse(source);
        checker::check(&mut ast).unwrap();
        ast
    }

    fn check_errors(source: &str) -> Vec<String> {
        let mut ast = parse(source);
        checker::check(&mut ast)
            .unwrap_err()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn test_undeclared_variable() {
        let errors = check_errors("int main() { return x; }");
        assert_eq!(errors, vec!["line 1: 'x' undeclared"]);
    }

    #[test]
    fn test_undeclared_function() {
        let errors = check_errors("int main() { return f(1); }");
        assert_eq!(errors, vec!["line 1: 'f' undeclared"]);
    }

    #[test]
    fn test_redeclared_local() {
        let errors = check_errors("int main() { int x; int x; return 0; }");
        assert_eq!(errors, vec!["line 1: 'x' redeclared"]);
    }

    #[test]
    fn test_inner_scope_may_shadow() {
        check_ok("int main() { int x; { int x; x = 1; } return 0; }");
    }

    #[test]
    fn test_break_outside_loop() {
        let errors = check_errors("int main() { break; return 0; }");
        assert_eq!(errors, vec!["line 1: break statement not within a loop"]);
    }

    #[test]
    fn test_break_inside_loop_is_fine() {
        check_ok("int main() { while (1) break; return 0; }");
    }

    #[test]
    fn test_wrong_argument_count() {
        let errors = check_errors(
            "int f(int a, int b) { return a; }\nint main() { return f(1); }",
        );
        assert_eq!(errors, vec!["line 2: wrong number of arguments to 'f'"]);
    }

    #[test]
    fn test_variadic_accepts_extra_arguments() {
        check_ok(
            "int printf(char *s, ...);\nint main() { printf(\"%d %d\\n\", 1, 2); return 0; }",
        );
    }

    #[test]
    fn test_variadic_still_requires_fixed_arguments() {
        let errors = check_errors("int printf(char *s, ...);\nint main() { printf(); return 0; }");
        assert_eq!(errors, vec!["line 2: wrong number of arguments to 'printf'"]);
    }

    #[test]
    fn test_dereferencing_non_pointer() {
        let errors = check_errors("int main() { int x; return *x; }");
        assert_eq!(errors, vec!["line 1: cannot dereference non-pointer type"]);
    }

    #[test]
    fn test_address_requires_lvalue() {
        let errors = check_errors("int main() { int *p; p = &(1 + 2); return 0; }");
        assert_eq!(errors, vec!["line 1: lvalue required for unary '&'"]);
    }

    #[test]
    fn test_pointer_minus_pointer_is_rejected() {
        let errors = check_errors(
            "int main() { int x; int *p; int *q; p = &x; q = &x; return p - q; }",
        );
        assert_eq!(errors, vec!["line 1: invalid operands to binary '-'"]);
    }

    #[test]
    fn test_pointer_assignment_type_mismatch() {
        let errors = check_errors("int main() { int x; char *p; p = &x; return 0; }");
        assert_eq!(errors, vec!["line 1: incompatible types in assignment"]);
    }

    #[test]
    fn test_function_used_as_value() {
        let errors = check_errors("int f() { return 0; }\nint main() { f; return 0; }");
        assert_eq!(errors, vec!["line 2: function 'f' used as a value"]);
    }

    #[test]
    fn test_assignment_inserts_widening_cast() {
        use crate::ast::{ExprKind, Stmt};

        let ast = check_ok("int main() { char c; int i; c = 0; i = c; return i; }");
        let body = match ast.functions[0].body.as_ref().unwrap() {
            Stmt::Block(stmts) => stmts,
            _ => unreachable!(),
        };
        // `i = c` must now assign from a cast node of type int.
        let cast_assignments = body
            .iter()
            .filter_map(|s| match s {
                Stmt::Assignment { right, .. } => Some(*right),
                _ => None,
            })
            .filter(|e| {
                matches!(ast.expr(*e).kind, ExprKind::Cast(_)) && ast.expr(*e).ty == Type::Int
            })
            .count();
        assert_eq!(cast_assignments, 1);
    }

    #[test]
    fn test_char_promotes_to_int_in_arithmetic() {
        let ast = check_ok("int main() { char a; char b; a = 1; b = 2; return a + b; }");

        // The sum itself is an int.
        let sum = ast
            .exprs
            .iter()
            .find(|e| matches!(e.kind, crate::ast::ExprKind::Binary { op: crate::ast::BinOp::Add, .. }))
            .unwrap();
        assert_eq!(sum.ty, Type::Int);
    }

    #[test]
    fn test_mixed_int_long_widens_to_long() {
        let ast = check_ok("int main() { long l; l = 1; return (int)(l + 2); }");

        let sum = ast
            .exprs
            .iter()
            .find(|e| matches!(e.kind, crate::ast::ExprKind::Binary { op: crate::ast::BinOp::Add, .. }))
            .unwrap();
        assert_eq!(sum.ty, Type::Long);
    }

    #[test]
    fn test_string_literal_decays_to_char_pointer() {
        let ast = check_ok("int puts(char *s);\nint main() { puts(\"hi\"); return 0; }");

        // The call argument is an address-of node typed char *.
        let decayed = ast
            .exprs
            .iter()
            .filter(|e| matches!(e.kind, crate::ast::ExprKind::Address(_)))
            .filter(|e| e.ty == Type::Pointer(Box::new(Type::Char)))
            .count();
        assert_eq!(decayed, 1);
    }

    #[test]
    fn test_locals_and_params_are_collected() {
        let ast = check_ok("int f(int a, int b) { int c; { long d; d = 0; } return c; }");

        assert_eq!(ast.functions[0].param_symbols.len(), 2);
        assert_eq!(ast.functions[0].locals.len(), 2);
    }

    #[test]
    fn test_allocate_assigns_aligned_offsets() {
        let mut ast = check_ok("int f(char c, long l, int i) { return i; }");

        let mut offset = 16;
        checker::allocate(&mut ast, 0, &mut offset);

        let offsets: Vec<i32> = ast.functions[0]
            .param_symbols
            .iter()
            .map(|id| ast.symbols[id.index()].offset)
            .collect();
        assert_eq!(offsets, vec![-1, -16, -20]);
        assert_eq!(offset, -20);
    }

    #[test]
    fn test_allocate_places_seventh_parameter_above_frame() {
        let mut ast = check_ok(
            "int f(int a, int b, int c, int d, int e, int g, int h, int i) { return i; }",
        );

        let mut offset = 16;
        checker::allocate(&mut ast, 0, &mut offset);

        let syms = &ast.functions[0].param_symbols;
        assert_eq!(ast.symbols[syms[6].index()].offset, 16);
        assert_eq!(ast.symbols[syms[7].index()].offset, 24);
    }
}
