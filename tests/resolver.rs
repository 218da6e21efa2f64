mod common;

#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{Expr, Stmt};
    use rox::error::LoxError;
    use rox::interpreter::Interpreter;
    use rox::parser::Parser;
    use rox::resolver::Resolver;
    use rox::scanner::scan_all;
    use rox::session::RunStatus;

    use crate::common::{self, Harness};

    /// Messages from the resolve pass alone.
    fn resolve_errors(source: &str) -> Vec<String> {
        let (tokens, _) = scan_all(source);
        let statements = Parser::new(&tokens).parse().expect("source should parse");

        let mut interpreter = Interpreter::new();
        match Resolver::new(&mut interpreter).resolve(&statements) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(LoxError::to_string).collect(),
        }
    }

    #[test]
    fn test_duplicate_local_is_an_error() {
        assert_eq!(
            resolve_errors("{\n  var x;\n  var x;\n}"),
            vec!["[line 3] Error: Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_duplicate_global_is_allowed() {
        assert!(resolve_errors("var x; var x;").is_empty());
        assert_eq!(common::output_of("var x = 1; var x = 2; print x;"), vec!["2"]);
    }

    #[test]
    fn test_duplicate_parameter_is_an_error() {
        assert_eq!(
            resolve_errors("fun f(a, a) {}"),
            vec!["[line 1] Error: Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            resolve_errors("var a = 1; { var a = a; }"),
            vec!["[line 1] Error: Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_return_outside_function() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error: Can't return from top-level code."]
        );
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_eq!(
            resolve_errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error: Can't return a value from an initializer."]
        );

        // A bare return is fine.
        assert!(resolve_errors("class A { init() { return; } }").is_empty());
    }

    #[test]
    fn test_this_outside_class() {
        assert_eq!(
            resolve_errors("print this;\nfun f() { return this; }"),
            vec![
                "[line 1] Error: Can't use 'this' outside of a class.",
                "[line 2] Error: Can't use 'this' outside of a class.",
            ]
        );
    }

    #[test]
    fn test_super_misuse() {
        assert_eq!(
            resolve_errors("super.x;\nclass A { f() { super.f(); } }"),
            vec![
                "[line 1] Error: Can't use 'super' outside of a class.",
                "[line 2] Error: Can't use 'super' in a class with no superclass.",
            ]
        );
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_eq!(
            resolve_errors("class A < A {}"),
            vec!["[line 1] Error: A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_all_errors_collected_in_one_pass() {
        let errors = resolve_errors("return;\n{ var a; var a; }\nprint this;");

        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_static_error_blocks_execution() {
        let mut harness = Harness::new();
        let status = harness.run("print \"before\";\n{ var a; var a; }");

        assert_eq!(status, RunStatus::StaticError);
        assert!(harness.output.contents().is_empty());
        assert_eq!(
            harness.messages(),
            vec!["Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_closure_binds_to_declaration_scope() {
        // The closure keeps seeing the global `a` even after a local `a`
        // is declared later in the same block.
        let lines = common::output_of(
            r#"
            var a = "global";
            {
              fun show() { print a; }
              show();
              var a = "block";
              show();
            }
            "#,
        );

        assert_eq!(lines, vec!["global", "global"]);
    }

    /// Resolve `{ var a; <second>; print a; }` and report the recorded
    /// distance of the printed `a`.
    fn printed_depth(second: &str) -> (bool, Option<usize>) {
        let source = format!("{{ var a; {} print a; }}", second);
        let (tokens, _) = scan_all(&source);
        let statements = Parser::new(&tokens).parse().expect("source should parse");

        let Stmt::Block(body) = &statements[0] else {
            panic!("expected block, got {:?}", statements[0]);
        };
        let Some(Stmt::Print(Expr::Variable { id, .. })) = body.last() else {
            panic!("expected print of a variable, got {:?}", body.last());
        };

        let mut interpreter = Interpreter::new();
        let resolved = Resolver::new(&mut interpreter).resolve(&statements).is_ok();

        (resolved, interpreter.local_depth(*id))
    }

    #[test]
    fn test_distances_recorded_on_success() {
        assert_eq!(printed_depth("var b;"), (true, Some(0)));
    }

    #[test]
    fn test_distances_dropped_when_resolution_fails() {
        assert_eq!(printed_depth("var a;"), (false, None));
    }
}
