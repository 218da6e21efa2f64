mod common;

#[cfg(test)]
mod session_tests {
    use pretty_assertions::assert_eq;

    use std::io::{self, Write};

    use rox::error::LoxError;
    use rox::session::{RunStatus, Session};

    use crate::common::Harness;

    /// Accepts writes but refuses to flush.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let mut repl = Harness::new();

        assert_eq!(repl.run("var count = 1;"), RunStatus::Completed);
        assert_eq!(repl.run("fun bump() { count = count + 1; return count; }"), RunStatus::Completed);
        assert_eq!(repl.run("print bump();"), RunStatus::Completed);
        assert_eq!(repl.run("print bump();"), RunStatus::Completed);

        assert_eq!(repl.output.lines(), vec!["2", "3"]);
        assert!(repl.errors.is_empty());
    }

    #[test]
    fn test_closures_survive_their_source_line() {
        let mut repl = Harness::new();

        repl.run("fun make() { var n = 0; fun next() { n = n + 1; return n; } return next; }");
        repl.run("var counter = make();");
        repl.run("counter();");
        repl.run("print counter();");

        assert_eq!(repl.output.lines(), vec!["2"]);
    }

    #[test]
    fn test_classes_span_runs() {
        let mut repl = Harness::new();

        repl.run("class Animal { speak() { return this.sound; } }");
        repl.run("class Dog < Animal { init() { this.sound = \"woof\"; } }");
        repl.run("var d = Dog();");
        repl.run("print d.speak();");

        assert_eq!(repl.output.lines(), vec!["woof"]);
    }

    #[test]
    fn test_runtime_error_keeps_existing_globals() {
        let mut repl = Harness::new();

        repl.run("var a = 1;");
        assert_eq!(repl.run("a = 2; print a; a = -nil; a = 3;"), RunStatus::RuntimeError);
        assert_eq!(repl.run("print a;"), RunStatus::Completed);

        // Effects before the error stay; nothing after it ran.
        assert_eq!(repl.output.lines(), vec!["2", "2"]);
        assert_eq!(repl.messages(), vec!["Operand must be a number."]);
    }

    #[test]
    fn test_static_error_run_defines_nothing() {
        let mut repl = Harness::new();

        assert_eq!(repl.run("var lost = 1; print ;"), RunStatus::StaticError);
        assert_eq!(repl.run("print lost;"), RunStatus::RuntimeError);

        assert_eq!(
            repl.messages(),
            vec!["Expect expression.", "Undefined variable 'lost'."]
        );
    }

    #[test]
    fn test_lex_error_is_static() {
        let mut repl = Harness::new();

        assert_eq!(repl.run("print 1; @"), RunStatus::StaticError);
        assert!(repl.output.contents().is_empty());
        assert!(repl.errors[0].is_static());
    }

    #[test]
    fn test_every_stage_reports_before_stopping() {
        let mut repl = Harness::new();

        // One lexical error and one parse error in the same source.
        assert_eq!(repl.run("var x = #;\nprint (1;"), RunStatus::StaticError);

        let lines: Vec<Option<usize>> = repl.errors.iter().map(|e| e.line()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], Some(1));
        assert_eq!(repl.errors[0].message(), Some("Unexpected character: #"));
    }

    #[test]
    fn test_evaluate_single_expression() {
        use rox::parser::Parser;
        use rox::scanner::scan_all;

        let mut repl = Harness::new();
        repl.run("var base = 40;");

        let (tokens, _) = scan_all("base + 2");
        let expr = Parser::new(&tokens).parse_expression().unwrap();
        let value = repl.session.interpreter().evaluate_expression(&expr).unwrap();

        assert_eq!(value.to_string(), "42");
    }

    #[test]
    fn test_runtime_error_survives_failed_flush() {
        let mut session = Session::with_output(Box::new(BrokenPipe));
        let mut errors: Vec<LoxError> = Vec::new();

        assert_eq!(session.run("print 1;\nprint -nil;", &mut errors), RunStatus::RuntimeError);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Operand must be a number.\n[line 2]");

        // With no runtime error, the flush failure itself is reported.
        errors.clear();
        assert_eq!(session.run("print 2;", &mut errors), RunStatus::RuntimeError);
        assert!(errors[0].to_string().contains("pipe closed"));
    }
}
