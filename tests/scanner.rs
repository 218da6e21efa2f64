#[cfg(test)]
mod scanner_tests {
    use pretty_assertions::assert_eq;

    use rox::error::LoxError;
    use rox::scanner::*;
    use rox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "! != = == < <= > >= /",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "class fun var orchid _x1 this super nil",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::FUN, "fun"),
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "orchid"),
                (TokenType::IDENTIFIER, "_x1"),
                (TokenType::THIS, "this"),
                (TokenType::SUPER, "super"),
                (TokenType::NIL, "nil"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_number_without_trailing_fraction() {
        // A dot with no digit after it is a separate token.
        assert_token_sequence(
            "123.abs 4.5",
            &[
                (TokenType::NUMBER(0.0), "123"),
                (TokenType::DOT, "."),
                (TokenType::IDENTIFIER, "abs"),
                (TokenType::NUMBER(0.0), "4.5"),
                (TokenType::EOF, ""),
            ],
        );

        let tokens: Vec<Token> = Scanner::new("4.5").filter_map(Result::ok).collect();
        match tokens[0].token_type {
            TokenType::NUMBER(n) => assert_eq!(n, 4.5),
            ref other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_05_comments_and_lines() {
        let source = "// heading\nvar a; // trailing\n\n\"multi\nline\" b";
        let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![2, 2, 2, 5, 5, 5]);

        assert_eq!(
            tokens[3].token_type,
            TokenType::STRING(String::new()),
            "string literal expected"
        );
        assert_eq!(tokens[3].to_string(), "STRING \"multi\nline\" multi\nline");
    }

    #[test]
    fn test_scanner_06_display() {
        let tokens: Vec<String> = Scanner::new("var x = 3; \"hi\" 2.25")
            .filter_map(Result::ok)
            .map(|t| t.to_string())
            .collect();

        assert_eq!(
            tokens,
            vec![
                "VAR var null",
                "IDENTIFIER x null",
                "EQUAL = null",
                "NUMBER 3 3.0",
                "SEMICOLON ; null",
                "STRING \"hi\" hi",
                "NUMBER 2.25 2.25",
                "EOF  null",
            ]
        );
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let results: Vec<_> = Scanner::new(source).collect();

        // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }

        fn assert_token_matches(
            result: &Result<Token, LoxError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(token.token_type, expected_type);
                    assert_eq!(token.lexeme, expected_lexeme);
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_multibyte_unexpected_character() {
        let (tokens, errors) = scan_all("a é b");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 1] Error: Unexpected character: é");

        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["a", "b", ""]);
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = scan_all("print \"open\nended");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), Some("Unterminated string."));
        assert_eq!(errors[0].line(), Some(2));

        // Scanning still finishes with EOF.
        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_exactly_one_eof() {
        let mut scanner = Scanner::new("");

        assert!(matches!(scanner.next(), Some(Ok(Token { token_type: TokenType::EOF, .. }))));
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }
}
