//! Unit tests for search expression edge cases and error handling
//!
//! Tests malformed expressions, edge cases, and error conditions to ensure
//! robust parsing without panics.

#[cfg(test)]
mod parser_robustness_tests {
    use searchcriteria::entity_catalog::{EntitySchemaConfig, Metamodel};
    use searchcriteria::search_parser::fiql::parse_fiql;
    use searchcriteria::search_parser::odata::parse_odata;
    use searchcriteria::search_parser::value_coercion::percent_decode;
    use searchcriteria::search_parser::{
        FiqlParser, ODataParser, ParserContext, SearchConditionParser, SearchParseError,
    };

    const SCHEMA: &str = r#"
name: minimal
entities:
  - name: Book
    table: books
    id: id
    attributes:
      - name: id
        type: integer
      - name: bookTitle
        type: string
        column: book_title
      - name: published
        type: date
      - name: authors
        element_collection: string
        table: book_authors
        join_column: book_id
        column: author
"#;

    fn metamodel() -> Metamodel {
        EntitySchemaConfig::from_yaml_str(SCHEMA)
            .and_then(|schema| schema.to_metamodel())
            .unwrap()
    }

    /// Test that malformed expressions don't cause panics
    #[test]
    fn test_malformed_fiql_no_panic() {
        let malformed = vec![
            "",                 // Empty expression
            "   ",              // Whitespace only
            "id",               // Missing operator
            "id==",             // Missing value
            "==10",             // Missing selector
            "id=xx10",          // Unterminated operator
            "(id==10",          // Unclosed bracket
            "id==10)",          // Stray closing bracket
            "id==10;",          // Dangling AND
            "id==10,",          // Dangling OR
            ";id==10",          // Leading AND
            "((id==10)",        // Unbalanced nesting
            "id==10;;id==11",   // Doubled separator
            "count(id==10",     // Broken aggregate
            "count()==1",       // Empty aggregate
        ];

        let model = metamodel();
        let parser = FiqlParser::new(ParserContext::new(&model, "Book"));
        for expression in malformed {
            assert!(
                parser.parse(expression).is_err(),
                "expected an error for {:?}",
                expression
            );
        }
    }

    #[test]
    fn test_malformed_odata_no_panic() {
        let malformed = vec![
            "",
            "id",
            "id eq",
            "id eq 1 and",
            "id eq 1 or",
            "eq 1",
            "(id eq 1",
            "id eq 1)",
            "bookTitle eq 'unterminated",
            "id like 1",
        ];

        let model = metamodel();
        let parser = ODataParser::new(ParserContext::new(&model, "Book"));
        for expression in malformed {
            assert!(
                parser.parse(expression).is_err(),
                "expected an error for {:?}",
                expression
            );
        }
    }

    #[test]
    fn test_bracket_errors() {
        assert!(matches!(
            parse_fiql("id==10)", false),
            Err(SearchParseError::UnexpectedClosingBracket { .. })
        ));
        assert!(matches!(
            parse_fiql("(id==10", false),
            Err(SearchParseError::UnmatchedBrackets { .. })
        ));
        assert!(matches!(
            parse_odata("(id eq 1"),
            Err(SearchParseError::UnmatchedBrackets { .. })
        ));
    }

    #[test]
    fn test_dangling_operators() {
        assert!(matches!(
            parse_fiql("id==10;", false),
            Err(SearchParseError::DanglingOperator { .. })
        ));
        assert!(matches!(
            parse_odata("id eq 1 and"),
            Err(SearchParseError::DanglingOperator { .. })
        ));
    }

    #[test]
    fn test_single_equals_is_opt_in() {
        assert!(parse_fiql("id=10", false).is_err());
        assert!(parse_fiql("id=10", true).is_ok());
    }

    #[test]
    fn test_values_with_reserved_text() {
        let model = metamodel();
        let fiql = FiqlParser::new(ParserContext::new(&model, "Book"));
        assert!(fiql.parse("bookTitle==a=b").is_ok());
        assert!(fiql.parse("bookTitle==x!y").is_ok());

        let odata = ODataParser::new(ParserContext::new(&model, "Book"));
        assert!(odata.parse("bookTitle eq 'a and b or c'").is_ok());
        assert!(odata.parse("bookTitle eq 'O''Hara'").is_ok());
    }

    #[test]
    fn test_value_errors() {
        let model = metamodel();
        let parser = FiqlParser::new(ParserContext::new(&model, "Book"));
        assert!(matches!(
            parser.parse("id==ten"),
            Err(SearchParseError::TypeCoercion { .. })
        ));
        assert!(matches!(
            parser.parse("id==99999999999"),
            Err(SearchParseError::TypeCoercion { .. })
        ));
        assert!(matches!(
            parser.parse("bookTitle==**"),
            Err(SearchParseError::InvalidWildcard { .. })
        ));
        assert!(matches!(
            parser.parse("count(authors)==many"),
            Err(SearchParseError::TypeCoercion { .. })
        ));
    }

    /// Duration literals too large for a date must fail coercion, not overflow
    #[test]
    fn test_oversized_duration_values() {
        let model = metamodel();
        let parser = FiqlParser::new(ParserContext::new(&model, "Book"));
        for expression in [
            "published==PT1M99999999999999999999S",
            "published==P4294967295W",
            "published=lt=-P4294967295Y",
        ] {
            assert!(
                matches!(
                    parser.parse(expression),
                    Err(SearchParseError::TypeCoercion { .. })
                ),
                "expected a coercion error for {:?}",
                expression
            );
        }
    }

    #[test]
    fn test_percent_decoding_edge_cases() {
        let test_cases = vec![
            ("", Some("")),
            ("plain", Some("plain")),
            ("a%20b", Some("a b")),
            ("%41%42", Some("AB")),
            ("caf%C3%A9", Some("café")),
            ("100%", None),
            ("%zz", None),
            ("%4", None),
        ];

        for (input, expected) in test_cases {
            let result = percent_decode(input).ok();
            assert_eq!(result.as_deref(), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_deeply_nested_expression() {
        let depth = 64;
        let expression = format!("{}id==10{}", "(".repeat(depth), ")".repeat(depth));
        let model = metamodel();
        let parser = FiqlParser::new(ParserContext::new(&model, "Book"));
        assert!(parser.parse(&expression).is_ok());
    }

    #[test]
    fn test_long_flat_expression() {
        let expression = (0..500)
            .map(|i| format!("id=={}", i))
            .collect::<Vec<_>>()
            .join(",");
        let model = metamodel();
        let parser = FiqlParser::new(ParserContext::new(&model, "Book"));
        assert!(parser.parse(&expression).is_ok());
    }
}
