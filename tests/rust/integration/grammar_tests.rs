//! Both grammars and the configuration layer feeding the same query pipeline.

#[cfg(test)]
mod grammar_tests {
    use std::io::Write;

    use searchcriteria::config::SearchConfig;
    use searchcriteria::criteria::CriteriaQueryVisitor;
    use searchcriteria::search_parser::{ParserContext, SearchConditionParser, SearchGrammar};
    use searchcriteria::sql_generator::{generate_sql, to_sql};
    use test_case::test_case;

    use crate::common::{book_ids, fiql, ids_of, metamodel, odata, visited};

    #[test_case("id lt 10 or id gt 10", "id=lt=10,id=gt=10" ; "or of ranges")]
    #[test_case("id eq 10 and bookTitle eq 'num10'", "id==10;bookTitle==num10" ; "and of fields")]
    #[test_case("bookTitle eq 'num1*'", "bookTitle==num1*" ; "wildcard")]
    #[test_case("id ne 10", "id!=10" ; "not equal")]
    #[test_case("count(authors) ge 1 and reviews.authors eq 'Ted'", "count(authors)=ge=1;reviews.authors==Ted" ; "collections")]
    fn test_odata_matches_fiql(odata_expression: &str, fiql_expression: &str) {
        let model = metamodel();
        assert_eq!(
            odata(&model, odata_expression).unwrap(),
            fiql(&model, fiql_expression).unwrap()
        );
    }

    #[test]
    fn test_odata_query_results() {
        let model = metamodel();
        let condition = odata(&model, "(id lt 10 or id gt 10) and authors eq 'Barry'").unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        condition.accept(&mut visitor).unwrap();
        assert_eq!(ids_of(&visitor.select_tuple(&["id"]).unwrap()), vec![11]);
    }

    #[test]
    fn test_query_building_is_repeatable() {
        let model = metamodel();
        let expression = "reviews.authors==Ted;authors==John,count(reviews)=gt=0";
        let first = visited(&model, expression).query().unwrap();
        let second = visited(&model, expression).query().unwrap();
        assert_eq!(first, second);
        assert_eq!(generate_sql(&first), generate_sql(&second));
        assert_eq!(book_ids(expression), book_ids(expression));
    }

    #[test]
    fn test_generated_sql() {
        let model = metamodel();
        let query = visited(&model, "authors==John;library.address==town")
            .order_by(&["id"], false)
            .unwrap()
            .select_tuple(&["id"])
            .unwrap();
        assert_eq!(
            generate_sql(&query),
            "SELECT DISTINCT \n\
             \x20     b.id AS \"id\"\n\
             FROM books AS b\n\
             LEFT JOIN book_authors AS a1 ON b.id = a1.book_id\n\
             LEFT JOIN libraries AS l2 ON b.library_id = l2.id\n\
             WHERE a1.author = 'John' AND l2.address = 'town'\n\
             ORDER BY b.id DESC\n"
        );
    }

    #[test]
    fn test_condition_sql() {
        let model = metamodel();
        assert_eq!(
            to_sql(&fiql(&model, "bookTitle==num1*;id=lt=11").unwrap(), "books"),
            "SELECT * FROM books WHERE (bookTitle LIKE 'num1%') AND (id < '11')"
        );
    }

    #[test]
    fn test_config_driven_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "date_format: \"%d/%m/%Y\"\nsingle_equals: true\ndecode_values: true\ngrammar: fiql"
        )
        .unwrap();
        let config = SearchConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.grammar, SearchGrammar::Fiql);

        let model = metamodel();
        let context =
            ParserContext::new(&model, "Book").with_properties(config.to_context_properties());
        let condition = config
            .grammar
            .parser(context)
            .parse("ownerInfo.dateOfBirth=01/01/2001;address.street==Street%32")
            .unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        condition.accept(&mut visitor).unwrap();
        assert_eq!(ids_of(&visitor.select_tuple(&["id"]).unwrap()), vec![10]);
    }

    #[test]
    fn test_grammar_switch() {
        let model = metamodel();
        let config = SearchConfig {
            grammar: SearchGrammar::OData,
            ..Default::default()
        };
        let condition = config
            .grammar
            .parser(ParserContext::new(&model, "Book"))
            .parse("bookTitle eq 'num9'")
            .unwrap();
        assert_eq!(condition, fiql(&model, "bookTitle==num9").unwrap());
    }
}
