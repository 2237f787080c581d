//! Filtering behaviour of visited conditions against the library data set.

#[cfg(test)]
mod filter_tests {
    use searchcriteria::criteria::{
        AttributePath, CriteriaBuildError, CriteriaQueryVisitor, Predicate, PredicateHooks,
    };
    use searchcriteria::executor::QueryExecutor;
    use searchcriteria::search_condition::ConditionType;
    use searchcriteria::search_parser::{
        FiqlParser, ParserContext, SearchConditionParser, SearchParseError, LAX_PROPERTY_MATCH,
    };
    use test_case::test_case;

    use crate::common::{book_ids, database, entity_count, fiql, mapping, metamodel, visited};

    #[test_case("id=lt=10,id=gt=10", vec![9, 11] ; "or of ranges")]
    #[test_case("id==7,id==5", vec![] ; "or without matches")]
    #[test_case("id==10;bookTitle==num10", vec![10] ; "and of matching fields")]
    #[test_case("id==10;bookTitle==num9", vec![] ; "and of conflicting fields")]
    #[test_case("id=gt=10", vec![11] ; "greater than")]
    #[test_case("id=ge=10", vec![10, 11] ; "greater or equal")]
    #[test_case("id=le=10", vec![9, 10] ; "less or equal")]
    #[test_case("id!=10", vec![9, 11] ; "not equal")]
    #[test_case("bookTitle==num1*", vec![10, 11] ; "trailing wildcard")]
    #[test_case("bookTitle!=num1*", vec![9] ; "negated wildcard")]
    #[test_case("address.street==Street2", vec![10] ; "embedded attribute")]
    #[test_case("ownerInfo.name==Bill", vec![11] ; "single attribute embeddable")]
    #[test_case("ownerInfo.dateOfBirth=gt=2000-06-01", vec![10, 11] ; "date comparison")]
    #[test_case("library.address==town;id==9", vec![9] ; "many to one attribute")]
    fn test_scalar_filters(expression: &str, expected: Vec<i64>) {
        assert_eq!(book_ids(expression), expected);
    }

    #[test_case("reviews.authors==Ted", 3 ; "element collection behind one to many")]
    #[test_case("reviews.book.id==10", 1 ; "back reference id")]
    #[test_case("reviews.book.ownerInfo.name==Barry", 1 ; "back reference embeddable")]
    #[test_case("authors==John", 2 ; "element collection by value")]
    #[test_case("authors==Barry;ownerInfo.name==Bill", 1 ; "collection and scalar")]
    #[test_case("reviews.review==good", 2 ; "enum is case insensitive")]
    #[test_case("id==10;authors==John;reviews.review==good;reviews.authors==Ted", 1 ; "mixed joins")]
    fn test_collection_filters(expression: &str, expected: usize) {
        assert_eq!(entity_count(expression), expected);
    }

    #[test_case("reviews=gt=0", 3 ; "one to many is not empty")]
    #[test_case("reviews=gt=3", 0 ; "one to many larger than data")]
    #[test_case("reviews==1", 3 ; "one to many exact size")]
    #[test_case("count(reviews.authors)=gt=0", 3 ; "nested element collection count")]
    #[test_case("count(reviews.authors)=gt=3", 0 ; "nested element collection count too large")]
    #[test_case("count(authors)=gt=0", 3 ; "element collection count")]
    #[test_case("count(authors)=gt=3", 0 ; "element collection count too large")]
    #[test_case("count(authors)!=1", 0 ; "element collection count negated")]
    #[test_case("reviews.authors=gt=0", 3 ; "element collection compared by value")]
    fn test_collection_sizes(expression: &str, expected: usize) {
        assert_eq!(entity_count(expression), expected);
    }

    #[test]
    fn test_count_matches_entity_rows() {
        let model = metamodel();
        let db = database();
        for expression in ["authors==John", "reviews.authors==Ted", "id=lt=10,id=gt=10"] {
            let count = visited(&model, expression).count(&db).unwrap();
            assert_eq!(count as usize, entity_count(expression), "for {}", expression);
        }
    }

    #[test]
    fn test_repeated_navigation_shares_join() {
        let model = metamodel();
        let query = visited(&model, "reviews.review==good,reviews.review==bad;reviews.authors==Ted")
            .query()
            .unwrap();
        let paths: Vec<&str> = query.joins.0.iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["reviews", "reviews.authors"]);
        assert!(query.select.distinct);
        assert_eq!(database().execute(&query).unwrap().len(), 3);
    }

    #[test]
    fn test_bean_properties_and_aliases() {
        let model = metamodel();
        let context = ParserContext::new(&model, "Book")
            .with_bean_properties(mapping(&[
                ("street", "address.street"),
                ("housenum", "address.houseNumber"),
            ]))
            .with_aliases(mapping(&[("ownerbdate", "ownerInfo.dateOfBirth")]));
        let parser = FiqlParser::new(context);

        let condition = parser.parse("street==Street2;housenum=lt=5").unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        condition.accept(&mut visitor).unwrap();
        let query = visitor.select_tuple(&["id"]).unwrap();
        assert_eq!(crate::common::ids_of(&query), vec![10]);

        let condition = parser.parse("ownerbdate==2000-01-01").unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book")
            .unwrap()
            .with_aliases(mapping(&[("ownerName", "ownerInfo.name")]));
        condition.accept(&mut visitor).unwrap();
        let rows = database()
            .execute(&visitor.select_tuple(&["ownerName"]).unwrap())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].as_tuple().and_then(|t| t.get("ownerName")),
            Some(&serde_json::json!("Fred"))
        );
    }

    #[test]
    fn test_unknown_property() {
        let model = metamodel();
        assert!(matches!(
            fiql(&model, "publisher==Acme;id==10"),
            Err(SearchParseError::PropertyNotFound { property, .. }) if property == "publisher"
        ));

        let lax = ParserContext::new(&model, "Book").with_property(LAX_PROPERTY_MATCH, "true");
        let condition = FiqlParser::new(lax).parse("publisher==Acme;id==10").unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        condition.accept(&mut visitor).unwrap();
        assert_eq!(visitor.count(&database()).unwrap(), 1);
    }

    #[test]
    fn test_visitor_rejects_other_root() {
        let model = metamodel();
        let condition = FiqlParser::new(ParserContext::new(&model, "BookReview"))
            .parse("review==GOOD")
            .unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        assert_eq!(
            condition.accept(&mut visitor),
            Err(CriteriaBuildError::RootMismatch {
                expected: "Book".to_string(),
                found: "BookReview".to_string(),
            })
        );
    }

    /// Answers every collection-size check with a constant: only size 0 holds.
    struct ZeroSizeHolds;

    impl PredicateHooks for ZeroSizeHolds {
        fn collection_predicate(
            &self,
            _path: &AttributePath<'_>,
            _condition: ConditionType,
            size: i64,
        ) -> Predicate {
            Predicate::Constant(size == 0)
        }
    }

    #[test]
    fn test_collection_hook_override() {
        let model = metamodel();
        let db = database();
        let count = |expression: &str| {
            let condition = fiql(&model, expression).unwrap();
            let mut visitor = CriteriaQueryVisitor::new(&model, "Book")
                .unwrap()
                .with_hooks(ZeroSizeHolds);
            condition.accept(&mut visitor).unwrap();
            visitor.count(&db).unwrap()
        };

        assert_eq!(count("reviews=gt=0"), 3);
        assert_eq!(count("reviews=gt=3"), 0);
        // plain comparisons keep the default construction
        assert_eq!(count("id=gt=9;reviews=gt=0"), 2);
    }

    #[test]
    fn test_entity_rows_satisfy_condition() {
        let model = metamodel();
        for expression in [
            "id==10;bookTitle==num10",
            "bookTitle==num1*",
            "address.street!=Street1",
        ] {
            let condition = fiql(&model, expression).unwrap();
            let rows = database()
                .execute(&visited(&model, expression).query().unwrap())
                .unwrap();
            assert!(!rows.is_empty());
            for row in rows {
                let entity = row.as_entity().unwrap();
                assert!(condition.is_met(entity), "{} should match {}", expression, entity);
            }
        }
    }
}
