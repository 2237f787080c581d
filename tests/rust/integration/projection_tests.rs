//! Projection, ordering and count queries over the library data set.

#[cfg(test)]
mod projection_tests {
    use serde::Deserialize;
    use serde_json::json;

    use searchcriteria::criteria::{CriteriaBuildError, CriteriaQueryVisitor, SelectionMode};
    use searchcriteria::executor::{QueryExecutor, ResultRow};

    use crate::common::{database, fiql, ids_of, metamodel, visited};

    #[derive(Debug, PartialEq, Deserialize)]
    struct BookInfo(i64, String);

    #[test]
    fn test_tuple_selection() {
        let model = metamodel();
        let query = visited(&model, "id==10").select_tuple(&["id"]).unwrap();
        let rows = database().execute(&query).unwrap();
        assert_eq!(rows.len(), 1);
        let tuple = rows[0].as_tuple().unwrap();
        assert_eq!(tuple.names(), ["id".to_string()]);
        assert_eq!(tuple.get("id"), Some(&json!(10)));
    }

    #[test]
    fn test_count() {
        let model = metamodel();
        assert_eq!(visited(&model, "id==10").count(&database()).unwrap(), 1);
        assert_eq!(visited(&model, "id==5").count(&database()).unwrap(), 0);
    }

    #[test]
    fn test_count_is_distinct_over_collection_joins() {
        let model = metamodel();
        let query = visited(&model, "authors==John,reviews.authors==Ted")
            .count_query()
            .unwrap();
        assert!(query.select.distinct);
        assert_eq!(
            database().execute(&query).unwrap(),
            vec![ResultRow::Count(3)]
        );
    }

    #[test]
    fn test_construct_selection() {
        let model = metamodel();
        let query = visited(&model, "id==10")
            .select_construct::<BookInfo>(&["id", "bookTitle"])
            .unwrap();
        assert_eq!(
            query.query().select.mode,
            SelectionMode::Construct {
                type_name: "BookInfo".to_string()
            }
        );
        assert_eq!(
            query.execute(&database()).unwrap(),
            vec![BookInfo(10, "num10".to_string())]
        );
    }

    #[test]
    fn test_construct_type_mismatch() {
        let model = metamodel();
        let query = visited(&model, "id==10")
            .select_construct::<BookInfo>(&["bookTitle", "id"])
            .unwrap();
        assert!(query.execute(&database()).is_err());
    }

    #[test]
    fn test_array_selection() {
        let model = metamodel();
        let query = visited(&model, "id==10")
            .array_query(&["id", "bookTitle"])
            .unwrap();
        let rows = database().execute(&query).unwrap();
        assert_eq!(rows, vec![ResultRow::Array(vec![json!(10), json!("num10")])]);
    }

    #[test]
    fn test_ordering() {
        let model = metamodel();
        let ascending = visited(&model, "id=gt=0")
            .order_by(&["id"], true)
            .unwrap()
            .select_tuple(&["id"])
            .unwrap();
        assert_eq!(ids_of(&ascending), vec![9, 10, 11]);

        let descending = visited(&model, "id=gt=0")
            .order_by(&["id"], false)
            .unwrap()
            .select_tuple(&["id"])
            .unwrap();
        assert_eq!(ids_of(&descending), vec![11, 10, 9]);
    }

    #[test]
    fn test_ordered_entity_query() {
        let model = metamodel();
        let query = visited(&model, "authors==John")
            .ordered_query(&["ownerInfo.name"], true)
            .unwrap();
        let owners: Vec<serde_json::Value> = database()
            .execute(&query)
            .unwrap()
            .iter()
            .map(|row| row.as_entity().unwrap()["ownerInfo"]["name"]["name"].clone())
            .collect();
        assert_eq!(owners, vec![json!("Barry"), json!("Fred")]);
    }

    #[test]
    fn test_entity_rows() {
        let model = metamodel();
        let rows = database()
            .execute(&visited(&model, "id==9").query().unwrap())
            .unwrap();
        assert_eq!(
            rows,
            vec![ResultRow::Entity(json!({
                "id": 9,
                "bookTitle": "num9",
                "address": {"street": "Street1", "houseNumber": 0},
                "ownerInfo": {"name": {"name": "Fred"}, "dateOfBirth": "2000-01-01"},
                "library": {"id": 1}
            }))]
        );
    }

    #[test]
    fn test_collection_selection_needs_join() {
        let model = metamodel();
        assert_eq!(
            visited(&model, "id==10").array_query(&["id", "authors"]),
            Err(CriteriaBuildError::UndeclaredJoin {
                path: "authors".to_string()
            })
        );

        let query = visited(&model, "authors==John")
            .order_by(&["id"], true)
            .unwrap()
            .array_query(&["id", "authors"])
            .unwrap();
        assert_eq!(
            database().execute(&query).unwrap(),
            vec![
                ResultRow::Array(vec![json!(9), json!("John")]),
                ResultRow::Array(vec![json!(10), json!("John")]),
            ]
        );
    }

    #[test]
    fn test_eager_joins() {
        let model = metamodel();
        let condition = fiql(&model, "id=ge=10").unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book")
            .unwrap()
            .with_joins(&["reviews.authors"])
            .unwrap();
        condition.accept(&mut visitor).unwrap();
        let query = visitor
            .order_by(&["id"], true)
            .unwrap()
            .array_query(&["id", "reviews.authors"])
            .unwrap();
        assert_eq!(query.joins.0.len(), 2);
        assert_eq!(
            database().execute(&query).unwrap(),
            vec![
                ResultRow::Array(vec![json!(10), json!("Ted")]),
                ResultRow::Array(vec![json!(11), json!("Ted")]),
            ]
        );
    }

    #[test]
    fn test_visitor_is_single_use() {
        let model = metamodel();
        let first = fiql(&model, "id==10").unwrap();
        let second = fiql(&model, "id==11").unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        first.accept(&mut visitor).unwrap();
        assert_eq!(
            second.accept(&mut visitor),
            Err(CriteriaBuildError::VisitorReused)
        );
        assert_eq!(visitor.count(&database()).unwrap(), 1);
    }
}
