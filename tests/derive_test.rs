#[cfg(test)]
mod tests {
    use cohort_reader::derive::{
        binarize, drop_null, drop_sentinel, map_text_contains, map_text_equals, one_hot,
    };
    use cohort_reader::rowset::{RowSet, Value};

    fn single_column(name: &str, values: Vec<Value>) -> RowSet {
        let mut rowset = RowSet::new(vec![name.to_string()]);
        for value in values {
            rowset.push_row(vec![value]);
        }
        rowset
    }

    #[test]
    fn test_binarize_maps_positive_to_one_and_rest_to_zero() {
        let mut rowset = single_column(
            "COUNT",
            vec![
                Value::Int(3),
                Value::Int(0),
                Value::Int(-2),
                Value::Real(0.5),
                Value::Real(0.0),
                Value::Text("4".to_string()),
                Value::Null,
            ],
        );
        binarize(&mut rowset, "COUNT").unwrap();
        let got: Vec<&Value> = (0..rowset.num_rows())
            .map(|i| rowset.get(i, "COUNT").unwrap())
            .collect();
        let expected = [1, 0, 0, 1, 0, 1, 0].map(Value::Int);
        assert_eq!(got, expected.iter().collect::<Vec<_>>());
        // Output domain is exactly {0, 1}
        assert!(got.iter().all(|v| matches!(v, Value::Int(0 | 1))));
    }

    #[test]
    fn test_binarize_is_idempotent() {
        let mut once = single_column("C", vec![Value::Int(5), Value::Int(0)]);
        binarize(&mut once, "C").unwrap();
        let mut twice = once.clone();
        binarize(&mut twice, "C").unwrap();
        assert_eq!(once.rows(), twice.rows());
    }

    #[test]
    fn test_map_text_equals() {
        let mut rowset = single_column(
            "GENDER",
            vec![
                Value::Text("Male".to_string()),
                Value::Text("Female".to_string()),
                Value::Null,
            ],
        );
        map_text_equals(&mut rowset, "GENDER", "Male").unwrap();
        assert_eq!(rowset.get(0, "GENDER").unwrap(), &Value::Int(1));
        assert_eq!(rowset.get(1, "GENDER").unwrap(), &Value::Int(0));
        assert_eq!(rowset.get(2, "GENDER").unwrap(), &Value::Int(0));

        // Re-applying leaves the derived indicators untouched
        let before = rowset.rows().to_vec();
        map_text_equals(&mut rowset, "GENDER", "Male").unwrap();
        assert_eq!(rowset.rows(), before);
    }

    #[test]
    fn test_map_text_contains_derives_new_column() {
        let mut rowset = single_column(
            "HOSPDISP",
            vec![
                Value::Text("Expired in hospital".to_string()),
                Value::Text("Discharged home".to_string()),
            ],
        );
        map_text_contains(&mut rowset, "HOSPDISP", "EXPIRED", "xpi").unwrap();
        assert_eq!(rowset.get(0, "EXPIRED").unwrap(), &Value::Int(1));
        assert_eq!(rowset.get(1, "EXPIRED").unwrap(), &Value::Int(0));
        // Source field is preserved
        assert!(rowset.get(0, "HOSPDISP").unwrap().as_str().is_some());
    }

    #[test]
    fn test_one_hot_expands_and_preserves_original() {
        let mut rowset = single_column(
            "SEVERITY",
            vec![Value::Int(4), Value::Int(3), Value::Real(5.0), Value::Int(3)],
        );
        one_hot(&mut rowset, "SEVERITY", "SEVERITY").unwrap();
        let columns: Vec<&str> = rowset.columns().iter().map(String::as_str).collect();
        assert_eq!(
            columns,
            vec!["SEVERITY", "SEVERITY_3", "SEVERITY_4", "SEVERITY_5"]
        );
        assert_eq!(rowset.get(0, "SEVERITY_4").unwrap(), &Value::Int(1));
        assert_eq!(rowset.get(0, "SEVERITY_3").unwrap(), &Value::Int(0));
        // Integral float lands in the same category as its integer form
        assert_eq!(rowset.get(2, "SEVERITY_5").unwrap(), &Value::Int(1));
        assert_eq!(rowset.get(0, "SEVERITY").unwrap(), &Value::Int(4));

        let before = rowset.rows().to_vec();
        one_hot(&mut rowset, "SEVERITY", "SEVERITY").unwrap();
        assert_eq!(rowset.rows(), before);
    }

    #[test]
    fn test_drop_sentinel_leaves_no_sentinel_behind() {
        let mut rowset = RowSet::new(vec!["A".to_string(), "B".to_string()]);
        rowset.push_row(vec![Value::Int(1), Value::Int(2)]);
        rowset.push_row(vec![Value::Int(-1), Value::Int(2)]);
        rowset.push_row(vec![Value::Int(3), Value::Real(-1.0)]);
        drop_sentinel(&mut rowset, -1.0);
        assert_eq!(rowset.num_rows(), 1);
        for row in rowset.rows() {
            assert!(row.iter().all(|v| !v.eq_number(-1.0)));
        }
    }

    #[test]
    fn test_drop_null() {
        let mut rowset = RowSet::new(vec!["A".to_string(), "B".to_string()]);
        rowset.push_row(vec![Value::Int(1), Value::Null]);
        rowset.push_row(vec![Value::Int(2), Value::Int(3)]);
        drop_null(&mut rowset);
        assert_eq!(rowset.num_rows(), 1);
        assert_eq!(rowset.get(0, "A").unwrap(), &Value::Int(2));
    }
}
