#[cfg(test)]
mod tests {
    use cohort_reader::cohort::{filter_by_keys, intersect_keys, pair_on_timestamp};
    use cohort_reader::rowset::{RowSet, Value};

    fn keyed(keys: &[i64]) -> RowSet {
        let mut rowset = RowSet::new(vec!["HADM_ID".to_string()]);
        for &key in keys {
            rowset.push_row(vec![Value::Int(key)]);
        }
        rowset
    }

    #[test]
    fn test_intersection_is_set_intersection() {
        let a = keyed(&[1, 2, 3, 3]);
        let b = keyed(&[2, 3, 4]);
        let c = keyed(&[3, 2, 5]);
        let keys = intersect_keys(&[&a, &b, &c], "HADM_ID").unwrap();
        let mut sorted: Vec<i64> = keys.into_iter().collect();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![2, 3]);
    }

    #[test]
    fn test_intersection_coerces_mixed_representations() {
        // The same key as integer, float, and text intersects to itself
        let a = keyed(&[7]);
        let mut b = RowSet::new(vec!["HADM_ID".to_string()]);
        b.push_row(vec![Value::Real(7.0)]);
        let mut c = RowSet::new(vec!["HADM_ID".to_string()]);
        c.push_row(vec![Value::Text("7.0".to_string())]);
        let keys = intersect_keys(&[&a, &b, &c], "HADM_ID").unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&7));
    }

    #[test]
    fn test_intersection_fails_on_non_numeric_key() {
        let a = keyed(&[1]);
        let mut b = RowSet::new(vec!["HADM_ID".to_string()]);
        b.push_row(vec![Value::Text("bogus".to_string())]);
        assert!(intersect_keys(&[&a, &b], "HADM_ID").is_err());
    }

    #[test]
    fn test_filter_by_keys() {
        let rowset = keyed(&[1, 2, 3, 4]);
        let keys = [2_i64, 4].into_iter().collect();
        let filtered = filter_by_keys(&rowset, "HADM_ID", &keys).unwrap();
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.get(0, "HADM_ID").unwrap(), &Value::Int(2));
        assert_eq!(filtered.get(1, "HADM_ID").unwrap(), &Value::Int(4));
    }

    fn observations(rows: &[(i64, &str, &str)]) -> RowSet {
        let mut rowset = RowSet::new(vec![
            "HADM_ID".to_string(),
            "CHARTTIME".to_string(),
            "VALUE".to_string(),
        ]);
        for (key, time, value) in rows {
            rowset.push_row(vec![
                Value::Int(*key),
                Value::Text((*time).to_string()),
                Value::Text((*value).to_string()),
            ]);
        }
        rowset
    }

    #[test]
    fn test_pairing_requires_exact_timestamp_match() {
        let sodium = observations(&[
            (1, "2020-01-01 08:00:00", "140"),
            (1, "2020-01-01 12:00:00", "145"),
            (2, "2020-01-01 08:00:00", "150"),
        ]);
        let osmolarity = observations(&[
            (1, "2020-01-01 08:00:00", "290"),
            (2, "2020-01-02 08:00:00", "300"),
        ]);
        let pairs =
            pair_on_timestamp(&sodium, &osmolarity, "HADM_ID", "CHARTTIME", "VALUE").unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.to_string(), "140");
        assert_eq!(pairs[0].1.to_string(), "290");
    }

    #[test]
    fn test_pairing_cross_product_on_shared_timestamp() {
        // Uniqueness per key+timestamp is not guaranteed; duplicates pair
        // as a cross product like the relational join
        let sodium = observations(&[
            (1, "2020-01-01 08:00:00", "140"),
            (1, "2020-01-01 08:00:00", "141"),
        ]);
        let osmolarity = observations(&[(1, "2020-01-01 08:00:00", "290")]);
        let pairs =
            pair_on_timestamp(&sodium, &osmolarity, "HADM_ID", "CHARTTIME", "VALUE").unwrap();
        assert_eq!(pairs.len(), 2);
    }
}
