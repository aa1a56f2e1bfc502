#[cfg(test)]
mod tests {
    use cohort_reader::rowset::{RowSet, Value};
    use cohort_reader::source::DataSource;
    use cohort_reader::study::transfusion::{
        TRANSFUSION_COLUMNS, analyze, isolated_tbi, load_source, process,
    };

    fn registry_fixture() -> DataSource {
        let source = DataSource::open_in_memory("2015").unwrap();
        source
            .execute_batch(
                "CREATE TABLE RDS_AISCCODE (INC_KEY INTEGER, PREDOT INTEGER, SEVERITY INTEGER);
                 CREATE TABLE RDS_PM (INC_KEY INTEGER,
                     TRANS_BLOOD_4HOURS INTEGER, TRANS_BLOOD_24HOURS INTEGER,
                     TRANS_PLASMA_4HOURS INTEGER, TRANS_PLASMA_24HOURS INTEGER,
                     TRANS_PLATELETS_4HOURS INTEGER, TRANS_PLATELETS_24HOURS INTEGER,
                     TRANS_CRYO_4HOURS INTEGER, TRANS_CRYO_24HOURS INTEGER);
                 CREATE TABLE RDS_DEMO (INC_KEY INTEGER, GENDER TEXT);
                 CREATE TABLE RDS_DISCHARGE (INC_KEY INTEGER, HOSPDISP TEXT);

                 -- incident 10: single distinct TBI code, charted twice
                 INSERT INTO RDS_AISCCODE VALUES (10, 150000, 3);
                 INSERT INTO RDS_AISCCODE VALUES (10, 150000, 3);
                 -- incident 11: polytrauma, fatal non-TBI injury
                 INSERT INTO RDS_AISCCODE VALUES (11, 150000, 3);
                 INSERT INTO RDS_AISCCODE VALUES (11, 999999, 6);
                 -- incident 12: injury coding entirely missing
                 INSERT INTO RDS_AISCCODE VALUES (12, NULL, 3);
                 -- incident 13: single code but out of the TBI range
                 INSERT INTO RDS_AISCCODE VALUES (13, 250000, 4);

                 INSERT INTO RDS_PM VALUES (10, 0, 0, 0, 0, 2, 2, 0, 0);
                 INSERT INTO RDS_PM VALUES (11, 0, 0, 0, 0, 0, 0, 0, 0);
                 INSERT INTO RDS_PM VALUES (12, 0, 0, 0, 0, 0, 0, 0, 0);
                 INSERT INTO RDS_PM VALUES (13, 0, 0, 0, 0, 0, 0, 0, 0);
                 INSERT INTO RDS_DEMO VALUES (10, 'Male');
                 INSERT INTO RDS_DEMO VALUES (11, 'Female');
                 INSERT INTO RDS_DEMO VALUES (12, 'Male');
                 INSERT INTO RDS_DEMO VALUES (13, 'Male');
                 INSERT INTO RDS_DISCHARGE VALUES (10, 'Discharged home');
                 INSERT INTO RDS_DISCHARGE VALUES (11, 'Expired');
                 INSERT INTO RDS_DISCHARGE VALUES (12, 'Discharged home');
                 INSERT INTO RDS_DISCHARGE VALUES (13, 'Discharged home');",
            )
            .unwrap();
        source
    }

    #[test]
    fn test_isolated_tbi_eligibility() {
        let source = registry_fixture();
        let eligibility = isolated_tbi(&source, "RDS_AISCCODE").unwrap();
        // Two identical chartings count as one distinct code
        assert!(eligibility.incidents.contains(&10));
        // Two distinct codes, missing coding, and an out-of-range code do not
        assert!(!eligibility.incidents.contains(&11));
        assert!(!eligibility.incidents.contains(&12));
        assert!(!eligibility.incidents.contains(&13));
        assert_eq!(eligibility.predots.len(), 1);
        assert!(eligibility.predots.contains(&150_000));
    }

    #[test]
    fn test_load_source_excludes_lethal_non_tbi_incidents() {
        let source = registry_fixture();
        let rows = load_source(&source, "RDS_AISCCODE").unwrap();
        // Incident 10 joins to two rows; incident 11 is excluded entirely
        // even though one of its rows carries an isolated-TBI code
        assert_eq!(rows.num_rows(), 2);
        for row in 0..rows.num_rows() {
            assert_eq!(rows.get(row, "INC_KEY").unwrap(), &Value::Int(10));
        }
    }

    /// Synthetic gathered table: per severity stratum, 6 platelet-exposed
    /// rows (3 deaths) and 6 unexposed rows (2 deaths), all platelet-only.
    fn gathered_fixture() -> RowSet {
        let mut columns = vec![
            "INC_KEY".to_string(),
            "PREDOT".to_string(),
            "SEVERITY".to_string(),
        ];
        columns.extend(TRANSFUSION_COLUMNS.iter().map(ToString::to_string));
        columns.push("HOSPDISP".to_string());
        columns.push("GENDER".to_string());

        let mut rowset = RowSet::new(columns);
        let mut incident = 0;
        for severity in [3_i64, 4, 5] {
            for exposed in [1_i64, 0] {
                for case in 0..6 {
                    let expired = if exposed == 1 { case < 3 } else { case < 2 };
                    incident += 1;
                    rowset.push_row(vec![
                        Value::Int(incident),
                        Value::Int(150_000),
                        Value::Int(severity),
                        Value::Int(0),           // blood 4h
                        Value::Int(0),           // blood 24h
                        Value::Int(0),           // plasma 4h
                        Value::Int(0),           // plasma 24h
                        Value::Int(exposed * 2), // platelets 4h, binarized later
                        Value::Int(exposed),     // platelets 24h
                        Value::Int(0),           // cryo 4h
                        Value::Int(0),           // cryo 24h
                        Value::Text(if expired { "Expired" } else { "Home" }.to_string()),
                        Value::Text(if case % 2 == 0 { "Male" } else { "Female" }.to_string()),
                    ]);
                }
            }
        }
        rowset
    }

    #[test]
    fn test_process_derives_analysis_table() {
        let mut gathered = gathered_fixture();
        // A sentinel-coded row and an incomplete row must both drop out
        gathered.push_row(vec![
            Value::Int(99),
            Value::Int(150_000),
            Value::Int(3),
            Value::Int(-1),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Text("Home".to_string()),
            Value::Text("Male".to_string()),
        ]);
        gathered.push_row(vec![
            Value::Int(98),
            Value::Int(150_000),
            Value::Int(4),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Text("Home".to_string()),
            Value::Null,
        ]);

        let processed = process(gathered).unwrap();
        assert_eq!(processed.num_rows(), 36);
        let columns: Vec<&str> = processed.columns().iter().map(String::as_str).collect();
        assert!(columns.contains(&"EXPIRED"));
        assert!(columns.contains(&"SEVERITY_3"));
        assert!(columns.contains(&"SEVERITY_5"));
        assert!(!columns.contains(&"INC_KEY"));
        assert!(!columns.contains(&"TRANS_BLOOD_4HOURS"));

        // Exposure is a pure 0/1 indicator after binarization
        for row in 0..processed.num_rows() {
            let value = processed.get(row, "TRANS_PLATELETS_4HOURS").unwrap();
            assert!(matches!(value, Value::Int(0 | 1)));
        }
    }

    #[test]
    fn test_analyze_strata_and_regression() {
        let processed = process(gathered_fixture()).unwrap();
        let report = analyze(&processed).unwrap();

        assert_eq!(report.strata.len(), 4);
        let severity3 = &report.strata[0];
        assert_eq!(severity3.label, "SEVERITY 3");
        assert_eq!(severity3.table.exposed_outcome, 3);
        assert_eq!(severity3.table.exposed_no_outcome, 3);
        assert_eq!(severity3.table.unexposed_outcome, 2);
        assert_eq!(severity3.table.unexposed_no_outcome, 4);
        assert!((severity3.table.outcome_rate(true) - 0.5).abs() < f64::EPSILON);
        // Corrected differences vanish for this table, so chi2 = 0, p = 1
        assert!(severity3.test.statistic.abs() < 1e-12);
        assert!((severity3.test.p_value - 1.0).abs() < 1e-9);

        let total = report.strata.last().unwrap();
        assert_eq!(total.label, "TOTAL");
        assert_eq!(total.table.total(), 36);
        assert!(total.test.statistic.is_finite());

        let names: Vec<&str> = report
            .regression
            .terms
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "TRANS_PLATELETS_4HOURS",
                "GENDER",
                "SEVERITY_3",
                "SEVERITY_4",
                "SEVERITY_5"
            ]
        );
        let platelets = &report.regression.terms[0];
        assert!(platelets.coef.is_finite());
        // Exposed deaths at 1:1 odds vs 1:2 unexposed: the odds ratio is
        // above one
        assert!(platelets.odds_ratio() > 1.0);
    }
}
