//! Transfusion-associated mortality in isolated traumatic brain injury
//!
//! Loads yearly trauma-registry sources, restricts to isolated-TBI
//! incidents, derives transfusion and mortality indicators, and tests the
//! platelet-transfusion/mortality association per injury-severity stratum
//! (2×2 chi-square) and overall (logistic regression).

use std::fmt;
use std::path::Path;

use log::info;
use rustc_hash::FxHashSet;

use crate::config::TransfusionStudyConfig;
use crate::derive;
use crate::error::Result;
use crate::rowset::RowSet;
use crate::source::DataSource;
use crate::stats::{ChiSquareResult, LogitFit, LogitModel, chi2_contingency, design_matrix};
use crate::tabulate::ContingencyTable;

/// PREDOT codes at or above this bound are not traumatic brain injuries
pub const PREDOT_TBI_BOUND: i64 = 200_000;
/// Injury severity score recorded for fatal-on-arrival cases
pub const FATAL_SEVERITY: f64 = 6.0;
/// Out-of-band value the registry uses for missing numeric fields
pub const MISSING_SENTINEL: f64 = -1.0;
/// Exposure indicator for every tabulation and the regression
pub const EXPOSURE: &str = "TRANS_PLATELETS_4HOURS";
/// Outcome indicator derived from the discharge disposition
pub const OUTCOME: &str = "EXPIRED";

/// Transfusion count columns, four blood products over two time windows
pub const TRANSFUSION_COLUMNS: [&str; 8] = [
    "TRANS_BLOOD_4HOURS",
    "TRANS_BLOOD_24HOURS",
    "TRANS_PLASMA_4HOURS",
    "TRANS_PLASMA_24HOURS",
    "TRANS_PLATELETS_4HOURS",
    "TRANS_PLATELETS_24HOURS",
    "TRANS_CRYO_4HOURS",
    "TRANS_CRYO_24HOURS",
];

const FOUR_HOUR_COLUMNS: [&str; 4] = [
    "TRANS_BLOOD_4HOURS",
    "TRANS_PLASMA_4HOURS",
    "TRANS_PLATELETS_4HOURS",
    "TRANS_CRYO_4HOURS",
];

/// Tabulation and test for one severity stratum
#[derive(Debug, Clone)]
pub struct StratumResult {
    /// Stratum label ("SEVERITY 3" .. "SEVERITY 5", "TOTAL")
    pub label: String,
    /// 2×2 exposure-by-outcome counts
    pub table: ContingencyTable,
    /// Chi-square test on the table
    pub test: ChiSquareResult,
}

/// Full study output: per-stratum tests plus the mortality regression
#[derive(Debug, Clone)]
pub struct TransfusionReport {
    /// One entry per severity stratum and one for the pooled table
    pub strata: Vec<StratumResult>,
    /// Logistic regression of mortality on transfusion, gender, and the
    /// severity indicator columns
    pub regression: LogitFit,
}

impl fmt::Display for TransfusionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stratum in &self.strata {
            writeln!(f, "=== {} (n = {}) ===", stratum.label, stratum.table.total())?;
            writeln!(f, "{}", stratum.table)?;
            writeln!(f, "{}", stratum.test)?;
            writeln!(f)?;
        }
        write!(f, "{}", self.regression)
    }
}

/// Isolated-TBI eligibility derived from one source's injury coding
///
/// An incident is isolated-TBI iff its rows carry exactly one distinct
/// non-null PREDOT and that code is below [`PREDOT_TBI_BOUND`]; incidents
/// with no non-null PREDOT at all are ineligible.
#[derive(Debug, Clone, Default)]
pub struct IsolatedTbi {
    /// Incident keys whose injury coding is single-valued TBI
    pub incidents: FxHashSet<i64>,
    /// The TBI codes those incidents resolve to
    pub predots: FxHashSet<i64>,
}

/// Compute isolated-TBI eligibility for one source
pub fn isolated_tbi(source: &DataSource, ais_table: &str) -> Result<IsolatedTbi> {
    let grouped = source.query(&format!(
        "SELECT INC_KEY, MAX(PREDOT) AS PREDOT FROM {ais_table} \
         GROUP BY INC_KEY HAVING COUNT(DISTINCT PREDOT) = 1"
    ))?;
    let grouped_key = grouped.column_index("INC_KEY")?;
    let grouped_predot = grouped.column_index("PREDOT")?;

    let mut eligibility = IsolatedTbi::default();
    for row in grouped.rows() {
        let predot = row[grouped_predot].as_key()?;
        if predot < PREDOT_TBI_BOUND {
            eligibility.incidents.insert(row[grouped_key].as_key()?);
            eligibility.predots.insert(predot);
        }
    }
    Ok(eligibility)
}

/// Load one yearly source, restricted to isolated-TBI injury coding
///
/// Rows keep only the PREDOT codes that some incident resolves to as its
/// single injury. Incidents holding a fatal-severity row with a non-TBI
/// PREDOT are excluded entirely regardless of isolation status; they
/// represent death from another primary injury.
pub fn load_source(source: &DataSource, ais_table: &str) -> Result<RowSet> {
    info!("Gathering data from {} (AIS table {})", source.name(), ais_table);

    let eligibility = isolated_tbi(source, ais_table)?;

    let transfusion_fields = TRANSFUSION_COLUMNS
        .iter()
        .map(|column| format!("transf.{column}"))
        .collect::<Vec<_>>()
        .join(",");
    let joined = source.query(&format!(
        "SELECT ais.INC_KEY, ais.PREDOT, ais.SEVERITY, {transfusion_fields}, \
         disch.HOSPDISP, demo.GENDER \
         FROM {ais_table} ais \
         INNER JOIN RDS_DEMO demo ON ais.INC_KEY = demo.INC_KEY \
         INNER JOIN RDS_PM transf ON transf.INC_KEY = ais.INC_KEY \
         INNER JOIN RDS_DISCHARGE disch ON disch.INC_KEY = ais.INC_KEY"
    ))?;
    let key_idx = joined.column_index("INC_KEY")?;
    let predot_idx = joined.column_index("PREDOT")?;
    let severity_idx = joined.column_index("SEVERITY")?;

    // Incidents where a fatal-severity row carries a non-TBI injury code
    let mut lethal_non_tbi = FxHashSet::default();
    for row in joined.rows() {
        if row[severity_idx].as_f64() != Some(FATAL_SEVERITY) || row[predot_idx].is_null() {
            continue;
        }
        if !eligibility.predots.contains(&row[predot_idx].as_key()?) {
            lethal_non_tbi.insert(row[key_idx].as_key()?);
        }
    }

    let mut restricted = RowSet::new(joined.columns().to_vec());
    for row in joined.rows() {
        if row[predot_idx].is_null() {
            continue;
        }
        if lethal_non_tbi.contains(&row[key_idx].as_key()?) {
            continue;
        }
        if eligibility.predots.contains(&row[predot_idx].as_key()?) {
            restricted.push_row(row.clone());
        }
    }
    info!(
        "{}: {} of {} rows after isolated-TBI restriction",
        source.name(),
        restricted.num_rows(),
        joined.num_rows()
    );
    Ok(restricted)
}

/// Load and concatenate every configured yearly source
///
/// Sources are processed strictly one at a time; each connection closes
/// before the next file is opened.
pub fn gather(config: &TransfusionStudyConfig) -> Result<RowSet> {
    let mut combined: Option<RowSet> = None;
    for path in &config.databases {
        let source = DataSource::open(path)?;
        let rows = load_source(&source, config.ais_tables.table_for(source.name()))?;
        match combined.as_mut() {
            None => combined = Some(rows),
            Some(all) => all.concat(rows)?,
        }
    }
    Ok(combined.unwrap_or_default())
}

/// Derive the analysis table from the gathered rows
///
/// Drops incomplete rows (nulls, then the missing-value sentinel), keeps
/// severities 3-5 below the TBI code bound, derives the gender and
/// mortality indicators, binarizes the 4-hour transfusion counts, expands
/// severity dummies, and restricts to platelet-only transfusion exposure.
pub fn process(mut rowset: RowSet) -> Result<RowSet> {
    info!("Processing {} gathered rows", rowset.num_rows());
    derive::drop_null(&mut rowset);
    derive::drop_sentinel(&mut rowset, MISSING_SENTINEL);

    let severity_idx = rowset.column_index("SEVERITY")?;
    let predot_idx = rowset.column_index("PREDOT")?;
    rowset.retain_rows(|row| {
        row[severity_idx]
            .as_f64()
            .is_some_and(|s| s > 2.0 && s < FATAL_SEVERITY)
            && row[predot_idx]
                .as_f64()
                .is_some_and(|p| p < PREDOT_TBI_BOUND as f64)
    });

    derive::map_text_equals(&mut rowset, "GENDER", "Male")?;
    derive::map_text_contains(&mut rowset, "HOSPDISP", OUTCOME, "xpi")?;
    for column in FOUR_HOUR_COLUMNS {
        derive::binarize(&mut rowset, column)?;
    }
    derive::one_hot(&mut rowset, "SEVERITY", "SEVERITY")?;

    // Exclude patients transfused with any other product in the window
    let blood_idx = rowset.column_index("TRANS_BLOOD_4HOURS")?;
    let plasma_idx = rowset.column_index("TRANS_PLASMA_4HOURS")?;
    let cryo_idx = rowset.column_index("TRANS_CRYO_4HOURS")?;
    rowset.retain_rows(|row| {
        row[blood_idx].eq_number(0.0)
            && row[plasma_idx].eq_number(0.0)
            && row[cryo_idx].eq_number(0.0)
    });

    rowset.drop_columns(&[
        "INC_KEY",
        "TRANS_BLOOD_24HOURS",
        "TRANS_PLATELETS_24HOURS",
        "TRANS_PLASMA_24HOURS",
        "TRANS_CRYO_24HOURS",
        "TRANS_BLOOD_4HOURS",
        "TRANS_PLASMA_4HOURS",
        "TRANS_CRYO_4HOURS",
    ])?;
    info!("{} rows in analysis table", rowset.num_rows());
    Ok(rowset)
}

fn severity_stratum(rowset: &RowSet, severity: i64) -> Result<RowSet> {
    let severity_idx = rowset.column_index("SEVERITY")?;
    let mut stratum = rowset.clone();
    stratum.retain_rows(|row| row[severity_idx].as_f64() == Some(severity as f64));
    Ok(stratum)
}

/// Tabulate and test the processed table per stratum, then fit the
/// mortality regression on the pooled table
pub fn analyze(rowset: &RowSet) -> Result<TransfusionReport> {
    let mut strata = Vec::new();
    for severity in 3..=5 {
        let stratum = severity_stratum(rowset, severity)?;
        let table = ContingencyTable::from_rowset(&stratum, EXPOSURE, OUTCOME)?;
        let test = chi2_contingency(&table)?;
        strata.push(StratumResult {
            label: format!("SEVERITY {severity}"),
            table,
            test,
        });
    }
    let table = ContingencyTable::from_rowset(rowset, EXPOSURE, OUTCOME)?;
    let test = chi2_contingency(&table)?;
    strata.push(StratumResult {
        label: "TOTAL".to_string(),
        table,
        test,
    });

    info!("Fitting logistic regression");
    let mut working = rowset.clone();
    working.drop_columns(&["PREDOT", "SEVERITY", "HOSPDISP"])?;
    let (names, design, response) = design_matrix(&working, OUTCOME, &[])?;
    let regression = LogitModel::default().fit(&names, &design, &response)?;

    Ok(TransfusionReport { strata, regression })
}

/// Export the processed working table as CSV (disabled by default)
pub fn export_table(path: &Path, rowset: &RowSet) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(rowset.columns())?;
    for row in rowset.rows() {
        writer.write_record(row.iter().map(ToString::to_string))?;
    }
    writer.flush()?;
    Ok(())
}

/// Run the full study against the configured sources
pub fn run(config: &TransfusionStudyConfig) -> Result<TransfusionReport> {
    let gathered = gather(config)?;
    let processed = process(gathered)?;
    if let Some(path) = &config.export {
        export_table(path, &processed)?;
    }
    analyze(&processed)
}
