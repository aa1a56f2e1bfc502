//! Sodium/osmolarity pair extraction
//!
//! Cohort: admissions with the cerebral edema diagnosis that received 3%
//! hypertonic saline, recorded either as a prescription or as an infusion
//! event in one of two charting subsystems. For every cohort admission the
//! serum sodium and serum osmolarity lab values charted at the same time
//! are paired and written to a delimited file.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::info;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::cohort::{intersect_keys, pair_on_timestamp};
use crate::config::SodiumOsmolarityConfig;
use crate::error::{CohortError, Result};
use crate::rowset::RowSet;
use crate::source::{DataSource, in_clause, union};

/// ICD-9 diagnosis code for cerebral edema
pub const CEREBRAL_EDEMA_ICD9: i64 = 3485;
/// Prescription drug name for 3% hypertonic saline
pub const HTS_DRUG: &str = "Sodium Chloride 3% (Hypertonic)";
/// MetaVision item identifier for a hypertonic saline infusion
pub const HTS_ITEM_METAVISION: i64 = 225_161;
/// CareVue item identifier for a hypertonic saline infusion
pub const HTS_ITEM_CAREVUE: i64 = 30_143;
/// Lab item identifier for serum sodium (not whole-blood sodium)
pub const SERUM_SODIUM_ITEM: i64 = 50_983;
/// Lab item identifier for serum osmolarity
pub const SERUM_OSMOLARITY_ITEM: i64 = 50_964;

/// One matched (sodium, osmolarity) observation pair
///
/// Values are carried as charted, without numeric reinterpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabPair {
    /// Serum sodium value
    #[serde(rename = "SODIUM")]
    pub sodium: String,
    /// Serum osmolarity value charted at the same time
    #[serde(rename = "OSMOLARITY")]
    pub osmolarity: String,
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").or_else(|_| {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(Into::into)
    })
}

/// Restrict the admissions row set to subjects at or above a minimum age,
/// derived from date of birth and admission time.
fn filter_by_age(admissions: &mut RowSet, min_age: u32) -> Result<()> {
    let dob_idx = admissions.column_index("DOB")?;
    let admit_idx = admissions.column_index("ADMITTIME")?;

    let mut keep = Vec::with_capacity(admissions.num_rows());
    for row in admissions.rows() {
        let dob = row[dob_idx]
            .as_str()
            .ok_or_else(|| CohortError::DateParse(row[dob_idx].to_string()))?;
        let admit = row[admit_idx]
            .as_str()
            .ok_or_else(|| CohortError::DateParse(row[admit_idx].to_string()))?;
        let age_years =
            (parse_timestamp(admit)? - parse_timestamp(dob)?).num_days() as f64 / 365.25;
        keep.push(age_years >= f64::from(min_age));
    }

    let mut decisions = keep.into_iter();
    admissions.retain_rows(|_| decisions.next().unwrap_or(false));
    Ok(())
}

/// Extract the cohort admission keys
///
/// An admission is in-cohort iff it satisfies all of: the age restriction
/// (when one is configured), the cerebral edema diagnosis, and at least one
/// qualifying hypertonic saline event from any charting subsystem.
pub fn extract_cohort(source: &DataSource, min_age: Option<u32>) -> Result<FxHashSet<i64>> {
    info!("Extracting cerebral edema cohort from {}", source.name());

    let mut admissions = source.query(
        "SELECT adm.HADM_ID, pat.DOB, adm.ADMITTIME \
         FROM PATIENTS pat INNER JOIN ADMISSIONS adm ON pat.SUBJECT_ID = adm.SUBJECT_ID",
    )?;
    if let Some(min_age) = min_age {
        filter_by_age(&mut admissions, min_age)?;
    }

    let diagnoses = source.query(&format!(
        "SELECT HADM_ID FROM DIAGNOSES_ICD WHERE ICD9_CODE = {CEREBRAL_EDEMA_ICD9}"
    ))?;

    // Item identifiers derived from each subsystem's own item table
    let infusion_sql = union(&[
        &format!("SELECT HADM_ID FROM PRESCRIPTIONS WHERE DRUG = '{HTS_DRUG}'"),
        &format!("SELECT HADM_ID FROM INPUTEVENTS_MV WHERE ITEMID = {HTS_ITEM_METAVISION}"),
        &format!("SELECT HADM_ID FROM INPUTEVENTS_CV WHERE ITEMID = {HTS_ITEM_CAREVUE}"),
    ]);
    let mut infusions = source.query(&infusion_sql)?;
    infusions.retain_rows(|row| !row[0].is_null());
    infusions.dedup_rows();

    let keys = intersect_keys(&[&admissions, &diagnoses, &infusions], "HADM_ID")?;
    info!("{} admissions in cohort", keys.len());
    Ok(keys)
}

/// Extract the matched (sodium, osmolarity) pairs for the given cohort
///
/// Both lab queries are restricted to the cohort via a membership clause;
/// observations pair on an exact (admission, charttime) match.
pub fn extract_pairs(source: &DataSource, keys: &FxHashSet<i64>) -> Result<Vec<LabPair>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let membership = in_clause("HADM_ID", keys);

    let sodium = source.query(&format!(
        "SELECT HADM_ID, CHARTTIME, VALUE FROM LABEVENTS \
         WHERE {membership} AND ITEMID = {SERUM_SODIUM_ITEM}"
    ))?;
    let osmolarity = source.query(&format!(
        "SELECT HADM_ID, CHARTTIME, VALUE FROM LABEVENTS \
         WHERE {membership} AND ITEMID = {SERUM_OSMOLARITY_ITEM}"
    ))?;

    let paired = pair_on_timestamp(&sodium, &osmolarity, "HADM_ID", "CHARTTIME", "VALUE")?;
    Ok(paired
        .into_iter()
        .map(|(sodium, osmolarity)| LabPair {
            sodium: sodium.to_string(),
            osmolarity: osmolarity.to_string(),
        })
        .collect())
}

/// Write the pairs to a delimited file, always with a header row
pub fn write_pairs(path: &Path, pairs: &[LabPair]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    // Header is written unconditionally, even for an empty cohort
    writer.write_record(["SODIUM", "OSMOLARITY"])?;
    for pair in pairs {
        writer.write_record([&pair.sodium, &pair.osmolarity])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a pairs file back, e.g. for downstream analysis
pub fn read_pairs(path: &Path) -> Result<Vec<LabPair>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut pairs = Vec::new();
    for record in reader.deserialize() {
        pairs.push(record?);
    }
    Ok(pairs)
}

/// Run the full extraction against the configured database
///
/// The source connection is scoped to this call and closes when it returns.
pub fn run(config: &SodiumOsmolarityConfig) -> Result<Vec<LabPair>> {
    let source = DataSource::open(&config.database)?;
    let keys = extract_cohort(&source, config.min_age)?;
    let pairs = extract_pairs(&source, &keys)?;
    write_pairs(&config.output, &pairs)?;
    info!(
        "Wrote {} observation pairs to {}",
        pairs.len(),
        config.output.display()
    );
    Ok(pairs)
}
