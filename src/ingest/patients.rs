//! Patient-file ingestion.
//!
//! The patient CSV is a headerless registry export: patient id, sex,
//! race, ethnicity, year of birth, age at death, regional location,
//! postal code, marital status, reason-yob-missing, month of death
//! (`YYYYMM`), source id. Records without a parseable year of birth
//! are skipped and tallied. Age buckets are derived afterwards from the
//! observed birth-year range.

use std::path::Path;

use chrono::NaiveDate;
use log::info;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::models::{Patient, Sex};

/// Outcome of patient-file parsing.
#[derive(Debug)]
pub struct ParsedPatients {
    /// Patients in file order, with age buckets assigned.
    pub patients: Vec<Patient>,
    /// Number of distinct regions seen.
    pub regions: usize,
    /// Records skipped for a missing or unparseable year of birth.
    pub skipped: usize,
}

/// Parse the patient file and bucket patients by birth year.
pub fn parse_patient_file(path: impl AsRef<Path>, age_buckets: usize) -> Result<ParsedPatients> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut patients = Vec::new();
    let mut region_ids: FxHashMap<String, usize> = FxHashMap::default();
    let mut skipped = 0usize;
    let mut deaths = 0usize;
    let mut min_year = i32::MAX;
    let mut max_year = i32::MIN;
    for record in reader.records() {
        let record = record?;
        let Some(birth_year) = record.get(4).and_then(|f| f.parse::<i32>().ok()) else {
            skipped += 1;
            continue;
        };
        let source_id = record.get(0).unwrap_or_default().to_string();
        let sex = match record.get(1) {
            Some("F") => Sex::Female,
            _ => Sex::Male,
        };
        let death_date = record
            .get(10)
            .filter(|f| f.len() == 6)
            .and_then(parse_death_month);
        if death_date.is_some() {
            deaths += 1;
        }
        let region_name = record.get(6).unwrap_or_default();
        let next_region = region_ids.len();
        let region = *region_ids
            .entry(region_name.to_string())
            .or_insert(next_region);
        min_year = min_year.min(birth_year);
        max_year = max_year.max(birth_year);
        patients.push(Patient {
            pid: 0,
            source_id,
            birth_year,
            sex,
            age_bucket: 0,
            region,
            death_date,
            event_of_interest: None,
            diagnoses: Vec::new(),
        });
    }
    if age_buckets > 1 && !patients.is_empty() {
        let span = (f64::from(max_year - min_year) / age_buckets as f64)
            .ceil()
            .max(1.0);
        for patient in &mut patients {
            // the youngest birth year lands exactly on the bucket edge
            patient.age_bucket =
                ((f64::from(patient.birth_year - min_year) / span) as usize).min(age_buckets - 1);
        }
    }
    info!(
        "Parsed {} patients ({} skipped without year of birth, {} with a date of death) from {}",
        patients.len(),
        skipped,
        deaths,
        path.display()
    );
    if !patients.is_empty() {
        info!(
            "Birth years {min_year}..{max_year} over {} regions",
            region_ids.len()
        );
    }
    Ok(ParsedPatients {
        patients,
        regions: region_ids.len().max(1),
        skipped,
    })
}

/// Parse a `YYYYMM` month-of-death field; the day is unknown and fixed to 1.
fn parse_death_month(field: &str) -> Option<NaiveDate> {
    let year: i32 = field.get(0..4)?.parse().ok()?;
    let month: u32 = field.get(4..6)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}
