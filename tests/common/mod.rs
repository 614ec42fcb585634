//! Shared helpers for the integration tests: synthetic populations and
//! experiments assembled without touching input files.
#![allow(dead_code)]

use chrono::NaiveDate;
use trajan::cohort::CohortIndex;
use trajan::models::{Diagnosis, Patient, PatientRegistry, Sex};
use trajan::Experiment;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A patient with diagnoses given as `(did, year)` on the 26th of August,
/// mirroring a fixed calendar so elapsed-year gaps are whole numbers.
pub fn patient(
    id: usize,
    sex: Sex,
    birth_year: i32,
    age_bucket: usize,
    diagnoses: &[(u32, i32)],
) -> Patient {
    Patient {
        pid: 0,
        source_id: format!("p{id}"),
        birth_year,
        sex,
        age_bucket,
        region: 0,
        death_date: None,
        event_of_interest: None,
        diagnoses: diagnoses
            .iter()
            .map(|&(did, year)| Diagnosis {
                did,
                date: date(year, 8, 26),
            })
            .collect(),
    }
}

/// Assemble an experiment over the given patients and diagnosis names.
pub fn experiment_from_patients(
    patients: Vec<Patient>,
    age_buckets: usize,
    names: &[&str],
) -> (Experiment, PatientRegistry) {
    let mut patients = patients;
    for p in &mut patients {
        p.normalize_diagnoses();
    }
    let registry = PatientRegistry::from_patients(patients);
    let cohorts = CohortIndex::build(&registry, age_buckets, names.len());
    let merged = cohorts.merge();
    let name_map: Vec<String> = names.iter().map(ToString::to_string).collect();
    let code_map = name_map.clone();
    let males = registry.males();
    let females = registry.females();
    let experiment = Experiment::new(
        "test".into(),
        0,
        1,
        name_map,
        code_map,
        cohorts,
        merged,
        males,
        females,
    );
    (experiment, registry)
}
