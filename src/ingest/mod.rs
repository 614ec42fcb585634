//! Input ingestion: turns the patient, diagnosis and dictionary files into
//! a populated patient registry and an experiment ready for relative-risk
//! estimation.
//!
//! Per-record problems (bad dates, unknown codes, unknown patients) are
//! absorbed and tallied; missing or unreadable files abort the run.

pub mod diagnoses;
pub mod dictionary;
pub mod patients;
pub mod treatments;
pub mod tumor;

use log::info;
use rustc_hash::FxHashMap;

use crate::cohort::CohortIndex;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::experiment::Experiment;
use crate::ingest::dictionary::DiagnosisDictionary;
use crate::models::PatientRegistry;
use crate::trajectory::filters::{apply_patient_filters, patient_filters_from_tokens};

/// Load and stratify the population described by the configuration.
///
/// Runs the full ingestion pipeline: patients, dictionary, diagnoses,
/// optional treatments, patient filters, registry construction and cohort
/// stratification. Returns the assembled experiment and the registry the
/// save/load machinery resolves patients against.
pub fn load_experiment(cfg: &AnalysisConfig) -> Result<(Experiment, PatientRegistry)> {
    let tumor_info = cfg
        .tumor_info
        .as_ref()
        .map(tumor::parse_tumor_file)
        .transpose()?;
    let parsed = patients::parse_patient_file(&cfg.patient_file, cfg.age_buckets)?;
    let mut dictionary = DiagnosisDictionary::from_ccsr_file(&cfg.diagnosis_info_file)?;
    let treatment_info = cfg
        .treatment_info
        .as_ref()
        .map(treatments::parse_treatment_file)
        .transpose()?;
    if treatment_info.is_some() {
        dictionary.add_treatment_codes();
    }
    let icd9_to_icd10 = match &cfg.icd9_to_icd10_file {
        Some(path) => dictionary::load_icd9_to_icd10_map(path)?,
        None => FxHashMap::default(),
    };

    let mut patients = parsed.patients;
    let index: FxHashMap<String, usize> = patients
        .iter()
        .enumerate()
        .map(|(i, p)| (p.source_id.clone(), i))
        .collect();
    diagnoses::parse_diagnosis_file(
        &cfg.diagnoses_file,
        &mut patients,
        &index,
        &dictionary,
        &icd9_to_icd10,
    )?;
    if let Some(treatment_info) = &treatment_info {
        let filled = diagnoses::fill_treatment_diagnoses(
            &mut patients,
            &index,
            treatment_info,
            &dictionary,
        );
        info!("Added treatment diagnoses for {filled} patients");
    }
    for patient in &mut patients {
        patient.normalize_diagnoses();
    }

    let filters = patient_filters_from_tokens(&cfg.patient_filters, tumor_info.as_ref())?;
    let total = patients.len();
    let patients = apply_patient_filters(patients, &filters);
    info!("Patient filters kept {} of {total} patients", patients.len());

    let registry = PatientRegistry::from_patients(patients);
    let cohorts = CohortIndex::build(&registry, cfg.age_buckets, dictionary.len());
    let merged = cohorts.merge();
    let (name_map, code_map) = dictionary.into_maps();
    let experiment = Experiment::new(
        cfg.name.clone(),
        cfg.level,
        parsed.regions,
        name_map,
        code_map,
        cohorts,
        merged,
        registry.males(),
        registry.females(),
    );
    Ok((experiment, registry))
}
