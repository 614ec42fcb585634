//! Cohort index: the partition of the population into strata used to match
//! control groups to exposed groups.
//!
//! Strata are keyed by `sex * A + age_bucket` where `A` is the number of
//! age buckets; the region is carried on the stratum label but does not
//! participate in the index. Cohort construction, matched sampling and
//! unexposed-prevalence estimation all use this one formula.

pub mod sampling;

use std::sync::Arc;

use log::info;
use rustc_hash::FxHashSet;

use crate::models::{Patient, PatientRegistry, Sex};

/// A group of patients sharing sex and age bucket.
///
/// Holds per-diagnosis exposure counts and patient lists, plus the full
/// patient list that serves as the sampling pool for matched controls.
#[derive(Debug)]
pub struct Stratum {
    /// Sex label of the stratum.
    pub sex: Sex,
    /// Age-bucket label of the stratum.
    pub age_bucket: usize,
    /// Region label. Informational only; see the module docs.
    pub region: usize,
    /// Number of patients in the stratum.
    pub patient_count: usize,
    /// Total distinct-diagnosis exposures over all patients.
    pub diagnosis_count: usize,
    /// Per-DID count of exposed patients.
    pub exposed_counts: Vec<usize>,
    /// Per-DID list of exposed patients. Each patient appears at most once
    /// per DID regardless of how many dated occurrences they have.
    pub exposed_patients: Vec<Vec<Arc<Patient>>>,
    /// All patients in the stratum, in registry order.
    pub patients: Vec<Arc<Patient>>,
}

/// Index of the stratum a patient with the given sex and age bucket belongs
/// to.
#[must_use]
pub const fn stratum_index(sex: Sex, age_bucket: usize, age_buckets: usize) -> usize {
    sex.index() * age_buckets + age_bucket
}

/// The stratified population: `2 * A` strata over the full registry.
#[derive(Debug)]
pub struct CohortIndex {
    strata: Vec<Stratum>,
    age_buckets: usize,
}

impl CohortIndex {
    /// Stratify the registry. Every patient is visited exactly once; for
    /// every distinct diagnosis id in a patient's history the owning
    /// stratum's counter is bumped and the patient appended to that id's
    /// list.
    #[must_use]
    pub fn build(registry: &PatientRegistry, age_buckets: usize, n_codes: usize) -> Self {
        info!(
            "Stratifying {} patients ({} male, {} female) over {} age buckets, {} diagnosis codes",
            registry.len(),
            registry.males(),
            registry.females(),
            age_buckets,
            n_codes
        );
        let mut strata = Vec::with_capacity(age_buckets * 2);
        for sex in [Sex::Male, Sex::Female] {
            for age_bucket in 0..age_buckets {
                strata.push(Stratum {
                    sex,
                    age_bucket,
                    region: 0,
                    patient_count: 0,
                    diagnosis_count: 0,
                    exposed_counts: vec![0; n_codes],
                    exposed_patients: vec![Vec::new(); n_codes],
                    patients: Vec::new(),
                });
            }
        }
        let mut seen = FxHashSet::default();
        for patient in registry.iter() {
            let idx = stratum_index(patient.sex, patient.age_bucket, age_buckets);
            let stratum = &mut strata[idx];
            stratum.patient_count += 1;
            stratum.patients.push(patient.clone());
            seen.clear();
            for diagnosis in &patient.diagnoses {
                // one exposure per patient per diagnosis id
                if seen.insert(diagnosis.did) {
                    let did = diagnosis.did as usize;
                    stratum.exposed_counts[did] += 1;
                    stratum.diagnosis_count += 1;
                    stratum.exposed_patients[did].push(patient.clone());
                }
            }
        }
        Self { strata, age_buckets }
    }

    /// Number of age buckets the index was built with.
    #[must_use]
    pub const fn age_buckets(&self) -> usize {
        self.age_buckets
    }

    /// All strata in index order.
    #[must_use]
    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// The stratum a patient belongs to.
    #[must_use]
    pub fn stratum_of(&self, patient: &Patient) -> &Stratum {
        &self.strata[stratum_index(patient.sex, patient.age_bucket, self.age_buckets)]
    }

    /// Merge all strata into a single aggregate cohort: summed counts and
    /// concatenated per-DID patient lists. The merged per-DID lists become
    /// the experiment's exposed-patient lists.
    #[must_use]
    pub fn merge(&self) -> MergedCohort {
        let n_codes = self.strata.first().map_or(0, |s| s.exposed_counts.len());
        let mut merged = MergedCohort {
            patient_count: 0,
            diagnosis_count: 0,
            exposed_counts: vec![0; n_codes],
            exposed_patients: vec![Vec::new(); n_codes],
        };
        for stratum in &self.strata {
            merged.patient_count += stratum.patient_count;
            merged.diagnosis_count += stratum.diagnosis_count;
            for (did, count) in stratum.exposed_counts.iter().enumerate() {
                merged.exposed_counts[did] += count;
            }
            for (did, patients) in stratum.exposed_patients.iter().enumerate() {
                merged.exposed_patients[did].extend(patients.iter().cloned());
            }
        }
        info!(
            "Merged cohort: {} patients, {} distinct-diagnosis exposures",
            merged.patient_count, merged.diagnosis_count
        );
        merged
    }
}

/// Aggregate of all strata; the population-wide per-diagnosis patient lists.
#[derive(Debug)]
pub struct MergedCohort {
    /// Total patient count.
    pub patient_count: usize,
    /// Total distinct-diagnosis exposures.
    pub diagnosis_count: usize,
    /// Per-DID exposed-patient counts over the whole population.
    pub exposed_counts: Vec<usize>,
    /// Per-DID exposed-patient lists over the whole population.
    pub exposed_patients: Vec<Vec<Arc<Patient>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnosis;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient(source_id: &str, sex: Sex, age_bucket: usize, dids: &[u32]) -> Patient {
        Patient {
            pid: 0,
            source_id: source_id.into(),
            birth_year: 1960,
            sex,
            age_bucket,
            region: 0,
            death_date: None,
            event_of_interest: None,
            diagnoses: dids
                .iter()
                .enumerate()
                .map(|(i, &did)| Diagnosis {
                    did,
                    date: date(2019, 1 + i as u32, 1),
                })
                .collect(),
        }
    }

    #[test]
    fn empty_registry_builds_empty_strata() {
        let registry = PatientRegistry::from_patients(Vec::new());
        let index = CohortIndex::build(&registry, 3, 4);
        assert_eq!(index.strata().len(), 6);
        assert!(index.strata().iter().all(|s| s.patient_count == 0));
        let merged = index.merge();
        assert_eq!(merged.patient_count, 0);
        assert!(merged.exposed_patients.iter().all(Vec::is_empty));
    }

    #[test]
    fn counts_each_patient_once_per_did() {
        let registry = PatientRegistry::from_patients(vec![
            patient("a", Sex::Male, 0, &[0, 1, 0]),
            patient("b", Sex::Male, 0, &[1]),
            patient("c", Sex::Female, 1, &[0]),
        ]);
        let index = CohortIndex::build(&registry, 2, 2);
        let male_young = &index.strata()[stratum_index(Sex::Male, 0, 2)];
        assert_eq!(male_young.patient_count, 2);
        // patient "a" has DID 0 twice but counts once
        assert_eq!(male_young.exposed_counts[0], 1);
        assert_eq!(male_young.exposed_counts[1], 2);
        assert_eq!(
            male_young.exposed_counts[0],
            male_young.exposed_patients[0].len()
        );
        let female_old = &index.strata()[stratum_index(Sex::Female, 1, 2)];
        assert_eq!(female_old.patient_count, 1);
        assert_eq!(female_old.exposed_counts[0], 1);
    }

    #[test]
    fn merge_sums_counts_and_concatenates_lists() {
        let registry = PatientRegistry::from_patients(vec![
            patient("a", Sex::Male, 0, &[0]),
            patient("b", Sex::Female, 1, &[0, 1]),
        ]);
        let index = CohortIndex::build(&registry, 2, 2);
        let merged = index.merge();
        assert_eq!(merged.patient_count, 2);
        assert_eq!(merged.exposed_counts, vec![2, 1]);
        assert_eq!(merged.exposed_patients[0].len(), 2);
        assert_eq!(merged.exposed_patients[1].len(), 1);
    }
}
