//! Matched control sampling.
//!
//! Given a group of exposed patients, draws a control group of the same
//! size with the same per-stratum composition, excluding the exposed
//! patients themselves. Selection walks each stratum's patient list in
//! stored order and decides membership with fair coin flips against a
//! surplus budget, which gives an approximately uniform
//! without-replacement sample without paying for a shuffle of the whole
//! stratum.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::cohort::{stratum_index, CohortIndex};
use crate::models::Patient;

/// Randomly select `want` patients from `pool` (in stored order), skipping
/// members of `excluded`, and append them to `out`.
fn select_without_shuffle(
    pool: &[Arc<Patient>],
    want: usize,
    excluded: &FxHashSet<u32>,
    rng: &mut SmallRng,
    out: &mut Vec<Arc<Patient>>,
) {
    let mut collected = 0;
    // patients we can afford to skip and still fill the quota
    let mut surplus = pool.len().saturating_sub(excluded.len() + want);
    for patient in pool {
        if collected == want {
            break;
        }
        if excluded.contains(&patient.pid) {
            continue;
        }
        if surplus > 0 && !rng.random::<bool>() {
            surplus -= 1;
            continue;
        }
        out.push(patient.clone());
        collected += 1;
    }
}

/// Draw a control group matched to `exposed` stratum by stratum.
///
/// For every stratum the control group holds as many patients as the
/// exposed group has there, none of which appear in `excluded`. When a
/// stratum cannot supply enough eligible patients the returned group is
/// shorter than `exposed`; callers treat that as an infeasible draw.
#[must_use]
pub fn sample_matched_controls(
    index: &CohortIndex,
    exposed: &[Arc<Patient>],
    excluded: &FxHashSet<u32>,
    rng: &mut SmallRng,
) -> Vec<Arc<Patient>> {
    let age_buckets = index.age_buckets();
    let mut demand: SmallVec<[usize; 32]> = SmallVec::new();
    demand.resize(index.strata().len(), 0);
    for patient in exposed {
        demand[stratum_index(patient.sex, patient.age_bucket, age_buckets)] += 1;
    }
    let mut controls = Vec::with_capacity(exposed.len());
    for (idx, &want) in demand.iter().enumerate() {
        if want == 0 {
            continue;
        }
        select_without_shuffle(
            &index.strata()[idx].patients,
            want,
            excluded,
            rng,
            &mut controls,
        );
    }
    controls
}

/// Probability of drawing a patient diagnosed with `d2` but not part of the
/// exposed group, averaged over the strata of the exposed patients.
///
/// Used by the RR engine as a cheap pre-filter: when the unexposed `d2`
/// prevalence is at least the exposed-and-followed rate, the pair cannot
/// yield an interesting relative risk and sampling is skipped.
#[must_use]
pub fn unexposed_prevalence(
    index: &CohortIndex,
    exposed: &[Arc<Patient>],
    excluded: &FxHashSet<u32>,
    d2: u32,
) -> f64 {
    let mut total = 0.0;
    for patient in exposed {
        let stratum = index.stratum_of(patient);
        let eligible = stratum.exposed_patients[d2 as usize]
            .iter()
            .filter(|p| !excluded.contains(&p.pid))
            .count();
        total += eligible as f64 / stratum.patient_count as f64;
    }
    total / exposed.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Diagnosis, PatientRegistry, Sex};
    use chrono::NaiveDate;
    use rand::SeedableRng;

    fn patient(id: usize, sex: Sex, age_bucket: usize, dids: &[u32]) -> Patient {
        Patient {
            pid: 0,
            source_id: format!("p{id}"),
            birth_year: 1960,
            sex,
            age_bucket,
            region: 0,
            death_date: None,
            event_of_interest: None,
            diagnoses: dids
                .iter()
                .map(|&did| Diagnosis {
                    did,
                    date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                })
                .collect(),
        }
    }

    fn build_index(patients: Vec<Patient>, age_buckets: usize, codes: usize) -> CohortIndex {
        let registry = PatientRegistry::from_patients(patients);
        CohortIndex::build(&registry, age_buckets, codes)
    }

    #[test]
    fn controls_match_stratum_composition_and_avoid_excluded() {
        let mut patients = Vec::new();
        for i in 0..40 {
            patients.push(patient(i, Sex::Male, 0, &[0]));
        }
        for i in 40..80 {
            patients.push(patient(i, Sex::Female, 1, &[0]));
        }
        let index = build_index(patients, 2, 1);
        // expose ten males and five females
        let exposed: Vec<_> = index.strata()[stratum_index(Sex::Male, 0, 2)].patients[..10]
            .iter()
            .chain(index.strata()[stratum_index(Sex::Female, 1, 2)].patients[..5].iter())
            .cloned()
            .collect();
        let excluded: FxHashSet<u32> = exposed.iter().map(|p| p.pid).collect();
        let mut rng = SmallRng::seed_from_u64(7);
        let controls = sample_matched_controls(&index, &exposed, &excluded, &mut rng);
        assert_eq!(controls.len(), exposed.len());
        assert!(controls.iter().all(|p| !excluded.contains(&p.pid)));
        let male_controls = controls.iter().filter(|p| p.sex == Sex::Male).count();
        assert_eq!(male_controls, 10);
    }

    #[test]
    fn infeasible_stratum_yields_short_group() {
        // three males total; exposing two leaves only one eligible control
        let patients = (0..3).map(|i| patient(i, Sex::Male, 0, &[0])).collect();
        let index = build_index(patients, 1, 1);
        let exposed: Vec<_> = index.strata()[0].patients[..2].to_vec();
        let excluded: FxHashSet<u32> = exposed.iter().map(|p| p.pid).collect();
        let mut rng = SmallRng::seed_from_u64(7);
        let controls = sample_matched_controls(&index, &exposed, &excluded, &mut rng);
        assert!(controls.len() < exposed.len());
    }

    #[test]
    fn prevalence_counts_only_unexposed_carriers() {
        // stratum of 10 males: 4 carry DID 1, 2 of them are in the exposed set
        let mut patients: Vec<Patient> =
            (0..6).map(|i| patient(i, Sex::Male, 0, &[0])).collect();
        patients.extend((6..10).map(|i| patient(i, Sex::Male, 0, &[0, 1])));
        let index = build_index(patients, 1, 2);
        let stratum = &index.strata()[0];
        // exposed group: two DID-1 carriers and two non-carriers
        let exposed = vec![
            stratum.patients[6].clone(),
            stratum.patients[7].clone(),
            stratum.patients[0].clone(),
            stratum.patients[1].clone(),
        ];
        let excluded: FxHashSet<u32> = exposed.iter().map(|p| p.pid).collect();
        let prevalence = unexposed_prevalence(&index, &exposed, &excluded, 1);
        // per exposed patient: 2 eligible carriers out of 10
        assert!((prevalence - 0.2).abs() < 1e-12);
    }
}
