//! End-to-end scenarios over the RR engine, pair selector and trajectory
//! builder, using synthetic populations with known structure.

mod common;

use common::{experiment_from_patients, patient};
use trajan::models::Sex;
use trajan::trajectory::selection::select_pairs;
use trajan::{build_trajectories, BuildParams, RiskConfig};

fn risk_config(iterations: usize) -> RiskConfig {
    RiskConfig {
        min_years: 1.0,
        max_years: 5.0,
        iterations,
        seed: Some(42),
    }
}

fn build_params(min_patients: usize) -> BuildParams {
    BuildParams {
        min_patients,
        max_length: 3,
        min_length: 2,
        min_years: 1.0,
        max_years: 5.0,
        min_rr: 1.0,
    }
}

#[test]
fn empty_cohort_yields_nothing() {
    let (mut exp, _registry) = experiment_from_patients(Vec::new(), 2, &["a", "b", "c"]);
    exp.estimate_relative_risks(&risk_config(10)).unwrap();
    for d1 in 0..3 {
        for d2 in 0..3 {
            assert_eq!(exp.risk.rr(d1, d2), 1.0);
            assert!(exp.risk.pair_patients(d1, d2).is_empty());
        }
    }
    build_trajectories(&mut exp, &build_params(5), &[]);
    assert!(exp.pairs.is_empty());
    assert!(exp.trajectories.is_empty());
}

#[test]
fn single_patient_yields_nothing() {
    let patients = vec![patient(0, Sex::Male, 1950, 0, &[(0, 2019)])];
    let (mut exp, _registry) = experiment_from_patients(patients, 1, &["a", "b"]);
    exp.estimate_relative_risks(&risk_config(10)).unwrap();
    for d1 in 0..2 {
        for d2 in 0..2 {
            assert_eq!(exp.risk.rr(d1, d2), 1.0);
        }
    }
    build_trajectories(&mut exp, &build_params(1), &[]);
    assert!(exp.trajectories.is_empty());
}

/// The deterministic causal-chain population: 200 patients with the full
/// `smoking -> lung cancer -> drinking -> liver cancer` history and 200
/// controls with sporadic non-causal occurrences of the cancers.
fn causal_chain_population() -> Vec<trajan::models::Patient> {
    let n = 100;
    let mut patients = Vec::new();
    let chain: &[(u32, i32)] = &[(0, 2019), (1, 2020), (2, 2021), (3, 2022)];
    for i in 0..n {
        let birth_year = 1900 + i as i32;
        let bucket = usize::from(birth_year >= 1950);
        patients.push(patient(i, Sex::Male, birth_year, bucket, chain));
    }
    for i in n..2 * n {
        let birth_year = 1900 + (i - n) as i32;
        let bucket = usize::from(birth_year >= 1950);
        patients.push(patient(i, Sex::Female, birth_year, bucket, chain));
    }
    // sporadic controls: a few get lung cancer or liver cancer on their own
    for i in 2 * n..3 * n {
        let birth_year = 1900 + (i - 2 * n) as i32;
        let bucket = usize::from(birth_year >= 1950);
        let mut diagnoses = Vec::new();
        if (1925..=1930).contains(&birth_year) || (1980..=1985).contains(&birth_year) {
            diagnoses.push((1, 2020));
        }
        if (1945..=1950).contains(&birth_year) || (1990..=1995).contains(&birth_year) {
            diagnoses.push((3, 2021));
        }
        patients.push(patient(i, Sex::Male, birth_year, bucket, &diagnoses));
    }
    for i in 3 * n..4 * n {
        let birth_year = 1920 + (i - 3 * n) as i32;
        let bucket = usize::from(birth_year >= 1970);
        let mut diagnoses = Vec::new();
        if (1925..=1930).contains(&birth_year) || (1980..=1985).contains(&birth_year) {
            diagnoses.push((1, 2020));
        }
        if (1945..=1950).contains(&birth_year) || (1990..=1995).contains(&birth_year) {
            diagnoses.push((3, 2021));
        }
        patients.push(patient(i, Sex::Female, birth_year, bucket, &diagnoses));
    }
    patients
}

#[test]
fn causal_chain_produces_the_expected_trajectories() {
    let names = ["Smoking", "Lung cancer", "Drinking", "Liver cancer"];
    let (mut exp, _registry) = experiment_from_patients(causal_chain_population(), 2, &names);
    exp.estimate_relative_risks(&risk_config(10)).unwrap();

    // the causal pairs carry strong RR scores and full support
    assert!(exp.risk.rr(0, 1) > 5.0);
    assert!(exp.risk.rr(2, 3) > 5.0);
    assert_eq!(exp.risk.support(0, 1), 200);
    assert_eq!(exp.risk.support(0, 2), 200);
    assert_eq!(exp.risk.support(0, 3), 200);
    assert_eq!(exp.risk.support(2, 3), 200);
    // nothing precedes smoking
    assert_eq!(exp.risk.support(1, 0), 0);
    assert_eq!(exp.risk.rr(1, 0), 1.0);

    build_trajectories(&mut exp, &build_params(5), &[]);
    assert_eq!(exp.pairs.len(), 4);

    let sequences: Vec<Vec<u32>> = exp
        .trajectories
        .iter()
        .map(|t| t.diagnoses.clone())
        .collect();
    for expected in [
        vec![0, 1],
        vec![0, 2, 3],
        vec![0, 2],
        vec![0, 3],
        vec![2, 3],
    ] {
        assert!(
            sequences.contains(&expected),
            "missing trajectory {expected:?} in {sequences:?}"
        );
    }
    assert_eq!(exp.trajectories.len(), 5);
    for trajectory in &exp.trajectories {
        assert!(trajectory.transition_counts.iter().all(|&c| c == 200));
        assert_eq!(
            trajectory.transition_counts.len(),
            trajectory.diagnoses.len() - 1
        );
        // every adjacent pair of an emitted trajectory is a selected pair
        for window in trajectory.diagnoses.windows(2) {
            assert!(exp
                .pairs
                .iter()
                .any(|p| p.first == window[0] && p.second == window[1]));
        }
        // ids are dense from zero
    }
    let mut ids: Vec<usize> = exp.trajectories.iter().map(|t| t.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..exp.trajectories.len()).collect::<Vec<_>>());
}

#[test]
fn asymmetric_pair_keeps_only_the_dominant_direction() {
    // support built by hand: 300 patients A -> B, 50 patients B -> A
    let mut patients = Vec::new();
    for i in 0..300 {
        patients.push(patient(i, Sex::Male, 1950, 0, &[(0, 2019), (1, 2021)]));
    }
    for i in 300..350 {
        patients.push(patient(i, Sex::Male, 1950, 0, &[(1, 2019), (0, 2021)]));
    }
    let (mut exp, registry) = experiment_from_patients(patients, 1, &["A", "B"]);
    let forward: Vec<_> = registry.iter().take(300).cloned().collect();
    let reverse: Vec<_> = registry.iter().skip(300).cloned().collect();
    exp.risk.set_rr(0, 1, 3.0);
    exp.risk.set_rr(1, 0, 3.0);
    exp.risk.set_pair_patients(0, 1, forward);
    exp.risk.set_pair_patients(1, 0, reverse);

    let pairs = select_pairs(&exp, 5, 1.0);
    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].first, pairs[0].second), (0, 1));
}

#[test]
fn balanced_directions_are_dropped_entirely() {
    let mut patients = Vec::new();
    for i in 0..180 {
        patients.push(patient(i, Sex::Male, 1950, 0, &[(0, 2019), (1, 2021)]));
    }
    for i in 180..350 {
        patients.push(patient(i, Sex::Male, 1950, 0, &[(1, 2019), (0, 2021)]));
    }
    let (mut exp, registry) = experiment_from_patients(patients, 1, &["A", "B"]);
    let forward: Vec<_> = registry.iter().take(180).cloned().collect();
    let reverse: Vec<_> = registry.iter().skip(180).cloned().collect();
    exp.risk.set_rr(0, 1, 3.0);
    exp.risk.set_rr(1, 0, 3.0);
    exp.risk.set_pair_patients(0, 1, forward);
    exp.risk.set_pair_patients(1, 0, reverse);

    // 180 vs 170 is not significantly asymmetric
    assert!(select_pairs(&exp, 5, 1.0).is_empty());
}

#[test]
fn pair_support_never_exceeds_exposure() {
    let (mut exp, _registry) =
        experiment_from_patients(causal_chain_population(), 2, &["s", "lc", "d", "vc"]);
    let exposure: Vec<usize> = exp.d_patients.iter().map(Vec::len).collect();
    exp.estimate_relative_risks(&risk_config(10)).unwrap();
    for d1 in 0..4u32 {
        for d2 in 0..4u32 {
            assert!(exp.risk.support(d1, d2) <= exposure[d1 as usize]);
        }
    }
}
