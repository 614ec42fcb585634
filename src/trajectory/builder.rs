//! Trajectory building: a parallel depth-first search that extends every
//! selected pair into longer diagnosis sequences.
//!
//! Each trajectory under construction tracks, per supporting patient, the
//! absolute index of the last matched diagnosis in that patient's history.
//! An extension with diagnosis `c` keeps the patients whose history shows a
//! `c` after that index inside the time window. Extensions copy the
//! ancestor's state; sibling extensions never observe each other.
//!
//! The seed list is split into one range per worker; every worker runs an
//! independent LIFO stack and the per-worker results are concatenated, so
//! the output order is deterministic for a fixed seed order and worker
//! partitioning.

use std::sync::Arc;

use log::info;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::experiment::Experiment;
use crate::models::Patient;
use crate::risk::RiskMatrix;
use crate::trajectory::filters::TrajectoryFilter;
use crate::trajectory::selection::select_pairs;
use crate::trajectory::{Pair, Trajectory};
use crate::utils::progress;

/// Constraints for trajectory building.
#[derive(Debug, Clone)]
pub struct BuildParams {
    /// Minimum number of supporting patients per transition.
    pub min_patients: usize,
    /// Maximum trajectory length (number of diagnoses).
    pub max_length: usize,
    /// Minimum trajectory length (number of diagnoses).
    pub min_length: usize,
    /// Minimum elapsed years between consecutive diagnoses.
    pub min_years: f64,
    /// Maximum elapsed years between consecutive diagnoses.
    pub max_years: f64,
    /// Minimum RR score for a pair to participate.
    pub min_rr: f64,
}

/// A trajectory under construction.
#[derive(Debug, Clone)]
struct PartialTrajectory {
    diagnoses: Vec<u32>,
    transition_counts: Vec<usize>,
    step_patients: Vec<Vec<Arc<Patient>>>,
    /// Per supporting patient, the absolute index of the last matched
    /// diagnosis in that patient's history.
    positions: FxHashMap<u32, usize>,
}

impl PartialTrajectory {
    fn seed(pair: Pair, matrix: &RiskMatrix, min_years: f64, max_years: f64) -> Self {
        let supporters = matrix.pair_patients(pair.first, pair.second).to_vec();
        let mut positions = FxHashMap::default();
        for patient in &supporters {
            if let Some(idx) =
                patient.first_pair_match(pair.first, pair.second, min_years, max_years)
            {
                positions.insert(patient.pid, idx);
            }
        }
        Self {
            diagnoses: vec![pair.first, pair.second],
            transition_counts: vec![supporters.len()],
            step_patients: vec![supporters],
            positions,
        }
    }

    fn last_diagnosis(&self) -> u32 {
        self.diagnoses[self.diagnoses.len() - 1]
    }

    /// Patients that can continue into `next`, with their new positions.
    fn survivors(
        &self,
        next: u32,
        min_years: f64,
        max_years: f64,
    ) -> Vec<(Arc<Patient>, usize)> {
        let current = match self.step_patients.last() {
            Some(patients) => patients,
            None => return Vec::new(),
        };
        current
            .iter()
            .filter_map(|patient| {
                let &idx = self.positions.get(&patient.pid)?;
                patient
                    .next_match_after(idx, next, min_years, max_years)
                    .map(|new_idx| (patient.clone(), new_idx))
            })
            .collect()
    }

    /// Copy this trajectory and append `next` with the given survivors.
    fn extended_with(&self, next: u32, survivors: Vec<(Arc<Patient>, usize)>) -> Self {
        let mut diagnoses = self.diagnoses.clone();
        diagnoses.push(next);
        let mut transition_counts = self.transition_counts.clone();
        transition_counts.push(survivors.len());
        let mut step_patients = self.step_patients.clone();
        let mut positions = FxHashMap::default();
        let mut patients = Vec::with_capacity(survivors.len());
        for (patient, idx) in survivors {
            positions.insert(patient.pid, idx);
            patients.push(patient);
        }
        step_patients.push(patients);
        Self {
            diagnoses,
            transition_counts,
            step_patients,
            positions,
        }
    }

    fn finish(self) -> Trajectory {
        Trajectory {
            id: 0,
            diagnoses: self.diagnoses,
            transition_counts: self.transition_counts,
            step_patients: self.step_patients,
            cluster: None,
        }
    }
}

/// Depth-first growth of one range of seeds.
fn grow_range(
    seeds: &[PartialTrajectory],
    extensions_by_first: &[Vec<u32>],
    matrix: &RiskMatrix,
    params: &BuildParams,
) -> Vec<Trajectory> {
    let mut finished = Vec::new();
    let mut stack: Vec<PartialTrajectory> = seeds.to_vec();
    while let Some(current) = stack.pop() {
        let last = current.last_diagnosis();
        let mut growing = 0usize;
        for &next in &extensions_by_first[last as usize] {
            if matrix.support(last, next) < params.min_patients {
                continue;
            }
            let survivors = current.survivors(next, params.min_years, params.max_years);
            if survivors.len() > params.min_patients {
                let extended = current.extended_with(next, survivors);
                if extended.diagnoses.len() >= params.max_length {
                    finished.push(extended.finish());
                } else {
                    growing += 1;
                    stack.push(extended);
                }
            }
        }
        // a trajectory whose extensions all finished (or failed) is itself
        // reportable once it is long enough
        if growing == 0 && current.diagnoses.len() >= params.min_length {
            finished.push(current.finish());
        }
    }
    finished
}

/// Build, filter and store the trajectories of an experiment.
///
/// Selects qualifying pairs, grows every pair into trajectories under the
/// given constraints, applies the trajectory filters, and assigns dense
/// trajectory ids. The surviving trajectories are stored on the experiment
/// along with the selected pairs.
pub fn build_trajectories(
    exp: &mut Experiment,
    params: &BuildParams,
    filters: &[TrajectoryFilter],
) {
    info!("Building patient trajectories");
    let pairs = select_pairs(exp, params.min_patients, params.min_rr);
    let mut extensions_by_first: Vec<Vec<u32>> = vec![Vec::new(); exp.n_codes];
    for pair in &pairs {
        extensions_by_first[pair.first as usize].push(pair.second);
    }
    let seeds: Vec<PartialTrajectory> = pairs
        .iter()
        .map(|&pair| PartialTrajectory::seed(pair, &exp.risk, params.min_years, params.max_years))
        .collect();
    let pb = progress::create_main_progress_bar(seeds.len() as u64, Some("Growing trajectories"));
    let workers = rayon::current_num_threads().max(1);
    let chunk_size = seeds.len().div_ceil(workers).max(1);
    let per_worker: Vec<Vec<Trajectory>> = seeds
        .par_chunks(chunk_size)
        .map(|range| {
            let grown = grow_range(range, &extensions_by_first, &exp.risk, params);
            pb.inc(range.len() as u64);
            grown
        })
        .collect();
    progress::finish_progress_bar(&pb, Some("Trajectories grown"));
    let trajectories: Vec<Trajectory> = per_worker.into_iter().flatten().collect();
    let total = trajectories.len();
    info!("Found {total} trajectories");
    let mut kept: Vec<Trajectory> = trajectories
        .into_iter()
        .filter(|t| filters.iter().all(|f| f(t)))
        .collect();
    for (id, trajectory) in kept.iter_mut().enumerate() {
        trajectory.id = id;
    }
    if !filters.is_empty() {
        info!("Filtered {total} trajectories down to {}", kept.len());
    }
    exp.pairs = pairs;
    exp.trajectories = kept;
}
