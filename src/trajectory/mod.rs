//! Disease trajectories: ordered diagnosis sequences supported by a
//! minimum number of patients with consecutive gaps inside the configured
//! time window.

pub mod builder;
pub mod filters;
pub mod metrics;
pub mod output;
pub mod selection;

use std::sync::Arc;

use crate::models::Patient;

/// An ordered diagnosis pair, `first != second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub first: u32,
    pub second: u32,
}

/// A directed disease trajectory `d1 -> d2 -> ... -> dk`.
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// Dense trajectory id, assigned after filtering.
    pub id: usize,
    /// The diagnosis sequence, `k >= 2` entries.
    pub diagnoses: Vec<u32>,
    /// Patient counts per transition, `k - 1` entries.
    pub transition_counts: Vec<usize>,
    /// Patients supporting each step; the last entry holds the patients
    /// that completed the whole trajectory.
    pub step_patients: Vec<Vec<Arc<Patient>>>,
    /// Cluster the trajectory was assigned to, when clustering ran.
    pub cluster: Option<usize>,
}

impl Trajectory {
    /// Patients that completed the full trajectory.
    #[must_use]
    pub fn final_patients(&self) -> &[Arc<Patient>] {
        self.step_patients
            .last()
            .map_or(&[], |patients| patients.as_slice())
    }

    /// The last diagnosis in the sequence.
    #[must_use]
    pub fn last_diagnosis(&self) -> u32 {
        self.diagnoses[self.diagnoses.len() - 1]
    }
}
