//! Relative-risk matrix: per ordered diagnosis pair, the estimated RR score
//! and the list of patients that experienced the pair inside the configured
//! time window.

pub mod engine;
pub mod persist;

use std::sync::Arc;

use crate::models::Patient;

/// Dense `D x D` storage for RR scores and pair patient lists.
///
/// Cells default to an RR of 1.0 and an empty patient list; pair selection
/// scans the whole matrix linearly, so dense rows beat any keyed map here.
#[derive(Debug)]
pub struct RiskMatrix {
    size: usize,
    rr: Vec<f64>,
    pair_patients: Vec<Vec<Arc<Patient>>>,
}

impl RiskMatrix {
    /// Allocate a `size x size` matrix with all RR scores at 1.0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rr: vec![1.0; size * size],
            pair_patients: vec![Vec::new(); size * size],
        }
    }

    /// Matrix dimension `D`.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn cell(&self, d1: u32, d2: u32) -> usize {
        d1 as usize * self.size + d2 as usize
    }

    /// RR score for the ordered pair `(d1, d2)`.
    #[must_use]
    pub fn rr(&self, d1: u32, d2: u32) -> f64 {
        self.rr[self.cell(d1, d2)]
    }

    /// Set the RR score for the ordered pair `(d1, d2)`.
    pub fn set_rr(&mut self, d1: u32, d2: u32, value: f64) {
        let cell = self.cell(d1, d2);
        self.rr[cell] = value;
    }

    /// Patients that experienced `d1` followed by `d2` inside the window.
    #[must_use]
    pub fn pair_patients(&self, d1: u32, d2: u32) -> &[Arc<Patient>] {
        &self.pair_patients[self.cell(d1, d2)]
    }

    /// Replace the patient list of the ordered pair `(d1, d2)`.
    pub fn set_pair_patients(&mut self, d1: u32, d2: u32, patients: Vec<Arc<Patient>>) {
        let cell = self.cell(d1, d2);
        self.pair_patients[cell] = patients;
    }

    /// Number of patients supporting the ordered pair `(d1, d2)`.
    #[must_use]
    pub fn support(&self, d1: u32, d2: u32) -> usize {
        self.pair_patients[self.cell(d1, d2)].len()
    }

    /// Mutable views of the raw cell storage, for the row-partitioned
    /// parallel fill. Both slices are row-major with stride `size`.
    pub(crate) fn cells_mut(&mut self) -> (&mut [f64], &mut [Vec<Arc<Patient>>]) {
        (&mut self.rr, &mut self.pair_patients)
    }
}
