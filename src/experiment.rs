//! The experiment: analysis context tying together the diagnosis
//! dictionary, the stratified population, the relative-risk matrix and the
//! computed trajectories.

use std::sync::Arc;

use log::info;

use crate::cohort::{CohortIndex, MergedCohort};
use crate::error::{Result, TrajanError};
use crate::models::Patient;
use crate::risk::engine::{self, RiskConfig};
use crate::risk::RiskMatrix;
use crate::trajectory::{Pair, Trajectory};

/// Analysis context for one patient population.
///
/// Owns the RR matrix, the pair patient lists, the strata and the produced
/// trajectories for its lifetime. Patients are shared read-only.
#[derive(Debug)]
pub struct Experiment {
    /// Name of the run; used to derive output file names.
    pub name: String,
    /// Number of distinct diagnosis codes `D`.
    pub n_codes: usize,
    /// Number of age buckets used for stratification.
    pub age_buckets: usize,
    /// Number of regions seen in the input.
    pub regions: usize,
    /// Dictionary hierarchy level the run was configured with.
    pub level: usize,
    /// `DID -> medical category name`.
    pub name_map: Vec<String>,
    /// `DID -> source diagnosis code`.
    pub code_map: Vec<String>,
    /// Stratified population; dropped once the RR matrix is computed.
    pub cohorts: Option<CohortIndex>,
    /// Per-DID exposed-patient lists over the whole population.
    pub d_patients: Vec<Vec<Arc<Patient>>>,
    /// The `D x D` RR matrix and its companion pair patient lists.
    pub risk: RiskMatrix,
    /// Ordered diagnosis pairs selected for trajectory building.
    pub pairs: Vec<Pair>,
    /// Trajectories produced by the builder.
    pub trajectories: Vec<Trajectory>,
    /// Number of male patients in the population.
    pub males: usize,
    /// Number of female patients in the population.
    pub females: usize,
}

impl Experiment {
    /// Assemble an experiment from the stratified population and the
    /// diagnosis dictionary maps.
    #[must_use]
    pub fn new(
        name: String,
        level: usize,
        regions: usize,
        name_map: Vec<String>,
        code_map: Vec<String>,
        cohorts: CohortIndex,
        merged: MergedCohort,
        males: usize,
        females: usize,
    ) -> Self {
        let n_codes = name_map.len();
        let age_buckets = cohorts.age_buckets();
        Self {
            name,
            n_codes,
            age_buckets,
            regions,
            level,
            name_map,
            code_map,
            cohorts: Some(cohorts),
            d_patients: merged.exposed_patients,
            risk: RiskMatrix::new(n_codes),
            pairs: Vec::new(),
            trajectories: Vec::new(),
            males,
            females,
        }
    }

    /// Fill the RR matrix by Monte-Carlo matched sampling.
    ///
    /// Fails when the stratified population has already been released.
    pub fn estimate_relative_risks(&mut self, cfg: &RiskConfig) -> Result<()> {
        let cohorts = self.cohorts.as_ref().ok_or_else(|| {
            TrajanError::config("relative-risk estimation needs the stratified population")
        })?;
        engine::estimate(cohorts, &self.d_patients, &mut self.risk, cfg);
        Ok(())
    }

    /// Release the stratified population and the per-diagnosis patient
    /// lists. They are only needed to fill the RR matrix; pair selection,
    /// trajectory building and clustering work off the matrix alone.
    pub fn release_cohorts(&mut self) {
        if self.cohorts.take().is_some() {
            info!("Released stratified population");
        }
        self.d_patients = Vec::new();
    }

    /// Medical name of a diagnosis id.
    #[must_use]
    pub fn name_of(&self, did: u32) -> &str {
        &self.name_map[did as usize]
    }

    /// Source code of a diagnosis id.
    #[must_use]
    pub fn code_of(&self, did: u32) -> &str {
        &self.code_map[did as usize]
    }
}
