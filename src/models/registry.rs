//! Patient registry: owns every patient parsed from the input and hands out
//! shared read-only references for the analysis phases.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::models::patient::{Patient, Sex};

/// The full patient population, indexed by dense analysis id and by the
/// identifier used in the source data.
#[derive(Debug, Default)]
pub struct PatientRegistry {
    patients: Vec<Arc<Patient>>,
    by_source_id: FxHashMap<String, u32>,
    males: usize,
    females: usize,
}

impl PatientRegistry {
    /// Build the registry from fully ingested (and filtered) patients.
    /// Assigns dense patient ids in input order and freezes the records.
    #[must_use]
    pub fn from_patients(patients: Vec<Patient>) -> Self {
        let mut registry = Self::default();
        for mut patient in patients {
            let pid = registry.patients.len() as u32;
            patient.pid = pid;
            match patient.sex {
                Sex::Male => registry.males += 1,
                Sex::Female => registry.females += 1,
            }
            registry
                .by_source_id
                .insert(patient.source_id.clone(), pid);
            registry.patients.push(Arc::new(patient));
        }
        registry
    }

    /// Number of patients in the registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    /// Whether the registry holds no patients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Number of male patients.
    #[must_use]
    pub const fn males(&self) -> usize {
        self.males
    }

    /// Number of female patients.
    #[must_use]
    pub const fn females(&self) -> usize {
        self.females
    }

    /// Look up a patient by dense id.
    #[must_use]
    pub fn get(&self, pid: u32) -> Option<&Arc<Patient>> {
        self.patients.get(pid as usize)
    }

    /// Look up a patient by the identifier used in the source data.
    #[must_use]
    pub fn get_by_source_id(&self, source_id: &str) -> Option<&Arc<Patient>> {
        self.by_source_id
            .get(source_id)
            .and_then(|&pid| self.get(pid))
    }

    /// Iterate over all patients in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Patient>> {
        self.patients.iter()
    }
}
