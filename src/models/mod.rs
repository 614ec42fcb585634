//! Domain models: patients, diagnoses, and the patient registry.

pub mod patient;
pub mod registry;

pub use patient::{date_to_years, elapsed_years, Diagnosis, Patient, Sex};
pub use registry::PatientRegistry;
