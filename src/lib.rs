//! Temporal disease-trajectory analysis over longitudinal patient
//! diagnosis histories.
//!
//! Given a population of patients with dated, coded diagnoses, this
//! library finds directed diagnosis pairs that occur more often than
//! chance accounts for (relative-risk estimation by Monte-Carlo matched
//! sampling), chains qualifying pairs into longer trajectories supported
//! by a minimum number of patients, and optionally clusters the
//! trajectories over a Jaccard pair graph via an external
//! Markov-clustering process.

pub mod cluster;
pub mod cohort;
pub mod config;
pub mod error;
pub mod experiment;
pub mod ingest;
pub mod models;
pub mod risk;
pub mod stats;
pub mod trajectory;
pub mod utils;

// Core types
pub use config::AnalysisConfig;
pub use error::{Result, TrajanError};
pub use experiment::Experiment;

// Domain models
pub use models::{Diagnosis, Patient, PatientRegistry, Sex};

// Pipeline entry points
pub use cluster::{cluster_trajectories, GraphClusterer};
pub use cohort::CohortIndex;
pub use ingest::load_experiment;
pub use risk::engine::RiskConfig;
pub use trajectory::builder::{build_trajectories, BuildParams};
pub use trajectory::{Pair, Trajectory};
