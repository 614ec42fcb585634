//! Patient metrics over groups of trajectories, reported per cluster.

use crate::models::Sex;
use crate::trajectory::Trajectory;

/// Aggregate patient metrics for a set of trajectories.
///
/// Patients are counted once per trajectory they complete; a patient
/// finishing two trajectories of the same cluster contributes twice, which
/// matches how the cluster summaries weight the membership.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryMetrics {
    /// Mean age at the last diagnosis of the trajectory.
    pub mean_age: f64,
    /// Standard deviation of the age at the last diagnosis.
    pub stdev_age: f64,
    /// Mean age at the event of interest, over patients that have one.
    pub mean_age_eoi: f64,
    /// Standard deviation of the age at the event of interest.
    pub stdev_age_eoi: f64,
    /// Number of male patient instances.
    pub males: usize,
    /// Number of female patient instances.
    pub females: usize,
}

/// Compute metrics over the final-step patients of the given trajectories.
#[must_use]
pub fn metrics_for(trajectories: &[&Trajectory]) -> TrajectoryMetrics {
    let mut metrics = TrajectoryMetrics::default();
    let mut ages = Vec::new();
    let mut eoi_ages = Vec::new();
    for trajectory in trajectories {
        let last = trajectory.last_diagnosis();
        for patient in trajectory.final_patients() {
            if let Some(age) = patient.age_at_first(last) {
                ages.push(f64::from(age));
            }
            match patient.sex {
                Sex::Male => metrics.males += 1,
                Sex::Female => metrics.females += 1,
            }
            if let Some(age) = patient.age_at_event_of_interest() {
                eoi_ages.push(f64::from(age));
            }
        }
    }
    (metrics.mean_age, metrics.stdev_age) = mean_and_stdev(&ages);
    (metrics.mean_age_eoi, metrics.stdev_age_eoi) = mean_and_stdev(&eoi_ages);
    metrics
}

fn mean_and_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (mean - v) * (mean - v)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
