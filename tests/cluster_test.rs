//! Clustering-stage tests with an injected deterministic partition in
//! place of the external MCL process.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{experiment_from_patients, patient};
use trajan::cluster::{
    assign_clusters, cluster_trajectories, jaccard_edges, write_edge_list, GraphClusterer,
    MAX_MISSING_DIAGNOSES,
};
use trajan::models::Sex;
use trajan::trajectory::{Pair, Trajectory};
use trajan::Result;

fn trajectory(id: usize, diagnoses: &[u32], patients: Vec<Arc<trajan::models::Patient>>) -> Trajectory {
    Trajectory {
        id,
        diagnoses: diagnoses.to_vec(),
        transition_counts: vec![patients.len(); diagnoses.len() - 1],
        step_patients: vec![patients],
        cluster: None,
    }
}

/// Test double for the external clusterer: returns a fixed partition.
struct FixedPartition(Vec<Vec<u32>>);

impl GraphClusterer for FixedPartition {
    fn cluster(&self, _edges: &Path, _granularity: usize, _work_dir: &Path) -> Result<Vec<Vec<u32>>> {
        Ok(self.0.clone())
    }
}

/// Three trajectories over codes X=0, Y=1, Z=2, W=3, P=4, Q=5, R=6.
fn clustered_experiment() -> trajan::Experiment {
    let patients = vec![patient(0, Sex::Male, 1950, 0, &[(0, 2019), (1, 2020)])];
    let names = ["X", "Y", "Z", "W", "P", "Q", "R"];
    let (mut exp, registry) = experiment_from_patients(patients, 1, &names);
    let supporter: Vec<_> = registry.iter().cloned().collect();
    exp.trajectories = vec![
        trajectory(0, &[0, 1, 2], supporter.clone()),
        trajectory(1, &[0, 1, 3], supporter.clone()),
        trajectory(2, &[4, 5, 6], supporter),
    ];
    exp.pairs = vec![
        Pair { first: 0, second: 1 },
        Pair { first: 1, second: 2 },
        Pair { first: 1, second: 3 },
        Pair { first: 4, second: 5 },
        Pair { first: 5, second: 6 },
        Pair { first: 2, second: 4 },
    ];
    exp
}

#[test]
fn jaccard_weights_match_the_occurrence_counts() {
    let exp = clustered_experiment();
    let edges = jaccard_edges(&exp);
    // the 2 -> 4 pair occurs in no trajectory and is excluded
    assert_eq!(edges.len(), 5);
    for &(_, _, w) in &edges {
        assert!(w > 0.0 && w <= 1.0);
    }
    // 0 -> 1 occurs in two trajectories; 0 occurs twice, 1 twice
    let edge = edges.iter().find(|e| e.0 == 0 && e.1 == 1).unwrap();
    assert!((edge.2 - 1.0).abs() < 1e-12);
    // 1 -> 2 occurs once; 1 occurs twice, 2 once
    let edge = edges.iter().find(|e| e.0 == 1 && e.1 == 2).unwrap();
    assert!((edge.2 - 0.5).abs() < 1e-12);
}

#[test]
fn containment_assigns_each_trajectory_to_one_cluster() {
    let mut exp = clustered_experiment();
    let partition = vec![vec![0, 1, 2, 3], vec![4, 5, 6]];
    let n = assign_clusters(&mut exp.trajectories, &partition, MAX_MISSING_DIAGNOSES);
    assert_eq!(n, 2);
    assert_eq!(exp.trajectories[0].cluster, Some(0));
    assert_eq!(exp.trajectories[1].cluster, Some(0));
    assert_eq!(exp.trajectories[2].cluster, Some(1));
}

#[test]
fn leftover_trajectories_become_singletons() {
    let mut exp = clustered_experiment();
    // only the P/Q/R cluster is provided; the X/Y trajectories are left over
    let partition = vec![vec![4, 5, 6]];
    let n = assign_clusters(&mut exp.trajectories, &partition, MAX_MISSING_DIAGNOSES);
    assert_eq!(n, 3);
    assert_eq!(exp.trajectories[2].cluster, Some(0));
    assert_eq!(exp.trajectories[0].cluster, Some(1));
    assert_eq!(exp.trajectories[1].cluster, Some(2));
}

#[test]
fn cluster_stage_writes_the_per_granularity_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let mut exp = clustered_experiment();
    let clusterer = FixedPartition(vec![vec![0, 1, 2, 3], vec![4, 5, 6]]);
    cluster_trajectories(&mut exp, &[40, 60], dir.path(), &clusterer).unwrap();

    let work_dir = dir.path().join("test-clusters");
    assert!(work_dir.join("test.abc").is_file());
    for granularity in [40, 60] {
        for suffix in [
            "trajectories.gml",
            "gml",
            "clustered-trajectories.tab",
            "patients.csv",
            "clusters.csv",
        ] {
            let file = work_dir.join(format!("test.I{granularity}.{suffix}"));
            assert!(file.is_file(), "missing {}", file.display());
        }
    }
    // the clustered tab file carries the per-cluster metric headers
    let tab =
        std::fs::read_to_string(work_dir.join("test.I40.clustered-trajectories.tab")).unwrap();
    assert!(tab.starts_with("CID:\t0\tMean Age:"));
    assert!(tab.contains("Trajectories:\t2"));
    assert!(tab.contains("CID:\t1\tTID:\t2"));
}

#[test]
fn edge_list_is_tab_separated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edges.abc");
    write_edge_list(&[(0, 1, 0.5), (1, 2, 1.0)], &path).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "0\t1\t0.500000\n1\t2\t1.000000\n");
}
