//! Trajectory clustering over the Jaccard pair graph.
//!
//! Retained trajectories induce a weighted directed graph on diagnosis
//! codes: the weight of a selected pair is the Jaccard coefficient of the
//! trajectory sets containing the pair and its endpoints. The weighted
//! edge list goes to an external Markov-clustering process; the resulting
//! node partition is pulled back onto trajectories, assigning each
//! trajectory to at most one cluster.

pub mod mcl;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use rustc_hash::FxHashSet;

use crate::error::{IoResultExt, Result};
use crate::experiment::Experiment;
use crate::trajectory::metrics::metrics_for;
use crate::trajectory::output::write_trajectory_lines;
use crate::trajectory::Trajectory;

/// Trajectories may miss at most this many diagnoses of a cluster and
/// still be assigned to it.
pub const MAX_MISSING_DIAGNOSES: usize = 1;

/// External clustering contract: weighted edge list in, node partition out.
pub trait GraphClusterer {
    /// Cluster the graph in `edges` at the given granularity, working in
    /// `work_dir`. Returns one node-id list per cluster.
    fn cluster(&self, edges: &Path, granularity: usize, work_dir: &Path) -> Result<Vec<Vec<u32>>>;
}

/// A weighted directed edge of the Jaccard pair graph.
pub type JaccardEdge = (u32, u32, f64);

/// Compute the Jaccard weight of every selected pair over the retained
/// trajectories. Pairs no trajectory contains are excluded, so every
/// emitted weight lies in `(0, 1]`.
#[must_use]
pub fn jaccard_edges(exp: &Experiment) -> Vec<JaccardEdge> {
    let n = exp.n_codes;
    let mut diagnosis_counts = vec![0usize; n];
    let mut pair_counts = vec![0usize; n * n];
    for trajectory in &exp.trajectories {
        diagnosis_counts[trajectory.diagnoses[0] as usize] += 1;
        for window in trajectory.diagnoses.windows(2) {
            diagnosis_counts[window[1] as usize] += 1;
            pair_counts[window[0] as usize * n + window[1] as usize] += 1;
        }
    }
    let mut edges = Vec::new();
    for pair in &exp.pairs {
        let together = pair_counts[pair.first as usize * n + pair.second as usize];
        if together == 0 {
            continue;
        }
        let first = diagnosis_counts[pair.first as usize];
        let second = diagnosis_counts[pair.second as usize];
        let weight = together as f64 / (first + second - together) as f64;
        edges.push((pair.first, pair.second, weight));
    }
    edges
}

/// Write the edge list in the `a \t b \t w` format the clusterer ingests.
pub fn write_edge_list(edges: &[JaccardEdge], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for &(a, b, w) in edges {
        writeln!(out, "{a}\t{b}\t{w:.6}").with_path(path)?;
    }
    out.flush().with_path(path)
}

/// Assign trajectories to clusters of the given node partition.
///
/// Clusters are visited in partition order; a still-unassigned trajectory
/// joins a cluster when all but at most `max_missing` of its diagnoses are
/// cluster members. Unassigned leftovers become singleton clusters.
/// Returns the total number of clusters assigned.
pub fn assign_clusters(
    trajectories: &mut [Trajectory],
    partition: &[Vec<u32>],
    max_missing: usize,
) -> usize {
    for trajectory in trajectories.iter_mut() {
        trajectory.cluster = None;
    }
    let mut next_cluster = 0usize;
    for cluster in partition {
        let members: FxHashSet<u32> = cluster.iter().copied().collect();
        let mut captured = false;
        for trajectory in trajectories.iter_mut() {
            if trajectory.cluster.is_some() {
                continue;
            }
            let misses = trajectory
                .diagnoses
                .iter()
                .filter(|d| !members.contains(d))
                .count();
            if misses <= max_missing {
                trajectory.cluster = Some(next_cluster);
                captured = true;
            }
        }
        if captured {
            next_cluster += 1;
        }
    }
    for trajectory in trajectories.iter_mut() {
        if trajectory.cluster.is_none() {
            trajectory.cluster = Some(next_cluster);
            next_cluster += 1;
        }
    }
    next_cluster
}

fn trajectories_of_cluster(exp: &Experiment, cluster: usize) -> Vec<&Trajectory> {
    exp.trajectories
        .iter()
        .filter(|t| t.cluster == Some(cluster))
        .collect()
}

/// Write one GML subgraph per cluster, containing the trajectories
/// assigned to it.
pub fn write_cluster_trajectory_graphs(
    exp: &Experiment,
    n_clusters: usize,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let n = exp.n_codes;
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for cluster in 0..n_clusters {
        let members = trajectories_of_cluster(exp, cluster);
        if members.is_empty() {
            continue;
        }
        writeln!(out, "graph [\n directed 1\nmultigraph 1").with_path(path)?;
        let mut node_printed = FxHashSet::default();
        for trajectory in &members {
            for &node in &trajectory.diagnoses {
                if node_printed.insert(node) {
                    writeln!(out, "node [ id {node}\nlabel \"{}\"\n]", exp.name_of(node))
                        .with_path(path)?;
                }
            }
        }
        let mut edge_counts: Vec<Vec<usize>> = vec![Vec::new(); n * n];
        for trajectory in &members {
            for (i, window) in trajectory.diagnoses.windows(2).enumerate() {
                let cell = window[0] as usize * n + window[1] as usize;
                let count = trajectory.transition_counts[i];
                if !edge_counts[cell].contains(&count) {
                    edge_counts[cell].push(count);
                    writeln!(
                        out,
                        "edge [\nsource {}\ntarget {}\nlabel {count}\n]",
                        window[0], window[1]
                    )
                    .with_path(path)?;
                }
            }
        }
        writeln!(out, "]").with_path(path)?;
    }
    out.flush().with_path(path)
}

/// Write one GML subgraph per partition cluster over the diagnosis codes,
/// with an edge wherever a selected pair connects two cluster members.
pub fn write_cluster_diagnosis_graphs(
    exp: &Experiment,
    partition: &[Vec<u32>],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let selected: FxHashSet<(u32, u32)> = exp
        .pairs
        .iter()
        .map(|pair| (pair.first, pair.second))
        .collect();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for cluster in partition {
        writeln!(out, "graph [\n directed 1\nmultigraph 1").with_path(path)?;
        for &code in cluster {
            writeln!(out, "node [ id {code}\nlabel \"{}\"\n]", exp.name_of(code))
                .with_path(path)?;
        }
        for &d1 in cluster {
            for &d2 in cluster {
                if selected.contains(&(d1, d2)) {
                    writeln!(out, "edge [\nsource {d1}\ntarget {d2}\n]").with_path(path)?;
                }
            }
        }
        writeln!(out, "]").with_path(path)?;
    }
    out.flush().with_path(path)
}

/// Write the clustered-trajectory tab file: per cluster a metrics header,
/// then each member trajectory as an id line, a name line and a count line.
pub fn write_clustered_trajectories_tab(
    exp: &Experiment,
    n_clusters: usize,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for cluster in 0..n_clusters {
        let members = trajectories_of_cluster(exp, cluster);
        let metrics = metrics_for(&members);
        writeln!(
            out,
            "CID:\t{cluster}\tMean Age:\t{:.2}\tStdev:\t{:.2}\tMean Age EOI:\t{:.2}\tStdev:\t{:.2}\tMales:\t{}\tFemales:\t{}\tTrajectories:\t{}",
            metrics.mean_age,
            metrics.stdev_age,
            metrics.mean_age_eoi,
            metrics.stdev_age_eoi,
            metrics.males,
            metrics.females,
            members.len()
        )
        .with_path(path)?;
        for trajectory in members {
            writeln!(out, "CID:\t{cluster}\tTID:\t{}", trajectory.id).with_path(path)?;
            write_trajectory_lines(&mut out, trajectory, exp, path)?;
        }
    }
    out.flush().with_path(path)
}

/// Write the per-patient and per-assignment CSV exports.
pub fn write_cluster_csvs(
    exp: &Experiment,
    patients_path: impl AsRef<Path>,
    clusters_path: impl AsRef<Path>,
) -> Result<()> {
    let patients_path = patients_path.as_ref();
    let mut out = BufWriter::new(File::create(patients_path).with_path(patients_path)?);
    writeln!(out, "PID,AgeEOI,Sex,PIDString").with_path(patients_path)?;
    let mut seen = FxHashSet::default();
    for trajectory in &exp.trajectories {
        for patient in trajectory.final_patients() {
            if !seen.insert(patient.pid) {
                continue;
            }
            let age_eoi = patient.age_at_event_of_interest().unwrap_or(-1);
            let sex = match patient.sex {
                crate::models::Sex::Male => "M",
                crate::models::Sex::Female => "F",
            };
            writeln!(out, "{},{},{},{}", patient.pid, age_eoi, sex, patient.source_id)
                .with_path(patients_path)?;
        }
    }
    out.flush().with_path(patients_path)?;

    let clusters_path = clusters_path.as_ref();
    let mut out = BufWriter::new(File::create(clusters_path).with_path(clusters_path)?);
    writeln!(out, "PID,CID,TID,Age").with_path(clusters_path)?;
    for trajectory in &exp.trajectories {
        let cid = trajectory.cluster.unwrap_or_default();
        let last = trajectory.last_diagnosis();
        for patient in trajectory.final_patients() {
            let age = patient.age_at_first(last).unwrap_or(-1);
            writeln!(out, "{},{cid},{},{age}", patient.pid, trajectory.id)
                .with_path(clusters_path)?;
        }
    }
    out.flush().with_path(clusters_path)
}

/// Run the full clustering stage: emit the edge list, invoke the external
/// clusterer per granularity, pull each partition back onto the
/// trajectories and write the per-granularity outputs.
pub fn cluster_trajectories(
    exp: &mut Experiment,
    granularities: &[usize],
    output_dir: impl AsRef<Path>,
    clusterer: &dyn GraphClusterer,
) -> Result<()> {
    let work_dir: PathBuf = output_dir
        .as_ref()
        .join(format!("{}-clusters", exp.name));
    fs::create_dir_all(&work_dir).with_path(&work_dir)?;
    let edges = jaccard_edges(exp);
    info!(
        "Clustering {} trajectories over {} weighted pair edges",
        exp.trajectories.len(),
        edges.len()
    );
    let edges_path = work_dir.join(format!("{}.abc", exp.name));
    write_edge_list(&edges, &edges_path)?;
    for &granularity in granularities {
        let partition = clusterer.cluster(&edges_path, granularity, &work_dir)?;
        let n_clusters =
            assign_clusters(&mut exp.trajectories, &partition, MAX_MISSING_DIAGNOSES);
        info!(
            "Granularity {granularity}: {} clusters over {} trajectories",
            n_clusters,
            exp.trajectories.len()
        );
        let base = format!("{}.I{granularity}", exp.name);
        write_cluster_trajectory_graphs(
            exp,
            n_clusters,
            work_dir.join(format!("{base}.trajectories.gml")),
        )?;
        write_cluster_diagnosis_graphs(exp, &partition, work_dir.join(format!("{base}.gml")))?;
        write_clustered_trajectories_tab(
            exp,
            n_clusters,
            work_dir.join(format!("{base}.clustered-trajectories.tab")),
        )?;
        write_cluster_csvs(
            exp,
            work_dir.join(format!("{base}.patients.csv")),
            work_dir.join(format!("{base}.clusters.csv")),
        )?;
    }
    Ok(())
}
