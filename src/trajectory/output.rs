//! Human-readable and graph-format output of trajectories and pairs.
//!
//! Tab files hold two lines per trajectory (medical names, then transition
//! patient counts) or one line per pair (names and RR). Graph files use a
//! minimal GML dialect with directed multigraph headers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::{IoResultExt, Result};
use crate::experiment::Experiment;
use crate::trajectory::Trajectory;

/// Render a trajectory as `name1 -- n --> name2 -- m --> name3` for logs.
#[must_use]
pub fn format_trajectory(trajectory: &Trajectory, exp: &Experiment) -> String {
    let mut line = String::new();
    for (i, &did) in trajectory.diagnoses.iter().enumerate() {
        line.push_str(exp.name_of(did));
        if i < trajectory.transition_counts.len() {
            line.push_str(&format!(" -- {} --> ", trajectory.transition_counts[i]));
        }
    }
    line
}

/// Write the two-line-per-trajectory tab file.
pub fn write_trajectories_tab(exp: &Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for trajectory in &exp.trajectories {
        write_trajectory_lines(&mut out, trajectory, exp, path)?;
    }
    out.flush().with_path(path)
}

/// Write the name line and the count line of one trajectory.
pub(crate) fn write_trajectory_lines(
    out: &mut impl Write,
    trajectory: &Trajectory,
    exp: &Experiment,
    path: &Path,
) -> Result<()> {
    let names: Vec<&str> = trajectory
        .diagnoses
        .iter()
        .map(|&d| exp.name_of(d))
        .collect();
    writeln!(out, "{}", names.join("\t")).with_path(path)?;
    let counts: Vec<String> = trajectory
        .transition_counts
        .iter()
        .map(ToString::to_string)
        .collect();
    writeln!(out, "{}", counts.join("\t")).with_path(path)
}

/// Write the selected pairs with their RR scores.
pub fn write_pairs_tab(exp: &Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    for pair in &exp.pairs {
        writeln!(
            out,
            "{}\t{}\t{:E}",
            exp.name_of(pair.first),
            exp.name_of(pair.second),
            exp.risk.rr(pair.first, pair.second)
        )
        .with_path(path)?;
    }
    out.flush().with_path(path)
}

/// Write all trajectories as one merged GML graph. Parallel transitions
/// with distinct patient counts become one edge labeled with the count
/// list.
pub fn write_merged_graph(exp: &Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let n = exp.n_codes;
    let mut nodes: Vec<u32> = Vec::new();
    let mut edge_counts: Vec<Vec<usize>> = vec![Vec::new(); n * n];
    for trajectory in &exp.trajectories {
        for &d in &trajectory.diagnoses {
            if !nodes.contains(&d) {
                nodes.push(d);
            }
        }
        for (i, window) in trajectory.diagnoses.windows(2).enumerate() {
            let cell = window[0] as usize * n + window[1] as usize;
            let count = trajectory.transition_counts[i];
            if !edge_counts[cell].contains(&count) {
                edge_counts[cell].push(count);
            }
        }
    }
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    writeln!(out, "graph [\n directed 1\nmultigraph 1").with_path(path)?;
    for &node in &nodes {
        writeln!(out, "node [ id {node}\nlabel \"{}\"\n]", exp.name_of(node)).with_path(path)?;
    }
    for (cell, counts) in edge_counts.iter().enumerate() {
        if counts.is_empty() {
            continue;
        }
        let labels: Vec<String> = counts.iter().map(ToString::to_string).collect();
        writeln!(
            out,
            "edge [\nsource {}\ntarget {}\nlabel \"{}\"\n]",
            cell / n,
            cell % n,
            labels.join(",")
        )
        .with_path(path)?;
    }
    writeln!(out, "]").with_path(path)?;
    out.flush().with_path(path)
}

/// Write every trajectory as its own GML subgraph in a single file.
pub fn write_individual_graphs(exp: &Experiment, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path).with_path(path)?);
    let mut node_ctr = 0usize;
    for trajectory in &exp.trajectories {
        writeln!(out, "graph [\n directed 1\nmultigraph 1").with_path(path)?;
        for &d in &trajectory.diagnoses {
            writeln!(out, "node [ id {node_ctr}\nlabel \"{}\"\n]", exp.name_of(d))
                .with_path(path)?;
            node_ctr += 1;
        }
        let first_node = node_ctr - trajectory.diagnoses.len();
        for (i, count) in trajectory.transition_counts.iter().enumerate() {
            writeln!(
                out,
                "edge [\nsource {}\ntarget {}\nlabel {count}\n]",
                first_node + i,
                first_node + i + 1
            )
            .with_path(path)?;
        }
        writeln!(out, "]").with_path(path)?;
    }
    out.flush().with_path(path)
}

/// Write the standard trajectory outputs into `dir`, named after the
/// experiment.
pub fn write_trajectory_outputs(exp: &Experiment, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    write_trajectories_tab(exp, dir.join(format!("{}-trajectories.tab", exp.name)))?;
    write_pairs_tab(exp, dir.join(format!("{}-pairs.tab", exp.name)))?;
    write_merged_graph(
        exp,
        dir.join(format!("{}-trajectories-merged-graph.gml", exp.name)),
    )?;
    write_individual_graphs(
        exp,
        dir.join(format!("{}-trajectories-individual-graphs.gml", exp.name)),
    )?;
    info!(
        "Wrote {} trajectories and {} pairs to {}",
        exp.trajectories.len(),
        exp.pairs.len(),
        dir.display()
    );
    Ok(())
}
