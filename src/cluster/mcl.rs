//! External Markov-clustering (MCL) integration.
//!
//! Drives the three-tool MCL pipeline: `mcxload` turns the edge list into
//! a native matrix plus a node tab, `mcl` clusters it at the requested
//! inflation, and `mcxdump` renders one cluster per line of tab-separated
//! node ids. Any non-zero exit is fatal and carries the tool's stderr.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::cluster::GraphClusterer;
use crate::error::{IoResultExt, Result, TrajanError};

/// Clusterer backed by the MCL tool suite.
#[derive(Debug, Clone)]
pub struct MclClusterer {
    /// Directory holding the `mcxload`, `mcl` and `mcxdump` binaries.
    mcl_dir: PathBuf,
}

impl MclClusterer {
    /// Create a clusterer for MCL binaries found in `mcl_dir`.
    #[must_use]
    pub fn new(mcl_dir: impl Into<PathBuf>) -> Self {
        Self {
            mcl_dir: mcl_dir.into(),
        }
    }

    fn tool(&self, name: &str) -> PathBuf {
        self.mcl_dir.join(name)
    }
}

/// Run a command to completion, failing on spawn errors and non-zero exit.
fn run(mut command: Command) -> Result<()> {
    debug!("Running {command:?}");
    let output = command
        .output()
        .map_err(|e| TrajanError::External(format!("{:?}: {e}", command.get_program())))?;
    if !output.status.success() {
        return Err(TrajanError::External(format!(
            "{:?} exited with {}: {}",
            command.get_program(),
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

impl GraphClusterer for MclClusterer {
    fn cluster(&self, edges: &Path, granularity: usize, work_dir: &Path) -> Result<Vec<Vec<u32>>> {
        let tab_path = work_dir.join("graph.tab");
        let mci_path = work_dir.join("graph.mci");
        let mut load = Command::new(self.tool("mcxload"));
        load.arg("-abc")
            .arg(edges)
            .arg("--stream-mirror")
            .arg("-write-tab")
            .arg(&tab_path)
            .arg("-o")
            .arg(&mci_path);
        run(load)?;

        // mcl names its result out.<input>.I<inflation*10> in the working
        // directory
        let mut mcl = Command::new(self.tool("mcl"));
        mcl.current_dir(work_dir)
            .arg(&mci_path)
            .arg("-I")
            .arg(format!("{:.1}", granularity as f64 / 10.0));
        run(mcl)?;
        let clusters_path = work_dir.join(format!("out.graph.mci.I{granularity}"));

        let dump_path = work_dir.join(format!("dump.graph.mci.I{granularity}"));
        let mut dump = Command::new(self.tool("mcxdump"));
        dump.arg("-icl")
            .arg(&clusters_path)
            .arg("-tabr")
            .arg(&tab_path)
            .arg("-o")
            .arg(&dump_path);
        run(dump)?;

        let partition = parse_partition(&dump_path)?;
        info!(
            "MCL granularity {granularity} produced {} clusters",
            partition.len()
        );
        Ok(partition)
    }
}

/// Parse a dumped clustering: one cluster per line, tab-separated node ids.
pub fn parse_partition(path: &Path) -> Result<Vec<Vec<u32>>> {
    let reader = BufReader::new(File::open(path).with_path(path)?);
    let mut partition = Vec::new();
    for line in reader.lines() {
        let line = line.with_path(path)?;
        let mut cluster = Vec::new();
        for field in line.split('\t').filter(|f| !f.is_empty()) {
            let node: u32 = field.trim().parse().map_err(|_| {
                TrajanError::External(format!("unparseable node id in cluster dump: {field}"))
            })?;
            cluster.push(node);
        }
        if !cluster.is_empty() {
            partition.push(cluster);
        }
    }
    Ok(partition)
}
