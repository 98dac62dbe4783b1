use crate::branch::Branch;
use crate::grid::Grid;
use crate::node::Node;
use crate::solution::{Solution, VoltageViolation};

use anyhow::{format_err, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Network description as read from a case file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

impl Network {
    pub fn into_grid(self) -> Result<Grid> {
        Grid::new(self.nodes, self.branches)
    }
}

/// Solve outcome written to a results file. Nodes are listed by id.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub success: bool,
    pub converged: bool,
    pub iterations: usize,
    pub summary: &'a str,
    pub violations: &'a [VoltageViolation],
    pub nodes: Vec<&'a Node>,
    pub branches: &'a [Branch],
}

impl<'a> Report<'a> {
    pub fn new(solution: &'a Solution) -> Self {
        let mut nodes: Vec<&Node> = solution.nodes().iter().collect();
        nodes.sort_by_key(|n| n.id);
        Self {
            success: solution.success(),
            converged: solution.converged(),
            iterations: solution.iterations(),
            summary: solution.summary(),
            violations: solution.violations(),
            nodes,
            branches: solution.branches(),
        }
    }
}

pub fn read_network(reader: impl std::io::Read) -> Result<Network> {
    serde_json::from_reader(reader).map_err(|err| format_err!("invalid network: {}", err))
}

pub fn load_network(path: &Path) -> Result<Network> {
    let file = File::open(path)
        .map_err(|err| format_err!("cannot open {}: {}", path.display(), err))?;
    read_network(BufReader::new(file))
}

pub fn write_report(writer: impl Write, solution: &Solution) -> Result<()> {
    let mut writer = writer;
    serde_json::to_writer_pretty(&mut writer, &Report::new(solution))?;
    writeln!(writer)?;
    Ok(())
}

pub fn save_report(path: &Path, solution: &Solution) -> Result<()> {
    let file = File::create(path)
        .map_err(|err| format_err!("cannot create {}: {}", path.display(), err))?;
    let mut writer = BufWriter::new(file);
    write_report(&mut writer, solution)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlState;
    use crate::lu::DenseLU;
    use crate::newton::newtonpf;
    use crate::node::NodeType;
    use crate::options::CalculationOptions;

    const CASE: &str = r#"{
        "nodes": [
            {"id": 1, "node_type": "Slack", "nominal_voltage": [1.0, 0.0]},
            {"id": 2, "node_type": "PQ", "nominal_voltage": [1.0, 0.0],
             "load": [0.5, 0.2]},
            {"id": 3, "node_type": "PV", "nominal_voltage": [1.0, 0.0],
             "preset_magnitude": 1.01, "generation": [0.3, 0.0],
             "q_min": -1.0, "q_max": 1.0}
        ],
        "branches": [
            {"from_id": 1, "to_id": 2, "series_admittance": [3.0, -9.0]},
            {"from_id": 2, "to_id": 3, "series_admittance": [3.0, -9.0],
             "shunt_admittance": [0.0, 0.02]}
        ]
    }"#;

    #[test]
    fn network_from_json() -> Result<()> {
        let net = read_network(CASE.as_bytes())?;
        assert_eq!(net.nodes.len(), 3);
        assert_eq!(net.nodes[2].node_type, NodeType::PV);
        assert_eq!(net.nodes[2].q_max, Some(1.0));
        assert_eq!(net.nodes[1].control, ControlState::Pq);
        assert_eq!(net.branches[0].tap_ratio, crate::cmplx!(1.0));
        assert!(!net.branches[1].is_transformer());
        Ok(())
    }

    #[test]
    fn report_lists_nodes_by_id() -> Result<()> {
        let grid = read_network(CASE.as_bytes())?.into_grid()?;
        let sol = newtonpf(grid, &CalculationOptions::default(), &DenseLU, None)?;
        assert!(sol.success());

        let mut out = Vec::new();
        write_report(&mut out, &sol)?;
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(value["success"], serde_json::Value::Bool(true));
        let ids: Vec<u64> = value["nodes"]
            .as_array()
            .ok_or_else(|| format_err!("nodes is not an array"))?
            .iter()
            .filter_map(|n| n["id"].as_u64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn malformed_case_is_an_error() {
        assert!(read_network(r#"{"nodes": [{"id": 1}]}"#.as_bytes()).is_err());
    }
}
