//! Visualizer
//!
//! This module records the progress of a trial as a sequence of JSON snapshots: the lattice, the syndrome history,
//! the decoding graphs and their matchings
//!

use crate::chrono::Local;
use crate::decoding_graph::DecodingGraph;
use crate::lattice::PlanarLattice;
use crate::mwpm_solver::Matching;
use crate::serde::{Deserialize, Serialize};
use crate::serde_json;
use crate::syndrome::SyndromeHistory;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

pub trait PlanarVisualizer {
    /// take a snapshot, set `abbrev` to true to save space
    fn snapshot(&self, abbrev: bool) -> serde_json::Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizePosition {
    /// vertical axis, -i is up, +i is down (left-up corner is smallest i,j)
    pub i: f64,
    /// horizontal axis, -j is left, +j is right (left-up corner is smallest i,j)
    pub j: f64,
    /// time axis, measurement rounds
    pub t: f64,
}

impl VisualizePosition {
    /// create a visualization position
    pub fn new(i: f64, j: f64, t: f64) -> Self {
        Self { i, j, t }
    }
}

#[derive(Debug)]
pub struct Visualizer {
    /// save to file if applicable
    file: Option<File>,
    /// basic snapshot
    base: serde_json::Value,
    /// positions of the graph nodes
    positions: Vec<VisualizePosition>,
    /// all snapshots
    snapshots: Vec<(String, serde_json::Value)>,
}

pub type ObjectMap = serde_json::Map<String, serde_json::Value>;

/// move every field of `obj_2` into `obj`; a key present in both must carry the same value
pub fn snapshot_copy_remaining_fields(obj: &mut ObjectMap, obj_2: &mut ObjectMap) {
    let keys: Vec<String> = obj_2.keys().cloned().collect();
    for key in keys.iter() {
        if let Some(value) = obj_2.remove(key) {
            match obj.get(key) {
                None => {
                    obj.insert(key.to_string(), value);
                }
                Some(existing) => {
                    assert_eq!(existing, &value, "cannot combine different values of `{key}`");
                }
            }
        }
    }
}

pub fn snapshot_combine_values(value: &mut serde_json::Value, mut value_2: serde_json::Value) {
    let value = value.as_object_mut().expect("snapshot must be an object");
    let value_2 = value_2.as_object_mut().expect("snapshot must be an object");
    snapshot_copy_remaining_fields(value, value_2);
}

impl Visualizer {
    /// create a new visualizer with target filename
    pub fn new(mut filename: Option<String>) -> std::io::Result<Self> {
        if cfg!(feature = "disable_visualizer") {
            filename = None; // do not open file
        }
        let file = match filename {
            Some(filename) => Some(File::create(filename)?),
            None => None,
        };
        Ok(Self {
            file,
            base: json!({}),
            positions: Vec::new(),
            snapshots: Vec::new(),
        })
    }

    pub fn set_base(&mut self, base: serde_json::Value) {
        self.base = base;
    }

    pub fn snapshot_num(&self) -> usize {
        self.snapshots.len()
    }

    /// append a snapshot of several components, and also update the file in case the run is interrupted
    pub fn snapshot_combined(&mut self, name: String, components: Vec<&dyn PlanarVisualizer>) -> std::io::Result<()> {
        if cfg!(feature = "disable_visualizer") {
            return Ok(());
        }
        let abbrev = true;
        let mut value = json!({});
        for component in components.iter() {
            snapshot_combine_values(&mut value, component.snapshot(abbrev));
        }
        self.snapshots.push((name, value));
        self.save()
    }

    /// append a snapshot of one component
    pub fn snapshot(&mut self, name: String, component: &impl PlanarVisualizer) -> std::io::Result<()> {
        if cfg!(feature = "disable_visualizer") {
            return Ok(());
        }
        let value = component.snapshot(true);
        self.snapshots.push((name, value));
        self.save()
    }

    /// save to file
    pub fn save(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?; // truncate the file
            file.seek(SeekFrom::Start(0))?; // move the cursor to the front
            file.write_all(
                json!({
                    "base": &self.base,
                    "snapshots": &self.snapshots,
                    "positions": &self.positions,
                })
                .to_string()
                .as_bytes(),
            )?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// set positions of the nodes and optionally center all positions
    pub fn set_positions(&mut self, mut positions: Vec<VisualizePosition>, center: bool) {
        if center && !positions.is_empty() {
            let (mut ci, mut cj, mut ct) = (0., 0., 0.);
            for position in positions.iter() {
                ci += position.i;
                cj += position.j;
                ct += position.t;
            }
            ci /= positions.len() as f64;
            cj /= positions.len() as f64;
            ct /= positions.len() as f64;
            for position in positions.iter_mut() {
                position.i -= ci;
                position.j -= cj;
                position.t -= ct;
            }
        }
        self.positions = positions;
    }
}

const DEFAULT_VISUALIZE_DATA_FOLDER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/visualize/data/");

pub fn visualize_data_folder() -> String {
    DEFAULT_VISUALIZE_DATA_FOLDER.to_string()
}

pub fn static_visualize_data_filename() -> String {
    "static.json".to_string()
}

pub fn auto_visualize_data_filename() -> String {
    format!("{}.json", Local::now().format("%Y%m%d-%H-%M-%S%.3f"))
}

impl PlanarVisualizer for PlanarLattice {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        if abbrev {
            // qubits as `[x, z]`, stabilizers as their sign
            let cells: Vec<Vec<serde_json::Value>> = (0..self.width as isize)
                .map(|r| {
                    (0..self.width as isize)
                        .map(|c| match self.cell((r, c)) {
                            crate::lattice::Cell::Qubit { x, z } => json!([x, z]),
                            crate::lattice::Cell::Stabilizer(value) => json!(value),
                        })
                        .collect()
                })
                .collect();
            json!({ "d": self.size, "cells": cells, "logical": self.measure_logical() })
        } else {
            json!({
                "size": self.size,
                "lattice": self.snapshot(),
                "logical": self.measure_logical(),
            })
        }
    }
}

impl PlanarVisualizer for SyndromeHistory {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        let anyons = self.find_anyons();
        let encode = |rounds: &[Vec<crate::util::Anyon>]| -> serde_json::Value {
            rounds
                .iter()
                .flatten()
                .map(|anyon| json!([anyon.t, anyon.i, anyon.j]))
                .collect()
        };
        json!({
            if abbrev { "T" } else { "time" }: self.time(),
            if abbrev { "as" } else { "star_anyons" }: encode(&anyons.stars),
            if abbrev { "ap" } else { "plaquette_anyons" }: encode(&anyons.plaquettes),
        })
    }
}

impl PlanarVisualizer for DecodingGraph {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        let mut vertices = Vec::<serde_json::Value>::new();
        for (node_index, anyon) in self.positions.iter().enumerate() {
            vertices.push(json!({
                if abbrev { "v" } else { "is_virtual" }: i32::from(self.is_mirror(node_index)),
                "t": anyon.t,
                "i": anyon.i,
                "j": anyon.j,
            }));
        }
        let mut edges = Vec::<serde_json::Value>::new();
        for &(left, right, weight) in self.weighted_edges.iter() {
            edges.push(json!({
                if abbrev { "w" } else { "weight" }: weight,
                if abbrev { "l" } else { "left" }: left,
                if abbrev { "r" } else { "right" }: right,
            }));
        }
        json!({
            "stabilizer_type": self.stabilizer_type,
            "vertices": vertices,
            "edges": edges,
        })
    }
}

impl PlanarVisualizer for Matching {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        let pairs: Vec<(usize, usize)> = self.pairs().collect();
        json!({
            if abbrev { "m" } else { "matching" }: pairs,
        })
    }
}

/// node positions of a decoding graph for the 3D view
pub fn graph_positions(graph: &DecodingGraph) -> Vec<VisualizePosition> {
    graph
        .positions
        .iter()
        .map(|anyon| VisualizePosition::new(anyon.i as f64, anyon.j as f64, anyon.t as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding_graph::{DecodingGraphBuilder, DecodingWeights};
    use crate::lattice::{Channel, StabilizerType};
    use crate::mwpm_solver::{MatchingSolver, SolverSerial};
    use crate::util::*;

    #[test]
    fn visualize_in_memory() {
        // cargo test visualize_in_memory -- --nocapture
        let mut visualizer = Visualizer::new(None).unwrap();
        let mut lattice = PlanarLattice::new(3).unwrap();
        lattice.multiply_qubit((2, 2), Channel::Z, -1);
        visualizer.snapshot("lattice".to_string(), &lattice).unwrap();
        let builder = DecodingGraphBuilder::new(3, StabilizerType::Star, DecodingWeights::default()).unwrap();
        let graph = builder.build(&[vec![Anyon::new(0, 2, 1), Anyon::new(0, 2, 3)]]).unwrap();
        let matching = SolverSerial::new().solve_graph(&graph).unwrap();
        visualizer.set_positions(graph_positions(&graph), true);
        visualizer
            .snapshot_combined("matched".to_string(), vec![&graph, &matching])
            .unwrap();
        if cfg!(feature = "disable_visualizer") {
            assert_eq!(visualizer.snapshot_num(), 0);
        } else {
            assert_eq!(visualizer.snapshot_num(), 2);
            let (_, value) = &visualizer.snapshots[1];
            assert_eq!(value["vertices"].as_array().unwrap().len(), 4);
            assert_eq!(value["m"], json!([[0, 1], [2, 3]]));
            assert_eq!(value["vertices"][2]["v"], json!(1));
        }
        // positions are centered around the mean of (2, 1), (2, 3), (2, -1), (2, 7)
        assert_eq!(visualizer.positions[0].j, -1.5);
    }

    #[test]
    fn visualize_combine_conflict_free() {
        // cargo test visualize_combine_conflict_free -- --nocapture
        let mut value = json!({"a": 1, "b": [1, 2]});
        snapshot_combine_values(&mut value, json!({"b": [1, 2], "c": "x"}));
        assert_eq!(value, json!({"a": 1, "b": [1, 2], "c": "x"}));
    }

    #[test]
    #[should_panic]
    fn visualize_combine_conflict() {
        // cargo test visualize_combine_conflict -- --nocapture
        let mut value = json!({"a": 1});
        snapshot_combine_values(&mut value, json!({"a": 2}));
    }

    #[test]
    fn visualize_history_snapshot() {
        // cargo test visualize_history_snapshot -- --nocapture
        let mut history = SyndromeHistory::new(2).unwrap();
        history.add_layers(&[1, -1, 1, 1, 1, 1], &[1; 6]).unwrap();
        let value = history.snapshot(false);
        assert_eq!(value["time"], json!(1));
        assert_eq!(value["star_anyons"], json!([[0, 0, 3]]));
        assert_eq!(value["plaquette_anyons"], json!([]));
        let lattice = PlanarLattice::new(2).unwrap();
        let value = PlanarVisualizer::snapshot(&lattice, true);
        assert_eq!(value["cells"][0][0], json!([1, 1]));
        assert_eq!(value["logical"], json!([1, 1]));
    }
}
