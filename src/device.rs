/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The device routing-resource graph: an immutable directed multigraph of
//! routing nodes, loaded once from a text file and never mutated again.
//! Per-node routing scratch (occupancy, costs, search state) lives
//! separately in [`crate::routing::RoutingState`] so this module stays a
//! pure, shareable topology.

use crate::common::split_range_nicely;
use crate::errors::RouterError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Number of worker threads used to parse node and edge lines. Each
/// worker touches a disjoint, pre-sized slice of the node array, so no
/// cross-thread resize can race (see the device-graph loader note in
/// the design doc's concurrency section).
const PARSE_THREADS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentCode {
    Local,
    Pinfeed,
    Vlong,
    Hquad,
    IntentDefault,
    Hlong,
    Pinbounce,
    Single,
    Vquad,
    IntInterface,
    Double,
    CleOutput,
}

impl FromStr for IntentCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use IntentCode::*;
        Ok(match s {
            "LOCAL" => Local,
            "PINFEED" => Pinfeed,
            "VLONG" => Vlong,
            "HQUAD" => Hquad,
            "INTENT_DEFAULT" => IntentDefault,
            "HLONG" => Hlong,
            "PINBOUNCE" => Pinbounce,
            "SINGLE" => Single,
            "VQUAD" => Vquad,
            "INT_INTERFACE" => IntInterface,
            "DOUBLE" => Double,
            "CLE_OUTPUT" => CleOutput,
            other => return Err(format!("unknown intent code \"{other}\"")),
        })
    }
}

/// Promoted from `Wire`/`Pinbounce` once a node is found to be a net
/// source (`PinfeedO`) or a connection sink (`PinfeedI`); see
/// `crate::netlist::Netlist::build_connections`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Wire,
    Pinbounce,
    PinfeedI,
    PinfeedO,
}

/// A single routing-resource node. Static geometry and intent are fixed
/// at load time; `base_cost`, `accessible` and the initial `node_type`
/// are pure derived functions of that static data and never recomputed.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub intent_code: IntentCode,
    pub length: i32,
    pub begin_x: i32,
    pub begin_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub base_cost: f64,
    pub accessible: bool,
    pub node_type: NodeType,
    pub children: Vec<usize>,
}

impl Node {
    fn new(
        id: usize,
        intent_code: IntentCode,
        length: i32,
        begin_x: i32,
        begin_y: i32,
        end_x: i32,
        end_y: i32,
    ) -> Self {
        let (base_cost, accessible) = compute_base_cost(intent_code, length, begin_x, end_x);
        let node_type = if intent_code == IntentCode::Pinbounce {
            NodeType::Pinbounce
        } else {
            NodeType::Wire
        };
        Node {
            id,
            intent_code,
            length,
            begin_x,
            begin_y,
            end_x,
            end_y,
            base_cost,
            accessible,
            node_type,
            children: Vec::new(),
        }
    }

    fn placeholder(id: usize) -> Self {
        Node::new(id, IntentCode::Local, 0, 0, 0, 0, 0)
    }
}

/// Pure function of `(intent, length, begin_x, end_x)`; recomputing it
/// always yields the same value (a testable property in the design doc).
fn compute_base_cost(intent: IntentCode, length: i32, begin_x: i32, end_x: i32) -> (f64, bool) {
    use IntentCode::*;
    let mut accessible = true;
    let base_cost = match intent {
        Local | CleOutput | IntentDefault | Pinfeed | Pinbounce | IntInterface => 0.4,
        Single => {
            assert!(length <= 2, "NODE_SINGLE length {length} out of bounds");
            if length == 2 {
                0.8
            } else {
                0.4
            }
        }
        Double => {
            if end_x != begin_x {
                assert!(length <= 2, "NODE_DOUBLE (horizontal) length {length} out of bounds");
                if length == 2 {
                    0.8
                } else {
                    0.4
                }
            } else {
                assert!(length <= 3, "NODE_DOUBLE (vertical) length {length} out of bounds");
                0.4
            }
        }
        Hquad => {
            if length == 0 {
                accessible = false;
                0.4
            } else {
                0.35 * length as f64
            }
        }
        Vquad => {
            if length == 0 {
                0.4
            } else {
                0.15 * length as f64
            }
        }
        Hlong => {
            if length == 0 {
                accessible = false;
                0.4
            } else {
                0.15 * length as f64
            }
        }
        Vlong => 0.7 * length as f64,
    };
    (base_cost, accessible)
}

/// The immutable device routing-resource graph.
pub struct Device {
    pub nodes: Vec<Node>,
}

impl Device {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Device, RouterError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RouterError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        dbg_log!(crate::log::DBG_INFO, "Device file: {}", path.display());
        Self::parse(BufReader::new(file), path.to_path_buf())
    }

    pub(crate) fn parse<R: BufRead>(mut reader: R, path: PathBuf) -> Result<Device, RouterError> {
        let malformed = |message: String| RouterError::Malformed {
            path: path.clone(),
            message,
        };

        let mut header = String::new();
        reader
            .read_line(&mut header)
            .map_err(|source| RouterError::Open { path: path.clone(), source })?;
        let num_nodes: usize = header
            .trim()
            .parse()
            .map_err(|_| malformed(format!("expected node count, got \"{}\"", header.trim())))?;
        dbg_log!(crate::log::DBG_INFO, "#nodes: {}", num_nodes);

        let mut node_lines = Vec::with_capacity(num_nodes);
        for _ in 0..num_nodes {
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .map_err(|source| RouterError::Open { path: path.clone(), source })?;
            node_lines.push(line);
        }

        let mut nodes: Vec<Node> = (0..num_nodes).map(Node::placeholder).collect();
        dbg_log!(crate::log::DBG_INFO, "Start reading node lines.");
        parse_nodes_parallel(&node_lines, &mut nodes)?;
        dbg_log!(crate::log::DBG_INFO, "Finish reading nodes.");

        // separator line between the node and edge sections
        let mut sep = String::new();
        reader
            .read_line(&mut sep)
            .map_err(|source| RouterError::Open { path: path.clone(), source })?;

        let mut edge_lines = Vec::with_capacity(num_nodes);
        for _ in 0..num_nodes {
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .map_err(|source| RouterError::Open { path: path.clone(), source })?;
            edge_lines.push(line);
        }

        dbg_log!(crate::log::DBG_INFO, "Start reading edge lines.");
        parse_edges_parallel(&edge_lines, &mut nodes)?;
        dbg_log!(crate::log::DBG_INFO, "Finish reading edges.");

        Ok(Device { nodes })
    }
}

fn parse_nodes_parallel(lines: &[String], nodes: &mut [Node]) -> Result<(), RouterError> {
    let num_nodes = nodes.len();
    let thread_count = PARSE_THREADS.min(num_nodes.max(1));
    let errors: Vec<RouterError> = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        let mut rest = nodes;
        let mut start = 0;
        for range in split_range_nicely(0..num_nodes, thread_count) {
            let len = range.end - range.start;
            let (chunk, remainder) = rest.split_at_mut(len);
            rest = remainder;
            let chunk_lines = &lines[range.clone()];
            let base = start;
            start += len;
            handles.push(scope.spawn(move || -> Option<RouterError> {
                for (offset, line) in chunk_lines.iter().enumerate() {
                    match parse_node_line(base + offset, line) {
                        Ok(node) => chunk[offset] = node,
                        Err(e) => return Some(e),
                    }
                }
                None
            }));
        }
        handles
            .into_iter()
            .filter_map(|h| h.join().expect("node-parsing worker panicked"))
            .collect()
    });
    if let Some(e) = errors.into_iter().next() {
        return Err(e);
    }
    Ok(())
}

fn parse_node_line(expected_id: usize, line: &str) -> Result<Node, RouterError> {
    let mut parts = line.split_whitespace();
    let bad = |msg: &str| RouterError::Malformed {
        path: PathBuf::from("<device file>"),
        message: format!("node line {expected_id}: {msg}"),
    };
    let id: usize = parts.next().ok_or_else(|| bad("missing id"))?.parse().map_err(|_| bad("bad id"))?;
    let intent: IntentCode = parts
        .next()
        .ok_or_else(|| bad("missing intent code"))?
        .parse()
        .map_err(|e| bad(&e))?;
    let length: i32 = parts.next().ok_or_else(|| bad("missing length"))?.parse().map_err(|_| bad("bad length"))?;
    let begin_x: i32 = parts.next().ok_or_else(|| bad("missing begin_x"))?.parse().map_err(|_| bad("bad begin_x"))?;
    let begin_y: i32 = parts.next().ok_or_else(|| bad("missing begin_y"))?.parse().map_err(|_| bad("bad begin_y"))?;
    let end_x: i32 = parts.next().ok_or_else(|| bad("missing end_x"))?.parse().map_err(|_| bad("bad end_x"))?;
    let end_y: i32 = parts.next().ok_or_else(|| bad("missing end_y"))?.parse().map_err(|_| bad("bad end_y"))?;
    assert_eq!(id, expected_id, "device file node ids must be dense 0..N");
    Ok(Node::new(id, intent, length, begin_x, begin_y, end_x, end_y))
}

fn parse_edges_parallel(lines: &[String], nodes: &mut [Node]) -> Result<(), RouterError> {
    let num_nodes = nodes.len();
    let thread_count = PARSE_THREADS.min(num_nodes.max(1));
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        let mut rest = nodes;
        for range in split_range_nicely(0..num_nodes, thread_count) {
            let len = range.end - range.start;
            let (chunk, remainder) = rest.split_at_mut(len);
            rest = remainder;
            let chunk_lines = &lines[range.clone()];
            handles.push(scope.spawn(move || {
                for (node, line) in chunk.iter_mut().zip(chunk_lines) {
                    let mut parts = line.split_whitespace();
                    let parent_id: usize = parts
                        .next()
                        .and_then(|t| t.parse().ok())
                        .unwrap_or_else(|| panic!("device file edge line for node {}: missing or non-numeric parent id", node.id));
                    // Edge line i is assumed to belong to node i; a
                    // misordered file must fail loudly rather than
                    // silently attach children to the wrong node.
                    assert_eq!(parent_id, node.id, "device file edge lines must be in node-id order");
                    node.children = parts.filter_map(|p| p.parse::<usize>().ok()).collect();
                }
            }));
        }
        for h in handles {
            h.join().expect("edge-parsing worker panicked");
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_cost_is_pure() {
        let (c1, a1) = compute_base_cost(IntentCode::Hquad, 3, 0, 0);
        let (c2, a2) = compute_base_cost(IntentCode::Hquad, 3, 0, 0);
        assert_eq!(c1, c2);
        assert_eq!(a1, a2);
    }

    #[test]
    fn hquad_zero_length_inaccessible() {
        let (cost, accessible) = compute_base_cost(IntentCode::Hquad, 0, 0, 0);
        assert_eq!(cost, 0.4);
        assert!(!accessible);
    }

    #[test]
    fn hlong_zero_length_inaccessible() {
        let (_, accessible) = compute_base_cost(IntentCode::Hlong, 0, 5, 5);
        assert!(!accessible);
    }

    #[test]
    fn single_length_two_doubles_cost() {
        let (cost, _) = compute_base_cost(IntentCode::Single, 2, 0, 2);
        assert_eq!(cost, 0.8);
        let (cost, _) = compute_base_cost(IntentCode::Single, 1, 0, 1);
        assert_eq!(cost, 0.4);
    }

    #[test]
    fn double_vertical_uses_vertical_branch() {
        let (cost, accessible) = compute_base_cost(IntentCode::Double, 3, 4, 4);
        assert_eq!(cost, 0.4);
        assert!(accessible);
    }

    #[test]
    fn double_horizontal_length_two_doubles_cost() {
        let (cost, _) = compute_base_cost(IntentCode::Double, 2, 0, 2);
        assert_eq!(cost, 0.8);
    }

    #[test]
    #[should_panic]
    fn single_length_over_bound_asserts() {
        compute_base_cost(IntentCode::Single, 3, 0, 3);
    }

    #[test]
    fn vlong_cost_scales_with_length() {
        let (cost, accessible) = compute_base_cost(IntentCode::Vlong, 4, 0, 0);
        assert_eq!(cost, 2.8);
        assert!(accessible);
    }

    #[test]
    fn parses_small_device_file() {
        let text = "3\n\
            0 LOCAL 0 0 0 0 0\n\
            1 LOCAL 1 1 0 1 0\n\
            2 PINFEED 0 2 0 2 0\n\
            \n\
            0 1\n\
            1 2\n\
            2\n";
        let device = Device::parse(std::io::Cursor::new(text), PathBuf::from("test")).unwrap();
        assert_eq!(device.nodes.len(), 3);
        assert_eq!(device.nodes[0].children, vec![1]);
        assert_eq!(device.nodes[1].children, vec![2]);
        assert!(device.nodes[2].children.is_empty());
    }
}
