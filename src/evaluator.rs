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

//! Independently checks a router-produced result file against the
//! device graph: congestion, sink reachability and total wirelength.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::device::Device;
use crate::errors::RouterError;
use crate::netlist::{Netlist, Pip};
use crate::routing_state::RoutingState;

const REACHABILITY_WATCHDOG: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub num_congested_nodes: usize,
    pub num_successfully_routed_nets: usize,
    pub total_nets: usize,
    pub total_wirelength: i64,
}

/// Clears any pips left over on `netlist` from construction, loads the
/// result file, and runs the three independent checks. `dump_on_failure`
/// gates the per-failure path dumps (the CLI's `debug` token disables
/// them; the default is to dump).
pub fn evaluate<P: AsRef<Path>>(device: &Device, netlist: &mut Netlist, result_path: P, dump_on_failure: bool) -> Result<EvalReport, RouterError> {
    for net in &mut netlist.nets {
        net.clear_pips();
    }
    read_result(result_path, device, netlist)?;

    let mut state = RoutingState::new(device.nodes.len());
    let num_congested_nodes = check_congestion_from_pips(netlist, &mut state);
    let num_successfully_routed_nets = check_successfully_routed_nets_from_pips(device, netlist, dump_on_failure);
    let total_wirelength = check_total_wirelength_from_pips(device, netlist);

    dbg_log!(crate::log::DBG_INFO, "# congested nodes: {num_congested_nodes}");
    dbg_log!(crate::log::DBG_INFO, "# successfully routed nets: {num_successfully_routed_nets}/{}", netlist.nets.len());
    dbg_log!(crate::log::DBG_INFO, "total wirelength: {total_wirelength}");

    Ok(EvalReport {
        num_congested_nodes,
        num_successfully_routed_nets,
        total_nets: netlist.nets.len(),
        total_wirelength,
    })
}

/// Reads blank-line-delimited net blocks: a `net_id net_name` header
/// (only consumed if it matches a known net), followed by `parent_id
/// child_id` pip lines. Lines naming unknown node ids are logged and
/// skipped rather than rejected outright.
fn read_result<P: AsRef<Path>>(path: P, device: &Device, netlist: &mut Netlist) -> Result<(), RouterError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RouterError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    dbg_log!(crate::log::DBG_INFO, "Result file: {}", path.display());

    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next() {
        let line = line.map_err(|source| RouterError::Open { path: path.to_path_buf(), source })?;
        if line.trim().is_empty() {
            continue;
        }
        let mut header = line.split_whitespace();
        let net_id = header.next().and_then(|t| t.parse::<usize>().ok());
        let net_name = header.next();
        let (net_id, net_name) = match (net_id, net_name) {
            (Some(id), Some(name)) => (id, name),
            _ => continue,
        };
        if net_id >= netlist.nets.len() || netlist.nets[net_id].name != net_name {
            continue;
        }

        for pip_line in lines.by_ref() {
            let pip_line = pip_line.map_err(|source| RouterError::Open { path: path.to_path_buf(), source })?;
            if pip_line.trim().is_empty() {
                break;
            }
            let mut parts = pip_line.split_whitespace();
            let parent_id = parts.next().and_then(|t| t.parse::<usize>().ok());
            let child_id = parts.next().and_then(|t| t.parse::<usize>().ok());
            let (parent_id, child_id) = match (parent_id, child_id) {
                (Some(p), Some(c)) => (p, c),
                _ => continue,
            };
            if parent_id >= device.nodes.len() {
                dbg_log!(crate::log::DBG_ERROR, "No such node: {parent_id}");
                continue;
            }
            if child_id >= device.nodes.len() {
                dbg_log!(crate::log::DBG_ERROR, "No such node: {child_id}");
                continue;
            }
            netlist.nets[net_id].add_pip(Pip { parent: parent_id, child: child_id });
        }
    }
    Ok(())
}

/// Marks both endpoints of every pip with their owning net; a node
/// claimed by more than one net is congested.
fn check_congestion_from_pips(netlist: &Netlist, state: &mut RoutingState) -> usize {
    for node_state in &mut state.nodes {
        node_state.used_by_net_id = None;
    }

    let mut congested_node_ids: HashSet<usize> = HashSet::new();
    for net in &netlist.nets {
        for pip in &net.pips {
            for node_id in [pip.parent, pip.child] {
                match state.nodes[node_id].used_by_net_id {
                    None => state.nodes[node_id].used_by_net_id = Some(net.id),
                    Some(used_by) if used_by != net.id => {
                        congested_node_ids.insert(node_id);
                    }
                    _ => {}
                }
            }
        }
    }
    congested_node_ids.len()
}

/// For each net, builds a child→parent map from pips whose edge is
/// actually present in the device graph, then walks from every sink
/// toward the source. A net counts as successfully routed only if
/// every sink's walk reaches the source.
fn check_successfully_routed_nets_from_pips(device: &Device, netlist: &Netlist, dump_on_failure: bool) -> usize {
    let mut num_successfully_routed_nets = 0;

    for net in &netlist.nets {
        let mut child_to_parent: HashMap<usize, usize> = HashMap::new();
        for pip in &net.pips {
            if device.nodes[pip.parent].children.contains(&pip.child) {
                child_to_parent.insert(pip.child, pip.parent);
            }
        }

        if dump_on_failure && net.sink_node_ids.is_empty() {
            dbg_log!(crate::log::DBG_INFO, "net {}: no sinks.", net.id);
        }

        let mut net_routed = true;
        for &sink_node_id in &net.sink_node_ids {
            let mut routed_sink = false;
            let mut path = Vec::new();
            let mut node_id = sink_node_id;
            let mut watchdog = REACHABILITY_WATCHDOG;

            while watchdog > 0 {
                path.push(node_id);
                let parent = match child_to_parent.get(&node_id) {
                    Some(&p) => p,
                    None => {
                        if dump_on_failure {
                            dbg_log!(crate::log::DBG_ERROR, "net {}: fail to find source node.", net.id);
                            dbg_log!(crate::log::DBG_ERROR, "path starting from sink: {path:?}");
                        }
                        break;
                    }
                };
                if parent == net.source_node_id {
                    routed_sink = true;
                    break;
                }
                node_id = parent;
                watchdog -= 1;
            }

            if !routed_sink {
                if dump_on_failure {
                    dbg_log!(crate::log::DBG_ERROR, "net {}: fail to route sink node {sink_node_id}.", net.id);
                    dbg_log!(crate::log::DBG_ERROR, "path starting from sink: {path:?}");
                }
                net_routed = false;
                break;
            }
        }

        if net_routed {
            num_successfully_routed_nets += 1;
        }
    }

    num_successfully_routed_nets
}

fn check_total_wirelength_from_pips(device: &Device, netlist: &Netlist) -> i64 {
    let mut used_node_ids: HashSet<usize> = HashSet::new();
    for net in &netlist.nets {
        for pip in &net.pips {
            used_node_ids.insert(pip.parent);
            used_node_ids.insert(pip.child);
        }
    }
    used_node_ids.iter().map(|&id| device.nodes[id].length as i64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn chain_device() -> Device {
        let text = "3\n\
            0 LOCAL 0 0 0 0 0\n\
            1 LOCAL 1 1 0 1 0\n\
            2 PINFEED 0 2 0 2 0\n\
            \n\
            0 1\n\
            1 2\n\
            2\n";
        Device::parse(Cursor::new(text), PathBuf::from("test")).unwrap()
    }

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reachable_chain_counts_as_successfully_routed() {
        let mut device = chain_device();
        let netlist_path = write_temp("nisp_router_test_eval_netlist_ok.txt", "1\n0 net0 0 2\n");
        let mut netlist = Netlist::load_for_evaluator(&netlist_path, &mut device).unwrap();
        std::fs::remove_file(&netlist_path).ok();

        let result_path = write_temp("nisp_router_test_eval_result_ok.txt", "0 net0\n0 1\n1 2\n\n");
        let report = evaluate(&device, &mut netlist, &result_path, true).unwrap();
        std::fs::remove_file(&result_path).ok();

        assert_eq!(report.num_successfully_routed_nets, 1);
        assert_eq!(report.num_congested_nodes, 0);
        let expected_wirelength: i64 = device.nodes.iter().map(|n| n.length as i64).sum();
        assert_eq!(report.total_wirelength, expected_wirelength);
    }

    #[test]
    fn broken_chain_is_not_successfully_routed() {
        let mut device = chain_device();
        let netlist_path = write_temp("nisp_router_test_eval_netlist_bad.txt", "1\n0 net0 0 2\n");
        let mut netlist = Netlist::load_for_evaluator(&netlist_path, &mut device).unwrap();
        std::fs::remove_file(&netlist_path).ok();

        // Only the hop closest to the sink is present; node 1 never
        // reaches the net's source node 0.
        let result_path = write_temp("nisp_router_test_eval_result_bad.txt", "0 net0\n1 2\n\n");
        let report = evaluate(&device, &mut netlist, &result_path, false).unwrap();
        std::fs::remove_file(&result_path).ok();

        assert_eq!(report.num_successfully_routed_nets, 0);
    }

    #[test]
    fn shared_node_across_nets_is_congested() {
        let mut device = chain_device();
        let netlist_path = write_temp("nisp_router_test_eval_netlist_congest.txt", "2\n0 net0 0 2\n1 net1 0 2\n");
        let mut netlist = Netlist::load_for_evaluator(&netlist_path, &mut device).unwrap();
        std::fs::remove_file(&netlist_path).ok();

        let result_path = write_temp(
            "nisp_router_test_eval_result_congest.txt",
            "0 net0\n1 0\n2 1\n\n1 net1\n1 0\n2 1\n\n",
        );
        let report = evaluate(&device, &mut netlist, &result_path, false).unwrap();
        std::fs::remove_file(&result_path).ok();

        // Both nets claim every node on the shared path.
        assert_eq!(report.num_congested_nodes, 3);
    }
}
