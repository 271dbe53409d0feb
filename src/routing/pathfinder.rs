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

//! The iterative ripup-and-reroute driver: sorts connections, runs
//! [`super::astar::search`] for each, and negotiates congestion between
//! rounds via [`super::congestion::CostFactors`].

use std::collections::HashSet;

use crate::device::Device;
use crate::netlist::{Netlist, Pip};
use crate::routing_state::RoutingState;

use super::astar;
use super::congestion::CostFactors;

const MAX_ITER: i32 = 500;
const CONGESTION_RATIO_THRESHOLD: f64 = 0.45;
const SAVE_ROUTING_WATCHDOG: u32 = 100_000;

pub struct Router<'a> {
    device: &'a Device,
    netlist: &'a mut Netlist,
    state: RoutingState,
    cost_factors: CostFactors,
    sorted_connection_ids: Vec<usize>,
    iter: i32,
    connection_stamp_base: i64,
    num_routed_connection: usize,
    num_failed_connection: usize,
    is_congested_design: bool,
    num_congested_nodes: usize,
}

impl<'a> Router<'a> {
    pub fn new(device: &'a Device, netlist: &'a mut Netlist) -> Self {
        let num_nodes = device.nodes.len();
        Router {
            device,
            netlist,
            state: RoutingState::new(num_nodes),
            cost_factors: CostFactors::default(),
            sorted_connection_ids: Vec::new(),
            iter: 0,
            connection_stamp_base: 0,
            num_routed_connection: 0,
            num_failed_connection: 0,
            is_congested_design: false,
            num_congested_nodes: 0,
        }
    }

    /// Consumes the router, returning the final per-node routing state
    /// once every net's pips have been written into the netlist.
    pub fn route(mut self) -> RoutingState {
        self.sort_connections();
        self.update_sink_node_occupancy();
        self.print_header();
        self.iterative_route();
        self.save_pips();
        self.state
    }

    fn sort_connections(&mut self) {
        let mut ids: Vec<usize> = (0..self.netlist.connections.len()).collect();
        let nets = &self.netlist.nets;
        let connections = &self.netlist.connections;
        ids.sort_by(|&i, &j| {
            let fanout_i = nets[connections[i].net_id].num_connections();
            let fanout_j = nets[connections[j].net_id].num_connections();
            // 1st priority: descending net fanout; 2nd: ascending HPWL.
            fanout_j.cmp(&fanout_i).then_with(|| connections[i].hpwl().cmp(&connections[j].hpwl()))
        });
        self.sorted_connection_ids = ids;
    }

    fn update_sink_node_occupancy(&mut self) {
        for i in 0..self.netlist.connections.len() {
            let (net_id, sink) = {
                let connection = &self.netlist.connections[i];
                (connection.net_id, connection.sink)
            };
            self.netlist.nets[net_id].increase_user(sink, &mut self.state);
            self.state.nodes[sink].update_present_congestion_cost(self.cost_factors.present_congestion_factor);

            let occupancy = self.state.nodes[sink].occupancy;
            let user_count = self.netlist.nets[net_id].user_count(sink);
            assert!(occupancy <= 1 && user_count <= 1, "node {sink} is used by multiple connections");
        }
    }

    fn print_header(&self) {
        dbg_log!(
            crate::log::DBG_INFO,
            "{:>10} {:>15} {:>10} {:>20} {:>15}",
            "Iteration",
            "PFactor",
            "HFactor",
            "RoutedConnections",
            "CongestedNodes"
        );
    }

    fn print_route_stat(&self) {
        dbg_log!(
            crate::log::DBG_INFO,
            "{:>10} {:>15.4} {:>10.4} {:>20} {:>15}",
            self.iter,
            self.cost_factors.present_congestion_factor,
            self.cost_factors.historical_congestion_factor,
            self.num_routed_connection,
            self.num_congested_nodes
        );
    }

    fn should_route(&self, connection_id: usize) -> bool {
        let connection = &self.netlist.connections[connection_id];
        !connection.routed || connection.is_congested(&self.state)
    }

    fn rip_up(&mut self, connection_id: usize) {
        let net_id = self.netlist.connections[connection_id].net_id;
        if self.netlist.connections[connection_id].path.is_empty() {
            assert!(!self.netlist.connections[connection_id].routed);
            let sink = self.netlist.connections[connection_id].sink;
            self.netlist.connections[connection_id].path.push(sink);
        }
        let path = self.netlist.connections[connection_id].path.clone();
        for node_id in path {
            self.netlist.nets[net_id].decrease_user(node_id, &mut self.state);
            self.state.nodes[node_id].update_present_congestion_cost(self.cost_factors.present_congestion_factor);
        }
        self.netlist.connections[connection_id].reset_route();
    }

    fn iterative_route(&mut self) {
        for iter in 1..=MAX_ITER {
            self.iter = iter;
            self.connection_stamp_base += self.netlist.connections.len() as i64;
            self.num_routed_connection = 0;
            self.num_failed_connection = 0;

            let sorted = self.sorted_connection_ids.clone();
            for connection_id in sorted {
                if self.should_route(connection_id) {
                    self.rip_up(connection_id);
                    let success = self.route_connection(connection_id);
                    if !success {
                        self.num_failed_connection += 1;
                        dbg_log!(crate::log::DBG_INFO, "routing failure: connection {connection_id}");
                    }
                }
            }

            if iter == 1 {
                self.is_congested_design = self.decide_congested_design();
            }
            self.update_cost_factors();
            self.print_route_stat();

            if self.num_congested_nodes == 0 && self.num_failed_connection == 0 {
                break;
            }
        }
        dbg_log!(crate::log::DBG_INFO, "Finish routing.");
    }

    fn route_connection(&mut self, connection_id: usize) -> bool {
        self.num_routed_connection += 1;
        let net_id = self.netlist.connections[connection_id].net_id;
        let connection_stamp = self.connection_stamp_base + connection_id as i64;

        let target_node = astar::search(
            self.device,
            &mut self.state,
            &self.netlist.nets[net_id],
            &self.netlist.connections[connection_id],
            connection_stamp,
            self.cost_factors.present_congestion_factor,
        );

        let target_node = match target_node {
            Some(t) => t,
            None => return false,
        };

        let routed = self.save_routing(connection_id, target_node);
        if routed {
            self.netlist.connections[connection_id].routed = true;
            self.update_users_and_present_congestion_cost(connection_id);
        } else {
            self.netlist.connections[connection_id].reset_route();
        }
        routed
    }

    fn save_routing(&mut self, connection_id: usize, target_node: usize) -> bool {
        let (source, sink) = {
            let connection = &self.netlist.connections[connection_id];
            (connection.source, connection.sink)
        };
        assert_eq!(target_node, sink, "save_routing target does not match connection sink");

        let mut path = Vec::new();
        let mut node_id = target_node;
        let mut watchdog = SAVE_ROUTING_WATCHDOG;
        loop {
            let prev = self.state.nodes[node_id].prev;
            if prev.is_none() {
                assert_eq!(node_id, source, "save_routing: path does not end at the connection's source");
            }
            watchdog -= 1;
            path.push(node_id);
            if watchdog == 0 {
                panic!("watchdog exceeded while saving route for connection {connection_id}");
            }
            match prev {
                Some(p) => node_id = p,
                None => break,
            }
        }
        assert!(path.len() > 1);
        self.netlist.connections[connection_id].path = path;
        true
    }

    fn update_users_and_present_congestion_cost(&mut self, connection_id: usize) {
        let net_id = self.netlist.connections[connection_id].net_id;
        let path = self.netlist.connections[connection_id].path.clone();
        for node_id in path {
            self.netlist.nets[net_id].increase_user(node_id, &mut self.state);
            self.state.nodes[node_id].update_present_congestion_cost(self.cost_factors.present_congestion_factor);
        }
    }

    fn update_cost_factors(&mut self) {
        self.num_congested_nodes = self.cost_factors.update(self.device, &mut self.state, self.iter, self.is_congested_design);
    }

    fn decide_congested_design(&mut self) -> bool {
        let num_congested = self.state.nodes.iter().filter(|n| n.is_congested()).count();
        self.num_congested_nodes = num_congested;
        // ratio of overused nodes to connection count; 0.45 rather than
        // the textbook 0.5 (tuned for this cost function).
        let ratio = num_congested as f64 / self.netlist.connections.len() as f64;
        ratio > CONGESTION_RATIO_THRESHOLD
    }

    fn save_pips(&mut self) {
        let mut congested_node_ids: HashSet<usize> = HashSet::new();
        for net_idx in 0..self.netlist.nets.len() {
            let net_id = self.netlist.nets[net_idx].id;
            let connection_ids = self.netlist.nets[net_idx].connection_ids.clone();
            for connection_id in connection_ids {
                let path = self.netlist.connections[connection_id].path.clone();
                for node_id in path {
                    match self.state.nodes[node_id].used_by_net_id {
                        None => self.state.nodes[node_id].used_by_net_id = Some(net_id),
                        Some(used_by) if used_by != net_id => {
                            congested_node_ids.insert(node_id);
                        }
                        _ => {}
                    }
                }
            }
        }
        dbg_log!(crate::log::DBG_INFO, "# congested nodes: {}", congested_node_ids.len());

        for net_idx in 0..self.netlist.nets.len() {
            let connection_ids = self.netlist.nets[net_idx].connection_ids.clone();
            for connection_id in connection_ids {
                let path = self.netlist.connections[connection_id].path.clone();
                for window in path.windows(2) {
                    let child = window[0];
                    let parent = window[1];
                    if !self.device.nodes[parent].children.contains(&child) {
                        dbg_log!(crate::log::DBG_ERROR, "wrong pip {parent} -> {child}");
                    }
                    self.netlist.nets[net_idx].add_pip(Pip { parent, child });
                }
            }
        }
    }
}
