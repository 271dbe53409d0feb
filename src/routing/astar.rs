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

//! Best-first search for a single connection's source-to-sink path.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::device::{Device, NodeType};
use crate::netlist::{Connection, Net};
use crate::routing_state::RoutingState;

const SHARING_WEIGHT: f64 = 1.0;
const NODE_COST_WEIGHT: f64 = 1.0;
const NODE_WL_WEIGHT: f64 = 0.2;
const EST_WL_WEIGHT: f64 = 0.8;

struct HeapEntry {
    cost: f64,
    node: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Reversed: `BinaryHeap` is a max-heap, and the search wants the
    // node with the smallest total path cost popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
    }
}

/// A node's routing cost along this connection's search: base cost
/// scaled by congestion history and present sharing, plus a bias term
/// pulling the search toward the net's center for non-target nodes.
///
/// A negative result is logged rather than treated as fatal — unlike an
/// out-of-bounds node length, a negative cost here reflects an
/// unexpected combination of congestion inputs rather than a violated
/// structural invariant, so routing continues and the anomaly is
/// surfaced for later inspection instead of aborting the whole run.
fn node_cost(
    device: &Device,
    state: &RoutingState,
    net: &Net,
    node_id: usize,
    user_connection_cnt: u32,
    sharing_factor: f64,
    connection_stamp: i64,
    present_congestion_factor: f64,
) -> f64 {
    let node = &device.nodes[node_id];
    let node_state = &state.nodes[node_id];

    let present_congestion_cost = if user_connection_cnt != 0 {
        1.0 + (node_state.occupancy as f64 - 1.0) * present_congestion_factor
    } else {
        node_state.present_congestion_cost
    };

    let mut bias_cost = 0.0;
    if !node_state.is_target(connection_stamp) {
        let dist_to_center = (node.end_x as f64 - net.xcenter).abs() + (node.end_y as f64 - net.ycenter).abs();
        bias_cost = node.base_cost / net.num_connections() as f64 * dist_to_center / net.hpwl();
    }

    let cost = node.base_cost * node_state.historical_congestion_cost * present_congestion_cost / sharing_factor + bias_cost;
    if cost < 0.0 {
        dbg_log!(
            crate::log::DBG_ERROR,
            "node {} cost {} is negative (user_connection_cnt={}, base_cost={}, h-cost={}, p-cost={}, sharing_factor={})",
            node_id,
            cost,
            user_connection_cnt,
            node.base_cost,
            node_state.historical_congestion_cost,
            present_congestion_cost,
            sharing_factor
        );
    }
    cost
}

/// Searches for a path from `connection`'s source to its sink.
///
/// On success, every node on the winning path has its `prev` pointer
/// set in `state` (source's `prev` is `None`) and this returns the sink
/// node id. The caller walks `prev` back from the returned id to
/// recover the full path.
pub fn search(
    device: &Device,
    state: &mut RoutingState,
    net: &Net,
    connection: &Connection,
    connection_stamp: i64,
    present_congestion_factor: f64,
) -> Option<usize> {
    let source = connection.source;
    let sink = connection.sink;

    let mut queue: BinaryHeap<HeapEntry> = BinaryHeap::new();
    state.nodes[source].write_routing_info(None, 0.0, 0.0, connection_stamp, -1);
    queue.push(HeapEntry { cost: 0.0, node: source });
    state.nodes[sink].write_routing_info(None, 0.0, 0.0, -1, connection_stamp);

    let mut target_node = None;

    'search: while let Some(HeapEntry { node: current, .. }) = queue.pop() {
        let upstream_cost = state.nodes[current].upstream_cost;
        for &child in &device.nodes[current].children {
            if state.nodes[child].is_visited(connection_stamp) {
                continue;
            }
            if state.nodes[child].is_target(connection_stamp) {
                target_node = Some(child);
                state.nodes[child].prev = Some(current);
                break 'search;
            }
            // Accessibility is deliberately tested against `current`'s own
            // coordinates, not `child`'s — preserved as-is even though it
            // reads like it should gate the child being considered.
            if !connection.is_accessible_node(&device.nodes[current]) {
                continue;
            }
            if !device.nodes[child].accessible {
                continue;
            }
            match device.nodes[child].node_type {
                NodeType::Wire | NodeType::Pinbounce | NodeType::PinfeedO => {}
                NodeType::PinfeedI => {
                    if !state.nodes[current].is_target(connection_stamp) {
                        continue;
                    }
                }
            }

            let user_connection_cnt = net.user_count(child);
            let sharing_factor = 1.0 + SHARING_WEIGHT * user_connection_cnt as f64;
            let cost_of_child = node_cost(device, state, net, child, user_connection_cnt, sharing_factor, connection_stamp, present_congestion_factor);
            let upstream_cost_of_child =
                upstream_cost + NODE_COST_WEIGHT * cost_of_child + NODE_WL_WEIGHT * device.nodes[current].length as f64 / sharing_factor;
            let delta_x = (device.nodes[child].end_x - device.nodes[sink].begin_x).abs();
            let delta_y = (device.nodes[child].end_y - device.nodes[sink].begin_y).abs();
            let total_path_cost = upstream_cost_of_child + EST_WL_WEIGHT * (delta_x + delta_y) as f64 / sharing_factor;

            state.nodes[child].write_routing_info(Some(current), total_path_cost, upstream_cost_of_child, connection_stamp, -1);
            queue.push(HeapEntry { cost: total_path_cost, node: child });
        }
    }

    target_node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, IntentCode, Node, NodeType};
    use crate::netlist::Net;

    fn node(id: usize, children: Vec<usize>) -> Node {
        Node {
            id,
            intent_code: IntentCode::Local,
            length: 1,
            begin_x: id as i32,
            begin_y: 0,
            end_x: id as i32,
            end_y: 0,
            base_cost: 0.4,
            accessible: true,
            node_type: NodeType::Wire,
            children,
        }
    }

    fn chain_device() -> Device {
        // 0 -> 1 -> 2, a trivial source/intermediate/sink chain.
        Device {
            nodes: vec![node(0, vec![1]), node(1, vec![2]), node(2, vec![])],
        }
    }

    #[test]
    fn finds_direct_chain() {
        let device = chain_device();
        let mut state = RoutingState::new(3);
        let net = Net::new_for_test(0, 0, vec![2]);
        let connection = Connection::new_for_test(0, 0, 0, 2, -100, 100, -100, 100);
        let target = search(&device, &mut state, &net, &connection, 1, 0.5);
        assert_eq!(target, Some(2));
        assert_eq!(state.nodes[2].prev, Some(1));
        assert_eq!(state.nodes[1].prev, Some(0));
        assert_eq!(state.nodes[0].prev, None);
    }

    #[test]
    fn unreachable_sink_returns_none() {
        let mut device = chain_device();
        device.nodes[1].children.clear();
        let mut state = RoutingState::new(3);
        let net = Net::new_for_test(0, 0, vec![2]);
        let connection = Connection::new_for_test(0, 0, 0, 2, -100, 100, -100, 100);
        let target = search(&device, &mut state, &net, &connection, 1, 0.5);
        assert_eq!(target, None);
    }
}
