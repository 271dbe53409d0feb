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

//! Mutable per-node routing state, kept separate from the immutable
//! [`crate::device::Device`] topology (design doc §3/§9): occupancy,
//! congestion costs, per-search scratch (`prev`, path costs, visit and
//! target stamps) and the used-by-net marker.

/// Per-node mutable scratch, indexed identically to `Device::nodes`.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub occupancy: u32,
    pub present_congestion_cost: f64,
    pub historical_congestion_cost: f64,
    pub prev: Option<usize>,
    pub total_path_cost: f64,
    pub upstream_cost: f64,
    pub last_visited_stamp: i64,
    pub target_stamp: i64,
    pub used_by_net_id: Option<usize>,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState {
            occupancy: 0,
            present_congestion_cost: 1.0,
            historical_congestion_cost: 1.0,
            prev: None,
            total_path_cost: 0.0,
            upstream_cost: 0.0,
            last_visited_stamp: -1,
            target_stamp: -1,
            used_by_net_id: None,
        }
    }
}

impl NodeState {
    /// `occupancy > 1` is the definition of "congested" used throughout.
    pub fn is_congested(&self) -> bool {
        self.occupancy > 1
    }

    pub fn is_visited(&self, connection_stamp: i64) -> bool {
        self.last_visited_stamp == connection_stamp
    }

    pub fn is_target(&self, connection_stamp: i64) -> bool {
        self.target_stamp == connection_stamp
    }

    pub fn write_routing_info(
        &mut self,
        prev: Option<usize>,
        total_path_cost: f64,
        upstream_cost: f64,
        last_visited_stamp: i64,
        target_stamp: i64,
    ) {
        self.prev = prev;
        self.total_path_cost = total_path_cost;
        self.upstream_cost = upstream_cost;
        self.last_visited_stamp = last_visited_stamp;
        self.target_stamp = target_stamp;
    }

    /// Recomputes this node's present congestion cost from its current
    /// occupancy and the router's present congestion factor.
    pub fn update_present_congestion_cost(&mut self, present_congestion_factor: f64) {
        if self.occupancy < 1 {
            self.present_congestion_cost = 1.0;
        } else {
            self.present_congestion_cost = 1.0 + self.occupancy as f64 * present_congestion_factor;
        }
    }
}

/// Parallel array of [`NodeState`], one per device node.
pub struct RoutingState {
    pub nodes: Vec<NodeState>,
}

impl RoutingState {
    pub fn new(num_nodes: usize) -> Self {
        RoutingState {
            nodes: (0..num_nodes).map(|_| NodeState::default()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn congestion_threshold_is_occupancy_over_one() {
        let mut s = NodeState::default();
        assert!(!s.is_congested());
        s.occupancy = 1;
        assert!(!s.is_congested());
        s.occupancy = 2;
        assert!(s.is_congested());
    }

    #[test]
    fn present_congestion_cost_floor_for_zero_occupancy() {
        let mut s = NodeState::default();
        s.update_present_congestion_cost(0.5);
        assert_eq!(s.present_congestion_cost, 1.0);
    }

    #[test]
    fn stamp_isolation_across_values() {
        let mut s = NodeState::default();
        s.write_routing_info(None, 0.0, 0.0, 5, -1);
        assert!(s.is_visited(5));
        assert!(!s.is_visited(6));
    }
}
