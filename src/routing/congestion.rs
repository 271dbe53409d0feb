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

//! The present/historical congestion-factor schedule that drives
//! negotiation between iterations.

use crate::device::Device;
use crate::routing_state::RoutingState;

/// Mutable cost-factor state, updated once per routing iteration.
pub struct CostFactors {
    pub present_congestion_factor: f64,
    pub present_congestion_multiplier: f64,
    pub historical_congestion_factor: f64,
    pub max_present_congestion_factor: f64,
}

impl Default for CostFactors {
    fn default() -> Self {
        CostFactors {
            present_congestion_factor: 0.5,
            present_congestion_multiplier: 2.0,
            historical_congestion_factor: 1.0,
            max_present_congestion_factor: 1_000_000.0,
        }
    }
}

impl CostFactors {
    /// Advances the schedule for the iteration just completed and
    /// refreshes every node's present/historical congestion cost from
    /// its current occupancy. Returns the number of congested nodes.
    pub fn update(&mut self, device: &Device, state: &mut RoutingState, iter: i32, is_congested_design: bool) -> usize {
        if is_congested_design {
            let r = 1.0 / (1.0 + ((1.0 - iter as f64) * 0.5).exp());
            self.historical_congestion_factor = 2.0 * r;
            let r2 = 3.0 / (1.0 + (iter as f64 - 1.0).exp());
            self.present_congestion_multiplier = 1.1 * (1.0 + r2);
        }

        self.present_congestion_factor *= self.present_congestion_multiplier;
        self.present_congestion_factor = self.present_congestion_factor.min(self.max_present_congestion_factor);

        let mut num_congested_nodes = 0;
        for node in &device.nodes {
            let node_state = &mut state.nodes[node.id];
            let overuse = node_state.occupancy as i64 - 1;
            if overuse == 0 {
                node_state.present_congestion_cost = 1.0 + self.present_congestion_factor;
            } else if overuse > 0 {
                num_congested_nodes += 1;
                node_state.present_congestion_cost = 1.0 + (overuse as f64 + 1.0) * self.present_congestion_factor;
                node_state.historical_congestion_cost += overuse as f64 * self.historical_congestion_factor;
            }
        }
        num_congested_nodes
    }
}
