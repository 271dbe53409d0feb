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

use std::process::ExitCode;

use nisp_router::device::Device;
use nisp_router::evaluator;
use nisp_router::netlist::Netlist;

#[macro_use]
extern crate nisp_router;

fn main() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    // argc counts the program name, so valid invocations have 4 or 5 args.
    if raw_args.len() < 4 || raw_args.len() > 5 {
        eprintln!("Usage: evaluator <device> <netlist> <result> [debug]");
        return ExitCode::FAILURE;
    }

    let device_file = &raw_args[1];
    let netlist_file = &raw_args[2];
    let result_file = &raw_args[3];
    // The optional `debug` token disables per-failure path dumps; the
    // default, with no token, is to dump them.
    let dump_on_failure = raw_args.get(4).map(|s| s.as_str()) != Some("debug");

    if let Err(e) = run(device_file, netlist_file, result_file, dump_on_failure) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(device_file: &str, netlist_file: &str, result_file: &str, dump_on_failure: bool) -> Result<(), nisp_router::errors::RouterError> {
    let mut device = Device::load(device_file)?;
    let mut netlist = Netlist::load_for_evaluator(netlist_file, &mut device)?;

    let report = evaluator::evaluate(&device, &mut netlist, result_file, dump_on_failure)?;
    dbg_log!(nisp_router::log::DBG_INFO, "# congested nodes: {}", report.num_congested_nodes);
    dbg_log!(
        nisp_router::log::DBG_INFO,
        "# successfully routed nets: {}/{}",
        report.num_successfully_routed_nets,
        report.total_nets
    );
    dbg_log!(nisp_router::log::DBG_INFO, "total wirelength: {}", report.total_wirelength);
    dbg_log!(nisp_router::log::DBG_INFO, "Exit.");
    Ok(())
}
