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

use clap::Parser;
use std::process::ExitCode;

use nisp_router::device::Device;
use nisp_router::netlist::Netlist;
use nisp_router::routing::Router;
use nisp_router::serialize;

#[macro_use]
extern crate nisp_router;

#[derive(Parser, Debug)]
#[clap(author = "Antmicro", version = "0.1.0", about = "Negotiated-congestion FPGA router", long_about = None)]
struct Args {
    #[clap(help = "device routing-resource graph file")]
    device: String,
    #[clap(help = "input netlist file")]
    netlist: String,
    #[clap(help = "output result file")]
    output: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(_) => {
            eprintln!("Usage: router <device> <netlist> <output>");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(args) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: Args) -> Result<(), nisp_router::errors::RouterError> {
    let mut device = Device::load(&args.device)?;
    let mut netlist = Netlist::load_for_router(&args.netlist, &mut device)?;

    Router::new(&device, &mut netlist).route();
    serialize::write_result(&args.output, &netlist)?;

    dbg_log!(nisp_router::log::DBG_INFO, "Exit.");
    Ok(())
}
