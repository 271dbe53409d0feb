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

//! Writes the router's per-net PIP sets to the plain-text result file
//! the evaluator reads back.

use std::io::Write;

use crate::errors::RouterError;
use crate::netlist::Netlist;
use std::fs::File;
use std::path::Path;

/// Per net: a header line `net_id net_name`, then one `parent_id
/// child_id` line per PIP, then a blank separator line.
pub fn write_result<P: AsRef<Path>>(path: P, netlist: &Netlist) -> Result<(), RouterError> {
    let path = path.as_ref();
    let mut file = File::create(path).map_err(|source| RouterError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    dbg_log!(crate::log::DBG_INFO, "Output file: {}", path.display());

    for net in &netlist.nets {
        writeln!(file, "{} {}", net.id, net.name).map_err(|source| RouterError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        for pip in &net.pips {
            writeln!(file, "{} {}", pip.parent, pip.child).map_err(|source| RouterError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        writeln!(file).map_err(|source| RouterError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    }

    dbg_log!(crate::log::DBG_INFO, "Finish writing.");
    Ok(())
}
