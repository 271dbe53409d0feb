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

use std::path::PathBuf;
use thiserror::Error;

/// Usage/config-level errors (taxonomy kind 1 in the design doc): bad
/// argv, unopenable or malformed input files. These are reported to the
/// user and cause the binary to exit 1; they are distinct from invariant
/// violations, which remain `panic!`/`assert!`.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    Malformed { path: PathBuf, message: String },
}
