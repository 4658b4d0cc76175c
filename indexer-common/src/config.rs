// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Extension trait providing the standard way this system's binaries load their configuration:
/// built-in defaults, overlaid by a TOML file, overlaid by `INDEXER_`-prefixed environment
/// variables.
pub trait ConfigExt
where
    Self: DeserializeOwned,
{
    /// Load configuration from the given TOML file, then apply `INDEXER_`-prefixed environment
    /// variable overrides (nested keys separated by `__`, e.g. `INDEXER_APPLICATION__LOG_LEVEL`).
    fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("INDEXER_").split("__"))
            .extract()
    }
}

impl<T> ConfigExt for T where T: DeserializeOwned {}
