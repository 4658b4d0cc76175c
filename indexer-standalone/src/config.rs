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

use chain_indexer::{application, infra::gateway};
use indexer_common::telemetry::{self, LogFormat};
use serde::Deserialize;

#[cfg(feature = "cloud")]
use indexer_common::infra::pool::postgres;

#[cfg(feature = "standalone")]
use indexer_common::infra::pool::sqlite;

/// Top-level configuration, loaded by [indexer_common::config::ConfigExt::load] from the file
/// named on the command line, overlaid by `INDEXER_`-prefixed environment variables. Field names
/// are exactly the flat config keys of this system's external interface, so that a config file or
/// an env var maps onto a single, obvious name.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_start_height")]
    pub start_height: i64,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_true")]
    pub parse_old_blocks: bool,

    #[serde(default = "default_true")]
    pub listen_new_blocks: bool,

    #[serde(default = "default_true")]
    pub listen_events: bool,

    /// Query string used by the Event Listener producer when `listen_events` is enabled. Not
    /// named in this system's original config table (which only toggles the producer on or off);
    /// added because a query string has to come from somewhere. Defaults to all transactions.
    #[serde(default = "default_events_query")]
    pub events_query: String,

    pub rpc_node: String,
    pub client_node: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    pub metrics_address: Option<std::net::SocketAddr>,

    #[cfg(feature = "cloud")]
    #[serde(flatten)]
    pub database: postgres::Config,

    #[cfg(feature = "standalone")]
    #[serde(flatten)]
    pub database: sqlite::Config,
}

impl Config {
    pub fn application_config(&self) -> application::Config {
        application::Config {
            start_height: self.start_height,
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
            parse_old_blocks: self.parse_old_blocks,
            listen_new_blocks: self.listen_new_blocks,
            events_query: self.listen_events.then(|| self.events_query.clone()),
        }
    }

    pub fn gateway_config(&self) -> gateway::Config {
        gateway::Config {
            rpc_node: self.rpc_node.clone(),
            client_node: self.client_node.clone(),
        }
    }

    pub fn telemetry_config(&self) -> telemetry::Config {
        telemetry::Config {
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            metrics_address: self.metrics_address,
        }
    }
}

fn default_start_height() -> i64 {
    1
}

fn default_worker_count() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    chain_indexer::domain::DEFAULT_QUEUE_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_events_query() -> String {
    "tm.event='Tx'".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}
