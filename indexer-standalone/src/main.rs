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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chain indexer: follows a Tendermint-based chain and persists blocks, transactions, validator
/// sets, and runtime events for downstream querying.
#[derive(Debug, Parser)]
#[command(name = "indexer-standalone", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the ingestion pipeline using the given configuration file.
    Parse {
        /// Path to a TOML configuration file.
        config_file: PathBuf,
    },
}

#[cfg(all(feature = "cloud", feature = "standalone"))]
compile_error!("features \"cloud\" and \"standalone\" are mutually exclusive");

#[cfg(feature = "cloud")]
#[tokio::main]
async fn main() {
    use log::error;
    use std::panic;

    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    let Cli {
        command: Command::Parse { config_file },
    } = Cli::parse();

    if let Err(error) = run_cloud(config_file).await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

#[cfg(feature = "cloud")]
async fn run_cloud(config_file: PathBuf) -> anyhow::Result<()> {
    use indexer_standalone::config::Config;
    use anyhow::Context;
    use chain_indexer::infra::{codec::JsonCodec, gateway::TendermintGateway, storage::PostgresStorage};
    use indexer_common::{
        config::ConfigExt,
        infra::{migrations, pool::postgres::PostgresPool},
        telemetry,
    };
    use log::info;
    use tokio::signal::unix::{SignalKind, signal};

    let config = Config::load(&config_file).context("load configuration")?;

    telemetry::init_logging(&config.telemetry_config());
    telemetry::init_tracing();
    telemetry::init_metrics(&config.telemetry_config()).context("init metrics")?;

    info!(config_file:?; "starting chain indexer");

    let sigterm = signal(SignalKind::terminate()).context("register SIGTERM handler")?;

    let pool = PostgresPool::new(config.database.clone())
        .await
        .context("create Postgres pool")?;
    migrations::postgres::run(&pool)
        .await
        .context("run Postgres migrations")?;

    let gateway = TendermintGateway::new(&config.gateway_config()).context("create gateway")?;
    let storage = PostgresStorage::new(pool);
    let codec = JsonCodec;

    chain_indexer::application::run(config.application_config(), gateway, codec, storage, sigterm)
        .await
        .context("run chain indexer")
}

#[cfg(feature = "standalone")]
#[tokio::main]
async fn main() {
    use log::error;
    use std::panic;

    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    let Cli {
        command: Command::Parse { config_file },
    } = Cli::parse();

    if let Err(error) = run_standalone(config_file).await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

#[cfg(feature = "standalone")]
async fn run_standalone(config_file: PathBuf) -> anyhow::Result<()> {
    use indexer_standalone::config::Config;
    use anyhow::Context;
    use chain_indexer::infra::{codec::JsonCodec, gateway::TendermintGateway, storage::SqliteStorage};
    use indexer_common::{
        config::ConfigExt,
        infra::{migrations, pool::sqlite::SqlitePool},
        telemetry,
    };
    use log::info;
    use tokio::signal::unix::{SignalKind, signal};

    let config = Config::load(&config_file).context("load configuration")?;

    telemetry::init_logging(&config.telemetry_config());
    telemetry::init_tracing();
    telemetry::init_metrics(&config.telemetry_config()).context("init metrics")?;

    info!(config_file:?; "starting chain indexer");

    let sigterm = signal(SignalKind::terminate()).context("register SIGTERM handler")?;

    let pool = SqlitePool::new(config.database.clone())
        .await
        .context("create SQLite pool")?;
    migrations::sqlite::run(&pool)
        .await
        .context("run SQLite migrations")?;

    let gateway = TendermintGateway::new(&config.gateway_config()).context("create gateway")?;
    let storage = SqliteStorage::new(pool);
    let codec = JsonCodec;

    chain_indexer::application::run(config.application_config(), gateway, codec, storage, sigterm)
        .await
        .context("run chain indexer")
}

#[cfg(not(any(feature = "cloud", feature = "standalone")))]
fn main() {
    let _ = Cli::parse();
    unimplemented!("enable either the \"cloud\" or \"standalone\" feature")
}
