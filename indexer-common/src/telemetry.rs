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

use log::LevelFilter;
use logforth::{append, diagnostic::FastraceDiagnostic, filter::EnvFilter};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::{net::SocketAddr, str::FromStr};

/// Logging and metrics configuration, loaded as part of a binary's top-level `Config`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// The minimum level to log, e.g. `"info"` or `"debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Either `"json"` for machine-readable output or `"text"` for human-readable output.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Address the Prometheus metrics endpoint is exposed on, if metrics are enabled.
    pub metrics_address: Option<SocketAddr>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    #[default]
    Json,
}

/// Initialize the global logger. Must be called exactly once, as early as possible in `main`.
pub fn init_logging(config: &Config) {
    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::Info);

    let stdout = match config.log_format {
        LogFormat::Json => append::Stdout::default().with_layout(append::JsonLayout::default()),
        LogFormat::Text => append::Stdout::default(),
    };

    logforth::builder()
        .dispatch(|d| {
            d.filter(EnvFilter::from_default_env_or(level))
                .diagnostic(FastraceDiagnostic::default())
                .append(stdout)
                .append(append::FastraceEvent::default())
        })
        .apply();
}

/// Initialize the global tracing reporter. Currently a no-op placeholder: this system uses
/// `fastrace` spans directly via `#[trace]`, reported through [`init_logging`]'s
/// `FastraceEvent`/`FastraceDiagnostic` wiring rather than a separate exporter.
pub fn init_tracing() {
    fastrace::set_reporter(
        fastrace::collector::ConsoleReporter,
        fastrace::collector::Config::default(),
    );
}

/// Initialize the global metrics recorder and expose it via an HTTP endpoint, if configured.
pub fn init_metrics(config: &Config) -> anyhow::Result<()> {
    let Some(address) = config.metrics_address else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;

    Ok(())
}
