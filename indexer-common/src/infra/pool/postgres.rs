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

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::{ops::Deref, time::Duration};
use thiserror::Error;

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: SecretString,

    #[serde(default = "default_sslmode")]
    pub sslmode: PgSslMode,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(with = "humantime_serde", default = "default_idle_timeout")]
    pub idle_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_max_lifetime")]
    pub max_lifetime: Duration,
}

fn default_sslmode() -> PgSslMode {
    PgSslMode::Prefer
}

fn default_max_connections() -> u32 {
    10
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_lifetime() -> Duration {
    Duration::from_secs(30 * 60)
}

/// A Postgres connection pool, wrapped to keep [Config] next to its construction and to give this
/// crate's callers a stable, storage-backend-agnostic type.
#[derive(Debug, Clone)]
pub struct PostgresPool(PgPool);

impl PostgresPool {
    pub async fn new(config: Config) -> Result<Self, Error> {
        let connect_options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(config.password.expose_secret())
            .ssl_mode(config.sslmode);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(connect_options)
            .await?;

        Ok(Self(pool))
    }
}

impl Deref for PostgresPool {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error possibly returned by [PostgresPool::new].
#[derive(Debug, Error)]
#[error("cannot create Postgres pool")]
pub struct Error(#[from] sqlx::Error);
