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

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool as SqlxSqlitePool, SqlitePoolOptions};
use std::{ops::Deref, path::PathBuf};
use thiserror::Error;

/// Configuration for connecting to a SQLite database file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    1
}

/// A SQLite connection pool, wrapped to give this crate's callers a stable,
/// storage-backend-agnostic type that mirrors [super::postgres::PostgresPool].
#[derive(Debug, Clone)]
pub struct SqlitePool(SqlxSqlitePool);

impl SqlitePool {
    pub async fn new(config: Config) -> Result<Self, Error> {
        let connect_options = SqliteConnectOptions::new()
            .filename(config.path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options)
            .await?;

        Ok(Self(pool))
    }
}

impl Deref for SqlitePool {
    type Target = SqlxSqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error possibly returned by [SqlitePool::new].
#[derive(Debug, Error)]
#[error("cannot create SQLite pool")]
pub struct Error(#[from] sqlx::Error);
