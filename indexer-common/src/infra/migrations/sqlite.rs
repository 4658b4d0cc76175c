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

use crate::infra::pool::sqlite::SqlitePool;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Run the database migrations for SQLite.
pub async fn run(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::migrate!("migrations/sqlite").run(&**pool).await?;
    Ok(())
}

/// Error possibly returned by [run].
#[derive(Debug, Error)]
#[error("cannot run migrations for sqlite")]
pub struct Error(#[from] MigrateError);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::pool::sqlite::{Config, SqlitePool};
    use sqlx::Row;
    use std::{collections::HashSet, error::Error as StdError};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run() -> Result<(), Box<dyn StdError>> {
        let dir = tempdir()?;
        let config = Config {
            path: dir.path().join("indexer.sqlite"),
            max_connections: 1,
        };
        let pool = SqlitePool::new(config).await?;

        run(&pool).await?;

        let table_names = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&*pool)
            .await?
            .into_iter()
            .map(|row| row.get::<String, _>(0))
            .collect::<HashSet<_>>();

        assert!(table_names.contains("block"));
        assert!(table_names.contains("transaction"));
        assert!(table_names.contains("validator"));
        assert!(table_names.contains("event"));

        Ok(())
    }
}
