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

use crate::domain::{BlockDossier, BlockHash, BlockInfo, EventRecord, Storage};
use fastrace::trace;
use indexer_common::{
    bytes::{ByteArray, ByteVec},
    infra::pool::sqlite::SqlitePool,
};
use indoc::indoc;
use sqlx::{Sqlite, types::Json};

type Tx = sqlx::Transaction<'static, Sqlite>;

/// Sqlite based implementation of [Storage]. Rows are inserted one at a time rather than through
/// `QueryBuilder::push_values`, matching SQLite's lack of multi-row `RETURNING`/bulk-bind support.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl Storage for SqliteStorage {
    #[trace]
    async fn get_highest_block_info(&self) -> Result<Option<BlockInfo>, sqlx::Error> {
        let query = indoc! {"
            SELECT height, hash
            FROM block
            ORDER BY height DESC
            LIMIT 1
        "};

        sqlx::query_as::<_, (i64, ByteVec)>(query)
            .fetch_optional(&*self.pool)
            .await?
            .map(|(height, hash)| {
                let hash = ByteArray::<32>::try_from(hash.as_ref())
                    .map(BlockHash::from)
                    .map_err(|error| sqlx::Error::Decode(error.into()))?;

                Ok(BlockInfo { height, hash })
            })
            .transpose()
    }

    #[trace(properties = { "height": "{dossier.height}" })]
    async fn save_block(&self, dossier: &BlockDossier) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        save_block(dossier, &mut tx).await?;
        tx.commit().await
    }

    #[trace]
    async fn save_event(&self, event: &EventRecord) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO event (received_at, query, payload)
            VALUES ($1, $2, $3)
        "};

        sqlx::query(query)
            .bind(event.received_at)
            .bind(&event.query)
            .bind(Json(&event.payload))
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

#[trace(properties = { "height": "{dossier.height}" })]
async fn save_block(dossier: &BlockDossier, tx: &mut Tx) -> Result<(), sqlx::Error> {
    let query = indoc! {"
        INSERT INTO block (height, timestamp, proposer, hash, tx_count)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (height) DO UPDATE SET
            timestamp = excluded.timestamp,
            proposer = excluded.proposer,
            hash = excluded.hash,
            tx_count = excluded.tx_count
    "};

    sqlx::query(query)
        .bind(dossier.height)
        .bind(dossier.timestamp)
        .bind(&dossier.proposer)
        .bind(dossier.hash.as_ref())
        .bind(dossier.tx_count)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM validator WHERE height = $1")
        .bind(dossier.height)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM transaction WHERE height = $1")
        .bind(dossier.height)
        .execute(&mut **tx)
        .await?;

    for validator in &dossier.validator_set {
        let query = indoc! {"
            INSERT INTO validator (height, address, voting_power)
            VALUES ($1, $2, $3)
        "};

        sqlx::query(query)
            .bind(dossier.height)
            .bind(&validator.address)
            .bind(validator.voting_power)
            .execute(&mut **tx)
            .await?;
    }

    for record in &dossier.transactions {
        let query = indoc! {"
            INSERT INTO transaction (
                hash,
                height,
                timestamp,
                gas_wanted,
                gas_used,
                messages,
                fee,
                signatures,
                memo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (hash) DO UPDATE SET
                height = excluded.height,
                timestamp = excluded.timestamp,
                gas_wanted = excluded.gas_wanted,
                gas_used = excluded.gas_used,
                messages = excluded.messages,
                fee = excluded.fee,
                signatures = excluded.signatures,
                memo = excluded.memo
        "};

        sqlx::query(query)
            .bind(&record.hash)
            .bind(record.height)
            .bind(record.timestamp)
            .bind(record.gas_wanted)
            .bind(record.gas_used)
            .bind(Json(&record.messages))
            .bind(Json(&record.fee))
            .bind(Json(&record.signatures))
            .bind(&record.memo)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}
