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
    infra::pool::postgres::PostgresPool,
};
use indoc::indoc;
use sqlx::{Postgres, QueryBuilder, types::Json};

type Tx = sqlx::Transaction<'static, Postgres>;

/// Postgres based implementation of [Storage].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

impl Storage for PostgresStorage {
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
            timestamp = EXCLUDED.timestamp,
            proposer = EXCLUDED.proposer,
            hash = EXCLUDED.hash,
            tx_count = EXCLUDED.tx_count
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

    save_validators(dossier, tx).await?;
    save_transactions(dossier, tx).await?;

    Ok(())
}

#[trace(properties = { "height": "{dossier.height}" })]
async fn save_validators(dossier: &BlockDossier, tx: &mut Tx) -> Result<(), sqlx::Error> {
    if dossier.validator_set.is_empty() {
        return Ok(());
    }

    let query = indoc! {"
        INSERT INTO validator (height, address, voting_power)
    "};

    QueryBuilder::new(query)
        .push_values(dossier.validator_set.iter(), |mut q, validator| {
            q.push_bind(dossier.height)
                .push_bind(&validator.address)
                .push_bind(validator.voting_power);
        })
        .build()
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[trace(properties = { "height": "{dossier.height}" })]
async fn save_transactions(dossier: &BlockDossier, tx: &mut Tx) -> Result<(), sqlx::Error> {
    if dossier.transactions.is_empty() {
        return Ok(());
    }

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
    "};

    QueryBuilder::new(query)
        .push_values(dossier.transactions.iter(), |mut q, record| {
            q.push_bind(&record.hash)
                .push_bind(record.height)
                .push_bind(record.timestamp)
                .push_bind(record.gas_wanted)
                .push_bind(record.gas_used)
                .push_bind(Json(&record.messages))
                .push_bind(Json(&record.fee))
                .push_bind(Json(&record.signatures))
                .push_bind(&record.memo);
        })
        .push(indoc! {"
            ON CONFLICT (hash) DO UPDATE SET
                height = EXCLUDED.height,
                timestamp = EXCLUDED.timestamp,
                gas_wanted = EXCLUDED.gas_wanted,
                gas_used = EXCLUDED.gas_used,
                messages = EXCLUDED.messages,
                fee = EXCLUDED.fee,
                signatures = EXCLUDED.signatures,
                memo = EXCLUDED.memo
        "})
        .build()
        .execute(&mut **tx)
        .await?;

    Ok(())
}
