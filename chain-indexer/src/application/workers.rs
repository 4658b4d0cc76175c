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

use crate::application::metrics::Metrics;
use crate::domain::{
    BlockDossier, Codec, EventRecord, Gateway, Storage, WorkItem, WorkQueueReceiver,
};
use fastrace::trace;
use indexer_common::error::StdErrorExt;
use log::{error, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Drains `receiver` until it is closed or `shutdown` fires, assembling and committing one
/// [WorkItem] at a time. A worker never retries a failed item: the item is logged, counted, and
/// dropped, and the worker moves on to the next one.
pub async fn worker<G, C, S>(
    id: usize,
    gateway: G,
    codec: C,
    storage: S,
    receiver: Arc<WorkQueueReceiver>,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
) where
    G: Gateway,
    C: Codec,
    S: Storage,
{
    loop {
        let item = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => None,
                item = receiver.recv() => item,
            }
        };

        let Some(item) = item else {
            break;
        };

        match item {
            WorkItem::Height(height) => {
                process_height(id, &gateway, &codec, &storage, height, &metrics).await
            }
            WorkItem::Event(event) => process_event(id, &storage, event.into(), &metrics).await,
        }
    }
}

#[trace(properties = { "worker": "{id}", "height": "{height}" })]
async fn process_height<G, C, S>(
    id: usize,
    gateway: &G,
    codec: &C,
    storage: &S,
    height: i64,
    metrics: &Metrics,
) where
    G: Gateway,
    C: Codec,
    S: Storage,
{
    let header = match gateway.block(height).await {
        Ok(header) => header,
        Err(error) => {
            warn!(worker = id, height, error:% = error; "failed to fetch block, dropping");
            metrics.worker_error("transient");
            return;
        }
    };

    let validator_set = match gateway.validators(height).await {
        Ok(validators) => validators,
        Err(error) => {
            warn!(worker = id, height, error:% = error; "failed to fetch validators, dropping");
            metrics.worker_error("transient");
            return;
        }
    };

    let mut transactions = Vec::with_capacity(header.tx_hashes.len());
    for hash in &header.tx_hashes {
        let raw_tx = match gateway.tx_by_hash(hash).await {
            Ok(raw_tx) => raw_tx,
            Err(error) => {
                warn!(worker = id, height, hash, error:% = error; "failed to fetch transaction, dropping block");
                metrics.worker_error("transient");
                return;
            }
        };

        match codec.decode_tx(height, header.timestamp, raw_tx) {
            Ok(tx) => transactions.push(tx),
            Err(error) => {
                warn!(worker = id, height, hash, error:% = error.as_chain(); "failed to decode transaction, dropping block");
                metrics.worker_error("decode");
                return;
            }
        }
    }

    let dossier = BlockDossier {
        height,
        timestamp: header.timestamp,
        proposer: header.proposer,
        hash: header.hash,
        tx_count: transactions.len() as i32,
        validator_set,
        transactions,
    };

    match storage.save_block(&dossier).await {
        Ok(()) => {
            metrics.block_indexed();
            metrics.transactions_indexed(dossier.transactions.len() as u64);
        }
        Err(error) => {
            error!(worker = id, height, error:% = error.as_chain(); "failed to persist block, dropping");
            metrics.worker_error("persistence");
        }
    }
}

#[trace(properties = { "worker": "{id}" })]
async fn process_event<S>(id: usize, storage: &S, event: EventRecord, metrics: &Metrics)
where
    S: Storage,
{
    match storage.save_event(&event).await {
        Ok(()) => metrics.event_indexed(),
        Err(error) => {
            error!(worker = id, query = event.query, error:% = error.as_chain(); "failed to persist event, dropping");
            metrics.worker_error("persistence");
        }
    }
}
