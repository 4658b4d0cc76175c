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

//! Test doubles shared by the scenario tests: a scripted [Gateway] driven entirely by values set
//! up before a test starts (plus two channels a test can push live notifications/events into),
//! and an in-memory [Storage] satisfying the same atomicity/idempotence contract a real backend
//! must.

use async_stream::stream;
use chain_indexer::domain::{
    BlockDossier, BlockInfo, EventRecord, Gateway, GatewayError, NewBlockNotification,
    RawBlockHeader, RawBlockResults, RawEvent, RawTx, Storage, Subscription,
    SubscriptionCancelHandle, ValidatorEntry, box_stream,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A transaction fixture that fails a fixed number of times before it starts succeeding, so tests
/// can exercise the "transient REST flake" scenario deterministically.
#[derive(Debug, Clone)]
struct TxScript {
    body: RawTx,
    fail_remaining: usize,
}

struct GatewayState {
    latest_height: i64,
    blocks: HashMap<i64, RawBlockHeader>,
    validators: HashMap<i64, Vec<ValidatorEntry>>,
    txs: HashMap<String, TxScript>,
    new_blocks: Option<mpsc::UnboundedReceiver<NewBlockNotification>>,
    events: Option<mpsc::UnboundedReceiver<RawEvent>>,
}

/// A [Gateway] double entirely programmed by the test that constructs it: blocks, validator
/// sets, and transactions are fixed values keyed by height/hash, while `new_block` and event
/// subscriptions are fed by channels the test holds the sending half of.
#[derive(Clone)]
pub struct ScriptedGateway(Arc<Mutex<GatewayState>>);

impl ScriptedGateway {
    pub fn builder() -> ScriptedGatewayBuilder {
        ScriptedGatewayBuilder::default()
    }
}

#[derive(Default)]
pub struct ScriptedGatewayBuilder {
    latest_height: i64,
    blocks: HashMap<i64, RawBlockHeader>,
    validators: HashMap<i64, Vec<ValidatorEntry>>,
    txs: HashMap<String, TxScript>,
}

impl ScriptedGatewayBuilder {
    pub fn latest_height(mut self, height: i64) -> Self {
        self.latest_height = height;
        self
    }

    pub fn block(mut self, header: RawBlockHeader) -> Self {
        self.blocks.insert(header.height, header);
        self
    }

    pub fn validators(mut self, height: i64, validators: Vec<ValidatorEntry>) -> Self {
        self.validators.insert(height, validators);
        self
    }

    pub fn tx(mut self, tx: RawTx) -> Self {
        self.txs.insert(
            tx.hash.clone(),
            TxScript {
                body: tx,
                fail_remaining: 0,
            },
        );
        self
    }

    /// Registers a transaction that fails `fail_remaining` times before returning successfully.
    pub fn flaky_tx(mut self, tx: RawTx, fail_remaining: usize) -> Self {
        self.txs.insert(tx.hash.clone(), TxScript { body: tx, fail_remaining });
        self
    }

    /// Builds the gateway, returning it alongside senders a test can use to push `new_block`
    /// notifications and raw events into the live subscriptions.
    pub fn build(
        self,
    ) -> (
        ScriptedGateway,
        mpsc::UnboundedSender<NewBlockNotification>,
        mpsc::UnboundedSender<RawEvent>,
    ) {
        let (new_blocks_tx, new_blocks_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let gateway = ScriptedGateway(Arc::new(Mutex::new(GatewayState {
            latest_height: self.latest_height,
            blocks: self.blocks,
            validators: self.validators,
            txs: self.txs,
            new_blocks: Some(new_blocks_rx),
            events: Some(events_rx),
        })));

        (gateway, new_blocks_tx, events_tx)
    }
}

impl Gateway for ScriptedGateway {
    async fn latest_height(&self) -> Result<i64, GatewayError> {
        Ok(self.0.lock().latest_height)
    }

    async fn block(&self, height: i64) -> Result<RawBlockHeader, GatewayError> {
        self.0
            .lock()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| format!("no such block: {height}").into())
    }

    async fn block_results(&self, height: i64) -> Result<RawBlockResults, GatewayError> {
        Ok(RawBlockResults {
            height,
            results: Json::Null,
        })
    }

    async fn validators(&self, height: i64) -> Result<Vec<ValidatorEntry>, GatewayError> {
        Ok(self.0.lock().validators.get(&height).cloned().unwrap_or_default())
    }

    async fn tx_by_hash(&self, hash: &str) -> Result<RawTx, GatewayError> {
        let mut state = self.0.lock();
        let script = state
            .txs
            .get_mut(hash)
            .ok_or_else(|| format!("no such tx: {hash}"))?;

        if script.fail_remaining > 0 {
            script.fail_remaining -= 1;
            return Err(format!("503 service unavailable fetching {hash}").into());
        }

        Ok(script.body.clone())
    }

    async fn genesis(&self) -> Result<Json, GatewayError> {
        Ok(Json::Null)
    }

    async fn query_rest<T>(&self, _endpoint: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        Err("query_rest is not scripted in this test double".into())
    }

    async fn subscribe_new_blocks(
        &self,
        _subscriber_id: &str,
    ) -> Result<Subscription<NewBlockNotification>, GatewayError> {
        let mut receiver = self
            .0
            .lock()
            .new_blocks
            .take()
            .ok_or_else(|| "new_block subscription already taken".to_string())?;

        let stream = stream! {
            while let Some(item) = receiver.recv().await {
                yield Ok(item);
            }
        };

        Ok(Subscription {
            stream: box_stream(stream),
            cancel: SubscriptionCancelHandle::new(CancellationToken::new()),
        })
    }

    async fn subscribe_events(
        &self,
        _subscriber_id: &str,
        _query: &str,
    ) -> Result<Subscription<RawEvent>, GatewayError> {
        let mut receiver = self
            .0
            .lock()
            .events
            .take()
            .ok_or_else(|| "event subscription already taken".to_string())?;

        let stream = stream! {
            while let Some(item) = receiver.recv().await {
                yield Ok(item);
            }
        };

        Ok(Subscription {
            stream: box_stream(stream),
            cancel: SubscriptionCancelHandle::new(CancellationToken::new()),
        })
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// An in-memory [Storage] double satisfying the same atomicity and idempotence contract as a
/// real backend: `save_block` is insert-or-replace keyed by height, and never leaves a
/// partially-written dossier visible.
#[derive(Clone, Default)]
pub struct InMemoryStorage(Arc<Mutex<Inner>>);

#[derive(Default)]
struct Inner {
    blocks: Vec<BlockDossier>,
    events: Vec<EventRecord>,
}

impl InMemoryStorage {
    pub fn blocks(&self) -> Vec<BlockDossier> {
        self.0.lock().blocks.clone()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.0.lock().events.clone()
    }

    pub fn tx_count(&self) -> usize {
        self.0.lock().blocks.iter().map(|b| b.transactions.len()).sum()
    }

    pub fn contains_height(&self, height: i64) -> bool {
        self.0.lock().blocks.iter().any(|b| b.height == height)
    }
}

impl Storage for InMemoryStorage {
    async fn get_highest_block_info(&self) -> Result<Option<BlockInfo>, sqlx::Error> {
        Ok(self
            .0
            .lock()
            .blocks
            .iter()
            .max_by_key(|b| b.height)
            .map(|b| BlockInfo {
                height: b.height,
                hash: b.hash,
            }))
    }

    async fn save_block(&self, dossier: &BlockDossier) -> Result<(), sqlx::Error> {
        let mut inner = self.0.lock();
        inner.blocks.retain(|b| b.height != dossier.height);
        inner.blocks.push(dossier.clone());
        Ok(())
    }

    async fn save_event(&self, event: &EventRecord) -> Result<(), sqlx::Error> {
        self.0.lock().events.push(event.clone());
        Ok(())
    }
}

/// Builds a [RawTx] whose body is a minimal valid `JsonCodec` envelope for `hash`, so tests don't
/// have to hand-write the REST response shape.
pub fn json_tx(hash: &str) -> RawTx {
    let body = serde_json::json!({
        "tx_response": {
            "txhash": hash,
            "gas_wanted": "100000",
            "gas_used": "54321",
            "tx": {
                "body": { "messages": [], "memo": "" },
                "auth_info": { "fee": {} },
                "signatures": [],
            }
        }
    });

    RawTx {
        hash: hash.to_string(),
        raw: serde_json::to_vec(&body).unwrap(),
    }
}

/// Registers a real SIGTERM handler and immediately raises SIGTERM against the current process,
/// exercising the same shutdown path a deployed process takes from an orchestrator. Safe to call
/// from a single-threaded test process because nothing else in the process is listening for
/// SIGTERM at the time it's raised.
pub fn register_sigterm() -> tokio::signal::unix::Signal {
    use tokio::signal::unix::{SignalKind, signal};
    signal(SignalKind::terminate()).expect("SIGTERM handler can be registered")
}

pub fn raise_sigterm() {
    unsafe {
        libc::raise(libc::SIGTERM);
    }
}
