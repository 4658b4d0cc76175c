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

use crate::domain::{BlockHash, ValidatorEntry};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// The block header data a worker needs before it can resolve individual transactions: tx bodies
/// themselves stay opaque bytes, decoded downstream by a [crate::domain::Codec].
#[derive(Debug, Clone)]
pub struct RawBlockHeader {
    pub height: i64,
    pub timestamp: i64,
    pub proposer: String,
    pub hash: BlockHash,

    /// Hex-uppercase hashes of the block's transactions, in the node's returned order.
    pub tx_hashes: Vec<String>,
}

/// An opaque transaction payload as returned by the REST gateway, not yet decoded.
#[derive(Debug, Clone)]
pub struct RawTx {
    pub hash: String,
    pub raw: Vec<u8>,
}

/// The result of executing the block at `height` (tx results, validator updates, consensus
/// parameter updates, events), opaque to the core the same way `genesis` is.
#[derive(Debug, Clone)]
pub struct RawBlockResults {
    pub height: i64,
    pub results: Json,
}

/// An event received from either the `new_block` or a configured event subscription, carried
/// verbatim by a producer into the work queue.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub query: String,
    pub payload: Json,
    pub received_at: i64,
}

/// Height extracted from a raw `new_block` notification.
#[derive(Debug, Clone, Copy)]
pub struct NewBlockNotification {
    pub height: i64,
}

/// A live subscription: a stream of items paired with a cancel handle. The cancel handle MUST be
/// invoked by the caller on exit or the subscription leaks on the node.
pub struct Subscription<T> {
    pub stream: Box<dyn Stream<Item = Result<T, GatewayError>> + Send + Unpin>,
    pub cancel: SubscriptionCancelHandle,
}

/// Error possibly returned by any [Gateway] call. A single boxed type rather than an associated
/// type: producers and workers are generic over `G: Gateway` and still need one stable type to
/// name in a structured log field regardless of which concrete gateway is plugged in.
pub type GatewayError = indexer_common::error::BoxError;

/// Handle used to tear down a subscription obtained from [Gateway::subscribe_new_blocks] or
/// [Gateway::subscribe_events].
#[derive(Debug, Clone)]
pub struct SubscriptionCancelHandle(CancellationToken);

impl SubscriptionCancelHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }
}

/// Boxes a concrete stream as the `Send + Unpin` trait object [Subscription] expects. `Pin<Box<S>>`
/// is itself `Unpin` regardless of whether `S` is, so pinning once up front lets any gateway
/// implementation hand back a plain trait object without naming its stream's concrete type.
pub fn box_stream<T>(
    stream: impl Stream<Item = Result<T, GatewayError>> + Send + 'static,
) -> Box<dyn Stream<Item = Result<T, GatewayError>> + Send + Unpin> {
    let pinned: Pin<Box<dyn Stream<Item = Result<T, GatewayError>> + Send>> = Box::pin(stream);
    Box::new(pinned)
}

/// Unified client over a chain node's push (subscriptions) and pull (height/block/tx/validators)
/// surfaces, plus one-shot REST queries against a higher-level client-facing gateway.
///
/// Implementations must be safe for concurrent use by every producer and every worker: the core
/// never synchronises access to the gateway on its own.
#[trait_variant::make(Send)]
pub trait Gateway
where
    Self: Clone + Send + Sync + 'static,
{
    /// The highest height the node currently knows about.
    async fn latest_height(&self) -> Result<i64, GatewayError>;

    /// The header of the block at `height`, including its transaction hashes.
    async fn block(&self, height: i64) -> Result<RawBlockHeader, GatewayError>;

    /// The result of executing the block at `height`.
    async fn block_results(&self, height: i64) -> Result<RawBlockResults, GatewayError>;

    /// The validator set active at `height`.
    async fn validators(&self, height: i64) -> Result<Vec<ValidatorEntry>, GatewayError>;

    /// The raw (not yet decoded) transaction identified by its 64-character uppercase hex hash,
    /// fetched via the REST capability.
    async fn tx_by_hash(&self, hash: &str) -> Result<RawTx, GatewayError>;

    /// The chain's genesis document, opaque to the core.
    async fn genesis(&self) -> Result<Json, GatewayError>;

    /// A one-shot REST query against the client-facing gateway, decoded into `T`.
    async fn query_rest<T>(&self, endpoint: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned;

    /// Subscribe to `new_block` notifications under the given subscriber identity.
    async fn subscribe_new_blocks(
        &self,
        subscriber_id: &str,
    ) -> Result<Subscription<NewBlockNotification>, GatewayError>;

    /// Subscribe to events matching `query` under the given subscriber identity.
    async fn subscribe_events(
        &self,
        subscriber_id: &str,
        query: &str,
    ) -> Result<Subscription<RawEvent>, GatewayError>;

    /// Release any resources held by the gateway (the shared RPC session). Called once, during
    /// the final step of supervised shutdown.
    async fn stop(&self) -> Result<(), GatewayError>;
}
