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

//! A [Gateway] backed by a Tendermint-style node: pulls go over `reqwest`, subscriptions
//! multiplex over one long-lived `tokio-tungstenite` WebSocket.

use crate::domain::{
    BlockHash, Gateway, GatewayError, NewBlockNotification, RawBlockHeader, RawBlockResults,
    RawEvent, RawTx, Subscription, SubscriptionCancelHandle, ValidatorEntry, box_stream,
};
use async_stream::stream;
use dashmap::DashMap;
use fastrace::trace;
use futures::{SinkExt, StreamExt};
use indexer_common::bytes::ByteArray;
use log::info;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};
use tokio::sync::{OnceCell, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SUBSCRIBE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const VALIDATORS_PAGE_SIZE: u32 = 100;

/// Endpoint configuration for a [TendermintGateway]: a Tendermint RPC base (pulls and
/// subscriptions) and a higher-level REST base (`query_rest`, `tx_by_hash`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc_node: String,
    pub client_node: String,
}

/// One JSON-RPC item routed to a live subscription: either a decoded frame or a terminal error
/// (RPC error response, malformed frame, or the underlying connection closing).
type WsItem = Result<Json, GatewayError>;

/// Shared WebSocket session: one `tokio-tungstenite` connection, multiplexed by JSON-RPC id.
/// Constructed lazily on the first subscribe call so a gateway used only for backfill never opens
/// a socket it doesn't need.
struct WsDispatcher {
    next_id: AtomicI64,
    routes: Arc<DashMap<i64, mpsc::UnboundedSender<WsItem>>>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsDispatcher {
    async fn connect(ws_url: &str) -> Result<Arc<Self>, GatewayError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        let routes = Arc::new(DashMap::<i64, mpsc::UnboundedSender<WsItem>>::new());
        let reader_routes = routes.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => dispatch_frame(&reader_routes, &text),
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }

            for route in reader_routes.iter() {
                let _ = route.value().send(Err("websocket connection closed".into()));
            }
            reader_routes.clear();
        });

        Ok(Arc::new(Self {
            next_id: AtomicI64::new(1),
            routes,
            outbound: outbound_tx,
        }))
    }

    /// Sends a `subscribe` request and waits out the handshake deadline for its ack, returning a
    /// receiver fed with every subsequent event delivered under the assigned id.
    async fn subscribe(
        &self,
        query: &str,
    ) -> Result<(i64, mpsc::UnboundedReceiver<WsItem>), GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.routes.insert(id, tx);

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "subscribe",
            "params": { "query": query },
        });
        self.send(&request)?;

        let ack = tokio::time::timeout(SUBSCRIBE_HANDSHAKE_TIMEOUT, rx.recv())
            .await
            .map_err(|_| -> GatewayError { "subscribe handshake timed out".into() })?
            .ok_or_else(|| -> GatewayError { "websocket closed during subscribe handshake".into() })?;
        ack?;

        Ok((id, rx))
    }

    fn unsubscribe(&self, id: i64, query: &str) {
        self.routes.remove(&id);

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "unsubscribe",
            "params": { "query": query },
        });
        let _ = self.send(&request);
    }

    fn send(&self, request: &Json) -> Result<(), GatewayError> {
        let text = serde_json::to_string(request)?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| "websocket writer has shut down".into())
    }
}

fn dispatch_frame(routes: &DashMap<i64, mpsc::UnboundedSender<WsItem>>, text: &str) {
    let Ok(value) = serde_json::from_str::<Json>(text) else {
        return;
    };
    let Some(id) = value.get("id").and_then(Json::as_i64) else {
        return;
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        if let Some((_, sender)) = routes.remove(&id) {
            let _ = sender.send(Err(format!("rpc error: {error}").into()));
        }
        return;
    }

    if let Some(sender) = routes.get(&id) {
        let _ = sender.send(Ok(value));
    }
}

/// Concrete [Gateway] talking to a live Tendermint-style node: pulls via `reqwest`, push
/// subscriptions via one shared WebSocket.
#[derive(Clone)]
pub struct TendermintGateway(Arc<Inner>);

struct Inner {
    rpc_base: String,
    rest_base: String,
    ws_url: String,
    rpc_client: reqwest::Client,
    rest_client: reqwest::Client,
    dispatcher: OnceCell<Arc<WsDispatcher>>,
}

impl TendermintGateway {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let rpc_client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let rest_client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let ws_url = websocket_url(&config.rpc_node)?;

        Ok(Self(Arc::new(Inner {
            rpc_base: config.rpc_node.trim_end_matches('/').to_string(),
            rest_base: config.client_node.trim_end_matches('/').to_string(),
            ws_url,
            rpc_client,
            rest_client,
            dispatcher: OnceCell::new(),
        })))
    }

    async fn dispatcher(&self) -> Result<&Arc<WsDispatcher>, GatewayError> {
        self.0
            .dispatcher
            .get_or_try_init(|| WsDispatcher::connect(&self.0.ws_url))
            .await
    }

    async fn get_rpc<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = format!("{}{path}", self.0.rpc_base);
        let envelope = self
            .0
            .rpc_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<RpcEnvelope<T>>()
            .await?;

        Ok(envelope.result)
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    block_id: BlockId,
    block: BlockBody,
}

#[derive(Debug, Deserialize)]
struct BlockId {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BlockBody {
    header: BlockHeaderJson,
    data: BlockData,
}

#[derive(Debug, Deserialize)]
struct BlockHeaderJson {
    height: String,
    time: String,
    proposer_address: String,
}

#[derive(Debug, Deserialize)]
struct BlockData {
    txs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ValidatorsResult {
    validators: Vec<ValidatorJson>,
    total: String,
}

#[derive(Debug, Deserialize)]
struct ValidatorJson {
    address: String,
    voting_power: String,
}

#[derive(Debug, Deserialize)]
struct GenesisResult {
    genesis: Json,
}

impl Gateway for TendermintGateway {
    #[trace]
    async fn latest_height(&self) -> Result<i64, GatewayError> {
        let status = self.get_rpc::<StatusResult>("/status").await?;
        let height = status.sync_info.latest_block_height.parse()?;

        Ok(height)
    }

    #[trace]
    async fn block(&self, height: i64) -> Result<RawBlockHeader, GatewayError> {
        let result = self
            .get_rpc::<BlockResult>(&format!("/block?height={height}"))
            .await?;

        let hash_bytes = const_hex::decode(&result.block_id.hash)?;
        let hash = BlockHash::from(ByteArray::<32>::try_from(hash_bytes.as_slice())?);

        let timestamp = sqlx::types::time::OffsetDateTime::parse(
            &result.block.header.time,
            &sqlx::types::time::format_description::well_known::Rfc3339,
        )?
        .unix_timestamp();

        let tx_hashes = result
            .block
            .data
            .txs
            .iter()
            .map(|tx| tx_hash_of(tx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawBlockHeader {
            height: result.block.header.height.parse()?,
            timestamp,
            proposer: result.block.header.proposer_address,
            hash,
            tx_hashes,
        })
    }

    #[trace]
    async fn block_results(&self, height: i64) -> Result<RawBlockResults, GatewayError> {
        let results = self
            .get_rpc::<Json>(&format!("/block_results?height={height}"))
            .await?;

        Ok(RawBlockResults { height, results })
    }

    #[trace]
    async fn validators(&self, height: i64) -> Result<Vec<ValidatorEntry>, GatewayError> {
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let result = self
                .get_rpc::<ValidatorsResult>(&format!(
                    "/validators?height={height}&page={page}&per_page={VALIDATORS_PAGE_SIZE}"
                ))
                .await?;

            let fetched = result.validators.len();
            for validator in result.validators {
                entries.push(ValidatorEntry {
                    address: validator.address,
                    voting_power: validator.voting_power.parse()?,
                });
            }

            let total: usize = result.total.parse()?;
            if entries.len() >= total || fetched == 0 {
                break;
            }
            page += 1;
        }

        Ok(entries)
    }

    #[trace]
    async fn tx_by_hash(&self, hash: &str) -> Result<RawTx, GatewayError> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{hash}", self.0.rest_base);
        let bytes = self
            .0
            .rest_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(RawTx {
            hash: hash.to_string(),
            raw: bytes.to_vec(),
        })
    }

    #[trace]
    async fn genesis(&self) -> Result<Json, GatewayError> {
        let result = self.get_rpc::<GenesisResult>("/genesis").await?;
        Ok(result.genesis)
    }

    async fn query_rest<T>(&self, endpoint: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{endpoint}", self.0.rest_base);
        let value = self
            .0
            .rest_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;

        Ok(value)
    }

    #[trace]
    async fn subscribe_new_blocks(
        &self,
        subscriber_id: &str,
    ) -> Result<Subscription<NewBlockNotification>, GatewayError> {
        info!(subscriber_id; "subscribing to new_block notifications");

        let query = "tm.event='NewBlock'";
        let dispatcher = self.dispatcher().await?.clone();
        let (id, mut rx) = dispatcher.subscribe(query).await?;

        let cancel = CancellationToken::new();
        let unsubscribe_on_cancel = cancel.clone();
        let unsubscribe_dispatcher = dispatcher.clone();
        let query_owned = query.to_string();
        tokio::spawn(async move {
            unsubscribe_on_cancel.cancelled().await;
            unsubscribe_dispatcher.unsubscribe(id, &query_owned);
        });

        let stream = stream! {
            while let Some(item) = rx.recv().await {
                match item {
                    Ok(frame) => match parse_new_block_height(&frame) {
                        Some(height) => yield Ok(NewBlockNotification { height }),
                        None => {}
                    },
                    Err(error) => {
                        yield Err(error);
                        break;
                    }
                }
            }
        };

        Ok(Subscription {
            stream: box_stream(stream),
            cancel: SubscriptionCancelHandle::new(cancel),
        })
    }

    #[trace]
    async fn subscribe_events(
        &self,
        subscriber_id: &str,
        query: &str,
    ) -> Result<Subscription<RawEvent>, GatewayError> {
        info!(subscriber_id, query; "subscribing to events");

        let dispatcher = self.dispatcher().await?.clone();
        let (id, mut rx) = dispatcher.subscribe(query).await?;

        let cancel = CancellationToken::new();
        let unsubscribe_on_cancel = cancel.clone();
        let unsubscribe_dispatcher = dispatcher.clone();
        let query_for_cancel = query.to_string();
        tokio::spawn(async move {
            unsubscribe_on_cancel.cancelled().await;
            unsubscribe_dispatcher.unsubscribe(id, &query_for_cancel);
        });

        let query_for_stream = query.to_string();
        let stream = stream! {
            while let Some(item) = rx.recv().await {
                match item {
                    Ok(frame) => {
                        let Some(payload) = frame.get("result").and_then(|r| r.get("data")).cloned()
                        else {
                            continue;
                        };
                        let received_at = sqlx::types::time::OffsetDateTime::now_utc().unix_timestamp();
                        yield Ok(RawEvent { query: query_for_stream.clone(), payload, received_at });
                    }
                    Err(error) => {
                        yield Err(error);
                        break;
                    }
                }
            }
        };

        Ok(Subscription {
            stream: box_stream(stream),
            cancel: SubscriptionCancelHandle::new(cancel),
        })
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        if let Some(dispatcher) = self.0.dispatcher.get() {
            for route in dispatcher.routes.iter() {
                let _ = route.value().send(Err("gateway stopped".into()));
            }
            dispatcher.routes.clear();
        }

        Ok(())
    }
}

fn websocket_url(rpc_node: &str) -> Result<String, GatewayError> {
    let (scheme, rest) = rpc_node
        .split_once("://")
        .ok_or_else(|| -> GatewayError { format!("not a URL: {rpc_node}").into() })?;

    let ws_scheme = match scheme {
        "https" => "wss",
        _ => "ws",
    };
    let rest = rest.trim_end_matches('/');

    Ok(format!("{ws_scheme}://{rest}/websocket"))
}

fn parse_new_block_height(frame: &Json) -> Option<i64> {
    frame
        .get("result")?
        .get("data")?
        .get("value")?
        .get("block")?
        .get("header")?
        .get("height")?
        .as_str()?
        .parse()
        .ok()
}

fn tx_hash_of(tx_base64: &str) -> Result<String, GatewayError> {
    use base64::Engine;

    let raw = base64::engine::general_purpose::STANDARD.decode(tx_base64)?;
    let digest = Sha256::digest(&raw);

    Ok(const_hex::encode_upper(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_rewrites_scheme() {
        assert_eq!(
            websocket_url("http://node.example:26657").unwrap(),
            "ws://node.example:26657/websocket"
        );
        assert_eq!(
            websocket_url("https://node.example").unwrap(),
            "wss://node.example/websocket"
        );
    }

    #[test]
    fn test_websocket_url_trims_trailing_slash() {
        assert_eq!(
            websocket_url("http://node.example/").unwrap(),
            "ws://node.example/websocket"
        );
    }

    #[test]
    fn test_websocket_url_rejects_non_url() {
        assert!(websocket_url("node.example").is_err());
    }

    #[test]
    fn test_tx_hash_of_is_uppercase_hex_sha256() {
        let tx = base64::engine::general_purpose::STANDARD.encode(b"hello world");
        let hash = tx_hash_of(&tx).unwrap();

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash.to_uppercase());
    }

    #[test]
    fn test_parse_new_block_height_extracts_nested_value() {
        let frame = serde_json::json!({
            "result": { "data": { "value": { "block": { "header": { "height": "42" } } } } }
        });
        assert_eq!(parse_new_block_height(&frame), Some(42));
    }

    #[test]
    fn test_parse_new_block_height_returns_none_on_ack_frame() {
        let frame = serde_json::json!({ "result": {} });
        assert_eq!(parse_new_block_height(&frame), None);
    }
}
